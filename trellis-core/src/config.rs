//! Property sources and embedded-value resolution.
//!
//! An [`Environment`] aggregates prioritized [`PropertySource`]s and backs
//! the container's `${...}` placeholder expansion. Definition loading is out
//! of scope here; this layer only answers key lookups and typed binds.

use std::any::Any;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;

use crate::error::{ContainerError, ContainerResult};

/// A configuration value.
#[derive(Debug, Clone)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Int(i) => Some(*i as f64),
            ConfigValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Rendering used when a value is substituted into a placeholder.
    fn render(&self) -> Option<String> {
        match self {
            ConfigValue::String(s) => Some(s.clone()),
            ConfigValue::Int(i) => Some(i.to_string()),
            ConfigValue::Float(f) => Some(f.to_string()),
            ConfigValue::Bool(b) => Some(b.to_string()),
            ConfigValue::Array(_) | ConfigValue::Object(_) => None,
        }
    }

    fn to_toml(&self) -> toml::Value {
        match self {
            ConfigValue::String(s) => toml::Value::String(s.clone()),
            ConfigValue::Int(i) => toml::Value::Integer(*i),
            ConfigValue::Float(f) => toml::Value::Float(*f),
            ConfigValue::Bool(b) => toml::Value::Boolean(*b),
            ConfigValue::Array(items) => {
                toml::Value::Array(items.iter().map(ConfigValue::to_toml).collect())
            }
            ConfigValue::Object(map) => {
                let mut table = toml::map::Map::new();
                for (key, value) in map {
                    table.insert(key.clone(), value.to_toml());
                }
                toml::Value::Table(table)
            }
        }
    }
}

/// A single source of configuration properties.
pub trait PropertySource: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<ConfigValue>;

    fn keys(&self) -> Vec<String>;

    /// Higher priority sources win on key collision.
    fn priority(&self) -> i32 {
        0
    }
}

/// Aggregated configuration view over prioritized sources.
#[derive(Default)]
pub struct Environment {
    sources: RwLock<Vec<Box<dyn PropertySource>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_property_source(&self, source: Box<dyn PropertySource>) {
        let mut sources = self.sources.write();
        sources.push(source);
        sources.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        let sources = self.sources.read();
        for source in sources.iter() {
            if let Some(value) = source.get(key) {
                tracing::trace!("Property '{}' found in source '{}'", key, source.name());
                return Some(value);
            }
        }
        None
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(String::from))
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// Deserializes the subtree under `prefix` into a typed struct.
    ///
    /// Dotted keys are reassembled into nested tables first, so
    /// `server.pool.size = 8` binds to `pool: Pool { size: 8 }` under the
    /// prefix `server`.
    pub fn bind<T: DeserializeOwned>(&self, prefix: &str) -> ContainerResult<T> {
        let prefix_dot = format!("{prefix}.");
        let mut root = toml::map::Map::new();

        let sources = self.sources.read();
        // Lowest priority first so later (higher priority) writes win.
        for source in sources.iter().rev() {
            for key in source.keys() {
                let Some(stripped) = key.strip_prefix(&prefix_dot) else {
                    continue;
                };
                let Some(value) = source.get(&key) else {
                    continue;
                };
                insert_dotted(&mut root, stripped, value.to_toml());
            }
        }
        drop(sources);

        toml::Value::Table(root)
            .try_into()
            .map_err(|e| ContainerError::Conversion {
                value: format!("properties under '{prefix}'"),
                target: format!("{}: {e}", std::any::type_name::<T>()),
            })
    }
}

fn insert_dotted(table: &mut toml::map::Map<String, toml::Value>, key: &str, value: toml::Value) {
    match key.split_once('.') {
        None => {
            table.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = table
                .entry(head.to_string())
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
            if let toml::Value::Table(nested) = entry {
                insert_dotted(nested, rest, value);
            }
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("sources", &self.sources.read().len())
            .finish()
    }
}

/// In-memory property source, mostly for tests and runtime overrides.
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
            priority: 50,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// Process environment variables under a prefix, `APP_DATABASE_URL` →
/// `database.url`.
pub struct EnvironmentPropertySource {
    prefix: String,
    priority: i32,
}

impl EnvironmentPropertySource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            priority: 100,
        }
    }

    fn env_to_key(&self, env_key: &str) -> String {
        let stripped = env_key.strip_prefix(&self.prefix).unwrap_or(env_key);
        stripped.to_lowercase().replace('_', ".")
    }

    fn key_to_env(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.replace('.', "_").to_uppercase())
    }
}

impl PropertySource for EnvironmentPropertySource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        std::env::var(self.key_to_env(key))
            .ok()
            .map(ConfigValue::String)
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars()
            .filter(|(k, _)| k.starts_with(&self.prefix))
            .map(|(k, _)| self.env_to_key(&k))
            .collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// TOML file source with flattened dotted keys.
pub struct TomlPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl TomlPropertySource {
    pub fn from_file(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ContainerError::store(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml_str(&content, path.to_string_lossy().to_string())
    }

    pub fn from_toml_str(content: &str, name: String) -> ContainerResult<Self> {
        let value: toml::Value = toml::from_str(content)
            .map_err(|e| ContainerError::store(format!("Failed to parse TOML '{name}': {e}")))?;

        let mut properties = HashMap::new();
        Self::flatten(&value, String::new(), &mut properties);
        Ok(Self {
            name,
            properties,
            priority: 0,
        })
    }

    /// `{ database: { url: "..." } }` → `{ "database.url": "..." }`.
    fn flatten(value: &toml::Value, prefix: String, result: &mut HashMap<String, ConfigValue>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let next = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    Self::flatten(val, next, result);
                }
            }
            other => {
                result.insert(prefix, Self::to_config(other));
            }
        }
    }

    fn to_config(value: &toml::Value) -> ConfigValue {
        match value {
            toml::Value::String(s) => ConfigValue::String(s.clone()),
            toml::Value::Integer(i) => ConfigValue::Int(*i),
            toml::Value::Float(f) => ConfigValue::Float(*f),
            toml::Value::Boolean(b) => ConfigValue::Bool(*b),
            toml::Value::Array(arr) => {
                ConfigValue::Array(arr.iter().map(Self::to_config).collect())
            }
            toml::Value::Table(table) => {
                let mut map = HashMap::new();
                for (k, v) in table {
                    map.insert(k.clone(), Self::to_config(v));
                }
                ConfigValue::Object(map)
            }
            toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for TomlPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// Resolver applied to string configuration values before use; see
/// `DefaultListableBeanFactory::add_embedded_value_resolver`.
pub type EmbeddedValueResolver = Arc<dyn Fn(&str) -> ContainerResult<String> + Send + Sync>;

/// Placeholder passes are bounded so a value expanding to itself cannot
/// recurse forever.
const MAX_PLACEHOLDER_PASSES: usize = 4;

/// Expands `${key}` and `${key:default}` placeholders from an
/// [`Environment`].
pub struct PlaceholderResolver {
    environment: Arc<Environment>,
}

impl PlaceholderResolver {
    pub fn new(environment: Arc<Environment>) -> Self {
        Self { environment }
    }

    pub fn resolve(&self, text: &str) -> ContainerResult<String> {
        let mut current = text.to_string();
        for _ in 0..MAX_PLACEHOLDER_PASSES {
            if !current.contains("${") {
                break;
            }
            current = self.resolve_pass(&current)?;
        }
        Ok(current)
    }

    fn resolve_pass(&self, text: &str) -> ContainerResult<String> {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                return Err(ContainerError::store(format!(
                    "Unbalanced placeholder in value '{text}'"
                )));
            };
            let placeholder = &after[..end];
            let (key, default) = match placeholder.split_once(':') {
                Some((key, default)) => (key, Some(default)),
                None => (placeholder, None),
            };
            let replacement = match self.environment.get(key).and_then(|v| v.render()) {
                Some(value) => value,
                None => default.map(str::to_string).ok_or_else(|| {
                    ContainerError::store(format!(
                        "Could not resolve placeholder '${{{key}}}' in value '{text}'"
                    ))
                })?,
            };
            result.push_str(&replacement);
            rest = &after[end + 1..];
        }
        result.push_str(rest);
        Ok(result)
    }

    /// Adapts this resolver to the factory's embedded-value interface.
    pub fn into_embedded_resolver(self) -> EmbeddedValueResolver {
        Arc::new(move |text: &str| self.resolve(text))
    }
}

/// The security context forwarded through privileged operations; opaque to
/// the container.
pub type SecurityContext = Arc<dyn Any + Send + Sync>;
