//! Alias bookkeeping for bean names.
//!
//! An alias maps an alternate string to a canonical bean name. Aliases may
//! chain (alias → alias → name); lookups always resolve to the canonical
//! name first. Collisions are structural errors, never silent overwrites.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{ContainerError, ContainerResult};

/// Bidirectionally resolvable alias table.
#[derive(Default)]
pub struct AliasRegistry {
    /// alias → target name (which may itself be an alias).
    aliases: RwLock<HashMap<String, String>>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `alias` for `name`.
    ///
    /// Re-registering the same alias for the same target is idempotent; an
    /// alias already bound to a different target fails, as does an alias
    /// chain that would loop back onto itself. An alias equal to its own
    /// target is dropped.
    pub fn register_alias(&self, name: &str, alias: &str) -> ContainerResult<()> {
        let mut aliases = self.aliases.write();
        if alias == name {
            aliases.remove(alias);
            return Ok(());
        }
        if let Some(existing) = aliases.get(alias) {
            if existing == name {
                return Ok(());
            }
            return Err(ContainerError::store(format!(
                "Cannot register alias '{alias}' for name '{name}': it is already registered for name '{existing}'"
            )));
        }
        if Self::chain_contains(&aliases, name, alias) {
            return Err(ContainerError::store(format!(
                "Cannot register alias '{alias}' for name '{name}': circular alias chain"
            )));
        }
        tracing::trace!("Registering alias '{}' for bean '{}'", alias, name);
        aliases.insert(alias.to_string(), name.to_string());
        Ok(())
    }

    /// Whether following `name`'s alias chain reaches `target`.
    fn chain_contains<'a>(aliases: &'a HashMap<String, String>, mut name: &'a str, target: &str) -> bool {
        let mut hops = 0;
        while let Some(next) = aliases.get(name) {
            if next == target {
                return true;
            }
            name = next;
            hops += 1;
            if hops > aliases.len() {
                return true;
            }
        }
        false
    }

    pub fn remove_alias(&self, alias: &str) -> bool {
        self.aliases.write().remove(alias).is_some()
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.read().contains_key(name)
    }

    /// Resolves `name` through the alias table to its canonical bean name.
    pub fn canonical_name(&self, name: &str) -> String {
        let aliases = self.aliases.read();
        let mut canonical = name;
        let mut hops = 0;
        while let Some(next) = aliases.get(canonical) {
            canonical = next;
            hops += 1;
            if hops > aliases.len() {
                break;
            }
        }
        canonical.to_string()
    }

    /// All aliases resolving (directly or transitively) to `name`.
    pub fn get_aliases(&self, name: &str) -> Vec<String> {
        let aliases = self.aliases.read();
        let mut result = Vec::new();
        Self::collect_aliases(&aliases, name, &mut result);
        result
    }

    fn collect_aliases(aliases: &HashMap<String, String>, name: &str, result: &mut Vec<String>) {
        for (alias, target) in aliases {
            if target == name && !result.iter().any(|a| a == alias) {
                result.push(alias.clone());
                Self::collect_aliases(aliases, alias, result);
            }
        }
    }

    /// Applies a string value resolver to every alias and target,
    /// re-registering the resolved pairs.
    pub fn resolve_aliases(
        &self,
        resolver: &dyn Fn(&str) -> ContainerResult<String>,
    ) -> ContainerResult<()> {
        let snapshot: Vec<(String, String)> = {
            let aliases = self.aliases.read();
            aliases
                .iter()
                .map(|(a, n)| (a.clone(), n.clone()))
                .collect()
        };
        for (alias, target) in snapshot {
            let resolved_alias = resolver(&alias)?;
            let resolved_target = resolver(&target)?;
            let mut aliases = self.aliases.write();
            aliases.remove(&alias);
            if resolved_alias == resolved_target {
                continue;
            }
            if let Some(existing) = aliases.get(&resolved_alias) {
                if existing != &resolved_target {
                    return Err(ContainerError::store(format!(
                        "Cannot resolve alias '{alias}' to '{resolved_alias}': it is already registered for name '{existing}'"
                    )));
                }
                continue;
            }
            aliases.insert(resolved_alias, resolved_target);
        }
        Ok(())
    }
}
