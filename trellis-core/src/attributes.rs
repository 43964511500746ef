//! Generic metadata attachment for configuration objects.
//!
//! A [`AttributeAccessor`] is a string-keyed bag of arbitrary values plus a
//! `source` field recording where the holder came from (a file path, a span,
//! a registrar; the container never inspects it).

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared, type-erased attribute value.
pub type AttributeValue = Arc<dyn Any + Send + Sync>;

/// Key→value metadata bag with a traceable source.
#[derive(Clone, Default)]
pub struct AttributeAccessor {
    attributes: HashMap<String, AttributeValue>,
    source: Option<AttributeValue>,
}

impl AttributeAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, replacing any previous value.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(name.into(), value);
    }

    pub fn get_attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Removes and returns the value registered under `name`.
    pub fn remove_attribute(&mut self, name: &str) -> Option<AttributeValue> {
        self.attributes.remove(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    /// Records the configuration source this holder was produced from.
    pub fn set_source(&mut self, source: AttributeValue) {
        self.source = Some(source);
    }

    pub fn source(&self) -> Option<&AttributeValue> {
        self.source.as_ref()
    }

    /// Copies all attributes (and the source, if unset locally) from `other`.
    /// Existing local attributes win on key collision.
    pub fn merge_defaults_from(&mut self, other: &AttributeAccessor) {
        for (name, value) in &other.attributes {
            self.attributes
                .entry(name.clone())
                .or_insert_with(|| Arc::clone(value));
        }
        if self.source.is_none() {
            self.source = other.source.as_ref().map(Arc::clone);
        }
    }
}

impl std::fmt::Debug for AttributeAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeAccessor")
            .field("attribute_names", &self.attribute_names())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}
