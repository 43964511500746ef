//! Dependency descriptors for autowiring.
//!
//! A descriptor captures one injection point: the requested type, whether
//! the dependency is mandatory, an optional qualifier hint and whether
//! ancestor factories take part in candidate collection. Candidate
//! selection itself lives on the factory, which owns the registries the
//! search runs against.

use std::any::Any;

use crate::definition::TargetType;

/// Description of a single dependency to resolve.
#[derive(Clone, Debug)]
pub struct DependencyDescriptor {
    pub target: TargetType,
    pub required: bool,
    pub qualifier: Option<String>,
    pub search_ancestors: bool,
}

impl DependencyDescriptor {
    /// Required dependency on `T`, ancestor-inclusive.
    pub fn of<T: Any>() -> Self {
        Self {
            target: TargetType::of::<T>(),
            required: true,
            qualifier: None,
            search_ancestors: true,
        }
    }

    pub fn for_target(target: TargetType) -> Self {
        Self {
            target,
            required: true,
            qualifier: None,
            search_ancestors: true,
        }
    }

    /// Marks the dependency optional: zero candidates resolve to absent
    /// instead of failing.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Restricts the match to a qualifier (a definition qualifier, the bean
    /// name, or one of its aliases).
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Restricts candidate collection to the local factory.
    pub fn local_only(mut self) -> Self {
        self.search_ancestors = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_defaults() {
        let descriptor = DependencyDescriptor::of::<String>();
        assert!(descriptor.required);
        assert!(descriptor.search_ancestors);
        assert!(descriptor.qualifier.is_none());
        assert_eq!(descriptor.target.id, std::any::TypeId::of::<String>());
    }

    #[test]
    fn builder_adjustments() {
        let descriptor = DependencyDescriptor::of::<String>()
            .optional()
            .with_qualifier("primaryDs")
            .local_only();
        assert!(!descriptor.required);
        assert!(!descriptor.search_ancestors);
        assert_eq!(descriptor.qualifier.as_deref(), Some("primaryDs"));
    }
}
