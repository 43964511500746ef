//! Error taxonomy for the container.
//!
//! Every fallible container operation returns [`ContainerResult`]. Failures
//! during a single bean's creation are wrapped in
//! [`ContainerError::BeanCreation`] tagged with the bean name; disposal
//! failures are caught and logged by the destruction paths instead of
//! propagating.

use thiserror::Error;

/// Unified error type for all container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// No bean definition with the given name exists anywhere in the
    /// factory hierarchy.
    #[error("No bean named '{name}' is defined")]
    NoSuchBeanDefinition { name: String },

    /// Structural registry violation, e.g. a duplicate definition name or an
    /// alias colliding with another bean.
    #[error("Invalid bean definition: {message}")]
    BeanDefinitionStore { message: String },

    /// A structural mutation was attempted after `freeze_configuration`.
    #[error("Cannot {operation}: factory configuration is frozen")]
    ConfigurationFrozen { operation: String },

    /// An unresolvable construction cycle. `path` names the full cycle,
    /// e.g. `a -> b -> a`.
    #[error("Circular reference detected: {path}")]
    CircularReference { path: String },

    /// More than one autowire candidate matched and none could be singled
    /// out by the primary flag or a qualifier.
    #[error("No unique bean of type '{type_name}': matching candidates {candidates:?}")]
    AmbiguousDependency {
        type_name: String,
        candidates: Vec<String>,
    },

    /// A bean definition names a scope that has not been registered.
    #[error("No scope registered for name '{scope}'")]
    UnknownScope { scope: String },

    /// The type-conversion collaborator could not produce the target type.
    #[error("Cannot convert value '{value}' to target type '{target}'")]
    Conversion { value: String, target: String },

    /// Any failure during instantiation, population or post-processing,
    /// tagged with the bean under construction.
    #[error("Error creating bean '{bean}': {source}")]
    BeanCreation {
        bean: String,
        #[source]
        source: Box<ContainerError>,
    },

    /// A typed lookup found a bean of a different concrete type.
    #[error("Bean type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ContainerError {
    /// Wraps an error as a creation failure for `bean`, leaving circular
    /// reference errors untouched so the cycle report survives unwrapped.
    pub fn during_creation(bean: &str, err: ContainerError) -> ContainerError {
        match err {
            e @ ContainerError::CircularReference { .. } => e,
            e @ ContainerError::BeanCreation { .. } => e,
            e => ContainerError::BeanCreation {
                bean: bean.to_string(),
                source: Box::new(e),
            },
        }
    }

    /// Convenience constructor for [`ContainerError::BeanDefinitionStore`].
    pub fn store(message: impl Into<String>) -> ContainerError {
        ContainerError::BeanDefinitionStore {
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type ContainerResult<T> = Result<T, ContainerError>;
