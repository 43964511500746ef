//! Instantiation strategy: turns a merged definition plus resolved
//! constructor arguments into a raw, uninitialized instance.
//!
//! The container never constructs objects itself; a definition supplies
//! either a supplier closure or a factory-method path, and the strategy
//! picks between them. Replace the strategy via
//! `DefaultListableBeanFactory::set_instantiation_strategy` to intercept
//! raw construction.

use std::any::Any;
use std::sync::Arc;

use crate::config::SecurityContext;
use crate::definition::{BeanDefinition, ResolvedArguments};
use crate::error::{ContainerError, ContainerResult};

/// Produces raw instances from merged definitions.
pub trait InstantiationStrategy: Send + Sync {
    /// `factory_bean` is the resolved instance named by the definition's
    /// `factory_bean_name`, when that construction path is used. The
    /// security context is forwarded untouched.
    fn instantiate(
        &self,
        definition: &BeanDefinition,
        bean_name: &str,
        factory_bean: Option<&Arc<dyn Any + Send + Sync>>,
        args: &ResolvedArguments,
        security_context: Option<&SecurityContext>,
    ) -> ContainerResult<Box<dyn Any + Send + Sync>>;
}

/// Default strategy: factory method when configured, otherwise the
/// definition's supplier.
pub struct SimpleInstantiationStrategy;

impl InstantiationStrategy for SimpleInstantiationStrategy {
    fn instantiate(
        &self,
        definition: &BeanDefinition,
        bean_name: &str,
        factory_bean: Option<&Arc<dyn Any + Send + Sync>>,
        args: &ResolvedArguments,
        _security_context: Option<&SecurityContext>,
    ) -> ContainerResult<Box<dyn Any + Send + Sync>> {
        if let Some(method) = &definition.factory_method {
            let factory_bean = factory_bean.ok_or_else(|| {
                ContainerError::store(format!(
                    "Bean '{bean_name}' declares a factory method but no factory bean instance was resolved"
                ))
            })?;
            tracing::trace!("Instantiating bean '{}' via factory method", bean_name);
            return method(factory_bean, args);
        }
        if let Some(supplier) = &definition.supplier {
            tracing::trace!("Instantiating bean '{}' via supplier", bean_name);
            return supplier(args);
        }
        Err(ContainerError::store(format!(
            "Bean '{bean_name}' has no construction path: neither a supplier nor a factory method is set"
        )))
    }
}
