//! Extension hooks into bean creation.
//!
//! Processors registered on a factory are invoked in registration order at
//! each extension point; there is no priority sorting at this layer. A hook
//! failure propagates as a creation failure for the bean under construction.

use std::any::Any;
use std::sync::Arc;

use crate::definition::{BeanDefinition, PropertyValues};
use crate::error::ContainerResult;
use crate::factory::DefaultListableBeanFactory;

/// Hook invoked around every bean's creation.
///
/// All methods default to pass-through; implement only the extension points
/// a processor cares about.
///
/// # Example
///
/// ```ignore
/// struct AuditingProcessor;
///
/// impl BeanPostProcessor for AuditingProcessor {
///     fn after_initialization(
///         &self,
///         bean: Arc<dyn Any + Send + Sync>,
///         bean_name: &str,
///     ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
///         tracing::info!("Initialized bean '{}'", bean_name);
///         Ok(bean)
///     }
/// }
/// ```
pub trait BeanPostProcessor: Send + Sync {
    /// Called before the container instantiates the bean. Returning a
    /// surrogate instance short-circuits normal construction; only the
    /// after-initialization hooks still run on it.
    fn before_instantiation(
        &self,
        _definition: &BeanDefinition,
        _bean_name: &str,
    ) -> ContainerResult<Option<Arc<dyn Any + Send + Sync>>> {
        Ok(None)
    }

    /// Called right after raw instantiation. Returning `false` vetoes
    /// property population for this bean.
    fn after_instantiation(
        &self,
        _bean: &Arc<dyn Any + Send + Sync>,
        _bean_name: &str,
    ) -> ContainerResult<bool> {
        Ok(true)
    }

    /// May rewrite the property set before it is resolved and applied.
    fn process_property_values(
        &self,
        property_values: PropertyValues,
        _bean: &Arc<dyn Any + Send + Sync>,
        _bean_name: &str,
    ) -> ContainerResult<PropertyValues> {
        Ok(property_values)
    }

    /// Called after property population, before the init callback.
    fn before_initialization(
        &self,
        bean: Arc<dyn Any + Send + Sync>,
        _bean_name: &str,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        Ok(bean)
    }

    /// Called once initialization is complete. May wrap or replace the
    /// instance, e.g. to hand out a proxy.
    fn after_initialization(
        &self,
        bean: Arc<dyn Any + Send + Sync>,
        _bean_name: &str,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        Ok(bean)
    }

    /// Processor name for logs and diagnostics.
    fn name(&self) -> &str {
        "BeanPostProcessor"
    }
}

/// Hook invoked once against the factory itself, after all definitions are
/// registered and before singleton pre-instantiation. May register, modify
/// or remove definitions.
pub trait BeanFactoryPostProcessor: Send + Sync {
    fn post_process_bean_factory(
        &self,
        factory: &DefaultListableBeanFactory,
    ) -> ContainerResult<()>;
}
