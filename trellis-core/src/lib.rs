// trellis-core: an inversion-of-control bean container
//
// Beans are described declaratively as definitions (construction path,
// scope, dependencies, lifecycle callbacks) and the factory constructs,
// wires and manages them:
// - singleton and prototype scopes, plus registrable custom scopes
// - parent/child factory hierarchies with definition inheritance
// - circular-dependency detection with an early-reference escape hatch
// - an ordered post-processing pipeline around bean creation
// - by-type dependency resolution with primary/qualifier tie-breaking

pub mod attributes;
pub mod config;
pub mod convert;
pub mod definition;
pub mod error;
pub mod factory;
pub mod instantiation;
pub mod logging;
pub mod post_processor;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod singleton;

// 重新导出常用类型
pub use attributes::{AttributeAccessor, AttributeValue};
pub use config::{
    ConfigValue, EmbeddedValueResolver, Environment, EnvironmentPropertySource, MapPropertySource,
    PlaceholderResolver, PropertySource, SecurityContext, TomlPropertySource,
};
pub use convert::{SimpleTypeConverter, TypeConverter};
pub use definition::{
    BeanDefinition, BeanDefinitionSource, BeanRole, BeanSupplier, BeanValue,
    ConstructorArgumentValues, DestroyCallback, FactoryMethod, InitCallback, PropertyApplier,
    PropertyValue, PropertyValues, ResolvedArguments, ResolvedProperties, TargetType, ValueHolder,
};
pub use error::{ContainerError, ContainerResult};
pub use factory::{
    BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, HierarchicalBeanFactory, ListableBeanFactory,
};
pub use instantiation::{InstantiationStrategy, SimpleInstantiationStrategy};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use post_processor::{BeanFactoryPostProcessor, BeanPostProcessor};
pub use registry::AliasRegistry;
pub use resolver::DependencyDescriptor;
pub use scope::{DestructionCallback, Scope, ScopedObjectFactory, SCOPE_PROTOTYPE, SCOPE_SINGLETON};
pub use singleton::{DisposalHook, SingletonBeanRegistry, SingletonFactory};

/// Prelude with the traits and types most embedders need.
pub mod prelude {
    pub use crate::config::{
        ConfigValue, Environment, MapPropertySource, PlaceholderResolver, PropertySource,
        TomlPropertySource,
    };
    pub use crate::definition::{
        BeanDefinition, BeanValue, PropertyValues, ResolvedArguments, ResolvedProperties,
        TargetType, ValueHolder,
    };
    pub use crate::error::{ContainerError, ContainerResult};
    pub use crate::factory::{
        BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
        DefaultListableBeanFactory, HierarchicalBeanFactory, ListableBeanFactory,
    };
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::post_processor::{BeanFactoryPostProcessor, BeanPostProcessor};
    pub use crate::resolver::DependencyDescriptor;
    pub use crate::scope::{Scope, SCOPE_PROTOTYPE, SCOPE_SINGLETON};
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
