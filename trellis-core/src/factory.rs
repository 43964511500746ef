//! The bean factory engine.
//!
//! Capabilities are modeled as object-safe trait layers ([`BeanFactory`],
//! [`HierarchicalBeanFactory`], [`ListableBeanFactory`],
//! [`ConfigurableBeanFactory`], [`ConfigurableListableBeanFactory`]) plus a
//! generic [`BeanFactoryExt`], all implemented by
//! [`DefaultListableBeanFactory`].
//!
//! Lookup order for `get_bean`: alias canonicalization → local singleton
//! cache (including the sanctioned early reference of a bean this thread is
//! currently creating) → local definition → full delegation to the parent
//! factory. A local definition always shadows a parent definition of the
//! same name.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{EmbeddedValueResolver, SecurityContext};
use crate::convert::{SimpleTypeConverter, TypeConverter};
use crate::definition::{
    BeanDefinition, BeanValue, ResolvedArguments, ResolvedProperties, TargetType,
};
use crate::error::{ContainerError, ContainerResult};
use crate::instantiation::{InstantiationStrategy, SimpleInstantiationStrategy};
use crate::post_processor::{BeanFactoryPostProcessor, BeanPostProcessor};
use crate::registry::AliasRegistry;
use crate::resolver::DependencyDescriptor;
use crate::scope::{Scope, SCOPE_PROTOTYPE, SCOPE_SINGLETON};
use crate::singleton::SingletonBeanRegistry;

static FACTORY_IDS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// Prototype and custom-scoped beans this thread is currently creating,
    /// keyed by factory id. Turns constructor cycles among non-singletons
    /// into errors instead of unbounded recursion.
    static SCOPED_IN_CREATION: RefCell<Vec<(u64, String)>> = const { RefCell::new(Vec::new()) };
}

/// Basic bean access.
pub trait BeanFactory: Send + Sync {
    /// Returns the bean for `name` (or an alias of it), creating it
    /// according to its definition's scope.
    fn get_bean(&self, name: &str) -> ContainerResult<Arc<dyn Any + Send + Sync>>;

    /// Whether this factory or an ancestor can produce a bean for `name`.
    fn contains_bean(&self, name: &str) -> bool;
}

/// Parent/child factory navigation.
pub trait HierarchicalBeanFactory: BeanFactory {
    fn get_parent_bean_factory(&self) -> Option<Arc<dyn ConfigurableListableBeanFactory>>;

    /// Checks this factory level only, ignoring ancestors.
    fn contains_local_bean(&self, name: &str) -> bool;
}

/// Enumeration of the local definition space.
pub trait ListableBeanFactory: BeanFactory {
    fn get_bean_names(&self) -> Vec<String>;

    /// Names of local definitions (and manual singletons) producing the
    /// given type.
    fn get_bean_names_for_type(&self, type_id: TypeId) -> Vec<String>;

    fn get_bean_definition_count(&self) -> usize;

    fn contains_bean_definition(&self, name: &str) -> bool;
}

/// Configuration surface: definition registration, aliases, scopes,
/// post-processors, lifecycle control.
pub trait ConfigurableBeanFactory: HierarchicalBeanFactory {
    fn register_bean_definition(
        &self,
        name: &str,
        definition: BeanDefinition,
    ) -> ContainerResult<()>;

    fn remove_bean_definition(&self, name: &str) -> ContainerResult<()>;

    fn get_bean_definition(&self, name: &str) -> ContainerResult<BeanDefinition>;

    /// Returns the flattened definition for `name`, folding in the parent
    /// definition chain (locally or through ancestor factories).
    fn get_merged_bean_definition(&self, name: &str) -> ContainerResult<Arc<BeanDefinition>>;

    fn register_alias(&self, name: &str, alias: &str) -> ContainerResult<()>;

    fn get_aliases(&self, name: &str) -> Vec<String>;

    /// Registers an externally constructed singleton.
    fn register_singleton(
        &self,
        name: &str,
        instance: Arc<dyn Any + Send + Sync>,
    ) -> ContainerResult<()>;

    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>);

    fn get_bean_post_processor_count(&self) -> usize;

    fn register_scope(&self, name: &str, scope: Arc<dyn Scope>) -> ContainerResult<()>;

    /// Explicitly registered scopes only; built-ins are never exposed.
    fn get_registered_scope(&self, name: &str) -> Option<Arc<dyn Scope>>;

    fn get_registered_scope_names(&self) -> Vec<String>;

    fn resolve_embedded_value(&self, value: &str) -> ContainerResult<String>;

    fn freeze_configuration(&self);

    fn is_configuration_frozen(&self) -> bool;

    fn is_currently_in_creation(&self, name: &str) -> bool;

    /// Container-internal override of the in-creation marker.
    fn set_currently_in_creation(&self, name: &str, in_creation: bool);

    /// Records that `dependent` must be destroyed before `name`.
    fn register_dependent_bean(&self, name: &str, dependent: &str);

    fn get_dependent_beans(&self, name: &str) -> Vec<String>;

    fn get_dependencies_for_bean(&self, name: &str) -> Vec<String>;

    /// Runs the disposal hook of `instance` (usually a caller-owned
    /// prototype). Failures are logged, never propagated.
    fn destroy_bean(&self, name: &str, instance: &Arc<dyn Any + Send + Sync>);

    /// Evicts and disposes the named bean from its custom scope.
    fn destroy_scoped_bean(&self, name: &str);

    /// Destroys all singletons, dependents before dependencies.
    fn destroy_singletons(&self);
}

/// Full engine surface: bootstrap plus autowiring.
pub trait ConfigurableListableBeanFactory: ConfigurableBeanFactory + ListableBeanFactory {
    /// Eagerly creates every non-lazy singleton. On failure the factory is
    /// left partially initialized; tearing it down is the caller's job.
    fn pre_instantiate_singletons(&self) -> ContainerResult<()>;

    /// Registers a fixed value resolved for dependencies on `target`,
    /// bypassing the bean registry entirely.
    fn register_resolvable_dependency(
        &self,
        target: TargetType,
        value: Arc<dyn Any + Send + Sync>,
    );

    fn ignore_dependency_type(&self, target: TargetType);

    fn ignore_dependency_interface(&self, target: TargetType);

    /// Whether the named bean would be selected for the descriptor. Fails
    /// with `AmbiguousDependency` when no unique candidate exists.
    fn is_autowire_candidate(
        &self,
        name: &str,
        descriptor: &DependencyDescriptor,
    ) -> ContainerResult<bool>;

    /// Resolves a dependency descriptor to an instance, or `None` for an
    /// optional dependency with no candidates.
    fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
    ) -> ContainerResult<Option<Arc<dyn Any + Send + Sync>>>;
}

/// Generic conveniences on top of the object-safe traits.
pub trait BeanFactoryExt: ListableBeanFactory {
    /// Typed lookup by name.
    fn get_bean_as<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>> {
        self.get_bean(name)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
                found: "bean of different type".to_string(),
            })
    }

    /// Typed lookup by unique type.
    fn get_bean_of_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        let type_name = std::any::type_name::<T>();
        let names = self.get_bean_names_for_type(TypeId::of::<T>());
        match names.as_slice() {
            [] => Err(ContainerError::NoSuchBeanDefinition {
                name: type_name.to_string(),
            }),
            [name] => self.get_bean_as(name),
            _ => Err(ContainerError::AmbiguousDependency {
                type_name: type_name.to_string(),
                candidates: names,
            }),
        }
    }

    fn contains_bean_of_type<T: Any + Send + Sync>(&self) -> bool {
        !self.get_bean_names_for_type(TypeId::of::<T>()).is_empty()
    }
}

impl<F: ListableBeanFactory + ?Sized> BeanFactoryExt for F {}

/// Default implementation of the full factory surface.
pub struct DefaultListableBeanFactory {
    id: u64,

    definitions: RwLock<HashMap<String, BeanDefinition>>,

    /// Registration order; pre-instantiation follows it.
    definition_names: RwLock<Vec<String>>,

    /// Merged definitions, keyed by canonical bean name. Reset whenever a
    /// mutation touches the name or an ancestor in its parent chain;
    /// permanent once the configuration is frozen.
    merged_definitions: RwLock<HashMap<String, Arc<BeanDefinition>>>,

    aliases: AliasRegistry,

    singletons: SingletonBeanRegistry,

    scopes: RwLock<HashMap<String, Arc<dyn Scope>>>,

    bean_post_processors: RwLock<Vec<Arc<dyn BeanPostProcessor>>>,
    factory_post_processors: RwLock<Vec<Arc<dyn BeanFactoryPostProcessor>>>,

    resolvable_dependencies: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    ignored_dependency_types: RwLock<HashSet<TypeId>>,

    embedded_value_resolvers: RwLock<Vec<EmbeddedValueResolver>>,

    type_converter: RwLock<Arc<dyn TypeConverter>>,
    instantiation_strategy: RwLock<Arc<dyn InstantiationStrategy>>,

    parent: RwLock<Option<Arc<dyn ConfigurableListableBeanFactory>>>,

    frozen: AtomicBool,

    /// Early-reference escape hatch for property cycles.
    allow_circular_references: AtomicBool,

    security_context: RwLock<Option<SecurityContext>>,
}

impl Default for DefaultListableBeanFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultListableBeanFactory {
    pub fn new() -> Self {
        Self {
            id: FACTORY_IDS.fetch_add(1, Ordering::Relaxed),
            definitions: RwLock::new(HashMap::new()),
            definition_names: RwLock::new(Vec::new()),
            merged_definitions: RwLock::new(HashMap::new()),
            aliases: AliasRegistry::new(),
            singletons: SingletonBeanRegistry::new(),
            scopes: RwLock::new(HashMap::new()),
            bean_post_processors: RwLock::new(Vec::new()),
            factory_post_processors: RwLock::new(Vec::new()),
            resolvable_dependencies: RwLock::new(HashMap::new()),
            ignored_dependency_types: RwLock::new(HashSet::new()),
            embedded_value_resolvers: RwLock::new(Vec::new()),
            type_converter: RwLock::new(Arc::new(SimpleTypeConverter)),
            instantiation_strategy: RwLock::new(Arc::new(SimpleInstantiationStrategy)),
            parent: RwLock::new(None),
            frozen: AtomicBool::new(false),
            allow_circular_references: AtomicBool::new(true),
            security_context: RwLock::new(None),
        }
    }

    /// Sets the parent factory. The parent cannot be changed once set.
    pub fn set_parent_bean_factory(
        &self,
        parent: Arc<dyn ConfigurableListableBeanFactory>,
    ) -> ContainerResult<()> {
        let mut slot = self.parent.write();
        if slot.is_some() {
            return Err(ContainerError::store(
                "Parent bean factory is already set and cannot be changed",
            ));
        }
        *slot = Some(parent);
        Ok(())
    }

    /// Enables or disables the early-reference escape hatch for property
    /// cycles. On by default.
    pub fn set_allow_circular_references(&self, allow: bool) {
        self.allow_circular_references.store(allow, Ordering::Release);
    }

    pub fn allow_circular_references(&self) -> bool {
        self.allow_circular_references.load(Ordering::Acquire)
    }

    pub fn set_type_converter(&self, converter: Arc<dyn TypeConverter>) {
        *self.type_converter.write() = converter;
    }

    /// The converter applied to property values and constructor arguments.
    pub fn type_converter(&self) -> Arc<dyn TypeConverter> {
        Arc::clone(&self.type_converter.read())
    }

    pub fn set_instantiation_strategy(&self, strategy: Arc<dyn InstantiationStrategy>) {
        *self.instantiation_strategy.write() = strategy;
    }

    /// Appends a resolver applied to string configuration values before use.
    pub fn add_embedded_value_resolver(&self, resolver: EmbeddedValueResolver) {
        self.embedded_value_resolvers.write().push(resolver);
    }

    /// Stores the opaque security context forwarded through privileged
    /// operations. Set once before bootstrap.
    pub fn set_security_context(&self, context: SecurityContext) {
        *self.security_context.write() = Some(context);
    }

    pub fn security_context(&self) -> Option<SecurityContext> {
        self.security_context.read().clone()
    }

    pub fn add_bean_factory_post_processor(&self, processor: Arc<dyn BeanFactoryPostProcessor>) {
        self.factory_post_processors.write().push(processor);
    }

    /// Runs all registered factory post-processors against this factory, in
    /// registration order.
    pub fn apply_bean_factory_post_processors(&self) -> ContainerResult<()> {
        let processors: Vec<_> = self.factory_post_processors.read().clone();
        for processor in processors {
            processor.post_process_bean_factory(self)?;
        }
        Ok(())
    }

    /// Registers every definition a source yields, in source order.
    pub fn register_definitions_from(
        &self,
        source: &mut dyn crate::definition::BeanDefinitionSource,
    ) -> ContainerResult<()> {
        for (name, definition) in source.bean_definitions()? {
            self.register_bean_definition(&name, definition)?;
        }
        Ok(())
    }

    /// Applies a string value resolver to all registered aliases and their
    /// targets.
    pub fn resolve_aliases(
        &self,
        resolver: &dyn Fn(&str) -> ContainerResult<String>,
    ) -> ContainerResult<()> {
        self.aliases.resolve_aliases(resolver)
    }

    /// Copies factory configuration (processors, scopes, resolvable
    /// dependencies, converters, flags) from another factory. Bean
    /// definitions and aliases are deliberately not copied.
    pub fn copy_configuration_from(&self, other: &DefaultListableBeanFactory) {
        self.bean_post_processors
            .write()
            .extend(other.bean_post_processors.read().iter().cloned());
        self.factory_post_processors
            .write()
            .extend(other.factory_post_processors.read().iter().cloned());
        self.scopes.write().extend(
            other
                .scopes
                .read()
                .iter()
                .map(|(name, scope)| (name.clone(), Arc::clone(scope))),
        );
        self.resolvable_dependencies.write().extend(
            other
                .resolvable_dependencies
                .read()
                .iter()
                .map(|(id, value)| (*id, Arc::clone(value))),
        );
        self.ignored_dependency_types
            .write()
            .extend(other.ignored_dependency_types.read().iter().copied());
        self.embedded_value_resolvers
            .write()
            .extend(other.embedded_value_resolvers.read().iter().cloned());
        *self.type_converter.write() = Arc::clone(&other.type_converter.read());
        *self.instantiation_strategy.write() = Arc::clone(&other.instantiation_strategy.read());
        self.allow_circular_references
            .store(other.allow_circular_references(), Ordering::Release);
        if let Some(context) = other.security_context() {
            *self.security_context.write() = Some(context);
        }
    }

    fn check_not_frozen(&self, operation: &str) -> ContainerResult<()> {
        if self.frozen.load(Ordering::Acquire) {
            return Err(ContainerError::ConfigurationFrozen {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    fn canonical_name(&self, name: &str) -> String {
        self.aliases.canonical_name(name)
    }

    fn bean_post_processor_list(&self) -> Vec<Arc<dyn BeanPostProcessor>> {
        self.bean_post_processors.read().clone()
    }

    /// Drops the merged definition for `name` and, transitively, for every
    /// local definition inheriting from it.
    fn reset_merged_definition(&self, name: &str) {
        self.merged_definitions.write().remove(name);
        let children: Vec<String> = {
            let definitions = self.definitions.read();
            definitions
                .iter()
                .filter(|(_, def)| {
                    def.parent_name
                        .as_deref()
                        .map(|p| self.canonical_name(p) == name)
                        .unwrap_or(false)
                })
                .map(|(child, _)| child.clone())
                .collect()
        };
        for child in children {
            self.reset_merged_definition(&child);
        }
    }

    fn merged_definition_inner(
        &self,
        bean_name: &str,
        visiting: &mut Vec<String>,
    ) -> ContainerResult<Arc<BeanDefinition>> {
        if let Some(cached) = self.merged_definitions.read().get(bean_name) {
            return Ok(Arc::clone(cached));
        }
        if visiting.iter().any(|n| n == bean_name) {
            visiting.push(bean_name.to_string());
            return Err(ContainerError::store(format!(
                "Circular parent chain in bean definitions: {}",
                visiting.join(" -> ")
            )));
        }
        visiting.push(bean_name.to_string());

        let definition = self.get_bean_definition(bean_name)?;
        let merged = match &definition.parent_name {
            None => definition,
            Some(parent_name) => {
                let parent_canonical = self.canonical_name(parent_name);
                let parent_merged = if self.contains_bean_definition(&parent_canonical) {
                    self.merged_definition_inner(&parent_canonical, visiting)?
                } else if let Some(parent_factory) = self.get_parent_bean_factory() {
                    parent_factory.get_merged_bean_definition(parent_name)?
                } else {
                    return Err(ContainerError::NoSuchBeanDefinition {
                        name: parent_name.clone(),
                    });
                };
                definition.merged_with_parent(&parent_merged)
            }
        };
        visiting.pop();

        let merged = Arc::new(merged);
        self.merged_definitions
            .write()
            .insert(bean_name.to_string(), Arc::clone(&merged));
        Ok(merged)
    }

    fn do_get_bean(&self, name: &str) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        let bean_name = self.canonical_name(name);
        tracing::trace!("Requesting bean '{}'", bean_name);

        // Completed singleton, or the early reference of a bean this thread
        // is currently creating (the sanctioned way to break a property
        // cycle).
        let allow_early = self.allow_circular_references()
            && self.singletons.in_creation_on_current_thread(&bean_name);
        if let Some(shared) = self.singletons.get_singleton(&bean_name, allow_early) {
            tracing::trace!("Returning cached instance of singleton bean '{}'", bean_name);
            return Ok(shared);
        }

        if !self.contains_bean_definition(&bean_name) {
            // Not defined locally: delegate the lookup wholesale to the
            // parent, which applies its own merging, scopes and processors.
            if let Some(parent) = self.get_parent_bean_factory() {
                tracing::trace!("Delegating lookup of '{}' to parent factory", name);
                return parent.get_bean(name);
            }
            return Err(ContainerError::NoSuchBeanDefinition { name: bean_name });
        }

        let merged = self.get_merged_bean_definition(&bean_name)?;
        if merged.abstract_def {
            return Err(ContainerError::store(format!(
                "Bean definition '{bean_name}' is abstract and can only serve as a parent template"
            )));
        }

        // Explicit depends-on edges: fully initialize them first.
        if let Some(depends_on) = &merged.depends_on {
            for dep in depends_on {
                let dep = self.canonical_name(dep);
                if self.singletons.is_dependent(&bean_name, &dep) {
                    return Err(ContainerError::CircularReference {
                        path: format!("{bean_name} -> {dep} -> {bean_name} (depends-on)"),
                    });
                }
                self.singletons.register_dependent_bean(&dep, &bean_name);
                self.get_bean(&dep)?;
            }
        }

        match merged.resolved_scope() {
            SCOPE_SINGLETON => self
                .singletons
                .get_or_create_singleton(&bean_name, || self.create_bean(&bean_name, &merged))
                .map_err(|e| ContainerError::during_creation(&bean_name, e)),
            SCOPE_PROTOTYPE => {
                tracing::debug!("Creating instance of prototype bean '{}'", bean_name);
                let _guard = ScopedCreationGuard::enter(self, &bean_name)?;
                self.create_bean(&bean_name, &merged)
                    .map_err(|e| ContainerError::during_creation(&bean_name, e))
            }
            scope_name => {
                let scope = self.get_registered_scope(scope_name).ok_or_else(|| {
                    ContainerError::UnknownScope {
                        scope: scope_name.to_string(),
                    }
                })?;
                tracing::debug!(
                    "Resolving bean '{}' through scope '{}'",
                    bean_name,
                    scope_name
                );
                let _guard = ScopedCreationGuard::enter(self, &bean_name)?;
                let mut object_factory = || self.create_bean(&bean_name, &merged);
                scope
                    .get(&bean_name, &mut object_factory)
                    .map_err(|e| ContainerError::during_creation(&bean_name, e))
            }
        }
    }

    /// Full creation pipeline for one bean: post-processor extension points,
    /// constructor-argument resolution, instantiation, early exposure,
    /// property population, initialization and disposal registration.
    fn create_bean(
        &self,
        bean_name: &str,
        merged: &BeanDefinition,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        let processors = self.bean_post_processor_list();

        // Extension point 1: a processor may short-circuit construction
        // with a surrogate; only after-initialization hooks still apply.
        for processor in &processors {
            if let Some(surrogate) = processor.before_instantiation(merged, bean_name)? {
                tracing::debug!(
                    "Construction of bean '{}' short-circuited by processor '{}'",
                    bean_name,
                    processor.name()
                );
                let mut bean = surrogate;
                for processor in &processors {
                    bean = processor.after_initialization(bean, bean_name)?;
                }
                return Ok(bean);
            }
        }

        // Resolve the factory bean (alternate construction path) and the
        // constructor arguments before touching the instantiation strategy.
        let factory_bean = match &merged.factory_bean_name {
            Some(factory_name) => {
                let instance = self.get_bean(factory_name)?;
                self.singletons
                    .register_dependent_bean(&self.canonical_name(factory_name), bean_name);
                Some(instance)
            }
            None => None,
        };

        let mut args = ResolvedArguments::default();
        for (index, holder) in merged.constructor_args.indexed() {
            let value = self.resolve_bean_value(&holder.value, holder.target.as_ref(), bean_name)?;
            args.push_indexed(index, value);
        }
        for holder in merged.constructor_args.generic() {
            let value = self.resolve_bean_value(&holder.value, holder.target.as_ref(), bean_name)?;
            args.push_generic(value);
        }

        let strategy = Arc::clone(&self.instantiation_strategy.read());
        let security_context = self.security_context();
        let raw: Arc<dyn Any + Send + Sync> = Arc::from(strategy.instantiate(
            merged,
            bean_name,
            factory_bean.as_ref(),
            &args,
            security_context.as_ref(),
        )?);

        // Early-reference escape hatch: expose the raw instance while this
        // singleton is still in creation so a property cycle can close.
        let early_exposable = merged.is_singleton()
            && self.allow_circular_references()
            && self.singletons.is_currently_in_creation(bean_name);
        if early_exposable {
            let early = Arc::clone(&raw);
            self.singletons
                .add_singleton_factory(bean_name, Box::new(move || early));
        }

        // Extension point 2: veto property population.
        let mut populate = true;
        for processor in &processors {
            if !processor.after_instantiation(&raw, bean_name)? {
                tracing::debug!(
                    "Property population of bean '{}' vetoed by processor '{}'",
                    bean_name,
                    processor.name()
                );
                populate = false;
                break;
            }
        }

        if populate {
            // Extension point 3: rewrite the property set.
            let mut property_values = merged.property_values.clone();
            for processor in &processors {
                property_values =
                    processor.process_property_values(property_values, &raw, bean_name)?;
            }
            if !property_values.is_empty() {
                let mut resolved = ResolvedProperties::default();
                for property in property_values.iter() {
                    let value = self.resolve_bean_value(&property.value, None, bean_name)?;
                    resolved.push(property.name.clone(), value);
                }
                let applier = merged.property_applier.as_ref().ok_or_else(|| {
                    ContainerError::store(format!(
                        "Bean '{bean_name}' carries {} property value(s) but no property applier",
                        property_values.len()
                    ))
                })?;
                applier(&raw, &resolved)?;
            }
        }

        // Extension point 4, init callback, extension point 5.
        let mut bean = Arc::clone(&raw);
        for processor in &processors {
            bean = processor.before_initialization(bean, bean_name)?;
        }
        if let Some(init) = &merged.init_callback {
            tracing::trace!("Invoking init callback of bean '{}'", bean_name);
            init(&bean)?;
        }
        for processor in &processors {
            bean = processor.after_initialization(bean, bean_name)?;
        }

        // Convergence: once the raw instance leaked through the early
        // reference, the finished bean must be that same instance.
        if early_exposable
            && self.singletons.early_reference_exposed(bean_name)
            && !Arc::ptr_eq(&bean, &raw)
        {
            return Err(ContainerError::store(format!(
                "Bean '{bean_name}' was replaced during initialization, but its raw version has \
                 already been injected into other beans via an early reference"
            )));
        }

        self.register_disposal(bean_name, merged, &bean);
        Ok(bean)
    }

    fn register_disposal(
        &self,
        bean_name: &str,
        merged: &BeanDefinition,
        bean: &Arc<dyn Any + Send + Sync>,
    ) {
        let Some(destroy) = merged.destroy_callback.clone() else {
            return;
        };
        match merged.resolved_scope() {
            SCOPE_SINGLETON => {
                let instance = Arc::clone(bean);
                self.singletons.register_disposable(
                    bean_name,
                    Box::new(move || destroy(&instance)),
                );
            }
            // Prototypes are caller-owned; see `destroy_bean`.
            SCOPE_PROTOTYPE => {}
            scope_name => {
                if let Some(scope) = self.get_registered_scope(scope_name) {
                    let instance = Arc::clone(bean);
                    let name = bean_name.to_string();
                    scope.register_destruction_callback(
                        bean_name,
                        Box::new(move || {
                            if let Err(err) = destroy(&instance) {
                                tracing::warn!("Destruction of scoped bean '{}' failed: {}", name, err);
                            }
                        }),
                    );
                }
            }
        }
    }

    /// Resolves one configured value: embedded placeholders for strings,
    /// `get_bean` for runtime references (recording the dependency edge),
    /// then type conversion against the optional target.
    fn resolve_bean_value(
        &self,
        value: &BeanValue,
        target: Option<&TargetType>,
        requesting_bean: &str,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        let converter = Arc::clone(&self.type_converter.read());
        let prepared = self.prepare_bean_value(value, requesting_bean)?;
        converter.convert(prepared, target)
    }

    /// Reference and placeholder resolution, recursively through lists.
    fn prepare_bean_value(
        &self,
        value: &BeanValue,
        requesting_bean: &str,
    ) -> ContainerResult<BeanValue> {
        match value {
            BeanValue::Ref(ref_name) => {
                let instance = self.get_bean(ref_name)?;
                self.singletons
                    .register_dependent_bean(&self.canonical_name(ref_name), requesting_bean);
                Ok(BeanValue::Instance(instance))
            }
            BeanValue::Str(text) => Ok(BeanValue::Str(self.resolve_embedded_value(text)?)),
            BeanValue::List(items) => Ok(BeanValue::List(
                items
                    .iter()
                    .map(|item| self.prepare_bean_value(item, requesting_bean))
                    .collect::<ContainerResult<Vec<_>>>()?,
            )),
            other => Ok(other.clone()),
        }
    }

    /// Shared candidate selection for `resolve_dependency` and
    /// `is_autowire_candidate`: fixed-value bypass excluded, this applies
    /// the type filter, then primary, then qualifier, in that order.
    fn select_candidate_name(
        &self,
        descriptor: &DependencyDescriptor,
    ) -> ContainerResult<Option<String>> {
        if self
            .ignored_dependency_types
            .read()
            .contains(&descriptor.target.id)
        {
            return Ok(None);
        }

        let mut candidates: Vec<String> = Vec::new();
        for name in self.autowire_candidate_names(descriptor.target.id) {
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }
        if descriptor.search_ancestors {
            if let Some(parent) = self.get_parent_bean_factory() {
                for name in parent.get_bean_names_for_type(descriptor.target.id) {
                    // A local definition shadows a parent bean of the
                    // same name.
                    if self.contains_local_bean(&name) || candidates.contains(&name) {
                        continue;
                    }
                    let eligible = match parent.get_merged_bean_definition(&name) {
                        Ok(merged) => merged.is_autowire_candidate(),
                        Err(_) => true,
                    };
                    if eligible {
                        candidates.push(name);
                    }
                }
            }
        }

        match candidates.len() {
            0 => Ok(None),
            1 => Ok(Some(candidates.remove(0))),
            _ => self.tie_break(descriptor, candidates),
        }
    }

    /// Local definition and manual-singleton names eligible for autowiring
    /// into the descriptor's type.
    fn autowire_candidate_names(&self, type_id: TypeId) -> Vec<String> {
        let mut names = Vec::new();
        let defined: Vec<String> = self.definition_names.read().clone();
        for name in defined {
            let Ok(merged) = self.get_merged_bean_definition(&name) else {
                continue;
            };
            if merged.abstract_def || !merged.is_autowire_candidate() {
                continue;
            }
            if merged.bean_type.map(|t| t.id) == Some(type_id) {
                names.push(name);
            }
        }
        for name in self.singletons.singleton_names() {
            if self.contains_bean_definition(&name) {
                continue;
            }
            if self.singletons.singleton_type_id(&name) == Some(type_id) {
                names.push(name);
            }
        }
        names
    }

    /// Merged definition for a candidate that may live at this level or in
    /// an ancestor factory.
    fn merged_definition_anywhere(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        if self.contains_bean_definition(name) {
            return self.get_merged_bean_definition(name).ok();
        }
        self.get_parent_bean_factory()?
            .get_merged_bean_definition(name)
            .ok()
    }

    fn tie_break(
        &self,
        descriptor: &DependencyDescriptor,
        candidates: Vec<String>,
    ) -> ContainerResult<Option<String>> {
        let primaries: Vec<String> = candidates
            .iter()
            .filter(|name| {
                self.merged_definition_anywhere(name)
                    .map(|merged| merged.is_primary())
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        match primaries.len() {
            1 => return Ok(Some(primaries.into_iter().next().expect("one primary"))),
            n if n > 1 => {
                return Err(ContainerError::AmbiguousDependency {
                    type_name: descriptor.target.name.to_string(),
                    candidates: primaries,
                })
            }
            _ => {}
        }

        if let Some(qualifier) = &descriptor.qualifier {
            let matches: Vec<String> = candidates
                .iter()
                .filter(|name| self.matches_qualifier(name, qualifier))
                .cloned()
                .collect();
            if matches.len() == 1 {
                return Ok(Some(matches.into_iter().next().expect("one match")));
            }
        }

        Err(ContainerError::AmbiguousDependency {
            type_name: descriptor.target.name.to_string(),
            candidates,
        })
    }

    fn matches_qualifier(&self, name: &str, qualifier: &str) -> bool {
        if name == qualifier || self.get_aliases(name).iter().any(|a| a == qualifier) {
            return true;
        }
        self.merged_definition_anywhere(name)
            .and_then(|merged| merged.qualifier.clone())
            .map(|q| q == qualifier)
            .unwrap_or(false)
    }
}

impl BeanFactory for DefaultListableBeanFactory {
    fn get_bean(&self, name: &str) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        self.do_get_bean(name)
    }

    fn contains_bean(&self, name: &str) -> bool {
        if self.contains_local_bean(name) {
            return true;
        }
        self.get_parent_bean_factory()
            .map(|parent| parent.contains_bean(name))
            .unwrap_or(false)
    }
}

impl HierarchicalBeanFactory for DefaultListableBeanFactory {
    fn get_parent_bean_factory(&self) -> Option<Arc<dyn ConfigurableListableBeanFactory>> {
        self.parent.read().clone()
    }

    fn contains_local_bean(&self, name: &str) -> bool {
        let bean_name = self.canonical_name(name);
        self.singletons.contains_singleton(&bean_name)
            || self.definitions.read().contains_key(&bean_name)
    }
}

impl ListableBeanFactory for DefaultListableBeanFactory {
    fn get_bean_names(&self) -> Vec<String> {
        self.definition_names.read().clone()
    }

    fn get_bean_names_for_type(&self, type_id: TypeId) -> Vec<String> {
        self.autowire_candidate_names(type_id)
    }

    fn get_bean_definition_count(&self) -> usize {
        self.definitions.read().len()
    }

    fn contains_bean_definition(&self, name: &str) -> bool {
        let bean_name = self.canonical_name(name);
        self.definitions.read().contains_key(&bean_name)
    }
}

impl ConfigurableBeanFactory for DefaultListableBeanFactory {
    fn register_bean_definition(
        &self,
        name: &str,
        definition: BeanDefinition,
    ) -> ContainerResult<()> {
        self.check_not_frozen(&format!("register bean definition '{name}'"))?;
        if self.aliases.is_alias(name) {
            return Err(ContainerError::store(format!(
                "Cannot register bean definition '{name}': the name is already in use as an alias"
            )));
        }
        tracing::trace!(
            "Registering bean definition '{}' ({:?})",
            name,
            definition.bean_type.map(|t| t.name)
        );
        {
            let mut definitions = self.definitions.write();
            if definitions.contains_key(name) {
                return Err(ContainerError::store(format!(
                    "A bean definition named '{name}' is already registered"
                )));
            }
            definitions.insert(name.to_string(), definition);
        }
        self.definition_names.write().push(name.to_string());
        self.reset_merged_definition(name);
        Ok(())
    }

    fn remove_bean_definition(&self, name: &str) -> ContainerResult<()> {
        self.check_not_frozen(&format!("remove bean definition '{name}'"))?;
        let removed = self.definitions.write().remove(name);
        if removed.is_none() {
            return Err(ContainerError::NoSuchBeanDefinition {
                name: name.to_string(),
            });
        }
        self.definition_names.write().retain(|n| n != name);
        self.reset_merged_definition(name);
        tracing::debug!("Removed bean definition '{}'", name);
        Ok(())
    }

    fn get_bean_definition(&self, name: &str) -> ContainerResult<BeanDefinition> {
        self.definitions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::NoSuchBeanDefinition {
                name: name.to_string(),
            })
    }

    fn get_merged_bean_definition(&self, name: &str) -> ContainerResult<Arc<BeanDefinition>> {
        let bean_name = self.canonical_name(name);
        self.merged_definition_inner(&bean_name, &mut Vec::new())
    }

    fn register_alias(&self, name: &str, alias: &str) -> ContainerResult<()> {
        self.check_not_frozen(&format!("register alias '{alias}'"))?;
        if alias != name && self.contains_bean_definition(alias) {
            return Err(ContainerError::store(format!(
                "Cannot register alias '{alias}' for bean '{name}': a bean definition with that name exists"
            )));
        }
        self.aliases.register_alias(name, alias)
    }

    fn get_aliases(&self, name: &str) -> Vec<String> {
        self.aliases.get_aliases(name)
    }

    fn register_singleton(
        &self,
        name: &str,
        instance: Arc<dyn Any + Send + Sync>,
    ) -> ContainerResult<()> {
        self.check_not_frozen(&format!("register singleton '{name}'"))?;
        self.singletons.register_singleton(name, instance)
    }

    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        // Registration order is authoritative; no priority sorting here.
        self.bean_post_processors.write().push(processor);
    }

    fn get_bean_post_processor_count(&self) -> usize {
        self.bean_post_processors.read().len()
    }

    fn register_scope(&self, name: &str, scope: Arc<dyn Scope>) -> ContainerResult<()> {
        if name == SCOPE_SINGLETON || name == SCOPE_PROTOTYPE {
            return Err(ContainerError::store(format!(
                "Cannot replace existing scope '{name}': built-in scopes are not registrable"
            )));
        }
        tracing::debug!("Registering scope '{}'", name);
        self.scopes.write().insert(name.to_string(), scope);
        Ok(())
    }

    fn get_registered_scope(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.scopes.read().get(name).cloned()
    }

    fn get_registered_scope_names(&self) -> Vec<String> {
        self.scopes.read().keys().cloned().collect()
    }

    fn resolve_embedded_value(&self, value: &str) -> ContainerResult<String> {
        let resolvers = self.embedded_value_resolvers.read().clone();
        let mut current = value.to_string();
        for resolver in &resolvers {
            current = resolver(&current)?;
        }
        Ok(current)
    }

    fn freeze_configuration(&self) {
        self.frozen.store(true, Ordering::Release);
        tracing::debug!("Bean factory configuration frozen");
    }

    fn is_configuration_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    fn is_currently_in_creation(&self, name: &str) -> bool {
        self.singletons
            .is_currently_in_creation(&self.canonical_name(name))
    }

    fn set_currently_in_creation(&self, name: &str, in_creation: bool) {
        self.singletons
            .set_currently_in_creation(&self.canonical_name(name), in_creation);
    }

    fn register_dependent_bean(&self, name: &str, dependent: &str) {
        self.singletons
            .register_dependent_bean(&self.canonical_name(name), dependent);
    }

    fn get_dependent_beans(&self, name: &str) -> Vec<String> {
        self.singletons
            .get_dependent_beans(&self.canonical_name(name))
    }

    fn get_dependencies_for_bean(&self, name: &str) -> Vec<String> {
        self.singletons
            .get_dependencies_for_bean(&self.canonical_name(name))
    }

    fn destroy_bean(&self, name: &str, instance: &Arc<dyn Any + Send + Sync>) {
        let destroy = self
            .get_merged_bean_definition(name)
            .ok()
            .and_then(|merged| merged.destroy_callback.clone());
        if let Some(destroy) = destroy {
            if let Err(err) = destroy(instance) {
                tracing::warn!("Destruction of bean '{}' failed: {}", name, err);
            }
        }
    }

    fn destroy_scoped_bean(&self, name: &str) {
        let bean_name = self.canonical_name(name);
        let Ok(merged) = self.get_merged_bean_definition(&bean_name) else {
            return;
        };
        let scope_name = merged.resolved_scope();
        if scope_name == SCOPE_SINGLETON || scope_name == SCOPE_PROTOTYPE {
            tracing::warn!(
                "Bean '{}' does not live in a custom scope; nothing to destroy",
                bean_name
            );
            return;
        }
        let Some(scope) = self.get_registered_scope(scope_name) else {
            return;
        };
        if let Some(instance) = scope.remove(&bean_name) {
            self.destroy_bean(&bean_name, &instance);
        }
    }

    fn destroy_singletons(&self) {
        self.singletons.destroy_singletons();
    }
}

impl ConfigurableListableBeanFactory for DefaultListableBeanFactory {
    fn pre_instantiate_singletons(&self) -> ContainerResult<()> {
        let names = self.get_bean_names();
        tracing::debug!("Pre-instantiating singletons: {:?}", names);
        for name in names {
            let merged = self.get_merged_bean_definition(&name)?;
            if !merged.abstract_def && merged.is_singleton() && !merged.is_lazy_init() {
                self.get_bean(&name)?;
            }
        }
        Ok(())
    }

    fn register_resolvable_dependency(
        &self,
        target: TargetType,
        value: Arc<dyn Any + Send + Sync>,
    ) {
        tracing::debug!("Registering resolvable dependency for type '{}'", target.name);
        self.resolvable_dependencies.write().insert(target.id, value);
    }

    fn ignore_dependency_type(&self, target: TargetType) {
        self.ignored_dependency_types.write().insert(target.id);
    }

    fn ignore_dependency_interface(&self, target: TargetType) {
        // One notion of type in Rust: trait-object dependencies are ignored
        // through the same set as concrete ones.
        self.ignored_dependency_types.write().insert(target.id);
    }

    fn is_autowire_candidate(
        &self,
        name: &str,
        descriptor: &DependencyDescriptor,
    ) -> ContainerResult<bool> {
        let bean_name = self.canonical_name(name);
        let selected = self.select_candidate_name(descriptor)?;
        Ok(selected.as_deref() == Some(bean_name.as_str()))
    }

    fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
    ) -> ContainerResult<Option<Arc<dyn Any + Send + Sync>>> {
        // Fixed values registered for the type bypass the registry.
        if let Some(value) = self.resolvable_dependencies.read().get(&descriptor.target.id) {
            return Ok(Some(Arc::clone(value)));
        }

        match self.select_candidate_name(descriptor)? {
            Some(name) => Ok(Some(self.get_bean(&name)?)),
            None if descriptor.required => Err(ContainerError::NoSuchBeanDefinition {
                name: descriptor.target.name.to_string(),
            }),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for DefaultListableBeanFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultListableBeanFactory")
            .field("definitions", &self.get_bean_definition_count())
            .field("singletons", &self.singletons.singleton_count())
            .field("frozen", &self.is_configuration_frozen())
            .field("has_parent", &self.parent.read().is_some())
            .finish()
    }
}

/// RAII guard for prototype/custom-scope creation on the current thread.
struct ScopedCreationGuard<'a> {
    factory: &'a DefaultListableBeanFactory,
    name: String,
}

impl<'a> ScopedCreationGuard<'a> {
    fn enter(factory: &'a DefaultListableBeanFactory, name: &str) -> ContainerResult<Self> {
        let cycle = SCOPED_IN_CREATION.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack
                .iter()
                .any(|(id, n)| *id == factory.id && n == name)
            {
                let mut path: Vec<String> = stack
                    .iter()
                    .filter(|(id, _)| *id == factory.id)
                    .map(|(_, n)| n.clone())
                    .collect();
                path.push(name.to_string());
                return Some(path.join(" -> "));
            }
            stack.push((factory.id, name.to_string()));
            None
        });
        match cycle {
            Some(path) => Err(ContainerError::CircularReference { path }),
            None => Ok(Self {
                factory,
                name: name.to_string(),
            }),
        }
    }
}

impl Drop for ScopedCreationGuard<'_> {
    fn drop(&mut self) {
        SCOPED_IN_CREATION.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack
                .iter()
                .rposition(|(id, n)| *id == self.factory.id && n == &self.name)
            {
                stack.remove(pos);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigValue, Environment, MapPropertySource, PlaceholderResolver};
    use crate::definition::{PropertyValues, ValueHolder};
    use crate::scope::DestructionCallback;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn counted_supplier(value: i64, counter: &Arc<AtomicUsize>) -> BeanDefinition {
        let counter = Arc::clone(counter);
        BeanDefinition::with_supplier::<i64, _>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        })
    }

    #[test]
    fn singleton_is_constructed_once_and_cached() {
        let factory = DefaultListableBeanFactory::new();
        let constructions = Arc::new(AtomicUsize::new(0));
        factory
            .register_bean_definition("answer", counted_supplier(42, &constructions))
            .unwrap();

        let first = factory.get_bean("answer").unwrap();
        let second = factory.get_bean("answer").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        assert_eq!(*factory.get_bean_as::<i64>("answer").unwrap(), 42);
    }

    #[test]
    fn prototype_yields_fresh_untracked_instances() {
        let factory = DefaultListableBeanFactory::new();
        let constructions = Arc::new(AtomicUsize::new(0));
        factory
            .register_bean_definition(
                "scratch",
                counted_supplier(1, &constructions).with_scope(SCOPE_PROTOTYPE),
            )
            .unwrap();

        let first = factory.get_bean("scratch").unwrap();
        let second = factory.get_bean("scratch").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(constructions.load(Ordering::SeqCst), 2);
        assert!(!factory.singletons.contains_singleton("scratch"));
    }

    #[test]
    fn typed_lookup_reports_mismatch() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "answer",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(5)),
            )
            .unwrap();

        let err = factory.get_bean_as::<String>("answer").unwrap_err();
        assert!(matches!(err, ContainerError::TypeMismatch { .. }));
    }

    #[test]
    fn missing_bean_fails_with_no_such_definition() {
        let factory = DefaultListableBeanFactory::new();
        let err = factory.get_bean("ghost").unwrap_err();
        assert!(matches!(
            err,
            ContainerError::NoSuchBeanDefinition { name } if name == "ghost"
        ));
    }

    #[test]
    fn aliases_resolve_and_collisions_are_rejected() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "dataSource",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(1)),
            )
            .unwrap();
        factory
            .register_bean_definition("other", BeanDefinition::with_supplier::<i64, _>(|_| Ok(2)))
            .unwrap();

        factory.register_alias("dataSource", "ds").unwrap();
        // Idempotent for the same pair.
        factory.register_alias("dataSource", "ds").unwrap();
        let via_alias = factory.get_bean("ds").unwrap();
        assert!(Arc::ptr_eq(&via_alias, &factory.get_bean("dataSource").unwrap()));

        // Alias equal to a different bean's definition name.
        let err = factory.register_alias("dataSource", "other").unwrap_err();
        assert!(matches!(err, ContainerError::BeanDefinitionStore { .. }));
        // Alias already bound to a different target.
        let err = factory.register_alias("other", "ds").unwrap_err();
        assert!(matches!(err, ContainerError::BeanDefinitionStore { .. }));
    }

    #[test]
    fn merged_definition_unions_parent_and_child_properties() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "P",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(0))
                    .with_property("x", BeanValue::Int(1)),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "C",
                BeanDefinition::new()
                    .with_parent("P")
                    .with_property("y", BeanValue::Int(2)),
            )
            .unwrap();

        let merged = factory.get_merged_bean_definition("C").unwrap();
        assert!(matches!(merged.property_values.get("x"), Some(BeanValue::Int(1))));
        assert!(matches!(merged.property_values.get("y"), Some(BeanValue::Int(2))));
        assert!(merged.supplier.is_some());
        assert!(merged.parent_name.is_none());
    }

    #[test]
    fn merged_definition_resolves_parent_through_the_hierarchy() {
        let parent = Arc::new(DefaultListableBeanFactory::new());
        parent
            .register_bean_definition(
                "template",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(3))
                    .with_property("size", BeanValue::Int(10)),
            )
            .unwrap();

        let child = DefaultListableBeanFactory::new();
        child
            .set_parent_bean_factory(Arc::clone(&parent) as Arc<dyn ConfigurableListableBeanFactory>)
            .unwrap();
        child
            .register_bean_definition("impl", BeanDefinition::new().with_parent("template"))
            .unwrap();

        let merged = child.get_merged_bean_definition("impl").unwrap();
        assert!(matches!(merged.property_values.get("size"), Some(BeanValue::Int(10))));

        child
            .register_bean_definition("orphan", BeanDefinition::new().with_parent("nowhere"))
            .unwrap();
        let err = child.get_merged_bean_definition("orphan").unwrap_err();
        assert!(matches!(err, ContainerError::NoSuchBeanDefinition { .. }));
    }

    #[test]
    fn merged_definition_cache_resets_on_ancestor_mutation() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "P",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(0))
                    .with_property("x", BeanValue::Int(1)),
            )
            .unwrap();
        factory
            .register_bean_definition("C", BeanDefinition::new().with_parent("P"))
            .unwrap();

        let before = factory.get_merged_bean_definition("C").unwrap();
        assert!(matches!(before.property_values.get("x"), Some(BeanValue::Int(1))));

        factory.remove_bean_definition("P").unwrap();
        factory
            .register_bean_definition(
                "P",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(0))
                    .with_property("x", BeanValue::Int(9)),
            )
            .unwrap();

        let after = factory.get_merged_bean_definition("C").unwrap();
        assert!(matches!(after.property_values.get("x"), Some(BeanValue::Int(9))));
    }

    #[test]
    fn local_definitions_shadow_the_parent() {
        let parent = Arc::new(DefaultListableBeanFactory::new());
        parent
            .register_bean_definition("svc", BeanDefinition::with_supplier::<i64, _>(|_| Ok(1)))
            .unwrap();

        let child = DefaultListableBeanFactory::new();
        child
            .set_parent_bean_factory(Arc::clone(&parent) as Arc<dyn ConfigurableListableBeanFactory>)
            .unwrap();

        // No local definition: full delegation to the parent.
        let delegated = child.get_bean_as::<i64>("svc").unwrap();
        assert_eq!(*delegated, 1);
        assert!(child.contains_bean("svc"));
        assert!(!child.contains_local_bean("svc"));

        // A local definition of the same name shadows the parent's.
        child
            .register_bean_definition("svc", BeanDefinition::with_supplier::<i64, _>(|_| Ok(2)))
            .unwrap();
        assert_eq!(*child.get_bean_as::<i64>("svc").unwrap(), 2);
        assert_eq!(*parent.get_bean_as::<i64>("svc").unwrap(), 1);

        // Setting a second parent is rejected.
        let err = child
            .set_parent_bean_factory(parent as Arc<dyn ConfigurableListableBeanFactory>)
            .unwrap_err();
        assert!(matches!(err, ContainerError::BeanDefinitionStore { .. }));
    }

    #[test]
    fn frozen_configuration_rejects_structural_mutation() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition("kept", BeanDefinition::with_supplier::<i64, _>(|_| Ok(1)))
            .unwrap();
        factory.freeze_configuration();
        assert!(factory.is_configuration_frozen());

        let err = factory
            .register_bean_definition("late", BeanDefinition::with_supplier::<i64, _>(|_| Ok(2)))
            .unwrap_err();
        assert!(matches!(err, ContainerError::ConfigurationFrozen { .. }));
        assert!(matches!(
            factory.remove_bean_definition("kept").unwrap_err(),
            ContainerError::ConfigurationFrozen { .. }
        ));
        assert!(matches!(
            factory.register_alias("kept", "alias").unwrap_err(),
            ContainerError::ConfigurationFrozen { .. }
        ));
        assert!(matches!(
            factory.register_singleton("manual", Arc::new(3_i64)).unwrap_err(),
            ContainerError::ConfigurationFrozen { .. }
        ));

        // Instances may still be created from the frozen snapshot.
        assert_eq!(*factory.get_bean_as::<i64>("kept").unwrap(), 1);
    }

    #[test]
    fn depends_on_initializes_dependencies_first_and_orders_destruction() {
        let factory = DefaultListableBeanFactory::new();
        let events = Arc::new(Mutex::new(Vec::<String>::new()));

        for (name, deps) in [("c", vec![]), ("b", vec!["c"]), ("a", vec!["b"])] {
            let constructed = Arc::clone(&events);
            let destroyed = Arc::clone(&events);
            let mut definition = BeanDefinition::with_supplier::<String, _>(move |_| {
                constructed.lock().push(format!("create:{name}"));
                Ok(name.to_string())
            })
            .with_destroy::<String, _>(move |bean| {
                destroyed.lock().push(format!("destroy:{bean}"));
                Ok(())
            });
            if !deps.is_empty() {
                definition = definition.with_depends_on(deps);
            }
            factory.register_bean_definition(name, definition).unwrap();
        }

        factory.get_bean("a").unwrap();
        assert_eq!(
            events.lock().clone(),
            vec!["create:c", "create:b", "create:a"]
        );

        events.lock().clear();
        factory.destroy_singletons();
        assert_eq!(
            events.lock().clone(),
            vec!["destroy:a", "destroy:b", "destroy:c"]
        );
    }

    #[test]
    fn depends_on_cycle_is_detected() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "a",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(1)).with_depends_on(["b"]),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "b",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(2)).with_depends_on(["a"]),
            )
            .unwrap();

        let err = factory.get_bean("a").unwrap_err();
        assert!(matches!(err, ContainerError::CircularReference { .. }));
    }

    #[test]
    fn constructor_cycle_fails_deterministically() {
        let factory = DefaultListableBeanFactory::new();
        for (name, other) in [("x", "y"), ("y", "x")] {
            factory
                .register_bean_definition(
                    name,
                    BeanDefinition::with_supplier::<i64, _>(|args| {
                        Ok(*args.get_as::<i64>(0).expect("dependency"))
                    })
                    .with_constructor_arg(0, BeanValue::Ref(other.to_string())),
                )
                .unwrap();
        }

        let err = factory.get_bean("x").unwrap_err();
        match err {
            ContainerError::CircularReference { path } => {
                assert_eq!(path, "x -> y -> x");
            }
            other => panic!("expected CircularReference, got {other}"),
        }
    }

    struct Node {
        partner: RwLock<Option<Arc<Node>>>,
    }

    fn node_definition(partner: &str) -> BeanDefinition {
        BeanDefinition::with_supplier::<Node, _>(|_| {
            Ok(Node {
                partner: RwLock::new(None),
            })
        })
        .with_property("partner", BeanValue::Ref(partner.to_string()))
        .with_property_applier::<Node, _>(|node, properties| {
            let partner = properties
                .get_as::<Node>("partner")
                .ok_or_else(|| ContainerError::store("partner property missing"))?;
            *node.partner.write() = Some(partner);
            Ok(())
        })
    }

    #[test]
    fn property_cycle_resolves_through_early_references() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition("x", node_definition("y")).unwrap();
        factory.register_bean_definition("y", node_definition("x")).unwrap();

        let x = factory.get_bean_as::<Node>("x").unwrap();
        let y = factory.get_bean_as::<Node>("y").unwrap();

        let x_partner = x.partner.read().clone().expect("x is populated");
        let y_partner = y.partner.read().clone().expect("y is populated");
        assert!(Arc::ptr_eq(&x_partner, &y));
        assert!(Arc::ptr_eq(&y_partner, &x));
    }

    #[test]
    fn property_cycle_fails_when_early_references_are_disabled() {
        let factory = DefaultListableBeanFactory::new();
        factory.set_allow_circular_references(false);
        factory.register_bean_definition("x", node_definition("y")).unwrap();
        factory.register_bean_definition("y", node_definition("x")).unwrap();

        let err = factory.get_bean("x").unwrap_err();
        assert!(matches!(err, ContainerError::CircularReference { .. }));
    }

    #[test]
    fn concurrent_callers_share_one_construction() {
        let factory = Arc::new(DefaultListableBeanFactory::new());
        let constructions = Arc::new(AtomicUsize::new(0));
        {
            let constructions = Arc::clone(&constructions);
            factory
                .register_bean_definition(
                    "shared",
                    BeanDefinition::with_supplier::<i64, _>(move |_| {
                        constructions.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(15));
                        Ok(99)
                    }),
                )
                .unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = Arc::clone(&factory);
                std::thread::spawn(move || factory.get_bean("shared").unwrap())
            })
            .collect();
        let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        for instance in &instances {
            assert!(Arc::ptr_eq(instance, &instances[0]));
        }
    }

    struct Recorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl BeanPostProcessor for Recorder {
        fn after_instantiation(
            &self,
            _bean: &Arc<dyn Any + Send + Sync>,
            bean_name: &str,
        ) -> ContainerResult<bool> {
            self.events.lock().push(format!("instantiated:{bean_name}"));
            Ok(true)
        }

        fn before_initialization(
            &self,
            bean: Arc<dyn Any + Send + Sync>,
            bean_name: &str,
        ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
            self.events.lock().push(format!("before-init:{bean_name}"));
            Ok(bean)
        }

        fn after_initialization(
            &self,
            bean: Arc<dyn Any + Send + Sync>,
            bean_name: &str,
        ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
            self.events.lock().push(format!("after-init:{bean_name}"));
            Ok(bean)
        }

        fn name(&self) -> &str {
            "Recorder"
        }
    }

    #[test]
    fn post_processors_run_in_registration_order() {
        let factory = DefaultListableBeanFactory::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        factory.add_bean_post_processor(Arc::new(Recorder {
            events: Arc::clone(&events),
        }));
        assert_eq!(factory.get_bean_post_processor_count(), 1);

        let init_events = Arc::clone(&events);
        factory
            .register_bean_definition(
                "svc",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(1)).with_init::<i64, _>(
                    move |_| {
                        init_events.lock().push("init-callback:svc".to_string());
                        Ok(())
                    },
                ),
            )
            .unwrap();
        factory.get_bean("svc").unwrap();

        assert_eq!(
            events.lock().clone(),
            vec![
                "instantiated:svc",
                "before-init:svc",
                "init-callback:svc",
                "after-init:svc"
            ]
        );
    }

    struct ShortCircuit;

    impl BeanPostProcessor for ShortCircuit {
        fn before_instantiation(
            &self,
            _definition: &BeanDefinition,
            bean_name: &str,
        ) -> ContainerResult<Option<Arc<dyn Any + Send + Sync>>> {
            if bean_name == "stubbed" {
                return Ok(Some(Arc::new("surrogate".to_string())));
            }
            Ok(None)
        }
    }

    #[test]
    fn before_instantiation_may_short_circuit_construction() {
        let factory = DefaultListableBeanFactory::new();
        factory.add_bean_post_processor(Arc::new(ShortCircuit));
        let events = Arc::new(Mutex::new(Vec::new()));
        factory.add_bean_post_processor(Arc::new(Recorder {
            events: Arc::clone(&events),
        }));

        let supplier_ran = Arc::new(AtomicUsize::new(0));
        factory
            .register_bean_definition("stubbed", counted_supplier(1, &supplier_ran))
            .unwrap();

        let bean = factory.get_bean_as::<String>("stubbed").unwrap();
        assert_eq!(*bean, "surrogate");
        assert_eq!(supplier_ran.load(Ordering::SeqCst), 0);
        // Only the after-initialization point still applies to surrogates.
        assert_eq!(events.lock().clone(), vec!["after-init:stubbed"]);
    }

    struct VetoPopulation;

    impl BeanPostProcessor for VetoPopulation {
        fn after_instantiation(
            &self,
            _bean: &Arc<dyn Any + Send + Sync>,
            _bean_name: &str,
        ) -> ContainerResult<bool> {
            Ok(false)
        }
    }

    #[test]
    fn after_instantiation_veto_skips_property_population() {
        let factory = DefaultListableBeanFactory::new();
        factory.add_bean_post_processor(Arc::new(VetoPopulation));
        let applied = Arc::new(AtomicUsize::new(0));
        let applier_calls = Arc::clone(&applied);
        factory
            .register_bean_definition(
                "svc",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(1))
                    .with_property("x", BeanValue::Int(1))
                    .with_property_applier::<i64, _>(move |_, _| {
                        applier_calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
            )
            .unwrap();

        factory.get_bean("svc").unwrap();
        assert_eq!(applied.load(Ordering::SeqCst), 0);
    }

    struct InjectDefaults;

    impl BeanPostProcessor for InjectDefaults {
        fn process_property_values(
            &self,
            mut property_values: PropertyValues,
            _bean: &Arc<dyn Any + Send + Sync>,
            _bean_name: &str,
        ) -> ContainerResult<PropertyValues> {
            property_values.add("injected", BeanValue::Int(7));
            Ok(property_values)
        }
    }

    #[test]
    fn property_values_can_be_rewritten_by_processors() {
        let factory = DefaultListableBeanFactory::new();
        factory.add_bean_post_processor(Arc::new(InjectDefaults));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let names = Arc::clone(&seen);
        factory
            .register_bean_definition(
                "svc",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(0))
                    .with_property("own", BeanValue::Int(1))
                    .with_property_applier::<i64, _>(move |_, properties| {
                        names
                            .lock()
                            .extend(properties.names().iter().map(|n| n.to_string()));
                        assert_eq!(*properties.get_as::<i64>("injected").unwrap(), 7);
                        Ok(())
                    }),
            )
            .unwrap();

        factory.get_bean("svc").unwrap();
        assert_eq!(seen.lock().clone(), vec!["own", "injected"]);
    }

    struct Wrapping;

    impl BeanPostProcessor for Wrapping {
        fn after_initialization(
            &self,
            bean: Arc<dyn Any + Send + Sync>,
            _bean_name: &str,
        ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
            let value = *bean.downcast_ref::<i64>().expect("i64 bean");
            Ok(Arc::new(value * 10))
        }
    }

    #[test]
    fn after_initialization_may_replace_the_instance() {
        let factory = DefaultListableBeanFactory::new();
        factory.add_bean_post_processor(Arc::new(Wrapping));
        factory
            .register_bean_definition("svc", BeanDefinition::with_supplier::<i64, _>(|_| Ok(4)))
            .unwrap();

        assert_eq!(*factory.get_bean_as::<i64>("svc").unwrap(), 40);
    }

    struct Failing;

    impl BeanPostProcessor for Failing {
        fn before_initialization(
            &self,
            _bean: Arc<dyn Any + Send + Sync>,
            _bean_name: &str,
        ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
            Err(ContainerError::store("processor exploded"))
        }
    }

    #[test]
    fn processor_failure_propagates_as_bean_creation_error() {
        let factory = DefaultListableBeanFactory::new();
        factory.add_bean_post_processor(Arc::new(Failing));
        factory
            .register_bean_definition("svc", BeanDefinition::with_supplier::<i64, _>(|_| Ok(1)))
            .unwrap();

        let err = factory.get_bean("svc").unwrap_err();
        match err {
            ContainerError::BeanCreation { bean, .. } => assert_eq!(bean, "svc"),
            other => panic!("expected BeanCreation, got {other}"),
        }
    }

    #[derive(Default)]
    struct TestScope {
        instances: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
        callbacks: Mutex<HashMap<String, DestructionCallback>>,
    }

    impl Scope for TestScope {
        fn get(
            &self,
            name: &str,
            object_factory: &mut crate::scope::ScopedObjectFactory<'_>,
        ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
            if let Some(existing) = self.instances.lock().get(name) {
                return Ok(Arc::clone(existing));
            }
            let created = object_factory()?;
            self.instances
                .lock()
                .insert(name.to_string(), Arc::clone(&created));
            Ok(created)
        }

        fn remove(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
            self.callbacks.lock().remove(name);
            self.instances.lock().remove(name)
        }

        fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) {
            self.callbacks.lock().insert(name.to_string(), callback);
        }
    }

    #[test]
    fn custom_scope_owns_instance_caching() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_scope("request", Arc::new(TestScope::default()))
            .unwrap();
        assert_eq!(factory.get_registered_scope_names(), vec!["request"]);

        let constructions = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let destroy_count = Arc::clone(&destroyed);
        factory
            .register_bean_definition(
                "ctx",
                counted_supplier(5, &constructions)
                    .with_scope("request")
                    .with_destroy::<i64, _>(move |_| {
                        destroy_count.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
            )
            .unwrap();

        let first = factory.get_bean("ctx").unwrap();
        let second = factory.get_bean("ctx").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(constructions.load(Ordering::SeqCst), 1);

        factory.destroy_scoped_bean("ctx");
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        factory.get_bean("ctx").unwrap();
        assert_eq!(constructions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unregistered_scope_name_fails() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "sessionThing",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(1)).with_scope("session"),
            )
            .unwrap();

        let err = factory.get_bean("sessionThing").unwrap_err();
        assert!(matches!(err, ContainerError::UnknownScope { scope } if scope == "session"));

        let err = factory
            .register_scope(SCOPE_SINGLETON, Arc::new(TestScope::default()))
            .unwrap_err();
        assert!(matches!(err, ContainerError::BeanDefinitionStore { .. }));
    }

    fn string_bean(value: &'static str) -> BeanDefinition {
        BeanDefinition::with_supplier::<String, _>(move |_| Ok(value.to_string()))
    }

    #[test]
    fn primary_candidate_wins_the_tie_break() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition("one", string_bean("one")).unwrap();
        factory
            .register_bean_definition("two", string_bean("two").with_primary(true))
            .unwrap();
        factory.register_bean_definition("three", string_bean("three")).unwrap();

        let descriptor = DependencyDescriptor::of::<String>();
        let resolved = factory.resolve_dependency(&descriptor).unwrap().unwrap();
        assert_eq!(resolved.downcast_ref::<String>().unwrap(), "two");

        assert!(!factory.is_autowire_candidate("one", &descriptor).unwrap());
        assert!(factory.is_autowire_candidate("two", &descriptor).unwrap());
        assert!(!factory.is_autowire_candidate("three", &descriptor).unwrap());
    }

    #[test]
    fn ambiguous_candidates_without_primary_fail() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition("one", string_bean("one")).unwrap();
        factory.register_bean_definition("two", string_bean("two")).unwrap();

        let descriptor = DependencyDescriptor::of::<String>();
        let err = factory.resolve_dependency(&descriptor).unwrap_err();
        match err {
            ContainerError::AmbiguousDependency { candidates, .. } => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected AmbiguousDependency, got {other}"),
        }
        assert!(matches!(
            factory.is_autowire_candidate("one", &descriptor).unwrap_err(),
            ContainerError::AmbiguousDependency { .. }
        ));

        // Excluding all but one candidate resolves the ambiguity.
        factory.remove_bean_definition("two").unwrap();
        factory
            .register_bean_definition(
                "two",
                string_bean("two").with_autowire_candidate(false),
            )
            .unwrap();
        let resolved = factory.resolve_dependency(&descriptor).unwrap().unwrap();
        assert_eq!(resolved.downcast_ref::<String>().unwrap(), "one");
    }

    #[test]
    fn qualifier_breaks_primary_free_ties() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition("one", string_bean("one").with_qualifier("fast"))
            .unwrap();
        factory.register_bean_definition("two", string_bean("two")).unwrap();

        let descriptor = DependencyDescriptor::of::<String>().with_qualifier("fast");
        let resolved = factory.resolve_dependency(&descriptor).unwrap().unwrap();
        assert_eq!(resolved.downcast_ref::<String>().unwrap(), "one");

        // The bean name itself also counts as a qualifier match.
        let descriptor = DependencyDescriptor::of::<String>().with_qualifier("two");
        let resolved = factory.resolve_dependency(&descriptor).unwrap().unwrap();
        assert_eq!(resolved.downcast_ref::<String>().unwrap(), "two");
    }

    #[test]
    fn resolvable_dependency_bypasses_the_registry() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition("one", string_bean("one")).unwrap();
        factory.register_bean_definition("two", string_bean("two")).unwrap();

        let fixed: Arc<dyn Any + Send + Sync> = Arc::new("fixed".to_string());
        factory.register_resolvable_dependency(TargetType::of::<String>(), Arc::clone(&fixed));

        let resolved = factory
            .resolve_dependency(&DependencyDescriptor::of::<String>())
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&resolved, &fixed));
    }

    #[test]
    fn ignored_and_missing_dependency_types() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition("one", string_bean("one")).unwrap();
        factory.ignore_dependency_type(TargetType::of::<String>());

        let err = factory
            .resolve_dependency(&DependencyDescriptor::of::<String>())
            .unwrap_err();
        assert!(matches!(err, ContainerError::NoSuchBeanDefinition { .. }));

        let optional = factory
            .resolve_dependency(&DependencyDescriptor::of::<String>().optional())
            .unwrap();
        assert!(optional.is_none());

        let absent = factory
            .resolve_dependency(&DependencyDescriptor::of::<f64>().optional())
            .unwrap();
        assert!(absent.is_none());
    }

    #[test]
    fn embedded_values_and_conversion_feed_constructor_arguments() {
        let environment = Arc::new(Environment::new());
        environment.add_property_source(Box::new(
            MapPropertySource::new("test")
                .with_property("app.name", ConfigValue::String("trellis".into()))
                .with_property("app.pool", ConfigValue::String("42".into())),
        ));

        let factory = DefaultListableBeanFactory::new();
        factory.add_embedded_value_resolver(
            PlaceholderResolver::new(environment).into_embedded_resolver(),
        );

        struct AppInfo {
            name: String,
            pool: i64,
        }
        factory
            .register_bean_definition(
                "info",
                BeanDefinition::with_supplier::<AppInfo, _>(|args| {
                    Ok(AppInfo {
                        name: (*args.get_as::<String>(0).expect("name")).clone(),
                        pool: *args.get_as::<i64>(1).expect("pool"),
                    })
                })
                .with_constructor_holder(
                    0,
                    ValueHolder::new(BeanValue::Str("${app.name}".into()))
                        .with_target(TargetType::of::<String>()),
                )
                .with_constructor_holder(
                    1,
                    ValueHolder::new(BeanValue::Str("${app.pool}".into()))
                        .with_target(TargetType::of::<i64>()),
                ),
            )
            .unwrap();

        let info = factory.get_bean_as::<AppInfo>("info").unwrap();
        assert_eq!(info.name, "trellis");
        assert_eq!(info.pool, 42);
    }

    #[test]
    fn conversion_failure_surfaces_during_creation() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "bad",
                BeanDefinition::with_supplier::<i64, _>(|args| {
                    Ok(*args.get_as::<i64>(0).expect("arg"))
                })
                .with_constructor_holder(
                    0,
                    ValueHolder::new(BeanValue::Str("not-a-number".into()))
                        .with_target(TargetType::of::<i64>()),
                ),
            )
            .unwrap();

        let err = factory.get_bean("bad").unwrap_err();
        match err {
            ContainerError::BeanCreation { bean, source } => {
                assert_eq!(bean, "bad");
                assert!(matches!(*source, ContainerError::Conversion { .. }));
            }
            other => panic!("expected BeanCreation, got {other}"),
        }
    }

    #[test]
    fn factory_method_constructs_via_another_bean() {
        struct ConnectionFactory {
            prefix: String,
        }

        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "connectionFactory",
                BeanDefinition::with_supplier::<ConnectionFactory, _>(|_| {
                    Ok(ConnectionFactory {
                        prefix: "db".to_string(),
                    })
                }),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "connection",
                BeanDefinition::with_factory_method::<ConnectionFactory, String, _>(
                    "connectionFactory",
                    |conn_factory, _| Ok(format!("{}-connection", conn_factory.prefix)),
                ),
            )
            .unwrap();

        assert_eq!(
            *factory.get_bean_as::<String>("connection").unwrap(),
            "db-connection"
        );
        assert_eq!(
            factory.get_dependent_beans("connectionFactory"),
            vec!["connection"]
        );
    }

    #[test]
    fn pre_instantiation_skips_lazy_and_abstract_definitions() {
        let factory = DefaultListableBeanFactory::new();
        let eager = Arc::new(AtomicUsize::new(0));
        let lazy = Arc::new(AtomicUsize::new(0));
        factory
            .register_bean_definition("eager", counted_supplier(1, &eager))
            .unwrap();
        factory
            .register_bean_definition("lazy", counted_supplier(2, &lazy).with_lazy_init(true))
            .unwrap();
        factory
            .register_bean_definition(
                "template",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(0)).with_abstract(true),
            )
            .unwrap();

        factory.pre_instantiate_singletons().unwrap();
        assert_eq!(eager.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.load(Ordering::SeqCst), 0);
        assert!(factory.singletons.contains_singleton("eager"));

        // Abstract definitions are templates only.
        let err = factory.get_bean("template").unwrap_err();
        assert!(matches!(err, ContainerError::BeanDefinitionStore { .. }));
    }

    #[test]
    fn failed_pre_instantiation_leaves_partial_state() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition("good", BeanDefinition::with_supplier::<i64, _>(|_| Ok(1)))
            .unwrap();
        factory
            .register_bean_definition(
                "broken",
                BeanDefinition::with_supplier::<i64, _>(|_| {
                    Err(ContainerError::store("boot failure"))
                }),
            )
            .unwrap();

        assert!(factory.pre_instantiate_singletons().is_err());
        // No auto-rollback: the first singleton stays; tearing down is the
        // caller's call.
        assert!(factory.singletons.contains_singleton("good"));
        assert!(!factory.singletons.contains_singleton("broken"));
    }

    #[test]
    fn prototype_disposal_is_caller_driven() {
        let factory = DefaultListableBeanFactory::new();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&destroyed);
        factory
            .register_bean_definition(
                "task",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(1))
                    .with_scope(SCOPE_PROTOTYPE)
                    .with_destroy::<i64, _>(move |_| {
                        count.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
            )
            .unwrap();

        let instance = factory.get_bean("task").unwrap();
        factory.destroy_singletons();
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);

        factory.destroy_bean("task", &instance);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    struct Registrar;

    impl BeanFactoryPostProcessor for Registrar {
        fn post_process_bean_factory(
            &self,
            factory: &DefaultListableBeanFactory,
        ) -> ContainerResult<()> {
            factory.register_bean_definition(
                "injected",
                BeanDefinition::with_supplier::<i64, _>(|_| Ok(77)),
            )
        }
    }

    #[test]
    fn factory_post_processors_can_register_definitions() {
        let factory = DefaultListableBeanFactory::new();
        factory.add_bean_factory_post_processor(Arc::new(Registrar));
        factory.apply_bean_factory_post_processors().unwrap();

        assert_eq!(*factory.get_bean_as::<i64>("injected").unwrap(), 77);
    }

    #[test]
    fn definition_sources_register_as_a_batch() {
        let factory = DefaultListableBeanFactory::new();
        let mut source = || {
            Ok(vec![
                (
                    "first".to_string(),
                    BeanDefinition::with_supplier::<i64, _>(|_| Ok(1)),
                ),
                (
                    "second".to_string(),
                    BeanDefinition::with_supplier::<i64, _>(|_| Ok(2)),
                ),
            ])
        };
        factory.register_definitions_from(&mut source).unwrap();

        assert_eq!(factory.get_bean_names(), vec!["first", "second"]);
        assert_eq!(*factory.get_bean_as::<i64>("second").unwrap(), 2);
    }

    #[test]
    fn manual_singletons_take_part_in_type_lookup() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_singleton("config", Arc::new("manual".to_string()))
            .unwrap();

        assert!(factory.contains_bean("config"));
        assert_eq!(
            factory.get_bean_names_for_type(TypeId::of::<String>()),
            vec!["config"]
        );
        assert_eq!(
            *factory.get_bean_of_type::<String>().unwrap(),
            "manual"
        );
    }

    #[test]
    fn scoped_bean_cycle_is_detected() {
        let factory = DefaultListableBeanFactory::new();
        for (name, other) in [("p1", "p2"), ("p2", "p1")] {
            factory
                .register_bean_definition(
                    name,
                    BeanDefinition::with_supplier::<i64, _>(|args| {
                        Ok(*args.get_as::<i64>(0).expect("dependency"))
                    })
                    .with_scope(SCOPE_PROTOTYPE)
                    .with_constructor_arg(0, BeanValue::Ref(other.to_string())),
                )
                .unwrap();
        }

        let err = factory.get_bean("p1").unwrap_err();
        assert!(matches!(err, ContainerError::CircularReference { .. }));
    }
}
