//! Bean definitions: the declarative recipes the container constructs
//! beans from.
//!
//! A [`BeanDefinition`] describes how to create and manage one bean: its
//! construction path (supplier or factory method), scope, lifecycle
//! callbacks, constructor arguments and property values, and the inheritance
//! link to an optional parent definition. Definitions stay mutable until the
//! factory configuration is frozen.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::attributes::AttributeAccessor;
use crate::error::{ContainerError, ContainerResult};
use crate::scope::SCOPE_SINGLETON;

/// Upper bound on decoration-chain traversal; a self-referential chain
/// terminates here instead of looping.
const ORIGINATING_CHAIN_LIMIT: usize = 16;

/// A target type captured as `TypeId` plus its printable name.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TargetType {
    pub id: TypeId,
    pub name: &'static str,
}

impl TargetType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

impl fmt::Debug for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A configured value as it appears in a bean definition, before any
/// resolution has happened.
#[derive(Clone)]
pub enum BeanValue {
    /// Runtime reference to another bean by name; resolved through the
    /// factory during creation.
    Ref(String),
    /// String value; embedded placeholders are resolved before conversion.
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<BeanValue>),
    /// An already-materialized object, used as-is.
    Instance(Arc<dyn Any + Send + Sync>),
}

impl BeanValue {
    /// Short description used in conversion error messages.
    pub fn describe(&self) -> String {
        match self {
            BeanValue::Ref(name) => format!("ref({name})"),
            BeanValue::Str(s) => s.clone(),
            BeanValue::Int(i) => i.to_string(),
            BeanValue::Float(f) => f.to_string(),
            BeanValue::Bool(b) => b.to_string(),
            BeanValue::List(items) => format!("list[{}]", items.len()),
            BeanValue::Instance(_) => "instance".to_string(),
        }
    }
}

impl fmt::Debug for BeanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// One constructor argument: the value plus an optional required type and
/// an optional argument name.
#[derive(Clone, Debug)]
pub struct ValueHolder {
    pub value: BeanValue,
    pub target: Option<TargetType>,
    pub name: Option<String>,
}

impl ValueHolder {
    pub fn new(value: BeanValue) -> Self {
        Self {
            value,
            target: None,
            name: None,
        }
    }

    pub fn with_target(mut self, target: TargetType) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Constructor arguments: position-indexed entries plus generic (unindexed)
/// entries matched in order.
#[derive(Clone, Debug, Default)]
pub struct ConstructorArgumentValues {
    indexed: BTreeMap<usize, ValueHolder>,
    generic: Vec<ValueHolder>,
}

impl ConstructorArgumentValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_indexed(&mut self, index: usize, holder: ValueHolder) {
        self.indexed.insert(index, holder);
    }

    pub fn add_generic(&mut self, holder: ValueHolder) {
        self.generic.push(holder);
    }

    pub fn get_indexed(&self, index: usize) -> Option<&ValueHolder> {
        self.indexed.get(&index)
    }

    pub fn indexed(&self) -> impl Iterator<Item = (usize, &ValueHolder)> {
        self.indexed.iter().map(|(i, h)| (*i, h))
    }

    pub fn generic(&self) -> &[ValueHolder] {
        &self.generic
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }

    /// Folds `parent` entries in underneath this (child) set: indexed
    /// entries keep the child's value on index collision; generic entries
    /// keep the child's value on name collision, parent entries first.
    fn merge_defaults_from(&mut self, parent: &ConstructorArgumentValues) {
        for (index, holder) in &parent.indexed {
            self.indexed
                .entry(*index)
                .or_insert_with(|| holder.clone());
        }
        let mut merged: Vec<ValueHolder> = parent
            .generic
            .iter()
            .filter(|p| {
                p.name.is_none()
                    || !self
                        .generic
                        .iter()
                        .any(|c| c.name.is_some() && c.name == p.name)
            })
            .cloned()
            .collect();
        merged.append(&mut self.generic);
        self.generic = merged;
    }
}

/// A single named property value.
#[derive(Clone, Debug)]
pub struct PropertyValue {
    pub name: String,
    pub value: BeanValue,
}

/// Ordered collection of property values; last write wins per name.
#[derive(Clone, Debug, Default)]
pub struct PropertyValues {
    values: Vec<PropertyValue>,
}

impl PropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: BeanValue) {
        let name = name.into();
        if let Some(existing) = self.values.iter_mut().find(|pv| pv.name == name) {
            existing.value = value;
        } else {
            self.values.push(PropertyValue { name, value });
        }
    }

    pub fn get(&self, name: &str) -> Option<&BeanValue> {
        self.values
            .iter()
            .find(|pv| pv.name == name)
            .map(|pv| &pv.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|pv| pv.name == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        let pos = self.values.iter().position(|pv| pv.name == name)?;
        Some(self.values.remove(pos))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyValue> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Union with `parent`: child entries win on name collision, inherited
    /// entries keep the parent's relative order ahead of the child's.
    fn merge_defaults_from(&mut self, parent: &PropertyValues) {
        let mut merged: Vec<PropertyValue> = parent
            .values
            .iter()
            .filter(|pv| !self.contains(&pv.name))
            .cloned()
            .collect();
        merged.append(&mut self.values);
        self.values = merged;
    }
}

/// Constructor arguments after reference resolution and type conversion.
#[derive(Clone, Default)]
pub struct ResolvedArguments {
    indexed: BTreeMap<usize, Arc<dyn Any + Send + Sync>>,
    generic: Vec<Arc<dyn Any + Send + Sync>>,
}

impl ResolvedArguments {
    pub(crate) fn push_indexed(&mut self, index: usize, value: Arc<dyn Any + Send + Sync>) {
        self.indexed.insert(index, value);
    }

    pub(crate) fn push_generic(&mut self, value: Arc<dyn Any + Send + Sync>) {
        self.generic.push(value);
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.indexed.get(&index)
    }

    /// Typed access to an indexed argument.
    pub fn get_as<T: Any + Send + Sync>(&self, index: usize) -> Option<Arc<T>> {
        self.get(index).cloned()?.downcast::<T>().ok()
    }

    pub fn generic(&self) -> &[Arc<dyn Any + Send + Sync>] {
        &self.generic
    }

    /// Typed access to a generic (unindexed) argument by position.
    pub fn generic_as<T: Any + Send + Sync>(&self, position: usize) -> Option<Arc<T>> {
        self.generic.get(position).cloned()?.downcast::<T>().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }
}

/// Property values after reference resolution and type conversion, keyed by
/// property name.
#[derive(Clone, Default)]
pub struct ResolvedProperties {
    values: Vec<(String, Arc<dyn Any + Send + Sync>)>,
}

impl ResolvedProperties {
    pub(crate) fn push(&mut self, name: impl Into<String>, value: Arc<dyn Any + Send + Sync>) {
        self.values.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Typed access to a resolved property.
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name).cloned()?.downcast::<T>().ok()
    }

    pub fn names(&self) -> Vec<&str> {
        self.values.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Produces a raw instance from resolved constructor arguments.
pub type BeanSupplier =
    Arc<dyn Fn(&ResolvedArguments) -> ContainerResult<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// Alternate construction path: invoked with the resolved factory bean
/// instance and the resolved arguments.
pub type FactoryMethod = Arc<
    dyn Fn(
            &Arc<dyn Any + Send + Sync>,
            &ResolvedArguments,
        ) -> ContainerResult<Box<dyn Any + Send + Sync>>
        + Send
        + Sync,
>;

/// Applies resolved property values to a shared instance. Beans that take
/// part in property cycles use interior mutability in their fields.
pub type PropertyApplier = Arc<
    dyn Fn(&Arc<dyn Any + Send + Sync>, &ResolvedProperties) -> ContainerResult<()> + Send + Sync,
>;

/// Initialization callback, run after property population.
pub type InitCallback =
    Arc<dyn Fn(&Arc<dyn Any + Send + Sync>) -> ContainerResult<()> + Send + Sync>;

/// Disposal hook, run when the owning scope ends.
pub type DestroyCallback =
    Arc<dyn Fn(&Arc<dyn Any + Send + Sync>) -> ContainerResult<()> + Send + Sync>;

/// Informational role hint; never affects resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BeanRole {
    #[default]
    Application,
    Support,
    Infrastructure,
}

/// A source of materialized `(name, definition)` pairs, agnostic to the
/// format they were loaded from. The container registers the batch as-is.
pub trait BeanDefinitionSource {
    fn bean_definitions(&mut self) -> ContainerResult<Vec<(String, BeanDefinition)>>;
}

impl<F> BeanDefinitionSource for F
where
    F: FnMut() -> ContainerResult<Vec<(String, BeanDefinition)>>,
{
    fn bean_definitions(&mut self) -> ContainerResult<Vec<(String, BeanDefinition)>> {
        self()
    }
}

/// Declarative recipe for constructing and configuring one bean.
///
/// `Option`-typed scalars distinguish "unset" so that parent/child merging
/// can overlay only the fields a child actually specifies.
#[derive(Clone, Default)]
pub struct BeanDefinition {
    /// Name of the parent definition this one inherits from.
    pub parent_name: Option<String>,

    /// Concrete type produced by this definition, when known up front.
    pub bean_type: Option<TargetType>,

    /// Bean whose factory method constructs this bean.
    pub factory_bean_name: Option<String>,
    pub factory_method: Option<FactoryMethod>,

    /// Primary construction path.
    pub supplier: Option<BeanSupplier>,

    /// Scope name; empty means unset (singleton after merging).
    pub scope: String,

    pub lazy_init: Option<bool>,

    /// Beans that must be fully initialized before this one, in order.
    pub depends_on: Option<Vec<String>>,

    pub autowire_candidate: Option<bool>,
    pub primary: Option<bool>,
    pub qualifier: Option<String>,
    pub role: Option<BeanRole>,

    pub constructor_args: ConstructorArgumentValues,
    pub property_values: PropertyValues,

    /// Template-only definition; never instantiated directly.
    pub abstract_def: bool,

    pub init_callback: Option<InitCallback>,
    pub destroy_callback: Option<DestroyCallback>,
    pub property_applier: Option<PropertyApplier>,

    /// Decoration chain back-reference (e.g. a proxy definition wrapping
    /// the original).
    pub originating: Option<Arc<BeanDefinition>>,

    pub attributes: AttributeAccessor,
}

impl BeanDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Definition producing `T` from the given supplier; captures the bean
    /// type for by-type lookups.
    pub fn with_supplier<T, F>(supplier: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&ResolvedArguments) -> ContainerResult<T> + Send + Sync + 'static,
    {
        let mut def = Self::new();
        def.bean_type = Some(TargetType::of::<T>());
        def.supplier = Some(Arc::new(move |args| {
            let instance = supplier(args)?;
            Ok(Box::new(instance) as Box<dyn Any + Send + Sync>)
        }));
        def
    }

    /// Definition produced by calling a method on another (factory) bean.
    pub fn with_factory_method<B, T, F>(factory_bean: impl Into<String>, method: F) -> Self
    where
        B: Any + Send + Sync,
        T: Any + Send + Sync,
        F: Fn(&B, &ResolvedArguments) -> ContainerResult<T> + Send + Sync + 'static,
    {
        let mut def = Self::new();
        def.bean_type = Some(TargetType::of::<T>());
        def.factory_bean_name = Some(factory_bean.into());
        def.factory_method = Some(Arc::new(move |factory, args| {
            let factory = factory
                .downcast_ref::<B>()
                .ok_or_else(|| ContainerError::TypeMismatch {
                    expected: std::any::type_name::<B>().to_string(),
                    found: "factory bean of different type".to_string(),
                })?;
            let instance = method(factory, args)?;
            Ok(Box::new(instance) as Box<dyn Any + Send + Sync>)
        }));
        def
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_name = Some(parent.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_lazy_init(mut self, lazy: bool) -> Self {
        self.lazy_init = Some(lazy);
        self
    }

    pub fn with_depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_autowire_candidate(mut self, candidate: bool) -> Self {
        self.autowire_candidate = Some(candidate);
        self
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn with_role(mut self, role: BeanRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_abstract(mut self, abstract_def: bool) -> Self {
        self.abstract_def = abstract_def;
        self
    }

    pub fn with_constructor_arg(mut self, index: usize, value: BeanValue) -> Self {
        self.constructor_args
            .add_indexed(index, ValueHolder::new(value));
        self
    }

    pub fn with_constructor_holder(mut self, index: usize, holder: ValueHolder) -> Self {
        self.constructor_args.add_indexed(index, holder);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: BeanValue) -> Self {
        self.property_values.add(name, value);
        self
    }

    /// Typed init callback; fails with a type mismatch if the constructed
    /// bean is not a `T`.
    pub fn with_init<T, F>(mut self, init: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> ContainerResult<()> + Send + Sync + 'static,
    {
        self.init_callback = Some(Arc::new(move |bean| {
            let bean = downcast_shared::<T>(bean)?;
            init(bean)
        }));
        self
    }

    /// Typed destroy callback.
    pub fn with_destroy<T, F>(mut self, destroy: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> ContainerResult<()> + Send + Sync + 'static,
    {
        self.destroy_callback = Some(Arc::new(move |bean| {
            let bean = downcast_shared::<T>(bean)?;
            destroy(bean)
        }));
        self
    }

    /// Typed property applier; receives the shared instance and the fully
    /// resolved property set.
    pub fn with_property_applier<T, F>(mut self, applier: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &ResolvedProperties) -> ContainerResult<()> + Send + Sync + 'static,
    {
        self.property_applier = Some(Arc::new(move |bean, properties| {
            let bean = downcast_shared::<T>(bean)?;
            applier(bean, properties)
        }));
        self
    }

    pub fn with_originating(mut self, originating: Arc<BeanDefinition>) -> Self {
        self.originating = Some(originating);
        self
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        self.attributes.set_attribute(name, value);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn Any + Send + Sync>) -> Self {
        self.attributes.set_source(source);
        self
    }

    /// Effective scope name after defaulting.
    pub fn resolved_scope(&self) -> &str {
        if self.scope.is_empty() {
            SCOPE_SINGLETON
        } else {
            &self.scope
        }
    }

    pub fn is_singleton(&self) -> bool {
        self.resolved_scope() == SCOPE_SINGLETON
    }

    pub fn is_prototype(&self) -> bool {
        self.resolved_scope() == crate::scope::SCOPE_PROTOTYPE
    }

    pub fn is_lazy_init(&self) -> bool {
        self.lazy_init.unwrap_or(false)
    }

    pub fn is_autowire_candidate(&self) -> bool {
        self.autowire_candidate.unwrap_or(true)
    }

    pub fn is_primary(&self) -> bool {
        self.primary.unwrap_or(false)
    }

    pub fn role(&self) -> BeanRole {
        self.role.unwrap_or_default()
    }

    /// Innermost definition of the decoration chain. Traversal is bounded;
    /// a self-referential chain yields the definition at the bound.
    pub fn get_originating_bean_definition(&self) -> Option<Arc<BeanDefinition>> {
        let mut current = self.originating.clone()?;
        for _ in 0..ORIGINATING_CHAIN_LIMIT {
            match current.originating.clone() {
                Some(inner) => current = inner,
                None => break,
            }
        }
        Some(current)
    }

    /// Flattens this (child) definition onto an already-merged parent:
    /// set child fields override, unset fields inherit, collections are
    /// unioned with child precedence. The `abstract` flag is never
    /// inherited.
    pub(crate) fn merged_with_parent(&self, parent: &BeanDefinition) -> BeanDefinition {
        let mut merged = parent.clone();
        merged.parent_name = None;

        if self.bean_type.is_some() {
            merged.bean_type = self.bean_type;
        }
        if self.factory_bean_name.is_some() {
            merged.factory_bean_name = self.factory_bean_name.clone();
        }
        if self.factory_method.is_some() {
            merged.factory_method = self.factory_method.clone();
        }
        if self.supplier.is_some() {
            merged.supplier = self.supplier.clone();
        }
        if !self.scope.is_empty() {
            merged.scope = self.scope.clone();
        }
        if self.lazy_init.is_some() {
            merged.lazy_init = self.lazy_init;
        }
        if self.depends_on.is_some() {
            merged.depends_on = self.depends_on.clone();
        }
        if self.autowire_candidate.is_some() {
            merged.autowire_candidate = self.autowire_candidate;
        }
        if self.primary.is_some() {
            merged.primary = self.primary;
        }
        if self.qualifier.is_some() {
            merged.qualifier = self.qualifier.clone();
        }
        if self.role.is_some() {
            merged.role = self.role;
        }
        if self.init_callback.is_some() {
            merged.init_callback = self.init_callback.clone();
        }
        if self.destroy_callback.is_some() {
            merged.destroy_callback = self.destroy_callback.clone();
        }
        if self.property_applier.is_some() {
            merged.property_applier = self.property_applier.clone();
        }

        let mut constructor_args = self.constructor_args.clone();
        constructor_args.merge_defaults_from(&parent.constructor_args);
        merged.constructor_args = constructor_args;

        let mut property_values = self.property_values.clone();
        property_values.merge_defaults_from(&parent.property_values);
        merged.property_values = property_values;

        merged.abstract_def = self.abstract_def;
        merged.originating = self.originating.clone();

        let mut attributes = self.attributes.clone();
        attributes.merge_defaults_from(&parent.attributes);
        merged.attributes = attributes;

        merged
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("parent_name", &self.parent_name)
            .field("bean_type", &self.bean_type.map(|t| t.name))
            .field("scope", &self.resolved_scope())
            .field("lazy_init", &self.is_lazy_init())
            .field("abstract", &self.abstract_def)
            .field("depends_on", &self.depends_on)
            .field("constructor_args", &self.constructor_args.len())
            .field("property_values", &self.property_values.len())
            .finish()
    }
}

/// Downcasts a shared type-erased bean to `&T` for lifecycle callbacks.
fn downcast_shared<T: Any + Send + Sync>(
    bean: &Arc<dyn Any + Send + Sync>,
) -> ContainerResult<&T> {
    bean.downcast_ref::<T>()
        .ok_or_else(|| ContainerError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            found: "bean of different type".to_string(),
        })
}
