//! Shared singleton registry: the completed-instance cache, the in-creation
//! bookkeeping that detects circular references, the early-reference escape
//! hatch, and dependency-ordered destruction.
//!
//! Construction of one name is serialized by a per-name lock: concurrent
//! first-requests block all but one caller, which creates while the rest
//! wait for the cached result. Different names create in parallel. Cycle
//! detection runs against the current thread's own resolution path, so a
//! blocked waiter is never mistaken for a cycle.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{ContainerError, ContainerResult};

/// Producer registered right after raw instantiation to legally expose a
/// not-yet-fully-initialized instance.
pub type SingletonFactory = Box<dyn FnOnce() -> Arc<dyn Any + Send + Sync> + Send>;

/// Disposal hook registered during creation, run on destruction.
pub type DisposalHook = Box<dyn FnOnce() -> ContainerResult<()> + Send>;

static REGISTRY_IDS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// Per-thread resolution path, entries keyed by registry id so parent
    /// and child factories on one thread never pollute each other's cycle
    /// detection.
    static CREATION_PATH: RefCell<Vec<(u64, String)>> = const { RefCell::new(Vec::new()) };
}

/// Registry of fully constructed singletons plus all creation/destruction
/// state.
pub struct SingletonBeanRegistry {
    id: u64,

    /// Completed instances.
    singletons: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,

    /// Completion order; destruction runs in reverse.
    registered_order: Mutex<Vec<String>>,

    /// Early references already produced from a singleton factory.
    early_singletons: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,

    /// Producers for early references, registered while a bean is still in
    /// creation.
    singleton_factories: Mutex<HashMap<String, SingletonFactory>>,

    /// Per-name creation serialization.
    creation_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,

    /// Names currently under construction, across all threads.
    in_creation: RwLock<HashSet<String>>,

    /// Names currently being destroyed (re-entrancy guard).
    in_destruction: Mutex<HashSet<String>>,

    /// Whole-registry destruction pass in progress.
    destroying: AtomicBool,

    /// Disposal hooks in registration order.
    disposables: Mutex<Vec<(String, DisposalHook)>>,

    /// name → beans that depend on it.
    dependent_beans: RwLock<HashMap<String, Vec<String>>>,

    /// name → beans it depends on.
    bean_dependencies: RwLock<HashMap<String, Vec<String>>>,
}

impl Default for SingletonBeanRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SingletonBeanRegistry {
    pub fn new() -> Self {
        Self {
            id: REGISTRY_IDS.fetch_add(1, Ordering::Relaxed),
            singletons: RwLock::new(HashMap::new()),
            registered_order: Mutex::new(Vec::new()),
            early_singletons: RwLock::new(HashMap::new()),
            singleton_factories: Mutex::new(HashMap::new()),
            creation_locks: Mutex::new(HashMap::new()),
            in_creation: RwLock::new(HashSet::new()),
            in_destruction: Mutex::new(HashSet::new()),
            destroying: AtomicBool::new(false),
            disposables: Mutex::new(Vec::new()),
            dependent_beans: RwLock::new(HashMap::new()),
            bean_dependencies: RwLock::new(HashMap::new()),
        }
    }

    /// Registers an externally constructed singleton under `name`.
    pub fn register_singleton(
        &self,
        name: &str,
        instance: Arc<dyn Any + Send + Sync>,
    ) -> ContainerResult<()> {
        let mut singletons = self.singletons.write();
        if singletons.contains_key(name) {
            return Err(ContainerError::store(format!(
                "Could not register singleton '{name}': there is already a singleton bound under that name"
            )));
        }
        singletons.insert(name.to_string(), instance);
        drop(singletons);
        self.record_registration(name);
        Ok(())
    }

    fn record_registration(&self, name: &str) {
        let mut order = self.registered_order.lock();
        if !order.iter().any(|n| n == name) {
            order.push(name.to_string());
        }
    }

    /// Caches a completed singleton, clearing any early-reference state.
    fn add_singleton(&self, name: &str, instance: Arc<dyn Any + Send + Sync>) {
        {
            let mut singletons = self.singletons.write();
            singletons.insert(name.to_string(), instance);
        }
        self.early_singletons.write().remove(name);
        self.singleton_factories.lock().remove(name);
        self.record_registration(name);
    }

    /// Returns the cached instance for `name`. With `allow_early`, a bean
    /// currently in creation may yield its sanctioned early reference.
    pub fn get_singleton(
        &self,
        name: &str,
        allow_early: bool,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        if let Some(instance) = self.singletons.read().get(name) {
            return Some(Arc::clone(instance));
        }
        if !allow_early || !self.is_currently_in_creation(name) {
            return None;
        }
        if let Some(early) = self.early_singletons.read().get(name) {
            return Some(Arc::clone(early));
        }
        let factory = self.singleton_factories.lock().remove(name)?;
        let early = factory();
        self.early_singletons
            .write()
            .insert(name.to_string(), Arc::clone(&early));
        tracing::debug!("Exposed early reference for singleton bean '{}'", name);
        Some(early)
    }

    /// Whether an early reference for `name` has actually been handed out.
    pub(crate) fn early_reference_exposed(&self, name: &str) -> bool {
        self.early_singletons.read().contains_key(name)
    }

    /// Registers a producer for the early reference of a bean in creation.
    pub fn add_singleton_factory(&self, name: &str, factory: SingletonFactory) {
        if self.singletons.read().contains_key(name) {
            return;
        }
        self.singleton_factories
            .lock()
            .insert(name.to_string(), factory);
    }

    /// Returns the completed singleton for `name`, creating it via
    /// `creator` if absent. At most one caller constructs; concurrent
    /// requests for the same name block until that construction finishes.
    pub fn get_or_create_singleton(
        &self,
        name: &str,
        creator: impl FnOnce() -> ContainerResult<Arc<dyn Any + Send + Sync>>,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        if let Some(instance) = self.get_singleton(name, false) {
            return Ok(instance);
        }
        if self.destroying.load(Ordering::Acquire) {
            return Err(ContainerError::store(format!(
                "Singleton bean '{name}' requested while singletons of this factory are in destruction"
            )));
        }
        if self.creation_path_contains(name) {
            return Err(self.circular_reference_error(name));
        }

        let name_lock = {
            let mut locks = self.creation_locks.lock();
            Arc::clone(
                locks
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let _creation_guard = name_lock.lock();

        // Another caller may have finished while this one was blocked.
        if let Some(instance) = self.get_singleton(name, false) {
            tracing::debug!(
                "Returning instance of singleton bean '{}' completed by a concurrent caller",
                name
            );
            return Ok(instance);
        }

        tracing::debug!("Creating shared instance of singleton bean '{}'", name);
        let _marker = InCreationMarker::enter(self, name)?;

        match creator() {
            Ok(instance) => {
                self.add_singleton(name, Arc::clone(&instance));
                Ok(instance)
            }
            Err(err) => {
                self.early_singletons.write().remove(name);
                self.singleton_factories.lock().remove(name);
                Err(err)
            }
        }
    }

    fn circular_reference_error(&self, name: &str) -> ContainerError {
        let mut path = self.current_creation_path();
        path.push(name.to_string());
        ContainerError::CircularReference {
            path: path.join(" -> "),
        }
    }

    /// This thread's in-flight resolution path through this registry.
    pub fn current_creation_path(&self) -> Vec<String> {
        CREATION_PATH.with(|path| {
            path.borrow()
                .iter()
                .filter(|(id, _)| *id == self.id)
                .map(|(_, n)| n.clone())
                .collect()
        })
    }

    /// Whether the current thread is itself constructing `name` (as opposed
    /// to some other thread holding the creation lock).
    pub(crate) fn in_creation_on_current_thread(&self, name: &str) -> bool {
        self.creation_path_contains(name)
    }

    fn creation_path_contains(&self, name: &str) -> bool {
        CREATION_PATH.with(|path| {
            path.borrow()
                .iter()
                .any(|(id, n)| *id == self.id && n == name)
        })
    }

    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        self.in_creation.read().contains(name)
    }

    /// Container-internal override of the in-creation marker.
    pub fn set_currently_in_creation(&self, name: &str, in_creation: bool) {
        let mut markers = self.in_creation.write();
        if in_creation {
            markers.insert(name.to_string());
        } else {
            markers.remove(name);
        }
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        self.singletons.read().contains_key(name)
    }

    pub fn singleton_names(&self) -> Vec<String> {
        self.registered_order.lock().clone()
    }

    pub fn singleton_count(&self) -> usize {
        self.singletons.read().len()
    }

    /// Looks up the concrete `TypeId` of a completed singleton.
    pub fn singleton_type_id(&self, name: &str) -> Option<std::any::TypeId> {
        self.singletons
            .read()
            .get(name)
            .map(|instance| (**instance).type_id())
    }

    /// Registers a disposal hook for `name`, run on `destroy_singletons`.
    pub fn register_disposable(&self, name: &str, hook: DisposalHook) {
        let mut disposables = self.disposables.lock();
        disposables.retain(|(n, _)| n != name);
        disposables.push((name.to_string(), hook));
    }

    /// Records that `dependent` depends on `name` (and the inverse edge).
    pub fn register_dependent_bean(&self, name: &str, dependent: &str) {
        {
            let mut dependents = self.dependent_beans.write();
            let entry = dependents.entry(name.to_string()).or_default();
            if !entry.iter().any(|d| d == dependent) {
                entry.push(dependent.to_string());
            }
        }
        let mut dependencies = self.bean_dependencies.write();
        let entry = dependencies.entry(dependent.to_string()).or_default();
        if !entry.iter().any(|d| d == name) {
            entry.push(name.to_string());
        }
    }

    pub fn get_dependent_beans(&self, name: &str) -> Vec<String> {
        self.dependent_beans
            .read()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_dependencies_for_bean(&self, name: &str) -> Vec<String> {
        self.bean_dependencies
            .read()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `dependent` transitively depends on `name`.
    pub fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        let dependents = self.dependent_beans.read();
        let mut seen = HashSet::new();
        Self::is_dependent_inner(&dependents, name, dependent, &mut seen)
    }

    fn is_dependent_inner(
        dependents: &HashMap<String, Vec<String>>,
        name: &str,
        target: &str,
        seen: &mut HashSet<String>,
    ) -> bool {
        if !seen.insert(name.to_string()) {
            return false;
        }
        let Some(direct) = dependents.get(name) else {
            return false;
        };
        if direct.iter().any(|d| d == target) {
            return true;
        }
        direct
            .iter()
            .any(|d| Self::is_dependent_inner(dependents, d, target, seen))
    }

    /// Destroys all singletons: dependents before their dependencies, in
    /// reverse completion order. Failures of one bean's hook are logged and
    /// never abort the rest of the pass.
    pub fn destroy_singletons(&self) {
        tracing::debug!(
            "Destroying {} singleton(s) in this registry",
            self.singleton_count()
        );
        self.destroying.store(true, Ordering::Release);

        let names: Vec<String> = {
            let disposables = self.disposables.lock();
            disposables.iter().rev().map(|(n, _)| n.clone()).collect()
        };
        for name in names {
            self.destroy_singleton(&name);
        }

        self.singleton_factories.lock().clear();
        self.early_singletons.write().clear();
        self.singletons.write().clear();
        self.registered_order.lock().clear();
        self.dependent_beans.write().clear();
        self.bean_dependencies.write().clear();
        self.destroying.store(false, Ordering::Release);
    }

    /// Destroys one singleton, its dependents first.
    pub fn destroy_singleton(&self, name: &str) {
        {
            let mut in_destruction = self.in_destruction.lock();
            if !in_destruction.insert(name.to_string()) {
                return;
            }
        }

        let dependents = {
            let mut map = self.dependent_beans.write();
            map.remove(name).unwrap_or_default()
        };
        for dependent in dependents {
            self.destroy_singleton(&dependent);
        }

        self.singletons.write().remove(name);
        self.early_singletons.write().remove(name);
        self.singleton_factories.lock().remove(name);
        self.registered_order.lock().retain(|n| n != name);
        self.bean_dependencies.write().remove(name);

        let hook = {
            let mut disposables = self.disposables.lock();
            disposables
                .iter()
                .position(|(n, _)| n == name)
                .map(|pos| disposables.remove(pos).1)
        };
        if let Some(hook) = hook {
            if let Err(err) = hook() {
                tracing::warn!("Destruction of bean '{}' failed: {}", name, err);
            } else {
                tracing::trace!("Destroyed singleton bean '{}'", name);
            }
        }

        self.in_destruction.lock().remove(name);
    }
}

/// RAII marker covering one singleton construction: maintains the global
/// in-creation set and this thread's resolution path.
struct InCreationMarker<'a> {
    registry: &'a SingletonBeanRegistry,
    name: String,
}

impl<'a> InCreationMarker<'a> {
    fn enter(registry: &'a SingletonBeanRegistry, name: &str) -> ContainerResult<Self> {
        if !registry.in_creation.write().insert(name.to_string()) {
            return Err(registry.circular_reference_error(name));
        }
        CREATION_PATH.with(|path| {
            path.borrow_mut().push((registry.id, name.to_string()));
        });
        Ok(Self {
            registry,
            name: name.to_string(),
        })
    }
}

impl Drop for InCreationMarker<'_> {
    fn drop(&mut self) {
        self.registry.in_creation.write().remove(&self.name);
        CREATION_PATH.with(|path| {
            let mut path = path.borrow_mut();
            if let Some(pos) = path
                .iter()
                .rposition(|(id, n)| *id == self.registry.id && n == &self.name)
            {
                path.remove(pos);
            }
        });
    }
}
