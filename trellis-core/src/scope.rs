//! Scope strategies.
//!
//! The built-in `singleton` and `prototype` scopes are handled directly by
//! the factory and are never registered; custom scopes implement [`Scope`]
//! and are registered by name. A custom scope owns the binding of instances
//! to its unit of work (a request, a session, a thread); the container only
//! drives the get/remove/destruction-callback contract.

use std::any::Any;
use std::sync::Arc;

use crate::error::ContainerResult;

/// Scope identifier for the shared, factory-lifetime singleton scope.
pub const SCOPE_SINGLETON: &str = "singleton";

/// Scope identifier for the one-instance-per-request prototype scope.
pub const SCOPE_PROTOTYPE: &str = "prototype";

/// Producer invoked by a scope when it holds no instance for a name yet.
pub type ScopedObjectFactory<'a> =
    dyn FnMut() -> ContainerResult<Arc<dyn Any + Send + Sync>> + 'a;

/// Callback a scope runs when it evicts an instance or ends its unit of
/// work.
pub type DestructionCallback = Box<dyn FnOnce() + Send>;

/// Strategy contract for a custom scope.
pub trait Scope: Send + Sync {
    /// Returns the instance bound to `name` in the current unit of work,
    /// creating it via `object_factory` if absent.
    fn get(
        &self,
        name: &str,
        object_factory: &mut ScopedObjectFactory<'_>,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>>;

    /// Removes and returns the instance bound to `name`, if any. Implementors
    /// should also drop any destruction callback registered for it.
    fn remove(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>>;

    /// Registers a callback to run when the scoped instance for `name` is
    /// evicted or the scope ends. Scopes are not required to persist the
    /// callback; callers must not rely on it for correctness.
    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback);
}
