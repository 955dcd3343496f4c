//! Name-keyed action behavior registry.
//!
//! Built-in kinds are registered up front; applications add their own kinds with
//! [`ActionRegistry::register`]. A name is resolved once and the behavior is reused for every
//! later action of that name. Names without a registered kind execute on the server.

use super::builtin::{CancelEditAction, EditAction, EndEditAction, RefreshQueryAction, ServerAction};
use super::ActionBehavior;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub type ActionFactory = Arc<dyn Fn() -> Arc<dyn ActionBehavior> + Send + Sync>;

pub struct ActionRegistry {
    factories: RwLock<HashMap<String, ActionFactory>>,
    resolved: RwLock<HashMap<String, Arc<dyn ActionBehavior>>>,
    fallback: Arc<dyn ActionBehavior>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ActionRegistry {
    /// Registry without any kinds; everything executes on the server.
    pub fn empty() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            resolved: RwLock::new(HashMap::new()),
            fallback: Arc::new(ServerAction),
        }
    }

    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        registry.register("Edit", || Arc::new(EditAction));
        registry.register("EndEdit", || Arc::new(EndEditAction));
        registry.register("CancelEdit", || Arc::new(CancelEditAction));
        registry.register("RefreshQuery", || Arc::new(RefreshQueryAction));
        registry
    }

    /// Register a behavior kind for `name`, replacing any earlier kind.
    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn ActionBehavior> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(name.to_string(), Arc::new(factory));
        self.resolved.write().remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    pub fn resolve(&self, name: &str) -> Arc<dyn ActionBehavior> {
        if let Some(behavior) = self.resolved.read().get(name) {
            return Arc::clone(behavior);
        }

        let factory = self.factories.read().get(name).cloned();
        let behavior = match factory {
            Some(factory) => factory(),
            None => {
                debug!(action = name, "No client-side kind, executing on the server");
                Arc::clone(&self.fallback)
            }
        };
        self.resolved
            .write()
            .insert(name.to_string(), Arc::clone(&behavior));
        behavior
    }
}
