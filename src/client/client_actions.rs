//! Per object type action handlers.
//!
//! Handlers are registered under a type name. A full type name such as `Crm.Customer` resolves to
//! the handler registered for `Crm.Customer`, then (outside the `Vidyano.` namespace) to the one
//! registered for `Customer`, and finally to a handler that does nothing.

use super::execute::ExecuteActionArgs;
use crate::error::ClientError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

const SYSTEM_NAMESPACE: &str = "Vidyano.";

#[async_trait]
pub trait ObjectActions: Send + Sync {
    /// Handle an action for objects of this type. Set `args.handled` to skip the server call.
    async fn on_action(&self, _args: &mut ExecuteActionArgs<'_>) -> Result<(), ClientError> {
        Ok(())
    }
}

struct NoActions;

impl ObjectActions for NoActions {}

pub struct ClientActions {
    registered: RwLock<HashMap<String, Arc<dyn ObjectActions>>>,
    resolved: RwLock<HashMap<String, Arc<dyn ObjectActions>>>,
    fallback: Arc<dyn ObjectActions>,
}

impl Default for ClientActions {
    fn default() -> Self {
        Self {
            registered: RwLock::new(HashMap::new()),
            resolved: RwLock::new(HashMap::new()),
            fallback: Arc::new(NoActions),
        }
    }
}

impl ClientActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, type_name: &str, handler: Arc<dyn ObjectActions>) {
        self.registered
            .write()
            .insert(type_name.to_string(), handler);
        self.resolved.write().clear();
    }

    pub fn get(&self, full_type_name: &str) -> Arc<dyn ObjectActions> {
        if let Some(handler) = self.resolved.read().get(full_type_name) {
            return Arc::clone(handler);
        }

        let handler = {
            let registered = self.registered.read();
            registered
                .get(full_type_name)
                .or_else(|| {
                    if full_type_name.starts_with(SYSTEM_NAMESPACE) {
                        return None;
                    }
                    let (_, short) = full_type_name.split_once('.')?;
                    registered.get(short)
                })
                .cloned()
                .unwrap_or_else(|| Arc::clone(&self.fallback))
        };

        self.resolved
            .write()
            .insert(full_type_name.to_string(), Arc::clone(&handler));
        handler
    }
}
