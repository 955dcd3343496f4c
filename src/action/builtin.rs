//! Built-in action kinds.

use super::{Action, ActionBehavior, ActionScope};
use crate::client::Client;
use crate::error::ClientError;
use crate::object::BusinessObject;
use async_trait::async_trait;
use std::sync::Arc;

/// Default kind: run on the server.
pub struct ServerAction;

impl ActionBehavior for ServerAction {}

/// Put the parent object in edit mode.
pub struct EditAction;

#[async_trait]
impl ActionBehavior for EditAction {
    fn scope(&self) -> ActionScope {
        ActionScope::Object
    }

    fn dependent_actions(&self) -> &'static [&'static str] {
        &["EndEdit", "CancelEdit"]
    }

    async fn execute(
        &self,
        action: &Action,
        _client: &Client,
        _option: Option<&str>,
    ) -> Result<Option<Arc<BusinessObject>>, ClientError> {
        let parent = action.parent().ok_or(ClientError::TargetDropped)?;
        parent.edit();
        Ok(Some(parent))
    }
}

/// Save the parent object, re-entering edit when it stays in edit.
pub struct EndEditAction;

#[async_trait]
impl ActionBehavior for EndEditAction {
    fn scope(&self) -> ActionScope {
        ActionScope::Object
    }

    fn initialize(&self, action: &Action) {
        action.set_can_execute(false);
        action.set_visible(false);
    }

    async fn execute(
        &self,
        action: &Action,
        client: &Client,
        _option: Option<&str>,
    ) -> Result<Option<Arc<BusinessObject>>, ClientError> {
        let parent = action.parent().ok_or(ClientError::TargetDropped)?;
        parent.save(client).await;
        if !parent.has_error_notification() && parent.state_behavior().stay_in_edit {
            parent.edit();
        }
        Ok(Some(parent))
    }
}

/// Discard pending edits on the parent object.
pub struct CancelEditAction;

#[async_trait]
impl ActionBehavior for CancelEditAction {
    fn scope(&self) -> ActionScope {
        ActionScope::Object
    }

    fn initialize(&self, action: &Action) {
        let in_edit = action.parent().is_some_and(|p| p.is_in_edit());
        action.set_can_execute(in_edit);
    }

    async fn execute(
        &self,
        action: &Action,
        _client: &Client,
        _option: Option<&str>,
    ) -> Result<Option<Arc<BusinessObject>>, ClientError> {
        let parent = action.parent().ok_or(ClientError::TargetDropped)?;
        parent.cancel_edit();
        Ok(Some(parent))
    }
}

/// Re-run the owning query.
pub struct RefreshQueryAction;

#[async_trait]
impl ActionBehavior for RefreshQueryAction {
    fn scope(&self) -> ActionScope {
        ActionScope::Query
    }

    async fn execute(
        &self,
        action: &Action,
        client: &Client,
        _option: Option<&str>,
    ) -> Result<Option<Arc<BusinessObject>>, ClientError> {
        let query = action.query().ok_or(ClientError::TargetDropped)?;
        query.refresh(client).await;
        Ok(None)
    }
}
