//! Actions
//!
//! Server-declared operations bound to a business object or a query. Each action pairs a
//! definition from the application's `Actions` table with a behavior resolved by name from the
//! [`registry::ActionRegistry`]. Behaviors without a client-side override execute on the server
//! and classify the returned object.

use crate::client::{Client, Parameters};
use crate::error::ClientError;
use crate::object::BusinessObject;
use crate::payload::{NOTIFICATION_TYPE, REGISTERED_STREAM_TYPE};
use crate::query::Query;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

pub mod builtin;
pub mod registry;
pub mod selection_rule;

pub use registry::ActionRegistry;
pub use selection_rule::{SelectionRule, SelectionRuleCache};

/// Definition row from the application's `Actions` query.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDefinition {
    pub name: String,
    pub display_name: String,
    pub is_pinned: bool,
    pub refresh_query_on_completed: bool,
    pub offset: i32,
    pub options: Vec<String>,
    pub selection_rule: SelectionRule,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            is_pinned: false,
            refresh_query_on_completed: false,
            offset: 0,
            options: Vec::new(),
            selection_rule: SelectionRule::Always,
        }
    }
}

/// Where a behavior may be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionScope {
    Object,
    Query,
    Any,
}

impl ActionScope {
    fn allows(self, on_query: bool) -> bool {
        match self {
            ActionScope::Any => true,
            ActionScope::Object => !on_query,
            ActionScope::Query => on_query,
        }
    }
}

/// Client-side behavior of an action kind.
#[async_trait]
pub trait ActionBehavior: Send + Sync {
    fn scope(&self) -> ActionScope {
        ActionScope::Any
    }

    /// Sibling actions created right after this one, sharing its offset.
    fn dependent_actions(&self) -> &'static [&'static str] {
        &[]
    }

    /// Adjust the initial flags of a freshly built action.
    fn initialize(&self, _action: &Action) {}

    async fn execute(
        &self,
        action: &Action,
        client: &Client,
        option: Option<&str>,
    ) -> Result<Option<Arc<BusinessObject>>, ClientError> {
        action.execute_on_server(client, option).await
    }
}

#[derive(Debug, Clone)]
struct ActionState {
    offset: usize,
    is_dependent: bool,
    can_execute: bool,
    is_visible: bool,
}

/// One action on an object's or query's action bar.
pub struct Action {
    definition: Arc<ActionDefinition>,
    behavior: Arc<dyn ActionBehavior>,
    parent: Weak<BusinessObject>,
    query: Option<Weak<Query>>,
    state: RwLock<ActionState>,
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.definition.name)
            .field("state", &*self.state.read())
            .finish()
    }
}

impl Action {
    fn new(
        definition: Arc<ActionDefinition>,
        behavior: Arc<dyn ActionBehavior>,
        parent: Weak<BusinessObject>,
        query: Option<Weak<Query>>,
        offset: usize,
        is_dependent: bool,
    ) -> Self {
        let can_execute = match query {
            Some(_) => definition.selection_rule.evaluate(0),
            None => true,
        };
        Self {
            definition,
            behavior,
            parent,
            query,
            state: RwLock::new(ActionState {
                offset,
                is_dependent,
                can_execute,
                is_visible: true,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn display_name(&self) -> &str {
        &self.definition.display_name
    }

    pub fn definition(&self) -> &ActionDefinition {
        &self.definition
    }

    pub fn options(&self) -> &[String] {
        &self.definition.options
    }

    pub fn is_pinned(&self) -> bool {
        self.definition.is_pinned
    }

    pub fn is_query_action(&self) -> bool {
        self.query.is_some()
    }

    pub fn has_selection_rule(&self) -> bool {
        self.definition.selection_rule != SelectionRule::Always
    }

    pub fn offset(&self) -> usize {
        self.state.read().offset
    }

    pub fn is_dependent(&self) -> bool {
        self.state.read().is_dependent
    }

    pub fn can_execute(&self) -> bool {
        self.state.read().can_execute
    }

    pub fn set_can_execute(&self, value: bool) {
        self.state.write().can_execute = value;
    }

    pub fn is_visible(&self) -> bool {
        self.state.read().is_visible
    }

    pub fn set_visible(&self, value: bool) {
        self.state.write().is_visible = value;
    }

    pub fn parent(&self) -> Option<Arc<BusinessObject>> {
        self.parent.upgrade()
    }

    pub fn query(&self) -> Option<Arc<Query>> {
        self.query.as_ref().and_then(Weak::upgrade)
    }

    /// Re-evaluate the selection rule for a new selection count.
    pub fn invalidate(&self, selected: usize) {
        self.set_can_execute(self.definition.selection_rule.evaluate(selected));
    }

    /// Run the action through its behavior.
    pub async fn execute(
        &self,
        client: &Client,
        option: Option<&str>,
    ) -> Result<Option<Arc<BusinessObject>>, ClientError> {
        debug!(action = %self.name(), "Executing action");
        self.behavior.execute(self, client, option).await
    }

    /// Execute on the server and apply the returned object.
    pub async fn execute_on_server(
        &self,
        client: &Client,
        option: Option<&str>,
    ) -> Result<Option<Arc<BusinessObject>>, ClientError> {
        let parent = self.parent();
        let query = self.query();
        if self.is_query_action() && query.is_none() {
            return Err(ClientError::TargetDropped);
        }
        if !self.is_query_action() && parent.is_none() {
            return Err(ClientError::TargetDropped);
        }

        let index = option
            .and_then(|option| self.options().iter().position(|o| o == option))
            .map(|i| i as i64)
            .unwrap_or(-1);
        let mut parameters = Parameters::new();
        parameters.insert("MenuOption".to_string(), Value::String(index.to_string()));
        parameters.insert(
            "MenuLabel".to_string(),
            option.map(Value::from).unwrap_or(Value::Null),
        );

        let selected = query
            .as_ref()
            .filter(|q| q.count() > 0)
            .map(|q| q.selected_rows())
            .unwrap_or_default();

        let prefix = if self.is_query_action() {
            "Query"
        } else {
            "PersistentObject"
        };
        let result = client
            .execute_action(
                &format!("{}.{}", prefix, self.name()),
                parent.as_ref(),
                query.as_ref(),
                &selected,
                Some(parameters),
            )
            .await?;

        if let Some(result) = &result {
            self.apply_result(client, result, parent.as_ref(), query.as_ref())
                .await;
        }

        if self.definition.refresh_query_on_completed {
            if let Some(query) = query.as_ref().filter(|q| !q.has_error_notification()) {
                query.refresh(client).await;
                if let Some(owner) = query.semantic_zoom_owner() {
                    owner.refresh(client).await;
                }
            }
        }

        Ok(result)
    }

    async fn apply_result(
        &self,
        client: &Client,
        result: &Arc<BusinessObject>,
        parent: Option<&Arc<BusinessObject>>,
        query: Option<&Arc<Query>>,
    ) {
        let notification = result.notification();
        let message = notification.as_ref().map(|n| n.message.as_str());
        let kind = notification.as_ref().map(|n| n.kind).unwrap_or_default();

        if result.full_type_name() == NOTIFICATION_TYPE {
            if let Some(query) = query {
                query.set_notification(message, kind);
            } else if let Some(parent) = parent {
                parent.set_notification(message, kind);
            }
        } else if notification.as_ref().is_some_and(|n| n.is_error()) {
            if let Some(query) = query {
                query.set_notification(message, kind);
            } else if let Some(parent) = parent {
                parent.set_notification(message, kind);
                if same_identity(result, parent) {
                    parent.refresh_from_result(client, result).await;
                }
            }
        } else if result.full_type_name() == REGISTERED_STREAM_TYPE {
            match client.get_stream(result).await {
                Ok(stream) => client
                    .hooks()
                    .on_stream(stream.file_name.as_deref(), &stream.content),
                Err(e) => {
                    warn!(action = %self.name(), error = %e, "Stream download failed");
                    let text = e.to_string();
                    if let Some(query) = query.filter(|_| self.is_query_action()) {
                        query.set_notification(Some(&text), Default::default());
                    } else if let Some(parent) = parent {
                        parent.set_notification(Some(&text), Default::default());
                    }
                }
            }
        } else {
            match parent {
                Some(parent) if same_identity(result, parent) => {
                    parent.set_notification(message, kind);
                    parent.refresh_from_result(client, result).await;
                }
                _ => {
                    if let Some(query) = query {
                        result.set_owner_query(query);
                    }
                    client.hooks().on_open(Arc::clone(result));
                }
            }
        }
    }
}

/// Same type (or same new-ness), same id and same object id.
pub fn same_identity(a: &BusinessObject, b: &BusinessObject) -> bool {
    (a.full_type_name() == b.full_type_name() || a.is_new() == b.is_new())
        && a.id() == b.id()
        && a.object_id() == b.object_id()
}

/// Build an action bar from the declared action names.
///
/// `Edit` on a new object becomes `Save`, names without a definition are skipped and the rest
/// is ordered by definition offset. Each action's offset is its position; dependents share the
/// offset of the action that declared them.
pub fn build_actions(
    client: &Client,
    names: &[String],
    parent: &Weak<BusinessObject>,
    query: Option<&Weak<Query>>,
    parent_is_new: bool,
) -> Vec<Arc<Action>> {
    let mut definitions: Vec<Arc<ActionDefinition>> = names
        .iter()
        .filter_map(|name| {
            let name = if name == "Edit" && parent_is_new {
                "Save"
            } else {
                name.as_str()
            };
            client.action_definition(name)
        })
        .collect();
    definitions.sort_by_key(|d| d.offset);

    let on_query = query.is_some();
    let registry = client.action_registry();
    let mut actions: Vec<Arc<Action>> = Vec::with_capacity(definitions.len());

    for definition in definitions {
        let behavior = registry.resolve(&definition.name);
        if !behavior.scope().allows(on_query) {
            continue;
        }

        let parent_offset = actions.len();
        let dependents = behavior.dependent_actions();
        actions.push(Arc::new(Action::new(
            definition,
            behavior,
            parent.clone(),
            query.cloned(),
            parent_offset,
            false,
        )));

        for name in dependents {
            let Some(definition) = client.action_definition(name) else {
                continue;
            };
            let behavior = registry.resolve(name);
            actions.push(Arc::new(Action::new(
                definition,
                behavior,
                parent.clone(),
                query.cloned(),
                parent_offset,
                true,
            )));
        }
    }

    for action in &actions {
        action.behavior.initialize(action);
    }
    actions
}
