//! Business Objects
//!
//! A business object is a server-owned record: typed attributes, child queries, an action bar,
//! edit state and a single notification. Objects built from server payloads are shared as
//! `Arc<BusinessObject>`; links back to owners (parent, owner query, owner attribute) are weak
//! so that object graphs never keep themselves alive.

use crate::action::{build_actions, Action};
use crate::client::{Client, Parameters};
use crate::error::ClientError;
use crate::events::{EventBus, ObjectEvent};
use crate::notification::{Notification, NotificationType};
use crate::payload::ObjectPayload;
use crate::query::Query;
use crate::value::{is_guid, to_service_string, ServiceValue};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub mod attribute;
mod edit;

pub use attribute::{Attribute, AttributeKind, AttributeOption, AttributeVisibility, WriteOutcome};

/// How an object behaves around edit mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateBehavior {
    pub open_in_edit: bool,
    pub stay_in_edit: bool,
    pub as_dialog: bool,
}

impl StateBehavior {
    /// Parse a flag list such as `OpenInEdit, StayInEdit`, or its numeric form.
    pub fn parse(text: Option<&str>) -> Self {
        let mut behavior = Self::default();
        let Some(text) = text else {
            return behavior;
        };
        if let Ok(bits) = text.trim().parse::<u32>() {
            behavior.open_in_edit = bits & 1 != 0;
            behavior.stay_in_edit = bits & 2 != 0;
            behavior.as_dialog = bits & 4 != 0;
            return behavior;
        }
        for flag in text.split(',').map(str::trim) {
            match flag {
                "OpenInEdit" => behavior.open_in_edit = true,
                "StayInEdit" => behavior.stay_in_edit = true,
                "AsDialog" => behavior.as_dialog = true,
                _ => {}
            }
        }
        behavior
    }
}

enum ParentLink {
    None,
    /// Parent sent along with this object
    Owned(Arc<BusinessObject>),
    /// Object that lists this one in a detail attribute
    Detail(Weak<BusinessObject>),
}

struct EditBackup {
    security_token: Option<String>,
}

struct ObjectState {
    object_id: Option<String>,
    is_new: bool,
    label: Option<String>,
    breadcrumb: Option<String>,
    is_in_edit: bool,
    is_dirty: bool,
    notification: Option<Notification>,
    security_token: Option<String>,
    parent: ParentLink,
    owner_query: Weak<Query>,
    owner_reference: Weak<Attribute>,
    owner_detail: Weak<Attribute>,
    backup: Option<EditBackup>,
}

pub struct BusinessObject {
    id: String,
    type_name: String,
    full_type_name: String,
    is_hidden: bool,
    state_behavior: StateBehavior,
    bulk_object_ids: Option<String>,
    queries_to_refresh: Vec<String>,
    attributes: Vec<Arc<Attribute>>,
    queries: Vec<Arc<Query>>,
    actions: Vec<Arc<Action>>,
    pinned_actions: Vec<Arc<Action>>,
    state: RwLock<ObjectState>,
    events: EventBus<ObjectEvent>,
    self_ref: Weak<BusinessObject>,
}

impl std::fmt::Debug for BusinessObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusinessObject")
            .field("id", &self.id)
            .field("type", &self.full_type_name)
            .field("object_id", &self.object_id())
            .finish()
    }
}

impl BusinessObject {
    pub fn from_payload(client: &Client, payload: ObjectPayload) -> Arc<Self> {
        let parent = match payload.parent {
            Some(parent) => ParentLink::Owned(client.construct_object(*parent)),
            None => ParentLink::None,
        };
        let notification = Notification::new(
            payload.notification.as_deref(),
            NotificationType::from_wire(payload.notification_type.as_deref()),
        );
        let state_behavior = StateBehavior::parse(payload.state_behavior.as_deref());
        let is_new = payload.is_new;

        let object = Arc::new_cyclic(|weak: &Weak<BusinessObject>| {
            let attributes = payload
                .attributes
                .into_iter()
                .map(|a| Attribute::from_payload(client, a, weak, is_new))
                .collect();
            let mut queries: Vec<Arc<Query>> = payload
                .queries
                .into_iter()
                .map(|q| client.construct_query(q, weak.clone(), is_new, false))
                .collect();
            queries.sort_by_key(|q| q.offset());
            let (pinned_actions, actions) = build_actions(client, &payload.actions, weak, None, is_new)
                .into_iter()
                .partition(|a| a.is_pinned());

            BusinessObject {
                id: payload.id,
                type_name: payload.type_name,
                full_type_name: payload.full_type_name,
                is_hidden: payload.is_hidden,
                state_behavior,
                bulk_object_ids: payload.bulk_object_ids,
                queries_to_refresh: payload.queries_to_refresh.unwrap_or_default(),
                attributes,
                queries,
                actions,
                pinned_actions,
                state: RwLock::new(ObjectState {
                    object_id: payload.object_id,
                    is_new,
                    label: payload.label,
                    breadcrumb: payload.breadcrumb,
                    is_in_edit: false,
                    is_dirty: false,
                    notification,
                    security_token: payload.security_token,
                    parent,
                    owner_query: Weak::new(),
                    owner_reference: Weak::new(),
                    owner_detail: Weak::new(),
                    backup: None,
                }),
                events: EventBus::default(),
                self_ref: weak.clone(),
            }
        });

        let start_in_edit = payload.is_in_edit
            || is_new
            || state_behavior.open_in_edit
            || state_behavior.stay_in_edit;
        object.set_in_edit(start_in_edit);
        object.set_dirty(payload.is_dirty);
        object
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn full_type_name(&self) -> &str {
        &self.full_type_name
    }

    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    pub fn state_behavior(&self) -> StateBehavior {
        self.state_behavior
    }

    pub fn bulk_object_ids(&self) -> Option<&str> {
        self.bulk_object_ids.as_deref()
    }

    /// Names or ids of queries the server asked to refresh along with this result.
    pub fn queries_to_refresh(&self) -> &[String] {
        &self.queries_to_refresh
    }

    pub fn object_id(&self) -> Option<String> {
        self.state.read().object_id.clone()
    }

    pub fn is_new(&self) -> bool {
        self.state.read().is_new
    }

    pub fn label(&self) -> Option<String> {
        self.state.read().label.clone()
    }

    pub fn breadcrumb(&self) -> Option<String> {
        self.state.read().breadcrumb.clone()
    }

    pub fn security_token(&self) -> Option<String> {
        self.state.read().security_token.clone()
    }

    pub fn attributes(&self) -> &[Arc<Attribute>] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    pub fn attribute_by_id(&self, id: &str) -> Option<&Arc<Attribute>> {
        self.attributes.iter().find(|a| a.id() == id)
    }

    pub fn queries(&self) -> &[Arc<Query>] {
        &self.queries
    }

    pub fn query(&self, name: &str) -> Option<&Arc<Query>> {
        self.queries.iter().find(|q| q.name() == name)
    }

    pub fn actions(&self) -> &[Arc<Action>] {
        &self.actions
    }

    pub fn pinned_actions(&self) -> &[Arc<Action>] {
        &self.pinned_actions
    }

    pub fn action(&self, name: &str) -> Option<&Arc<Action>> {
        self.actions
            .iter()
            .chain(&self.pinned_actions)
            .find(|a| a.name() == name)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ObjectEvent> {
        self.events.subscribe()
    }

    pub fn notification(&self) -> Option<Notification> {
        self.state.read().notification.clone()
    }

    pub fn has_error_notification(&self) -> bool {
        self.state
            .read()
            .notification
            .as_ref()
            .is_some_and(Notification::is_error)
    }

    pub fn set_notification(&self, message: Option<&str>, kind: NotificationType) {
        let notification = Notification::new(message, kind);
        {
            let mut state = self.state.write();
            if state.notification == notification {
                return;
            }
            state.notification = notification.clone();
        }
        self.events.emit(ObjectEvent::NotificationChanged(notification));
    }

    pub fn parent(&self) -> Option<Arc<BusinessObject>> {
        match &self.state.read().parent {
            ParentLink::None => None,
            ParentLink::Owned(parent) => Some(Arc::clone(parent)),
            ParentLink::Detail(parent) => parent.upgrade(),
        }
    }

    pub fn set_parent(&self, parent: Option<Arc<BusinessObject>>) {
        self.state.write().parent = match parent {
            Some(parent) => ParentLink::Owned(parent),
            None => ParentLink::None,
        };
    }

    pub(crate) fn set_detail_owner(&self, parent: Weak<BusinessObject>, attribute: Weak<Attribute>) {
        let mut state = self.state.write();
        state.parent = ParentLink::Detail(parent);
        state.owner_detail = attribute;
    }

    /// Query this object was opened from.
    pub fn owner_query(&self) -> Option<Arc<Query>> {
        self.state.read().owner_query.upgrade()
    }

    pub fn set_owner_query(&self, query: &Arc<Query>) {
        self.state.write().owner_query = Arc::downgrade(query);
    }

    /// Reference attribute this object was created for.
    pub fn owner_reference_attribute(&self) -> Option<Arc<Attribute>> {
        self.state.read().owner_reference.upgrade()
    }

    pub fn set_owner_reference_attribute(&self, attribute: &Arc<Attribute>) {
        self.state.write().owner_reference = Arc::downgrade(attribute);
    }

    /// Detail attribute listing this object.
    pub fn owner_detail_attribute(&self) -> Option<Arc<Attribute>> {
        self.state.read().owner_detail.upgrade()
    }

    /// Write an attribute value locally.
    ///
    /// Marks the attribute changed and the object dirty. A `RefreshRequired` outcome means the
    /// attribute triggers a server refresh; see [`BusinessObject::set_attribute_value_and_refresh`].
    pub fn set_attribute_value(
        &self,
        name: &str,
        value: impl Into<ServiceValue>,
    ) -> Result<WriteOutcome, ClientError> {
        let attribute = self
            .attribute(name)
            .ok_or_else(|| ClientError::UnknownAttribute(name.to_string()))?;
        if !attribute.write_value(to_service_string(&value.into()))? {
            return Ok(WriteOutcome::Unchanged);
        }

        self.set_dirty(true);
        self.events.emit(ObjectEvent::AttributeChanged {
            name: name.to_string(),
        });
        Ok(if attribute.triggers_refresh() {
            WriteOutcome::RefreshRequired
        } else {
            WriteOutcome::Changed
        })
    }

    /// Write an attribute value and wait for the server refresh it triggers.
    pub async fn set_attribute_value_and_refresh(
        &self,
        client: &Client,
        name: &str,
        value: impl Into<ServiceValue>,
    ) -> Result<WriteOutcome, ClientError> {
        let outcome = self.set_attribute_value(name, value)?;
        if outcome == WriteOutcome::RefreshRequired {
            let attribute = self.attribute(name).cloned();
            self.refresh_attributes(client, attribute.as_deref()).await;
        }
        Ok(outcome)
    }

    /// Write an attribute value now and run the triggered refresh in the background.
    pub fn spawn_set_attribute_value(
        self: &Arc<Self>,
        client: Arc<Client>,
        name: &str,
        value: impl Into<ServiceValue>,
    ) -> Result<Option<JoinHandle<()>>, ClientError> {
        if self.set_attribute_value(name, value)? != WriteOutcome::RefreshRequired {
            return Ok(None);
        }
        let object = Arc::clone(self);
        let attribute = self.attribute(name).cloned();
        Ok(Some(tokio::spawn(async move {
            object
                .refresh_attributes(&client, attribute.as_deref())
                .await;
        })))
    }

    /// Ask the server to recompute the object after `attribute` changed.
    pub async fn refresh_attributes(&self, client: &Client, attribute: Option<&Attribute>) {
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        let mut parameters = Parameters::new();
        if let Some(attribute) = attribute {
            parameters.insert(
                "RefreshedPersistentObjectAttributeId".to_string(),
                Value::String(attribute.id().to_string()),
            );
        }

        match client
            .execute_action("PersistentObject.Refresh", Some(&this), None, &[], Some(parameters))
            .await
        {
            Ok(Some(result)) => {
                let notification = result.notification();
                if notification.as_ref().is_some_and(Notification::is_error) {
                    let message = notification.map(|n| n.message);
                    self.set_notification(message.as_deref(), NotificationType::Error);
                } else {
                    self.refresh_from_result(client, &result).await;
                }
            }
            Ok(None) => {}
            Err(e) => self.set_notification(Some(&e.to_string()), NotificationType::Error),
        }
    }

    /// Merge a server result for this object into it.
    ///
    /// Only attributes present in both are merged. Queries the result names in
    /// `queries_to_refresh` are re-run when they already searched.
    pub fn refresh_from_result<'a>(
        &'a self,
        client: &'a Client,
        result: &'a BusinessObject,
    ) -> BoxFuture<'a, ()> {
        async move {
            if std::ptr::eq(self, result) {
                return;
            }
            let notification = result.notification();
            self.set_notification(
                notification.as_ref().map(|n| n.message.as_str()),
                notification.as_ref().map(|n| n.kind).unwrap_or_default(),
            );

            for attribute in &self.attributes {
                if let Some(source) = result.attribute_by_id(attribute.id()) {
                    attribute.merge_from(source, self);
                }
            }

            {
                let source = result.state.read();
                let (object_id, is_new) = (source.object_id.clone(), source.is_new);
                let security_token = source.security_token.clone();
                let breadcrumb = source.breadcrumb.clone();
                drop(source);

                let mut state = self.state.write();
                if state.is_new {
                    state.object_id = object_id;
                    state.is_new = is_new;
                }
                state.security_token = security_token;
                if breadcrumb.is_some() {
                    state.breadcrumb = breadcrumb;
                }
            }

            let dirty = self.attributes.iter().any(|a| a.is_value_changed());
            self.set_dirty(dirty);

            for id in result.queries_to_refresh() {
                let query = if is_guid(id) {
                    self.queries
                        .iter()
                        .find(|q| q.id() == id)
                        .or_else(|| self.query(id))
                } else {
                    self.query(id)
                };
                match query {
                    Some(query) if query.has_searched() => {
                        debug!(query = %query.name(), "Refreshing query named by result");
                        query.refresh(client).await;
                    }
                    Some(_) => {}
                    None => warn!(query = %id, "Result names an unknown query"),
                }
            }

            self.events.emit(ObjectEvent::Refreshed);
        }
        .boxed()
    }

    pub fn to_service_object(&self) -> Value {
        let state = self.state.read();
        let parent = match &state.parent {
            ParentLink::None => None,
            ParentLink::Owned(parent) => Some(Arc::clone(parent)),
            ParentLink::Detail(parent) => parent.upgrade(),
        };
        json!({
            "id": self.id,
            "type": self.type_name,
            "objectId": state.object_id,
            "isNew": state.is_new,
            "isHidden": self.is_hidden,
            "bulkObjectIds": self.bulk_object_ids,
            "securityToken": state.security_token,
            "parent": parent.map(|p| p.to_service_object()),
            "attributes": self.attributes.iter().map(|a| a.to_service_object()).collect::<Vec<_>>(),
        })
    }
}
