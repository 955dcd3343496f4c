//! Attributes
//!
//! A named, typed value slot on a business object. Reference attributes point at another object
//! through a lookup query; detail attributes own a list of child objects.

use super::BusinessObject;
use crate::client::{Client, Parameters};
use crate::error::ClientError;
use crate::payload::AttributePayload;
use crate::query::{Query, Row};
use crate::value::{from_service_string, ServiceValue};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

const NULLABLE_BOOLEAN: &str = "NullableBoolean";
const KEY_VALUE_LIST: &str = "KeyValueList";
const ENUM: &str = "Enum";
const LIST_TYPES: [&str; 3] = ["DropDown", "Enum", "ComboBox"];

/// Where an attribute is shown, as a set of flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeVisibility(u8);

impl AttributeVisibility {
    pub const NEVER: Self = Self(0);
    pub const NEW: Self = Self(1);
    pub const READ: Self = Self(2);
    pub const QUERY: Self = Self(4);
    pub const ALWAYS: Self = Self(7);

    /// Parse a comma-separated flag list such as `New, Read`. Unknown text means always.
    pub fn parse(text: Option<&str>) -> Self {
        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            return Self::ALWAYS;
        };
        let mut flags = 0u8;
        for part in text.split(',').map(str::trim) {
            flags |= match part {
                "Never" => 0,
                "New" => Self::NEW.0,
                "Read" => Self::READ.0,
                "Query" => Self::QUERY.0,
                "Always" => Self::ALWAYS.0,
                other => match other.parse::<u8>() {
                    Ok(bits) => bits & Self::ALWAYS.0,
                    Err(_) => return Self::ALWAYS,
                },
            };
        }
        Self(flags)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// One selectable value of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeOption {
    pub key: Option<String>,
    pub display: String,
}

impl AttributeOption {
    fn new(key: Option<&str>, display: &str) -> Self {
        Self {
            key: key.map(str::to_string),
            display: display.to_string(),
        }
    }
}

/// Result of writing an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Unchanged,
    Changed,
    /// Changed, and the server must recompute the object.
    RefreshRequired,
}

#[derive(Debug)]
pub struct ReferenceInfo {
    pub lookup: Option<Arc<Query>>,
    pub display_attribute: Option<String>,
    pub select_in_place: bool,
    pub can_add_new_reference: bool,
}

#[derive(Debug)]
pub struct DetailInfo {
    pub details: Option<Arc<Query>>,
}

#[derive(Debug)]
pub enum AttributeKind {
    Plain,
    Reference(ReferenceInfo),
    Detail(DetailInfo),
}

#[derive(Debug, Clone, PartialEq)]
struct AttributeBackup {
    value: Option<String>,
    is_read_only: bool,
    is_value_changed: bool,
    options: Option<Vec<String>>,
    validation_error: Option<String>,
    object_id: Option<String>,
}

#[derive(Debug, Clone)]
struct AttributeState {
    value: Option<String>,
    options: Option<Vec<String>>,
    is_read_only: bool,
    is_required: bool,
    triggers_refresh: bool,
    is_value_changed: bool,
    differs_in_bulk_edit_mode: bool,
    validation_error: Option<String>,
    visibility: Option<String>,
    object_id: Option<String>,
    objects: Vec<Arc<BusinessObject>>,
    backup: Option<AttributeBackup>,
}

#[derive(Debug)]
pub struct Attribute {
    id: String,
    name: String,
    type_name: String,
    label: Option<String>,
    group: Option<String>,
    tab: Option<String>,
    offset: i32,
    rules: Option<String>,
    type_hints: BTreeMap<String, String>,
    kind: AttributeKind,
    parent: Weak<BusinessObject>,
    state: RwLock<AttributeState>,
    self_ref: Weak<Attribute>,
}

impl Attribute {
    pub(crate) fn from_payload(
        client: &Client,
        payload: AttributePayload,
        parent: &Weak<BusinessObject>,
        parent_is_new: bool,
    ) -> Arc<Self> {
        let is_reference = payload.lookup.is_some() || payload.type_name == "Reference";
        let is_detail = payload.details.is_some() || payload.type_name == "AsDetail";

        Arc::new_cyclic(|weak: &Weak<Attribute>| {
            let mut objects = Vec::new();
            let kind = if is_reference {
                AttributeKind::Reference(ReferenceInfo {
                    lookup: payload
                        .lookup
                        .map(|q| client.construct_query(*q, parent.clone(), parent_is_new, true)),
                    display_attribute: payload.display_attribute,
                    select_in_place: payload.select_in_place,
                    can_add_new_reference: payload.can_add_new_reference,
                })
            } else if is_detail {
                for object in payload.objects.unwrap_or_default() {
                    let object = client.construct_object(object);
                    object.set_detail_owner(parent.clone(), weak.clone());
                    objects.push(object);
                }
                AttributeKind::Detail(DetailInfo {
                    details: payload
                        .details
                        .map(|q| client.construct_query(*q, parent.clone(), parent_is_new, false)),
                })
            } else {
                AttributeKind::Plain
            };

            Attribute {
                id: payload.id,
                name: payload.name,
                type_name: payload.type_name,
                label: payload.label,
                group: payload.group,
                tab: payload.tab,
                offset: payload.offset,
                rules: payload.rules,
                type_hints: payload.type_hints,
                kind,
                parent: parent.clone(),
                state: RwLock::new(AttributeState {
                    value: payload.value,
                    options: payload.options,
                    is_read_only: payload.is_read_only,
                    is_required: payload.is_required,
                    triggers_refresh: payload.triggers_refresh,
                    is_value_changed: payload.is_value_changed,
                    differs_in_bulk_edit_mode: payload.differs_in_bulk_edit_mode,
                    validation_error: payload.validation_error,
                    visibility: payload.visibility,
                    object_id: payload.object_id,
                    objects,
                    backup: None,
                }),
                self_ref: weak.clone(),
            }
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn tab(&self) -> Option<&str> {
        self.tab.as_deref()
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn rules(&self) -> Option<&str> {
        self.rules.as_deref()
    }

    pub fn type_hint(&self, key: &str) -> Option<&str> {
        self.type_hints.get(key).map(String::as_str)
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, AttributeKind::Reference(_))
    }

    pub fn is_detail(&self) -> bool {
        matches!(self.kind, AttributeKind::Detail(_))
    }

    pub fn lookup(&self) -> Option<&Arc<Query>> {
        match &self.kind {
            AttributeKind::Reference(reference) => reference.lookup.as_ref(),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&Arc<Query>> {
        match &self.kind {
            AttributeKind::Detail(detail) => detail.details.as_ref(),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<Arc<BusinessObject>> {
        self.parent.upgrade()
    }

    /// Value as sent by the server.
    pub fn raw_value(&self) -> Option<String> {
        self.state.read().value.clone()
    }

    /// Value typed by the attribute's data type.
    pub fn value(&self) -> ServiceValue {
        from_service_string(self.state.read().value.as_deref(), &self.type_name)
    }

    pub fn is_read_only(&self) -> bool {
        self.state.read().is_read_only
    }

    pub fn is_required(&self) -> bool {
        self.state.read().is_required
    }

    pub fn triggers_refresh(&self) -> bool {
        self.state.read().triggers_refresh
    }

    pub fn is_value_changed(&self) -> bool {
        self.state.read().is_value_changed
    }

    pub fn differs_in_bulk_edit_mode(&self) -> bool {
        self.state.read().differs_in_bulk_edit_mode
    }

    pub fn validation_error(&self) -> Option<String> {
        self.state.read().validation_error.clone()
    }

    pub fn visibility(&self) -> AttributeVisibility {
        AttributeVisibility::parse(self.state.read().visibility.as_deref())
    }

    /// Shown on new objects with the `New` flag, otherwise with the `Read` flag.
    pub fn is_visible(&self) -> bool {
        let is_new = self.parent().is_some_and(|p| p.is_new());
        let flag = if is_new {
            AttributeVisibility::NEW
        } else {
            AttributeVisibility::READ
        };
        self.visibility().contains(flag)
    }

    /// Referenced object id (reference attributes).
    pub fn object_id(&self) -> Option<String> {
        self.state.read().object_id.clone()
    }

    /// Child objects (detail attributes).
    pub fn objects(&self) -> Vec<Arc<BusinessObject>> {
        self.state.read().objects.clone()
    }

    pub fn can_remove_reference(&self) -> bool {
        self.is_reference() && !self.is_required() && self.object_id().is_some()
    }

    pub fn can_open(&self) -> bool {
        self.object_id().is_some() && self.lookup().is_some_and(|l| l.can_read())
    }

    /// Selectable options derived from the data type.
    pub fn options(&self, client: &Client) -> Vec<AttributeOption> {
        let (is_required, raw) = {
            let state = self.state.read();
            (state.is_required, state.options.clone().unwrap_or_default())
        };

        let mut options = Vec::new();
        if !is_required && self.type_name != ENUM {
            options.push(AttributeOption::new(None, ""));
        }

        if self.is_reference() {
            options.extend(
                raw.iter()
                    .filter_map(|o| o.split_once('='))
                    .map(|(key, display)| AttributeOption::new(Some(key), display)),
            );
        } else if self.type_name == NULLABLE_BOOLEAN {
            for key in ["True", "False"] {
                let display = client.message(key).unwrap_or_else(|| key.to_string());
                options.push(AttributeOption::new(Some(key), &display));
            }
        } else if LIST_TYPES.contains(&self.type_name.as_str()) {
            options.extend(raw.iter().map(|o| AttributeOption::new(Some(o), o)));
        } else if self.type_name == KEY_VALUE_LIST {
            options.extend(raw.iter().map(|o| match o.split_once('=') {
                Some((key, display)) => AttributeOption::new(Some(key), display),
                None => AttributeOption::new(Some(o), ""),
            }));
        }
        options
    }

    /// Write a new raw value; read-only attributes reject the write.
    pub(crate) fn write_value(&self, value: Option<String>) -> Result<bool, ClientError> {
        let mut state = self.state.write();
        if state.is_read_only {
            return Err(ClientError::ReadOnlyAttribute(self.name.clone()));
        }
        if state.value == value {
            return Ok(false);
        }
        state.value = value;
        state.is_value_changed = true;
        Ok(true)
    }

    pub(crate) fn take_backup(&self) {
        let mut state = self.state.write();
        state.backup = Some(AttributeBackup {
            value: state.value.clone(),
            is_read_only: state.is_read_only,
            is_value_changed: state.is_value_changed,
            options: state.options.clone(),
            validation_error: state.validation_error.clone(),
            object_id: state.object_id.clone(),
        });
    }

    pub(crate) fn drop_backup(&self) {
        self.state.write().backup = None;
    }

    pub(crate) fn restore_backup(&self) {
        let mut state = self.state.write();
        let Some(backup) = state.backup.take() else {
            return;
        };
        state.value = backup.value;
        state.is_read_only = backup.is_read_only;
        state.is_value_changed = backup.is_value_changed;
        state.options = backup.options;
        state.validation_error = backup.validation_error;
        if self.is_reference() {
            state.object_id = backup.object_id;
        }
    }

    /// Take over the server's view of this attribute from a refreshed copy.
    pub(crate) fn merge_from(&self, source: &Attribute, owner: &BusinessObject) {
        let source = source.state.read().clone();
        let objects = {
            let mut state = self.state.write();
            state.options = source.options;
            state.is_read_only = source.is_read_only;
            state.is_required = source.is_required;
            if state.visibility != source.visibility {
                state.visibility = source.visibility;
            }
            state.value = source.value;
            if self.is_reference() {
                state.object_id = source.object_id;
            }
            if self.is_detail() {
                state.objects = source.objects.clone();
            }
            state.triggers_refresh = source.triggers_refresh;
            state.is_value_changed = source.is_value_changed;
            state.validation_error = source.validation_error;
            source.objects
        };

        if self.is_detail() {
            let in_edit = owner.is_in_edit();
            for object in objects {
                object.set_detail_owner(owner.self_ref.clone(), self.self_ref.clone());
                object.set_in_edit(in_edit);
            }
        }
    }

    /// Point this reference at `selected` (or clear it) through the server.
    pub async fn change_reference(
        &self,
        client: &Client,
        selected: Option<Arc<Row>>,
    ) -> Result<(), ClientError> {
        let AttributeKind::Reference(reference) = &self.kind else {
            return Err(ClientError::InvalidArgument(format!(
                "{} is not a reference attribute",
                self.name
            )));
        };
        let parent = self.parent().ok_or(ClientError::TargetDropped)?;
        if self.is_read_only() {
            return Err(ClientError::ReadOnlyAttribute(self.name.clone()));
        }

        let mut parameters = Parameters::new();
        parameters.insert(
            "PersistentObjectAttributeId".to_string(),
            Value::String(self.id.clone()),
        );
        let rows: Vec<Arc<Row>> = selected.into_iter().collect();
        let result = client
            .execute_action(
                "PersistentObject.SelectReference",
                Some(&parent),
                reference.lookup.as_ref(),
                &rows,
                Some(parameters),
            )
            .await?;

        if let Some(result) = result {
            parent.refresh_from_result(client, &result).await;
        }
        Ok(())
    }

    pub fn to_service_object(&self) -> Value {
        let state = self.state.read();
        let mut value = json!({
            "id": self.id,
            "name": self.name,
            "value": state.value,
            "label": self.label,
            "options": state.options,
            "type": self.type_name,
            "isReadOnly": state.is_read_only,
            "triggersRefresh": state.triggers_refresh,
            "isRequired": state.is_required,
            "differsInBulkEditMode": state.differs_in_bulk_edit_mode,
            "isValueChanged": state.is_value_changed,
            "visibility": state.visibility,
        });

        if let (AttributeKind::Reference(reference), Value::Object(map)) = (&self.kind, &mut value) {
            map.insert("displayAttribute".to_string(), json!(reference.display_attribute));
            map.insert("objectId".to_string(), json!(state.object_id));
        }
        if let (AttributeKind::Detail(_), Value::Object(map)) = (&self.kind, &mut value) {
            map.insert(
                "objects".to_string(),
                Value::Array(state.objects.iter().map(|o| o.to_service_object()).collect()),
            );
        }
        value
    }
}
