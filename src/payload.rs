//! Wire payloads exchanged with the application server.
//!
//! These are the raw JSON shapes; the typed entities in `object` and `query` are built from them
//! and serialize back into them for requests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Full type name the server uses for error results.
pub const ERROR_TYPE: &str = "Vidyano.Error";
/// Full type name of a pure notification result.
pub const NOTIFICATION_TYPE: &str = "Vidyano.Notification";
/// Full type name of a result that points at a downloadable stream.
pub const REGISTERED_STREAM_TYPE: &str = "Vidyano.RegisteredStream";

/// Business object payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub full_type_name: String,
    pub object_id: Option<String>,
    pub is_new: bool,
    pub is_hidden: bool,
    pub is_in_edit: bool,
    pub is_dirty: bool,
    pub label: Option<String>,
    pub breadcrumb: Option<String>,
    pub notification: Option<String>,
    pub notification_type: Option<String>,
    pub state_behavior: Option<String>,
    pub security_token: Option<String>,
    pub bulk_object_ids: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributePayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<QueryPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<ObjectPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queries_to_refresh: Option<Vec<String>>,
}

/// Attribute payload. Reference attributes carry `lookup`, detail attributes carry `details`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributePayload {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub label: Option<String>,
    pub value: Option<String>,
    pub options: Option<Vec<String>>,
    pub is_read_only: bool,
    pub is_required: bool,
    pub triggers_refresh: bool,
    pub is_value_changed: bool,
    pub differs_in_bulk_edit_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
    pub offset: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub type_hints: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_attribute: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub select_in_place: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub can_add_new_reference: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup: Option<Box<QueryPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<QueryPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<ObjectPayload>>,
}

/// Query payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryPayload {
    pub id: String,
    pub name: String,
    pub label: Option<String>,
    pub auto_query: bool,
    pub can_read: bool,
    pub is_hidden: bool,
    pub offset: i32,
    pub page_size: Option<i64>,
    pub skip: Option<i64>,
    pub top: Option<i64>,
    pub sort_options: Option<String>,
    pub text_search: Option<String>,
    pub total_items: Option<i64>,
    pub notification: Option<String>,
    pub notification_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_object: Option<Box<ObjectPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResultPayload>,
}

/// Query column payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnPayload {
    pub id: Option<String>,
    pub name: String,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    pub offset: i32,
    pub disable_sort: bool,
    pub includes: Option<Vec<String>>,
    pub excludes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_attribute: Option<String>,
}

/// Result of `ExecuteQuery`, also embedded as `result` in a query payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryResultPayload {
    pub columns: Option<Vec<ColumnPayload>>,
    pub total_items: Option<i64>,
    pub page_size: Option<i64>,
    pub skip: Option<i64>,
    pub items: Vec<RowPayload>,
    pub notification: Option<String>,
    pub notification_type: Option<String>,
}

/// One query result row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RowPayload {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breadcrumb: Option<String>,
    pub values: Vec<RowValuePayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowValuePayload {
    pub key: String,
    pub value: Option<String>,
}

/// Interactive retry descriptor returned by `ExecuteAction` instead of a terminal result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPayload {
    pub title: Option<String>,
    pub message: Option<String>,
    pub options: Vec<String>,
    pub persistent_object: Option<ObjectPayload>,
}

/// `GetClientData` answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientData {
    pub default_user: Option<String>,
    pub exception: Option<String>,
    pub providers: Map<String, Value>,
    pub languages: Map<String, Value>,
}

/// Read-only view over a response envelope.
///
/// A response is either `{exception}` / `{ExceptionMessage}` or the endpoint payload, plus
/// optional `authToken` and `session`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response(pub Map<String, Value>);

impl Response {
    /// The uniform error shape produced for transport failures.
    pub fn from_exception(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("exception".to_string(), Value::String(message.into()));
        Response(map)
    }

    /// Server or transport exception text, if any.
    pub fn exception(&self) -> Option<&str> {
        ["exception", "ExceptionMessage"]
            .iter()
            .filter_map(|key| self.0.get(*key).and_then(Value::as_str))
            .find(|text| !text.is_empty())
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.0.get("authToken").and_then(Value::as_str)
    }

    pub fn user_name(&self) -> Option<&str> {
        self.0.get("userName").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Decode a payload field, treating `null` as absent.
    pub fn decode<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, serde_json::Error> {
        match self.get(key) {
            Some(value) => serde_json::from_value(value.clone()).map(Some),
            None => Ok(None),
        }
    }

    pub fn retry(&self) -> Result<Option<RetryPayload>, serde_json::Error> {
        self.decode("retry")
    }
}
