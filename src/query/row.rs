use super::Query;
use crate::client::Client;
use crate::error::ClientError;
use crate::object::BusinessObject;
use crate::payload::{RowPayload, RowValuePayload};
use crate::value::{from_service_string, ServiceValue};
use serde_json::{json, Value};
use std::sync::{Arc, Weak};

/// One result row of a query.
#[derive(Debug)]
pub struct Row {
    id: String,
    breadcrumb: Option<String>,
    values: Vec<RowValuePayload>,
    query: Weak<Query>,
}

impl Row {
    pub(crate) fn from_payload(payload: RowPayload, query: Weak<Query>) -> Self {
        Self {
            id: payload.id,
            breadcrumb: payload.breadcrumb,
            values: payload.values,
            query,
        }
    }

    /// A row carrying only an object id, used to point a reference at an object.
    pub fn detached(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            breadcrumb: None,
            values: Vec::new(),
            query: Weak::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn breadcrumb(&self) -> Option<&str> {
        self.breadcrumb.as_deref()
    }

    pub fn query(&self) -> Option<Arc<Query>> {
        self.query.upgrade()
    }

    pub fn raw_value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.key == key)
            .and_then(|v| v.value.as_deref())
    }

    /// Value typed by its column's data type.
    pub fn value(&self, key: &str) -> ServiceValue {
        let type_name = self
            .query()
            .and_then(|q| q.column(key))
            .map(|c| c.type_name)
            .unwrap_or_default();
        from_service_string(self.raw_value(key), &type_name)
    }

    /// Open the row's object, if the query allows reading.
    pub async fn load(&self, client: &Client) -> Result<Option<Arc<BusinessObject>>, ClientError> {
        let query = self.query().ok_or(ClientError::TargetDropped)?;
        if !query.can_read() {
            return Ok(None);
        }
        let type_id = query
            .persistent_object()
            .map(|po| po.id().to_string())
            .ok_or_else(|| {
                ClientError::InvalidArgument(format!("query {} has no object type", query.name()))
            })?;

        let object = client
            .get_object(&type_id, Some(&self.id), query.parent().as_ref(), false)
            .await?;
        object.set_owner_query(&query);
        Ok(Some(object))
    }

    pub fn to_service_object(&self) -> Value {
        json!({
            "id": self.id,
            "values": self.values,
        })
    }
}
