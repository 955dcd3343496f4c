use crate::payload::ColumnPayload;
use serde_json::{json, Value};

/// Query column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub id: Option<String>,
    pub name: String,
    pub label: Option<String>,
    pub type_name: String,
    pub offset: i32,
    pub disable_sort: bool,
    pub display_attribute: Option<String>,
    /// Value filter: only these values
    pub includes: Option<Vec<String>>,
    /// Value filter: everything but these values
    pub excludes: Option<Vec<String>>,
}

impl Column {
    pub fn from_payload(payload: ColumnPayload) -> Self {
        Self {
            id: payload.id,
            name: payload.name,
            label: payload.label,
            type_name: payload.type_name,
            offset: payload.offset,
            disable_sort: payload.disable_sort,
            display_attribute: payload.display_attribute,
            includes: payload.includes,
            excludes: payload.excludes,
        }
    }

    pub fn has_filter(&self) -> bool {
        self.includes.as_ref().is_some_and(|i| !i.is_empty())
            || self.excludes.as_ref().is_some_and(|e| !e.is_empty())
    }

    pub fn to_service_object(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "label": self.label,
            "includes": self.includes,
            "excludes": self.excludes,
            "type": self.type_name,
            "displayAttribute": self.display_attribute,
        })
    }
}

/// Columns from a new result, keeping value filters of same-named existing columns.
pub fn merge_columns(existing: &[Column], incoming: Vec<ColumnPayload>) -> Vec<Column> {
    incoming
        .into_iter()
        .map(|payload| {
            let mut column = Column::from_payload(payload);
            if let Some(previous) = existing.iter().find(|c| c.name == column.name) {
                column.includes = previous.includes.clone();
                column.excludes = previous.excludes.clone();
            }
            column
        })
        .collect()
}
