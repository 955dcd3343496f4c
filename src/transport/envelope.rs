//! Request envelope
//!
//! Every call posts one JSON object: the session envelope
//! (`userName`, `authToken`, `environment`, `isMobile`, `uniqueId`, `timestamp`,
//! `requestedExpiration`, `session`) plus endpoint-specific fields.

use serde::Serialize;
use serde_json::{Map, Value};

/// Mutable request body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestData(Map<String, Value>);

impl RequestData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Set a field, writing `null` for `None`.
    pub fn set_opt<T: Into<Value>>(&mut self, key: &str, value: Option<T>) {
        self.0
            .insert(key.to_string(), value.map(Into::into).unwrap_or(Value::Null));
    }

    /// Serialize a payload into a field.
    pub fn set_serialized<T: Serialize>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        self.0.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Edit the `parameters` object, creating it when absent or null.
    pub fn update_parameters(&mut self, edit: impl FnOnce(&mut Map<String, Value>)) {
        let mut parameters = match self.0.remove("parameters") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        edit(&mut parameters);
        self.0
            .insert("parameters".to_string(), Value::Object(parameters));
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}
