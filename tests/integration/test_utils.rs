//! Shared test utilities for integration tests
//!
//! Scripted clients, server payload builders, and isolation of the environment variables the
//! configuration loader reads.

use objsync::client::Client;
use objsync::config::ServiceConfig;
use objsync::transport::mock::ScriptedTransport;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Serializes access to process environment variables across tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Environment variable state to restore after a test
struct EnvState {
    vars: Vec<(String, Option<String>)>,
}

impl EnvState {
    fn capture(keys: &[&str]) -> Self {
        Self {
            vars: keys
                .iter()
                .map(|k| (k.to_string(), std::env::var(k).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (key, value) in self.vars {
            match value {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}

/// Run `f` with `XDG_CONFIG_HOME` and `HOME` inside `test_dir` and the given extra variables set.
pub fn with_config_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let mut keys = vec!["HOME", "XDG_CONFIG_HOME"];
    keys.extend(vars.iter().map(|(k, _)| *k));
    let env_state = EnvState::capture(&keys);

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();
    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path());
    for (key, value) in vars {
        std::env::set_var(key, value);
    }

    let result = f();
    env_state.restore();
    result
}

pub fn scripted_client() -> (Arc<Client>, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new());
    let client = Client::new(
        ServiceConfig::with_uri("https://app.example.com/"),
        transport.clone(),
    );
    (Arc::new(client), transport)
}

fn action_row(name: &str, offset: i32, extra: &[(&str, &str)]) -> Value {
    let mut values = vec![
        json!({ "key": "Name", "value": name }),
        json!({ "key": "DisplayName", "value": name }),
        json!({ "key": "Offset", "value": offset.to_string() }),
    ];
    values.extend(extra.iter().map(|(k, v)| json!({ "key": k, "value": v })));
    json!({ "id": name, "values": values })
}

/// `GetApplication` answer with action definitions and a message table.
pub fn application_response() -> Value {
    json!({
        "authToken": "token-1",
        "userName": "admin",
        "application": {
            "id": "app",
            "type": "Application",
            "fullTypeName": "Vidyano.Application",
            "queries": [
                {
                    "id": "actions",
                    "name": "Actions",
                    "result": {
                        "items": [
                            action_row("Edit", 0, &[]),
                            action_row("EndEdit", 1, &[]),
                            action_row("CancelEdit", 2, &[]),
                            action_row("Save", 3, &[]),
                            action_row("Delete", 4, &[("SelectionRule", ">0"), ("RefreshQueryOnCompleted", "True")]),
                            action_row("Export", 5, &[("Options", "Excel;Csv"), ("IsPinned", "True")]),
                            action_row("Merge", 6, &[("SelectionRule", "=2")])
                        ]
                    }
                },
                {
                    "id": "messages",
                    "name": "ClientMessages",
                    "result": {
                        "items": [
                            { "id": "1", "values": [{ "key": "Key", "value": "True" }, { "key": "Value", "value": "Yes" }] },
                            { "id": "2", "values": [{ "key": "Key", "value": "False" }, { "key": "Value", "value": "No" }] }
                        ]
                    }
                }
            ]
        }
    })
}

/// Client signed in against [`application_response`].
pub async fn signed_in_client() -> (Arc<Client>, Arc<ScriptedTransport>) {
    let (client, transport) = scripted_client();
    transport.push_json("GetApplication", application_response());
    client
        .sign_in_using_credentials("admin", Some("secret"))
        .await
        .unwrap();
    transport.clear_requests();
    (client, transport)
}

/// A customer object payload with a plain, a read-only and a refresh-triggering attribute.
pub fn customer_payload(object_id: &str, name: &str, country: &str) -> Value {
    json!({
        "id": "customer-type",
        "type": "Customer",
        "fullTypeName": "Crm.Customer",
        "objectId": object_id,
        "securityToken": format!("sec-{}", object_id),
        "actions": ["Edit", "Delete"],
        "attributes": [
            { "id": "attr-name", "name": "Name", "type": "String", "value": name },
            { "id": "attr-code", "name": "Code", "type": "String", "value": "C1", "isReadOnly": true },
            { "id": "attr-country", "name": "Country", "type": "String", "value": country, "triggersRefresh": true },
            { "id": "attr-vat", "name": "VatNumber", "type": "String", "value": null }
        ]
    })
}

/// Query result rows `range` with an `Amount` column value equal to the index.
pub fn rows(range: std::ops::Range<usize>) -> Value {
    Value::Array(
        range
            .map(|i| json!({ "id": i.to_string(), "values": [{ "key": "Amount", "value": i.to_string() }] }))
            .collect(),
    )
}

pub fn query_payload(page_size: Option<i64>, actions: &[&str]) -> Value {
    json!({
        "id": "query-customers",
        "name": "Customers",
        "label": "Customers",
        "autoQuery": true,
        "canRead": true,
        "pageSize": page_size,
        "actions": actions,
        "columns": [{ "name": "Amount", "type": "Int32" }],
        "persistentObject": {
            "id": "customer-type",
            "type": "Customer",
            "fullTypeName": "Crm.Customer"
        }
    })
}
