//! Integration tests for action execution, retry prompts, and result classification

use crate::integration::test_utils::{
    application_response, customer_payload, query_payload, rows, signed_in_client,
};
use async_trait::async_trait;
use objsync::client::{Client, ExecuteActionArgs, Hooks, ObjectActions};
use objsync::config::ServiceConfig;
use objsync::error::ClientError;
use objsync::notification::NotificationType;
use objsync::object::BusinessObject;
use objsync::transport::mock::ScriptedTransport;
use objsync::transport::StreamResponse;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::{Arc, Weak};

/// Hooks that pick a fixed retry option and record what they were handed.
#[derive(Default)]
struct RecordingHooks {
    retry_choice: i64,
    short_circuit: bool,
    retry_prompts: Mutex<Vec<Vec<String>>>,
    opened: Mutex<Vec<Arc<BusinessObject>>>,
    streams: Mutex<Vec<(Option<String>, Vec<u8>)>>,
    exceptions: Mutex<Vec<String>>,
}

#[async_trait]
impl Hooks for RecordingHooks {
    async fn on_action(&self, args: &mut ExecuteActionArgs<'_>) -> Result<(), ClientError> {
        if self.short_circuit && args.action == "Approve" {
            args.handled = true;
        }
        Ok(())
    }

    async fn on_retry_action(
        &self,
        _title: Option<&str>,
        _message: Option<&str>,
        options: &[String],
        _object: Option<&Arc<BusinessObject>>,
    ) -> i64 {
        self.retry_prompts.lock().push(options.to_vec());
        self.retry_choice
    }

    fn on_open(&self, object: Arc<BusinessObject>) {
        self.opened.lock().push(object);
    }

    fn on_stream(&self, file_name: Option<&str>, content: &[u8]) {
        self.streams
            .lock()
            .push((file_name.map(str::to_string), content.to_vec()));
    }

    fn on_exception(&self, error: &ClientError) {
        self.exceptions.lock().push(error.to_string());
    }
}

async fn client_with_hooks(
    hooks: Arc<RecordingHooks>,
) -> (Arc<Client>, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new());
    let client = Client::new(
        ServiceConfig::with_uri("https://app.example.com/"),
        transport.clone(),
    )
    .with_hooks(hooks);
    transport.push_json("GetApplication", application_response());
    client
        .sign_in_using_credentials("admin", Some("secret"))
        .await
        .unwrap();
    transport.clear_requests();
    (Arc::new(client), transport)
}

fn customer(client: &Client, object_id: &str) -> Arc<BusinessObject> {
    client.construct_object(
        serde_json::from_value(customer_payload(object_id, "Ada", "BE")).unwrap(),
    )
}

#[tokio::test]
async fn test_retry_resends_with_chosen_option() {
    let hooks = Arc::new(RecordingHooks {
        retry_choice: 1,
        ..Default::default()
    });
    let (client, transport) = client_with_hooks(hooks.clone()).await;
    let object = customer(&client, "7");

    transport.push_json(
        "ExecuteAction",
        json!({ "retry": { "title": "Sure?", "message": "Pick one", "options": ["A", "B"] } }),
    );
    transport.push_json("ExecuteAction", json!({ "result": null }));

    let result = client
        .execute_action("PersistentObject.Approve", Some(&object), None, &[], None)
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(*hooks.retry_prompts.lock(), vec![vec!["A".to_string(), "B".to_string()]]);

    let sent = transport.requests_for("ExecuteAction");
    assert_eq!(sent.len(), 2);
    assert!(sent[0].body["parameters"].is_null());
    assert_eq!(sent[1].body["action"], "PersistentObject.Approve");
    assert_eq!(sent[1].body["parameters"]["RetryActionOption"], 1);
    assert_eq!(sent[1].body["parameters"]["RetryActionOptionLabel"], "B");
    assert_eq!(sent[1].body["parent"]["objectId"], "7");
}

#[tokio::test]
async fn test_retry_candidate_object_is_sent_back() {
    let hooks = Arc::new(RecordingHooks::default());
    let (client, transport) = client_with_hooks(hooks).await;
    let object = customer(&client, "7");

    transport.push_json(
        "ExecuteAction",
        json!({ "retry": {
            "options": ["OK", "Cancel"],
            "persistentObject": { "id": "reason", "type": "Reason", "fullTypeName": "Crm.Reason" }
        } }),
    );
    transport.push_json("ExecuteAction", json!({ "result": null }));

    client
        .execute_action("PersistentObject.Approve", Some(&object), None, &[], None)
        .await
        .unwrap();

    let sent = transport.requests_for("ExecuteAction");
    assert_eq!(sent[1].body["parameters"]["RetryActionOption"], 0);
    assert_eq!(sent[1].body["retryPersistentObject"]["type"], "Reason");
}

#[tokio::test]
async fn test_hook_can_short_circuit_the_server() {
    let hooks = Arc::new(RecordingHooks {
        short_circuit: true,
        ..Default::default()
    });
    let (client, transport) = client_with_hooks(hooks).await;
    let object = customer(&client, "7");

    let result = client
        .execute_action("PersistentObject.Approve", Some(&object), None, &[], None)
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(transport.request_count("ExecuteAction"), 0);
}

struct ApproveLocally;

#[async_trait]
impl ObjectActions for ApproveLocally {
    async fn on_action(&self, args: &mut ExecuteActionArgs<'_>) -> Result<(), ClientError> {
        if args.action == "Approve" {
            let mut parameters = args.parameters.take().unwrap_or_default();
            parameters.insert("Source".to_string(), json!("client"));
            args.parameters = Some(parameters);
            args.execute_service_request().await?;
            args.handled = true;
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_type_handler_is_found_by_short_name() {
    let (client, transport) = signed_in_client().await;
    client
        .client_actions()
        .register("Customer", Arc::new(ApproveLocally));
    let object = customer(&client, "7");
    transport.push_json("ExecuteAction", json!({ "result": null }));

    client
        .execute_action("PersistentObject.Approve", Some(&object), None, &[], None)
        .await
        .unwrap();

    let sent = transport.requests_for("ExecuteAction");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body["parameters"]["Source"], "client");
}

#[tokio::test]
async fn test_server_exception_becomes_notification() {
    let hooks = Arc::new(RecordingHooks::default());
    let (client, transport) = client_with_hooks(hooks.clone()).await;
    let object = customer(&client, "7");
    transport.push_json("ExecuteAction", json!({ "exception": "Not allowed" }));

    let result = client
        .execute_action("PersistentObject.Approve", Some(&object), None, &[], None)
        .await
        .unwrap();

    assert!(result.is_none());
    let notification = object.notification().unwrap();
    assert_eq!(notification.message, "Not allowed");
    assert!(notification.is_error());
    assert!(hooks.exceptions.lock().is_empty());
}

#[tokio::test]
async fn test_undecodable_result_reaches_exception_hook() {
    let hooks = Arc::new(RecordingHooks::default());
    let (client, transport) = client_with_hooks(hooks.clone()).await;
    let object = customer(&client, "7");
    transport.push_json("ExecuteAction", json!({ "result": 5 }));

    let result = client
        .execute_action("PersistentObject.Approve", Some(&object), None, &[], None)
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(hooks.exceptions.lock().len(), 1);
    assert!(object.has_error_notification());
}

#[tokio::test]
async fn test_empty_action_name_is_rejected() {
    let (client, _) = signed_in_client().await;
    let object = customer(&client, "7");
    let err = client
        .execute_action(" ", Some(&object), None, &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_notification_result_only_sets_notification() {
    let hooks = Arc::new(RecordingHooks::default());
    let (client, transport) = client_with_hooks(hooks.clone()).await;
    let object = customer(&client, "7");
    transport.push_json(
        "ExecuteAction",
        json!({ "result": {
            "id": "n", "fullTypeName": "Vidyano.Notification",
            "notification": "Mail sent", "notificationType": "OK"
        } }),
    );

    let delete = Arc::clone(object.action("Delete").unwrap());
    delete.execute(&client, None).await.unwrap();

    let notification = object.notification().unwrap();
    assert_eq!(notification.message, "Mail sent");
    assert_eq!(notification.kind, NotificationType::Ok);
    assert!(hooks.opened.lock().is_empty());
    assert_eq!(object.attribute("Name").unwrap().raw_value().as_deref(), Some("Ada"));
}

#[tokio::test]
async fn test_same_identity_result_merges_into_target() {
    let hooks = Arc::new(RecordingHooks::default());
    let (client, transport) = client_with_hooks(hooks.clone()).await;
    let object = customer(&client, "7");
    let mut result = customer_payload("7", "Grace", "NL");
    result["notification"] = json!("Saved elsewhere");
    result["notificationType"] = json!("Notice");
    transport.push_json("ExecuteAction", json!({ "result": result }));

    let delete = Arc::clone(object.action("Delete").unwrap());
    delete.execute(&client, None).await.unwrap();

    assert_eq!(object.attribute("Name").unwrap().raw_value().as_deref(), Some("Grace"));
    assert_eq!(object.notification().unwrap().message, "Saved elsewhere");
    assert!(hooks.opened.lock().is_empty());
}

#[tokio::test]
async fn test_error_result_with_same_identity_is_merged() {
    let hooks = Arc::new(RecordingHooks::default());
    let (client, transport) = client_with_hooks(hooks.clone()).await;
    let object = customer(&client, "7");
    let mut result = customer_payload("7", "Ada", "BE");
    result["notification"] = json!("VAT number is required");
    result["attributes"][3]["validationError"] = json!("Required");
    transport.push_json("ExecuteAction", json!({ "result": result }));

    let delete = Arc::clone(object.action("Delete").unwrap());
    delete.execute(&client, None).await.unwrap();

    assert!(object.has_error_notification());
    assert_eq!(
        object.attribute("VatNumber").unwrap().validation_error().as_deref(),
        Some("Required")
    );
}

#[tokio::test]
async fn test_other_object_is_opened() {
    let hooks = Arc::new(RecordingHooks::default());
    let (client, transport) = client_with_hooks(hooks.clone()).await;
    let object = customer(&client, "7");
    transport.push_json(
        "ExecuteAction",
        json!({ "result": customer_payload("8", "Grace", "NL") }),
    );

    let delete = Arc::clone(object.action("Delete").unwrap());
    delete.execute(&client, None).await.unwrap();

    let opened = hooks.opened.lock();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].object_id().as_deref(), Some("8"));
    assert_eq!(object.attribute("Name").unwrap().raw_value().as_deref(), Some("Ada"));
}

#[tokio::test]
async fn test_registered_stream_goes_to_sink() {
    let hooks = Arc::new(RecordingHooks::default());
    let (client, transport) = client_with_hooks(hooks.clone()).await;
    let object = customer(&client, "7");
    transport.push_json(
        "ExecuteAction",
        json!({ "result": { "id": "s", "fullTypeName": "Vidyano.RegisteredStream", "objectId": "stream-1" } }),
    );
    transport.push_stream(Ok(StreamResponse {
        file_name: Some("report.pdf".to_string()),
        content: vec![1, 2, 3],
    }));

    let delete = Arc::clone(object.action("Delete").unwrap());
    delete.execute(&client, None).await.unwrap();

    assert_eq!(
        *hooks.streams.lock(),
        vec![(Some("report.pdf".to_string()), vec![1, 2, 3])]
    );
    assert_eq!(transport.requests_for("GetStream")[0].body["id"], "stream-1");
}

#[tokio::test]
async fn test_failed_stream_becomes_notification() {
    let hooks = Arc::new(RecordingHooks::default());
    let (client, transport) = client_with_hooks(hooks.clone()).await;
    let object = customer(&client, "7");
    transport.push_json(
        "ExecuteAction",
        json!({ "result": { "id": "s", "fullTypeName": "Vidyano.RegisteredStream", "objectId": "stream-1" } }),
    );

    let delete = Arc::clone(object.action("Delete").unwrap());
    assert!(delete.execute(&client, None).await.is_ok());

    assert!(hooks.streams.lock().is_empty());
    assert_eq!(hooks.exceptions.lock().len(), 1);
    assert!(object.notification().is_some());
}

#[tokio::test]
async fn test_menu_option_index_and_label() {
    let (client, transport) = signed_in_client().await;
    let query = client.construct_query(
        serde_json::from_value(query_payload(Some(20), &["Export"])).unwrap(),
        Weak::new(),
        false,
        false,
    );
    transport.push_json("ExecuteAction", json!({ "result": null }));

    let export = query.action("Export").unwrap();
    assert!(export.is_pinned());
    export.execute(&client, Some("Csv")).await.unwrap();

    let sent = &transport.requests_for("ExecuteAction")[0].body;
    assert_eq!(sent["action"], "Query.Export");
    assert_eq!(sent["parameters"]["MenuOption"], "1");
    assert_eq!(sent["parameters"]["MenuLabel"], "Csv");
    assert!(sent["selectedItems"].is_null());
}

#[tokio::test]
async fn test_selection_drives_action_state() {
    let (client, transport) = signed_in_client().await;
    let query = client.construct_query(
        serde_json::from_value(query_payload(Some(20), &["Delete", "Merge"])).unwrap(),
        Weak::new(),
        false,
        false,
    );
    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 3, "pageSize": 20, "items": rows(0..3) } }),
    );
    query.refresh(&client).await;

    let delete = query.action("Delete").unwrap();
    let merge = query.action("Merge").unwrap();
    assert!(!delete.can_execute());
    assert!(!merge.can_execute());

    query.select(query.row(0).unwrap());
    assert!(delete.can_execute());
    assert!(!merge.can_execute());

    query.select(query.row(1).unwrap());
    assert!(merge.can_execute());

    query.toggle_selection(query.row(1).unwrap());
    assert_eq!(query.selected_count(), 1);
    assert!(!merge.can_execute());
}

#[tokio::test]
async fn test_query_action_refreshes_query_when_asked() {
    let (client, transport) = signed_in_client().await;
    let query = client.construct_query(
        serde_json::from_value(query_payload(Some(20), &["Delete"])).unwrap(),
        Weak::new(),
        false,
        false,
    );
    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 3, "pageSize": 20, "items": rows(0..3) } }),
    );
    transport.push_json("ExecuteAction", json!({ "result": null }));
    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 2, "pageSize": 20, "items": rows(1..3) } }),
    );

    query.refresh(&client).await;
    query.select(query.row(0).unwrap());
    query.action("Delete").unwrap().execute(&client, None).await.unwrap();

    let action = &transport.requests_for("ExecuteAction")[0].body;
    assert_eq!(action["action"], "Query.Delete");
    assert_eq!(action["selectedItems"][0]["id"], "0");
    assert_eq!(transport.request_count("ExecuteQuery"), 2);
    assert_eq!(query.total_items(), 2);
    assert_eq!(query.selected_count(), 0);
}

#[tokio::test]
async fn test_edit_brings_dependent_actions() {
    let (client, _) = signed_in_client().await;
    let object = customer(&client, "7");

    let names: Vec<&str> = object.actions().iter().map(|a| a.name()).collect();
    assert_eq!(names, vec!["Edit", "EndEdit", "CancelEdit", "Delete"]);

    let edit = object.action("Edit").unwrap();
    let end_edit = object.action("EndEdit").unwrap();
    let cancel = object.action("CancelEdit").unwrap();
    assert!(!edit.is_dependent());
    assert!(end_edit.is_dependent() && cancel.is_dependent());
    assert_eq!(end_edit.offset(), edit.offset());
    assert_eq!(cancel.offset(), edit.offset());
    assert!(edit.is_visible());
    assert!(!end_edit.is_visible());
    assert!(!cancel.can_execute());

    let mut new_payload = customer_payload("", "", "BE");
    new_payload["isNew"] = json!(true);
    new_payload["objectId"] = json!(null);
    let new_object = client.construct_object(serde_json::from_value(new_payload).unwrap());
    assert!(new_object.action("Save").is_some());
    assert!(new_object.action("Edit").is_none());
    assert!(new_object.is_in_edit());
}
