//! Integration tests for attribute writes, server refreshes, and the edit/save cycle

use crate::integration::test_utils::{customer_payload, query_payload, rows, signed_in_client};
use objsync::events::ObjectEvent;
use objsync::object::{BusinessObject, WriteOutcome};
use objsync::Client;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};

fn construct(client: &Client, payload: Value) -> Arc<BusinessObject> {
    client.construct_object(serde_json::from_value(payload).unwrap())
}

fn name_of(object: &BusinessObject, attribute: &str) -> Option<String> {
    object.attribute(attribute).unwrap().raw_value()
}

#[tokio::test]
async fn test_refresh_trigger_merges_only_returned_attributes() {
    let (client, transport) = signed_in_client().await;
    let object = construct(&client, customer_payload("7", "Ada", "BE"));
    object.edit();

    assert_eq!(
        object.set_attribute_value("Name", "Grace").unwrap(),
        WriteOutcome::Changed
    );

    transport.push_json(
        "ExecuteAction",
        json!({ "result": {
            "id": "customer-type",
            "type": "Customer",
            "fullTypeName": "Crm.Customer",
            "objectId": "7",
            "securityToken": "sec-7b",
            "attributes": [
                { "id": "attr-country", "name": "Country", "type": "String", "value": "NL", "isValueChanged": true, "triggersRefresh": true },
                { "id": "attr-vat", "name": "VatNumber", "type": "String", "value": "NL123" }
            ]
        } }),
    );

    let outcome = object
        .set_attribute_value_and_refresh(&client, "Country", "NL")
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::RefreshRequired);

    let sent = &transport.requests_for("ExecuteAction")[0].body;
    assert_eq!(sent["action"], "PersistentObject.Refresh");
    assert_eq!(
        sent["parameters"]["RefreshedPersistentObjectAttributeId"],
        "attr-country"
    );

    assert_eq!(name_of(&object, "Name").as_deref(), Some("Grace"));
    assert_eq!(name_of(&object, "Country").as_deref(), Some("NL"));
    assert_eq!(name_of(&object, "VatNumber").as_deref(), Some("NL123"));
    assert_eq!(object.security_token().as_deref(), Some("sec-7b"));
    assert!(object.is_dirty());
    assert!(object.is_in_edit());
}

#[tokio::test]
async fn test_spawned_write_refreshes_in_background() {
    let (client, transport) = signed_in_client().await;
    let object = construct(&client, customer_payload("7", "Ada", "BE"));
    object.edit();
    transport.push_json(
        "ExecuteAction",
        json!({ "result": customer_payload("7", "Ada", "FR") }),
    );

    let handle = object
        .spawn_set_attribute_value(Arc::clone(&client), "Country", "FR")
        .unwrap()
        .unwrap();
    handle.await.unwrap();

    assert_eq!(transport.request_count("ExecuteAction"), 1);
    assert_eq!(name_of(&object, "Country").as_deref(), Some("FR"));

    let plain = object
        .spawn_set_attribute_value(Arc::clone(&client), "Name", "Grace")
        .unwrap();
    assert!(plain.is_none());
}

#[tokio::test]
async fn test_refresh_error_keeps_local_values() {
    let (client, transport) = signed_in_client().await;
    let object = construct(&client, customer_payload("7", "Ada", "BE"));
    object.edit();
    let mut result = customer_payload("7", "Ada", "BE");
    result["notification"] = json!("Unknown country");
    transport.push_json("ExecuteAction", json!({ "result": result }));

    object
        .set_attribute_value_and_refresh(&client, "Country", "XX")
        .await
        .unwrap();

    assert_eq!(name_of(&object, "Country").as_deref(), Some("XX"));
    assert!(object.has_error_notification());
    assert_eq!(object.notification().unwrap().message, "Unknown country");
}

#[tokio::test]
async fn test_result_refreshes_named_queries_that_searched() {
    let (client, transport) = signed_in_client().await;
    let mut payload = customer_payload("7", "Ada", "BE");
    payload["queries"] = json!([
        { "id": "q-orders", "name": "Orders", "pageSize": 20 },
        { "id": "q-notes", "name": "Notes", "pageSize": 20 }
    ]);
    let object = construct(&client, payload);

    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 2, "pageSize": 20, "items": rows(0..2) } }),
    );
    let orders = Arc::clone(object.query("Orders").unwrap());
    assert!(orders.refresh(&client).await);

    let mut result = customer_payload("7", "Ada", "BE");
    result["queriesToRefresh"] = json!(["Orders", "Notes"]);
    transport.push_json("ExecuteAction", json!({ "result": result }));
    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 3, "pageSize": 20, "items": rows(0..3) } }),
    );

    object.edit();
    object
        .set_attribute_value_and_refresh(&client, "Country", "NL")
        .await
        .unwrap();

    assert_eq!(transport.request_count("ExecuteQuery"), 2);
    assert_eq!(orders.total_items(), 3);
    assert!(!object.query("Notes").unwrap().has_searched());
}

#[tokio::test]
async fn test_guid_shaped_query_name_falls_back_to_name_lookup() {
    let (client, transport) = signed_in_client().await;
    let guid = "3f2504e0-4f89-11d3-9a0c-0305e82c3301";
    let mut payload = customer_payload("7", "Ada", "BE");
    payload["queries"] = json!([{ "id": "q-linked", "name": guid, "pageSize": 20 }]);
    let object = construct(&client, payload);

    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 1, "pageSize": 20, "items": rows(0..1) } }),
    );
    let linked = Arc::clone(object.query(guid).unwrap());
    assert!(linked.refresh(&client).await);

    let mut result = customer_payload("7", "Ada", "BE");
    result["queriesToRefresh"] = json!([guid]);
    transport.push_json("ExecuteAction", json!({ "result": result }));
    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 4, "pageSize": 20, "items": rows(0..4) } }),
    );

    object.edit();
    object
        .set_attribute_value_and_refresh(&client, "Country", "NL")
        .await
        .unwrap();

    assert_eq!(transport.request_count("ExecuteQuery"), 2);
    assert_eq!(linked.total_items(), 4);
}

#[tokio::test]
async fn test_edit_then_cancel_restores_values_and_events() {
    let (client, _) = signed_in_client().await;
    let object = construct(&client, customer_payload("7", "Ada", "BE"));
    let mut events = object.subscribe();

    object.edit();
    object.set_attribute_value("Name", "Grace").unwrap();
    assert!(object.is_dirty());
    assert!(object.action("EndEdit").unwrap().can_execute());

    object.cancel_edit();

    assert_eq!(name_of(&object, "Name").as_deref(), Some("Ada"));
    assert!(!object.attribute("Name").unwrap().is_value_changed());
    assert!(!object.is_in_edit());
    assert!(!object.is_dirty());
    assert!(object.action("Edit").unwrap().is_visible());
    assert!(!object.action("EndEdit").unwrap().is_visible());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.first(), Some(&ObjectEvent::EditStateChanged { in_edit: true }));
    assert!(seen.contains(&ObjectEvent::AttributeChanged { name: "Name".to_string() }));
    assert!(seen.contains(&ObjectEvent::DirtyChanged { dirty: true }));
    assert!(seen.contains(&ObjectEvent::EditStateChanged { in_edit: false }));
    assert_eq!(seen.last(), Some(&ObjectEvent::Refreshed));
}

#[tokio::test]
async fn test_save_leaves_edit_and_refreshes_owner_query() {
    let (client, transport) = signed_in_client().await;
    let query = client.construct_query(
        serde_json::from_value(query_payload(Some(20), &[])).unwrap(),
        Weak::new(),
        false,
        false,
    );
    let object = construct(&client, customer_payload("7", "Ada", "BE"));
    object.set_owner_query(&query);

    object.edit();
    object.set_attribute_value("Name", "Grace").unwrap();
    transport.push_json(
        "ExecuteAction",
        json!({ "result": customer_payload("7", "Grace", "BE") }),
    );
    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 1, "pageSize": 20, "items": rows(0..1) } }),
    );

    assert!(object.save(&client).await);

    let sent = &transport.requests_for("ExecuteAction")[0].body;
    assert_eq!(sent["action"], "PersistentObject.Save");
    assert_eq!(sent["parent"]["securityToken"], "sec-7");
    assert_eq!(sent["parent"]["attributes"][0]["value"], "Grace");

    assert!(!object.is_in_edit());
    assert!(!object.is_dirty());
    assert_eq!(name_of(&object, "Name").as_deref(), Some("Grace"));
    assert_eq!(transport.request_count("ExecuteQuery"), 1);
    assert_eq!(query.total_items(), 1);
}

#[tokio::test]
async fn test_save_with_error_stays_in_edit() {
    let (client, transport) = signed_in_client().await;
    let object = construct(&client, customer_payload("7", "Ada", "BE"));
    object.edit();
    object.set_attribute_value("Name", "").unwrap();

    let mut result = customer_payload("7", "", "BE");
    result["notification"] = json!("Name is required");
    result["attributes"][0]["isValueChanged"] = json!(true);
    result["attributes"][0]["validationError"] = json!("Required");
    transport.push_json("ExecuteAction", json!({ "result": result }));

    assert!(!object.save(&client).await);

    assert!(object.is_in_edit());
    assert!(object.is_dirty());
    assert_eq!(object.notification().unwrap().message, "Name is required");
    assert_eq!(
        object.attribute("Name").unwrap().validation_error().as_deref(),
        Some("Required")
    );

    object.cancel_edit();
    assert_eq!(name_of(&object, "Name").as_deref(), Some("Ada"));
    assert!(object.notification().is_none());
}

#[tokio::test]
async fn test_saving_new_object_takes_server_identity() {
    let (client, transport) = signed_in_client().await;
    let mut payload = customer_payload("", "", "BE");
    payload["isNew"] = json!(true);
    payload["objectId"] = json!(null);
    let object = construct(&client, payload);
    assert!(object.is_in_edit());

    object.set_attribute_value("Name", "Ada").unwrap();
    transport.push_json(
        "ExecuteAction",
        json!({ "result": customer_payload("42", "Ada", "BE") }),
    );

    assert!(object.save(&client).await);

    let sent = &transport.requests_for("ExecuteAction")[0].body;
    assert_eq!(sent["parent"]["isNew"], true);
    assert_eq!(object.object_id().as_deref(), Some("42"));
    assert!(!object.is_new());
    assert!(!object.is_in_edit());
}

#[tokio::test]
async fn test_stay_in_edit_object_remains_editable_after_save() {
    let (client, transport) = signed_in_client().await;
    let mut payload = customer_payload("7", "Ada", "BE");
    payload["stateBehavior"] = json!("StayInEdit");
    let object = construct(&client, payload);
    assert!(object.is_in_edit());

    object.set_attribute_value("Name", "Grace").unwrap();
    transport.push_json(
        "ExecuteAction",
        json!({ "result": customer_payload("7", "Grace", "BE") }),
    );

    assert!(object.save(&client).await);
    assert!(object.is_in_edit());
    assert!(!object.is_dirty());

    object.set_attribute_value("Name", "Linus").unwrap();
    object.cancel_edit();
    assert_eq!(name_of(&object, "Name").as_deref(), Some("Grace"));
    assert!(object.is_in_edit());
}
