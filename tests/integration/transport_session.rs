//! Integration tests for sign-in, the request envelope, and session handling

use crate::integration::test_utils::{application_response, scripted_client, signed_in_client};
use objsync::error::{ClientError, TransportError};
use serde_json::json;

#[tokio::test]
async fn test_sign_in_loads_messages_and_action_definitions() {
    let (client, transport) = scripted_client();
    transport.push_json("GetApplication", application_response());

    let application = client
        .sign_in_using_credentials("admin", Some("secret"))
        .await
        .unwrap();

    assert_eq!(application.full_type_name(), "Vidyano.Application");
    assert!(client.is_connected());
    assert_eq!(client.user().as_deref(), Some("admin"));
    assert_eq!(client.auth_token().as_deref(), Some("token-1"));
    assert_eq!(client.message("True").as_deref(), Some("Yes"));

    let export = client.action_definition("Export").unwrap();
    assert!(export.is_pinned);
    assert_eq!(export.options, vec!["Excel".to_string(), "Csv".to_string()]);
    assert!(client.action_definition("Delete").unwrap().refresh_query_on_completed);

    let sent = &transport.requests_for("GetApplication")[0].body;
    assert_eq!(sent["userName"], "admin");
    assert_eq!(sent["password"], "secret");
    assert_eq!(sent["environment"], "Web");
    assert!(sent.get("authToken").is_none());
}

#[tokio::test]
async fn test_application_with_notification_aborts_sign_in() {
    let (client, transport) = scripted_client();
    transport.push_json(
        "GetApplication",
        json!({
            "application": {
                "id": "app",
                "fullTypeName": "Vidyano.Application",
                "notification": "Password expired",
                "notificationType": "Warning"
            }
        }),
    );

    let err = client
        .sign_in_using_credentials("admin", Some("old"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Protocol(ref m) if m == "Password expired"));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_auth_token_travels_with_later_calls() {
    let (client, transport) = signed_in_client().await;
    transport.push_json("GetQuery", json!({ "authToken": "token-2", "query": { "id": "q", "name": "Q" } }));

    client.get_query("q", None).await.unwrap();

    let sent = &transport.requests_for("GetQuery")[0].body;
    assert_eq!(sent["authToken"], "token-1");
    assert_eq!(sent["userName"], "admin");
    assert_eq!(client.auth_token().as_deref(), Some("token-2"));
}

#[tokio::test]
async fn test_session_expired_with_default_credentials_retries_once() {
    let (client, transport) = scripted_client();
    transport.push_text(Ok(json!({ "defaultUser": "guest" }).to_string()));
    client.get_client_data().await.unwrap();
    assert_eq!(client.default_user().as_deref(), Some("guest"));

    transport.push_json("GetApplication", application_response());
    client.sign_in_using_default_credentials().await.unwrap();
    assert!(client.is_using_default_credentials());

    transport.push_json("GetQuery", json!({ "exception": "Session expired" }));
    transport.push_json("GetQuery", json!({ "query": { "id": "q", "name": "Q" } }));

    let query = client.get_query("q", None).await.unwrap();
    assert_eq!(query.name(), "Q");

    let sent = transport.requests_for("GetQuery");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].body["authToken"], "token-1");
    assert!(sent[1].body.get("authToken").is_none());
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_second_session_expired_is_not_retried() {
    let (client, transport) = scripted_client();
    transport.push_text(Ok(json!({ "defaultUser": "guest" }).to_string()));
    client.get_client_data().await.unwrap();
    transport.push_json("GetApplication", application_response());
    client.sign_in_using_default_credentials().await.unwrap();

    transport.push_json("GetQuery", json!({ "exception": "Session expired" }));
    transport.push_json("GetQuery", json!({ "exception": "Session expired" }));

    let err = client.get_query("q", None).await.unwrap_err();

    assert!(matches!(err, ClientError::Protocol(ref m) if m == "Session expired"));
    assert_eq!(transport.request_count("GetQuery"), 2);
}

#[tokio::test]
async fn test_session_expired_with_credentials_requires_sign_in() {
    let (client, transport) = signed_in_client().await;
    transport.push_json("GetQuery", json!({ "exception": "Session expired" }));

    let err = client.get_query("q", None).await.unwrap_err();

    assert!(matches!(err, ClientError::Protocol(ref m) if m == "Session expired"));
    assert_eq!(transport.request_count("GetQuery"), 1);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_timeout_surfaces_as_timeout_message() {
    let (client, transport) = signed_in_client().await;
    transport.push_failure(
        "GetQuery",
        TransportError::Timeout(std::time::Duration::from_secs(90)),
    );

    let err = client.get_query("q", None).await.unwrap_err();
    assert!(err.to_string().starts_with("Timeout"));
}

#[tokio::test]
async fn test_session_is_merged_and_cleared() {
    let (client, transport) = signed_in_client().await;
    let session = |country: &str| {
        json!({
            "id": "session",
            "fullTypeName": "Crm.Session",
            "attributes": [{ "id": "s1", "name": "Country", "type": "String", "value": country }]
        })
    };
    transport.push_json("GetQuery", json!({ "session": session("BE"), "query": { "id": "q", "name": "Q" } }));
    transport.push_json("GetQuery", json!({ "session": session("NL"), "query": { "id": "q", "name": "Q" } }));
    transport.push_json("GetQuery", json!({ "query": { "id": "q", "name": "Q" } }));

    client.get_query("q", None).await.unwrap();
    let first = client.session().unwrap();
    assert_eq!(first.attribute("Country").unwrap().raw_value().as_deref(), Some("BE"));

    client.get_query("q", None).await.unwrap();
    let second = client.session().unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(second.attribute("Country").unwrap().raw_value().as_deref(), Some("NL"));

    // The held session is sent back with the next request
    let sent = &transport.requests_for("GetQuery")[1].body;
    assert_eq!(sent["session"]["attributes"][0]["value"], "BE");

    client.get_query("q", None).await.unwrap();
    assert!(client.session().is_none());
}

#[tokio::test]
async fn test_sign_out_forgets_credentials() {
    let (client, _) = signed_in_client().await;
    client.sign_out().await;

    assert!(!client.is_connected());
    assert!(client.user().is_none());
    assert!(client.auth_token().is_none());
    assert!(client.application().is_none());
}

#[tokio::test]
async fn test_credential_sign_in_clears_stored_authorization_header() {
    let (client, transport) = scripted_client();
    client.set_authorization_header(Some("Bearer stale".to_string()));
    transport.push_json("GetApplication", application_response());

    client
        .sign_in_using_credentials("admin", Some("secret"))
        .await
        .unwrap();

    let sent = &transport.requests_for("GetApplication")[0];
    assert_eq!(sent.body["userName"], "admin");
    assert!(sent.authorization.is_none());
}

#[tokio::test]
async fn test_authorization_header_sign_in_sends_no_user_name() {
    let (client, transport) = scripted_client();
    transport.push_json("GetApplication", application_response());
    transport.push_json("GetQuery", json!({ "query": { "id": "q", "name": "Q" } }));

    client
        .sign_in_using_authorization_header("Bearer abc")
        .await
        .unwrap();
    assert!(client.is_connected());
    assert!(!client.is_using_default_credentials());

    let sent = &transport.requests_for("GetApplication")[0];
    assert_eq!(sent.authorization.as_deref(), Some("Bearer abc"));
    assert!(sent.body.get("userName").is_none());
    assert!(sent.body.get("authToken").is_none());
    assert!(sent.body.get("password").is_none());

    client.get_query("q", None).await.unwrap();
    let later = &transport.requests_for("GetQuery")[0];
    assert_eq!(later.authorization.as_deref(), Some("Bearer abc"));
    assert!(later.body.get("userName").is_none());
}
