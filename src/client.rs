//! Session Client
//!
//! The client owns the connection to one application server: credentials, the current session
//! object, the application's message and action tables, and the request pipeline every call
//! goes through. Objects and queries never hold the client; operations that talk to the server
//! take it as an explicit `&Client`.

use crate::action::{ActionDefinition, ActionRegistry, SelectionRule, SelectionRuleCache};
use crate::config::ServiceConfig;
use crate::error::{ClientError, TransportError};
use crate::object::BusinessObject;
use crate::payload::{ClientData, ObjectPayload, QueryPayload, QueryResultPayload, Response, ERROR_TYPE};
use crate::query::Query;
use crate::transport::{no_internet_message, HttpTransport, RequestData, StreamResponse, Transport};
use crate::value::format_date_offset;
use chrono::{Local, Months};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

pub mod client_actions;
pub mod execute;
pub mod hooks;

pub use client_actions::{ClientActions, ObjectActions};
pub use execute::ExecuteActionArgs;
pub use hooks::{DefaultHooks, Hooks};

/// Action parameters sent as the `parameters` object.
pub type Parameters = Map<String, Value>;

const SESSION_EXPIRED: &str = "Session expired";
const DEFAULT_SERVICE_PROVIDER: &str = "Microsoft";

#[derive(Default)]
struct SessionState {
    user: Option<String>,
    auth_token: Option<String>,
    authorization_header: Option<String>,
    client_data: Option<ClientData>,
    is_using_default_credentials: bool,
    is_connected: bool,
    application: Option<Arc<BusinessObject>>,
    session: Option<Arc<BusinessObject>>,
    messages: HashMap<String, String>,
    action_definitions: HashMap<String, Arc<ActionDefinition>>,
}

struct BusyGuard<'a>(&'a AtomicUsize);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Connection to one application server.
pub struct Client {
    config: ServiceConfig,
    transport: Arc<dyn Transport>,
    hooks: Arc<dyn Hooks>,
    actions: ActionRegistry,
    client_actions: ClientActions,
    selection_rules: SelectionRuleCache,
    state: RwLock<SessionState>,
    busy: AtomicUsize,
}

impl Client {
    pub fn new(config: ServiceConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            hooks: Arc::new(DefaultHooks),
            actions: ActionRegistry::with_builtins(),
            client_actions: ClientActions::new(),
            selection_rules: SelectionRuleCache::new(),
            state: RwLock::new(SessionState::default()),
            busy: AtomicUsize::new(0),
        }
    }

    /// Client over HTTP for the configured service.
    pub fn connect(config: ServiceConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(config.clone())?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn hooks(&self) -> &Arc<dyn Hooks> {
        &self.hooks
    }

    pub fn action_registry(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn client_actions(&self) -> &ClientActions {
        &self.client_actions
    }

    pub fn selection_rules(&self) -> &SelectionRuleCache {
        &self.selection_rules
    }

    pub fn user(&self) -> Option<String> {
        self.state.read().user.clone()
    }

    pub fn auth_token(&self) -> Option<String> {
        self.state.read().auth_token.clone()
    }

    pub fn set_auth_token(&self, token: Option<String>) {
        self.state.write().auth_token = token;
    }

    /// Send `Authorization` instead of `userName`/`authToken` envelope fields.
    pub fn set_authorization_header(&self, header: Option<String>) {
        self.state.write().authorization_header = header;
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().is_connected
    }

    pub fn is_using_default_credentials(&self) -> bool {
        self.state.read().is_using_default_credentials
    }

    pub fn default_user(&self) -> Option<String> {
        self.state
            .read()
            .client_data
            .as_ref()
            .and_then(|data| data.default_user.clone())
    }

    pub fn application(&self) -> Option<Arc<BusinessObject>> {
        self.state.read().application.clone()
    }

    pub fn session(&self) -> Option<Arc<BusinessObject>> {
        self.state.read().session.clone()
    }

    /// Localized client message, if the application defines it.
    pub fn message(&self, key: &str) -> Option<String> {
        self.state.read().messages.get(key).cloned()
    }

    pub fn action_definition(&self, name: &str) -> Option<Arc<ActionDefinition>> {
        self.state.read().action_definitions.get(name).cloned()
    }

    /// Replace the action definition table.
    pub fn set_action_definitions(&self, definitions: impl IntoIterator<Item = ActionDefinition>) {
        let table = definitions
            .into_iter()
            .map(|d| (d.name.clone(), Arc::new(d)))
            .collect();
        self.state.write().action_definitions = table;
    }

    /// Whether any request is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst) > 0
    }

    fn busy(&self) -> BusyGuard<'_> {
        self.busy.fetch_add(1, Ordering::SeqCst);
        BusyGuard(&self.busy)
    }

    fn report<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(e) = &result {
            self.hooks.on_exception(e);
        }
        result
    }

    pub fn construct_object(&self, payload: ObjectPayload) -> Arc<BusinessObject> {
        let object = BusinessObject::from_payload(self, payload);
        self.hooks.on_construct_object(&object);
        object
    }

    pub fn construct_query(
        &self,
        payload: QueryPayload,
        parent: Weak<BusinessObject>,
        parent_is_new: bool,
        as_lookup: bool,
    ) -> Arc<Query> {
        let query = Query::from_payload(self, payload, parent, parent_is_new, as_lookup);
        self.hooks.on_construct_query(&query);
        query
    }

    /// Base request body: credentials, environment, device signature, expiration and session.
    pub fn create_data(&self, user: Option<&str>, auth_token: Option<&str>) -> RequestData {
        let mut data = RequestData::new();
        let unique_id = self
            .hooks
            .unique_id()
            .or_else(|| self.config.unique_id.clone())
            .filter(|id| !id.is_empty());

        let session = {
            let state = self.state.read();
            if state.authorization_header.is_none() {
                data.set_opt(
                    "userName",
                    user.map(str::to_string).or_else(|| state.user.clone()),
                );
                data.set_opt(
                    "authToken",
                    auth_token
                        .map(str::to_string)
                        .or_else(|| state.auth_token.clone()),
                );
            }
            data.set("environment", self.config.environment.as_str());
            data.set("isMobile", self.config.is_mobile);

            if let Some(unique_id) = unique_id {
                if state.is_using_default_credentials {
                    data.set("uniqueId", Value::Null);
                    data.set("timestamp", Value::Null);
                } else {
                    data.set("uniqueId", format!("rsa-{}", unique_id));
                    data.set_opt("timestamp", self.hooks.signed_timestamp());
                }
            }
            state.session.clone()
        };

        let now = Local::now().fixed_offset();
        let expiration = now.checked_add_months(Months::new(12)).unwrap_or(now);
        data.set("requestedExpiration", format_date_offset(&expiration));

        if let Some(session) = session {
            data.set("session", session.to_service_object());
        }

        self.hooks.on_create_data(&mut data);
        data
    }

    /// Post `data` to `method`, folding transport failures into the exception envelope.
    ///
    /// An expired session is re-sent once without credentials when signed in with the default
    /// user; otherwise the client is marked disconnected.
    pub async fn post(&self, method: &str, mut data: RequestData) -> Response {
        let authorization = self.state.read().authorization_header.clone();
        let mut response = self.send(method, &data, authorization.as_deref()).await;

        if response.exception() == Some(SESSION_EXPIRED) {
            let using_default = self.state.read().is_using_default_credentials;
            if using_default {
                warn!(method, "Session expired, resubmitting with default credentials");
                data.remove("password");
                data.remove("authToken");
                response = self.send(method, &data, authorization.as_deref()).await;
            } else {
                warn!(method, "Session expired, sign-in required");
                self.state.write().is_connected = false;
            }
        }

        self.hooks.on_response(method, &response);
        response
    }

    async fn send(&self, method: &str, data: &RequestData, authorization: Option<&str>) -> Response {
        debug!(method, "Posting request");
        match self
            .transport
            .post_json(method, &data.to_value(), authorization)
            .await
        {
            Ok(Value::Object(map)) => Response(map),
            Ok(other) => {
                warn!(method, "Response is not a JSON object");
                Response::from_exception(self.transport_failure(&TransportError::Malformed(
                    format!("expected an object, got {}", other),
                )))
            }
            Err(e) => {
                warn!(method, error = %e, "Request failed");
                Response::from_exception(self.transport_failure(&e))
            }
        }
    }

    fn transport_failure(&self, error: &TransportError) -> String {
        let message = no_internet_message(&self.config.language);
        match error {
            TransportError::Timeout(_) | TransportError::Status(_) => error.to_string(),
            TransportError::EmptyBody => message.title.to_string(),
            _ => format!("{}\n\nException: {}", message.message, error),
        }
    }

    /// Check for an exception, then take over the auth token and session.
    async fn accept(&self, response: &Response) -> Result<(), ClientError> {
        if let Some(exception) = response.exception() {
            return Err(ClientError::Protocol(exception.to_string()));
        }
        self.set_auth_token(response.auth_token().map(str::to_string));
        self.update_session(response).await
    }

    /// Merge the response's session into the current one, or clear it.
    pub(crate) async fn update_session(&self, response: &Response) -> Result<(), ClientError> {
        let Some(payload) = response.decode::<ObjectPayload>("session")? else {
            self.state.write().session = None;
            self.hooks.on_session_updated(None);
            return Ok(());
        };

        let incoming = self.construct_object(payload);
        check_clean(&incoming)?;

        let current = self.state.read().session.clone();
        let session = match current {
            Some(current) => {
                current.refresh_from_result(self, &incoming).await;
                current
            }
            None => {
                self.state.write().session = Some(Arc::clone(&incoming));
                incoming
            }
        };
        self.hooks.on_session_updated(Some(&session));
        Ok(())
    }

    /// Fetch public client data (default user, providers). Failures yield `None`.
    pub async fn get_client_data(&self) -> Option<ClientData> {
        let path = format!("GetClientData?environment={}", self.config.environment);
        let data = match self.transport.get_text(&path).await {
            Ok(text) => serde_json::from_str::<ClientData>(&text).map_err(ClientError::from),
            Err(e) => Err(ClientError::from(e)),
        };

        match data {
            Ok(data) if data.exception.is_none() => {
                self.state.write().client_data = Some(data.clone());
                Some(data)
            }
            Ok(data) => {
                warn!(exception = ?data.exception, "Client data request failed");
                None
            }
            Err(e) => {
                debug!(error = %e, "Client data unavailable");
                None
            }
        }
    }

    /// Sign in with a user name and optional password.
    #[instrument(skip(self, password))]
    pub async fn sign_in_using_credentials(
        &self,
        user: &str,
        password: Option<&str>,
    ) -> Result<Arc<BusinessObject>, ClientError> {
        let is_default = password.is_none() && self.default_user().as_deref() == Some(user);
        {
            let mut state = self.state.write();
            state.authorization_header = None;
            state.is_using_default_credentials = is_default;
        }
        self.sign_in(Credentials::Password { user, password }).await
    }

    /// Sign in as the server's default user.
    pub async fn sign_in_using_default_credentials(&self) -> Result<Arc<BusinessObject>, ClientError> {
        let user = self.default_user().ok_or_else(|| {
            ClientError::InvalidArgument("the server has no default user".to_string())
        })?;
        self.sign_in_using_credentials(&user, None).await
    }

    /// Resume a session with a previously issued auth token.
    #[instrument(skip(self, auth_token))]
    pub async fn sign_in_using_auth_token(
        &self,
        user: &str,
        auth_token: &str,
    ) -> Result<Arc<BusinessObject>, ClientError> {
        self.clear_credentials(None);
        self.sign_in(Credentials::AuthToken { user, auth_token }).await
    }

    /// Sign in with a third-party access token.
    #[instrument(skip(self, access_token))]
    pub async fn sign_in_using_access_token(
        &self,
        access_token: &str,
        service_provider: Option<&str>,
    ) -> Result<Arc<BusinessObject>, ClientError> {
        self.clear_credentials(None);
        self.sign_in(Credentials::AccessToken {
            access_token,
            service_provider,
        })
        .await
    }

    /// Sign in with a ready-made `Authorization` header and no user name.
    #[instrument(skip(self, header))]
    pub async fn sign_in_using_authorization_header(
        &self,
        header: &str,
    ) -> Result<Arc<BusinessObject>, ClientError> {
        self.clear_credentials(Some(header.to_string()));
        self.sign_in(Credentials::Header).await
    }

    fn clear_credentials(&self, header: Option<String>) {
        let mut state = self.state.write();
        state.authorization_header = header;
        state.is_using_default_credentials = false;
    }

    async fn sign_in(&self, credentials: Credentials<'_>) -> Result<Arc<BusinessObject>, ClientError> {
        let _busy = self.busy();
        let application = self.report(self.get_application(credentials).await)?;
        self.state.write().is_connected = true;
        info!(user = ?self.user(), "Signed in");
        self.hooks.on_initialized().await;
        Ok(application)
    }

    async fn get_application(
        &self,
        credentials: Credentials<'_>,
    ) -> Result<Arc<BusinessObject>, ClientError> {
        let (data, requested_user) = match credentials {
            Credentials::Password { user, password } => {
                let mut data = self.create_data(Some(user), None);
                if let Some(password) = password {
                    data.set("password", password);
                    data.remove("authToken");
                }
                (data, Some(user))
            }
            Credentials::AuthToken { user, auth_token } => {
                (self.create_data(Some(user), Some(auth_token)), Some(user))
            }
            Credentials::AccessToken {
                access_token,
                service_provider,
            } => {
                let mut data = self.create_data(None, None);
                data.remove("userName");
                data.remove("authToken");
                data.set("accessToken", access_token);
                data.set(
                    "serviceProvider",
                    service_provider.unwrap_or(DEFAULT_SERVICE_PROVIDER),
                );
                (data, None)
            }
            Credentials::Header => (self.create_data(None, None), None),
        };
        let response = self.post("GetApplication", data).await;
        if let Some(exception) = response.exception() {
            return Err(ClientError::Protocol(exception.to_string()));
        }

        let payload = response
            .decode::<ObjectPayload>("application")?
            .ok_or_else(|| ClientError::Protocol("No application returned".to_string()))?;
        let application = self.construct_object(payload);
        check_clean(&application)?;

        {
            let mut state = self.state.write();
            state.user = response
                .user_name()
                .map(str::to_string)
                .or_else(|| requested_user.map(str::to_string));
            state.auth_token = response.auth_token().map(str::to_string);
            state.application = Some(Arc::clone(&application));
            state.messages = application_messages(&application);
        }
        self.set_action_definitions(application_actions(&application, &self.selection_rules));

        self.update_session(&response).await?;
        Ok(application)
    }

    /// Forget credentials and application state.
    pub async fn sign_out(&self) {
        {
            let mut state = self.state.write();
            state.user = None;
            state.auth_token = None;
            state.authorization_header = None;
            state.is_using_default_credentials = false;
            state.is_connected = false;
            state.application = None;
            state.session = None;
        }
        info!("Signed out");
        self.hooks.sign_out().await;
    }

    /// Load one object.
    #[instrument(skip(self, parent))]
    pub async fn get_object(
        &self,
        type_id: &str,
        object_id: Option<&str>,
        parent: Option<&Arc<BusinessObject>>,
        is_new: bool,
    ) -> Result<Arc<BusinessObject>, ClientError> {
        let _busy = self.busy();
        let result: Result<Arc<BusinessObject>, ClientError> = async {
            let mut data = self.create_data(None, None);
            data.set("persistentObjectTypeId", type_id);
            data.set_opt("objectId", object_id);
            if let Some(parent) = parent {
                data.set("parent", parent.to_service_object());
            }
            if is_new {
                data.set("isNew", true);
            }

            let response = self.post("GetPersistentObject", data).await;
            self.accept(&response).await?;
            let payload = response
                .decode::<ObjectPayload>("result")?
                .ok_or_else(|| ClientError::Protocol("No object returned".to_string()))?;
            let object = self.construct_object(payload);
            check_result(&object)?;
            Ok(object)
        }
        .await;
        self.report(result)
    }

    /// Load one query definition.
    #[instrument(skip(self))]
    pub async fn get_query(
        &self,
        id: &str,
        filter_name: Option<&str>,
    ) -> Result<Arc<Query>, ClientError> {
        let _busy = self.busy();
        let result: Result<Arc<Query>, ClientError> = async {
            let mut data = self.create_data(None, None);
            data.set("id", id);
            data.set_opt("filterName", filter_name);

            let response = self.post("GetQuery", data).await;
            self.accept(&response).await?;
            let payload = response
                .decode::<QueryPayload>("query")?
                .ok_or_else(|| ClientError::Protocol("No query returned".to_string()))?;
            Ok(self.construct_query(payload, Weak::new(), false, false))
        }
        .await;
        self.report(result)
    }

    /// Run `query` with its current paging, sorting and text search.
    pub async fn execute_query(
        &self,
        query: &Query,
        filter_name: Option<&str>,
    ) -> Result<Option<QueryResultPayload>, ClientError> {
        self.execute_query_payload(
            query.to_service_object(),
            query.parent().as_ref(),
            filter_name,
            query.as_lookup(),
        )
        .await
    }

    pub(crate) async fn execute_query_payload(
        &self,
        query: Value,
        parent: Option<&Arc<BusinessObject>>,
        filter_name: Option<&str>,
        as_lookup: bool,
    ) -> Result<Option<QueryResultPayload>, ClientError> {
        let _busy = self.busy();
        let result: Result<Option<QueryResultPayload>, ClientError> = async {
            let mut data = self.create_data(None, None);
            data.set("query", query);
            data.set_opt("parent", parent.map(|p| p.to_service_object()));
            data.set_opt("filterName", filter_name);
            data.set("asLookup", as_lookup);

            let response = self.post("ExecuteQuery", data).await;
            self.accept(&response).await?;
            Ok(response.decode::<QueryResultPayload>("result")?)
        }
        .await;
        self.report(result)
    }

    /// Download the stream an action result points at.
    pub async fn get_stream(&self, object: &BusinessObject) -> Result<StreamResponse, ClientError> {
        let _busy = self.busy();
        let mut data = self.create_data(None, None);
        data.set_opt("id", object.object_id());
        let result = self
            .transport
            .post_form("GetStream", data.to_value().to_string())
            .await
            .map_err(ClientError::from);
        self.report(result)
    }
}

enum Credentials<'a> {
    Password {
        user: &'a str,
        password: Option<&'a str>,
    },
    AuthToken {
        user: &'a str,
        auth_token: &'a str,
    },
    AccessToken {
        access_token: &'a str,
        service_provider: Option<&'a str>,
    },
    Header,
}

/// Error results fail the call.
fn check_result(object: &BusinessObject) -> Result<(), ClientError> {
    if object.full_type_name() == ERROR_TYPE {
        let message = object
            .notification()
            .map(|n| n.message)
            .unwrap_or_else(|| "Unknown server error".to_string());
        return Err(ClientError::Protocol(message));
    }
    Ok(())
}

/// Application and session objects must also come without any notification.
fn check_clean(object: &BusinessObject) -> Result<(), ClientError> {
    check_result(object)?;
    match object.notification() {
        Some(notification) => Err(ClientError::Protocol(notification.message)),
        None => Ok(()),
    }
}

fn application_messages(application: &BusinessObject) -> HashMap<String, String> {
    application
        .query("ClientMessages")
        .map(|query| {
            query
                .rows()
                .iter()
                .filter_map(|row| {
                    let key = row.raw_value("Key")?;
                    Some((key.to_string(), row.raw_value("Value").unwrap_or_default().to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn application_actions(
    application: &BusinessObject,
    rules: &SelectionRuleCache,
) -> Vec<ActionDefinition> {
    let mut definitions: Vec<ActionDefinition> = application
        .query("Actions")
        .map(|query| {
            query
                .rows()
                .iter()
                .filter_map(|row| {
                    let name = row.raw_value("Name")?.to_string();
                    Some(ActionDefinition {
                        display_name: row
                            .raw_value("DisplayName")
                            .unwrap_or(name.as_str())
                            .to_string(),
                        is_pinned: is_true(row.raw_value("IsPinned")),
                        refresh_query_on_completed: is_true(
                            row.raw_value("RefreshQueryOnCompleted"),
                        ),
                        offset: row
                            .raw_value("Offset")
                            .and_then(|o| o.trim().parse().ok())
                            .unwrap_or_default(),
                        options: row
                            .raw_value("Options")
                            .map(|o| {
                                o.split(';')
                                    .map(str::trim)
                                    .filter(|o| !o.is_empty())
                                    .map(str::to_string)
                                    .collect()
                            })
                            .unwrap_or_default(),
                        selection_rule: rules.get(row.raw_value("SelectionRule")),
                        name,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    // Bulk edit always works on exactly one selected row
    if let Some(bulk_edit) = definitions.iter_mut().find(|d| d.name == "BulkEdit") {
        bulk_edit.selection_rule = SelectionRule::parse("=1").unwrap_or_default();
    }
    definitions
}

fn is_true(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}
