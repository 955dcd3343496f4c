//! Action execution
//!
//! `ExecuteAction` runs through the application hooks, then the per-type handlers, then the
//! server. A server answer may be a retry prompt instead of a result; the client keeps asking
//! the hooks for an option and re-posting until a terminal answer arrives.

use super::{Client, Parameters};
use crate::error::ClientError;
use crate::notification::NotificationType;
use crate::object::BusinessObject;
use crate::payload::ObjectPayload;
use crate::query::{Query, Row};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Action about to be executed, as seen by the hooks.
pub struct ExecuteActionArgs<'a> {
    client: &'a Client,
    full_action: String,
    /// Action name without its `PersistentObject.` / `Query.` prefix
    pub action: String,
    pub parameters: Option<Parameters>,
    pub persistent_object: Option<Arc<BusinessObject>>,
    pub query: Option<Arc<Query>>,
    pub selected_rows: Vec<Arc<Row>>,
    pub handled: bool,
    pub result: Option<Arc<BusinessObject>>,
}

impl<'a> ExecuteActionArgs<'a> {
    fn new(
        client: &'a Client,
        full_action: &str,
        parameters: Option<Parameters>,
        persistent_object: Option<Arc<BusinessObject>>,
        query: Option<Arc<Query>>,
        selected_rows: Vec<Arc<Row>>,
    ) -> Self {
        let action = full_action
            .split_once('.')
            .map(|(_, name)| name)
            .unwrap_or(full_action)
            .to_string();
        Self {
            client,
            full_action: full_action.to_string(),
            action,
            parameters,
            persistent_object,
            query,
            selected_rows,
            handled: false,
            result: None,
        }
    }

    pub fn full_action(&self) -> &str {
        &self.full_action
    }

    /// Send the action to the server without running the hooks again.
    pub async fn execute_service_request(
        &mut self,
    ) -> Result<Option<Arc<BusinessObject>>, ClientError> {
        let result = self
            .client
            .execute_action_with(
                &self.full_action,
                self.persistent_object.as_ref(),
                self.query.as_ref(),
                &self.selected_rows,
                self.parameters.clone(),
                true,
            )
            .await?;
        self.result = result.clone();
        Ok(result)
    }
}

impl Client {
    /// Execute `action` on `parent` or `query`.
    ///
    /// Names starting with `PersistentObject.`, or calls without a query, are object actions and
    /// need a parent. Server errors end up as a notification on the target and yield `Ok(None)`.
    pub async fn execute_action(
        &self,
        action: &str,
        parent: Option<&Arc<BusinessObject>>,
        query: Option<&Arc<Query>>,
        selected_rows: &[Arc<Row>],
        parameters: Option<Parameters>,
    ) -> Result<Option<Arc<BusinessObject>>, ClientError> {
        self.execute_action_with(action, parent, query, selected_rows, parameters, false)
            .await
    }

    pub(crate) async fn execute_action_with(
        &self,
        action: &str,
        parent: Option<&Arc<BusinessObject>>,
        query: Option<&Arc<Query>>,
        selected_rows: &[Arc<Row>],
        parameters: Option<Parameters>,
        skip_hooks: bool,
    ) -> Result<Option<Arc<BusinessObject>>, ClientError> {
        if action.trim().is_empty() {
            return Err(ClientError::InvalidArgument(
                "action name is required".to_string(),
            ));
        }
        let target = match (query, parent) {
            (Some(query), _) if !action.starts_with("PersistentObject.") => Target::Query(query),
            (_, Some(parent)) => Target::Object(parent),
            (_, None) => {
                return Err(ClientError::InvalidArgument(format!(
                    "{} requires a parent object",
                    action
                )))
            }
        };

        let _busy = self.busy();
        match self
            .run_action(action, target, parent, query, selected_rows, parameters, skip_hooks)
            .await
        {
            Ok(result) => Ok(result),
            Err(e) => {
                self.hooks.on_exception(&e);
                target.notify(Some(&e.to_string()), NotificationType::Error);
                Ok(None)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_action(
        &self,
        action: &str,
        target: Target<'_>,
        parent: Option<&Arc<BusinessObject>>,
        query: Option<&Arc<Query>>,
        selected_rows: &[Arc<Row>],
        mut parameters: Option<Parameters>,
        skip_hooks: bool,
    ) -> Result<Option<Arc<BusinessObject>>, ClientError> {
        if !skip_hooks {
            target.notify(None, NotificationType::Error);

            let mut args = ExecuteActionArgs::new(
                self,
                action,
                parameters,
                parent.cloned(),
                query.cloned(),
                selected_rows.to_vec(),
            );
            self.hooks.on_action(&mut args).await?;
            if args.handled {
                debug!(action, "Handled by application hooks");
                return Ok(args.result);
            }

            let full_type_name = target.full_type_name();
            self.client_actions
                .get(&full_type_name)
                .on_action(&mut args)
                .await?;
            if args.handled {
                debug!(action, type_name = %full_type_name, "Handled by client actions");
                return Ok(args.result);
            }
            parameters = args.parameters;
        }

        let mut data = self.create_data(None, None);
        data.set("action", action);
        data.set_opt("query", query.map(|q| q.to_service_object()));
        data.set_opt("parent", parent.map(|p| p.to_service_object()));
        data.set_opt(
            "selectedItems",
            (!selected_rows.is_empty()).then(|| {
                Value::Array(selected_rows.iter().map(|r| r.to_service_object()).collect())
            }),
        );
        data.set_opt("parameters", parameters.map(Value::Object));

        let response = loop {
            let response = self.post("ExecuteAction", data.clone()).await;
            let Some(retry) = response.retry()? else {
                break response;
            };

            let candidate = retry
                .persistent_object
                .clone()
                .map(|payload| self.construct_object(payload));
            let choice = self
                .hooks
                .on_retry_action(
                    retry.title.as_deref(),
                    retry.message.as_deref(),
                    &retry.options,
                    candidate.as_ref(),
                )
                .await;
            let label = usize::try_from(choice)
                .ok()
                .and_then(|i| retry.options.get(i))
                .cloned();
            info!(action, option = choice, label = ?label, "Retrying action with chosen option");

            data.update_parameters(|p| {
                p.insert("RetryActionOption".to_string(), Value::from(choice));
                p.insert(
                    "RetryActionOptionLabel".to_string(),
                    label.map(Value::String).unwrap_or(Value::Null),
                );
            });
            if let Some(candidate) = candidate {
                data.set("retryPersistentObject", candidate.to_service_object());
            }
        };

        if let Some(exception) = response.exception() {
            warn!(action, exception, "Action failed");
            target.notify(Some(exception), NotificationType::Error);
            return Ok(None);
        }

        self.set_auth_token(response.auth_token().map(str::to_string));
        self.update_session(&response).await?;

        Ok(response
            .decode::<ObjectPayload>("result")?
            .map(|payload| self.construct_object(payload)))
    }
}

#[derive(Clone, Copy)]
enum Target<'a> {
    Object(&'a Arc<BusinessObject>),
    Query(&'a Arc<Query>),
}

impl Target<'_> {
    fn notify(&self, message: Option<&str>, kind: NotificationType) {
        match self {
            Target::Object(object) => object.set_notification(message, kind),
            Target::Query(query) => query.set_notification(message, kind),
        }
    }

    fn full_type_name(&self) -> String {
        match self {
            Target::Object(object) => object.full_type_name().to_string(),
            Target::Query(query) => query
                .persistent_object()
                .map(|po| po.full_type_name().to_string())
                .unwrap_or_default(),
        }
    }
}
