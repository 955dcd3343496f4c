//! Application hooks
//!
//! Extension points the client calls while talking to the server. Every method has a default,
//! so an application only overrides what it needs.

use super::execute::ExecuteActionArgs;
use crate::error::ClientError;
use crate::object::BusinessObject;
use crate::payload::Response;
use crate::query::Query;
use crate::transport::RequestData;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

#[async_trait]
pub trait Hooks: Send + Sync {
    /// Device identifier for signed requests; overrides the configured one.
    fn unique_id(&self) -> Option<String> {
        None
    }

    /// Signed timestamp sent along with `uniqueId`.
    fn signed_timestamp(&self) -> Option<String> {
        None
    }

    /// Last chance to edit a request body before it is posted.
    fn on_create_data(&self, _data: &mut RequestData) {}

    /// Called for every response, including transport failures.
    fn on_response(&self, _method: &str, _response: &Response) {}

    fn on_construct_object(&self, _object: &Arc<BusinessObject>) {}

    fn on_construct_query(&self, _query: &Arc<Query>) {}

    /// Intercept an action before it is sent. Set `args.handled` to skip the server call.
    async fn on_action(&self, _args: &mut ExecuteActionArgs<'_>) -> Result<(), ClientError> {
        Ok(())
    }

    /// Pick an option for a retry prompt. Returns the option index, or -1 to cancel.
    async fn on_retry_action(
        &self,
        _title: Option<&str>,
        _message: Option<&str>,
        _options: &[String],
        _object: Option<&Arc<BusinessObject>>,
    ) -> i64 {
        -1
    }

    /// An action produced an object that should be shown on its own.
    fn on_open(&self, _object: Arc<BusinessObject>) {}

    /// An action produced a downloadable stream.
    fn on_stream(&self, _file_name: Option<&str>, _content: &[u8]) {}

    fn on_session_updated(&self, _session: Option<&Arc<BusinessObject>>) {}

    async fn on_initialized(&self) {}

    async fn sign_out(&self) {}

    fn on_exception(&self, error: &ClientError) {
        error!(error = %error, "Client error");
    }
}

/// Hooks with every default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl Hooks for DefaultHooks {}

/// Response inspection helper used by hook implementations in tests and the CLI.
pub fn describe_response(method: &str, response: &Response) -> String {
    match response.exception() {
        Some(exception) => format!("{} failed: {}", method, exception),
        None => format!("{} ok", method),
    }
}
