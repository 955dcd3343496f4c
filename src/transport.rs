//! Transport Layer
//!
//! Raw request/response exchange with the application server. The [`Transport`] trait keeps the
//! session logic independent of the HTTP stack; [`HttpTransport`] is the reqwest-backed
//! implementation and [`mock::ScriptedTransport`] a scripted one for tests.

use crate::config::ServiceConfig;
use crate::error::{ClientError, TransportError};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub mod disposition;
pub mod envelope;
pub mod messages;
pub mod mock;

pub use envelope::RequestData;
pub use messages::{no_internet_message, NoInternetMessage};

/// Downloaded stream content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamResponse {
    pub file_name: Option<String>,
    pub content: Vec<u8>,
}

/// Request/response exchange with the application server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON body to `method` and decode the JSON answer.
    async fn post_json(
        &self,
        method: &str,
        body: &Value,
        authorization: Option<&str>,
    ) -> Result<Value, TransportError>;

    /// POST a multipart form with a single `data` field and return the raw stream.
    async fn post_form(&self, method: &str, data: String) -> Result<StreamResponse, TransportError>;

    /// GET `path` (relative to the service URI, query string included) as text.
    async fn get_text(&self, path: &str) -> Result<String, TransportError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: HttpClient,
    service: ServiceConfig,
}

impl HttpTransport {
    pub fn new(service: ServiceConfig) -> Result<Self, ClientError> {
        let client = HttpClient::builder()
            .connect_timeout(service.connect_timeout())
            .timeout(service.request_timeout())
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, service })
    }

    fn map_error(&self, error: reqwest::Error) -> TransportError {
        map_http_error(error, self.service.request_timeout())
    }
}

fn map_http_error(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else if let Some(status) = error.status() {
        TransportError::Status(status.as_u16())
    } else if error.is_decode() {
        TransportError::Malformed(error.to_string())
    } else {
        TransportError::Http(error.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        method: &str,
        body: &Value,
        authorization: Option<&str>,
    ) -> Result<Value, TransportError> {
        let url = self.service.endpoint(method);
        debug!(method, url = %url, "Posting request");

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        let response = request.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let text = response.text().await.map_err(|e| self.map_error(e))?;
        if text.trim().is_empty() {
            return Err(TransportError::EmptyBody);
        }

        serde_json::from_str(&text).map_err(|e| TransportError::Malformed(e.to_string()))
    }

    async fn post_form(&self, method: &str, data: String) -> Result<StreamResponse, TransportError> {
        let url = self.service.endpoint(method);
        debug!(method, url = %url, "Posting form");

        let form = reqwest::multipart::Form::new().text("data", data);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition::file_name);
        let content = response.bytes().await.map_err(|e| self.map_error(e))?;

        Ok(StreamResponse {
            file_name,
            content: content.to_vec(),
        })
    }

    async fn get_text(&self, path: &str) -> Result<String, TransportError> {
        let url = self.service.endpoint(path);
        debug!(url = %url, "Fetching");

        let response = self.client.get(&url).send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        response.text().await.map_err(|e| self.map_error(e))
    }
}
