//! Scripted transport for tests.
//!
//! Responses are queued per endpoint and consumed in order. A response can be gated: the request
//! parks until the test releases it, which makes out-of-order completion reproducible.

use super::{StreamResponse, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::oneshot;

/// One request seen by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub body: Value,
    pub authorization: Option<String>,
}

enum Scripted {
    Json(Value),
    Failure(TransportError),
    Delayed(Duration, Value),
    Gated(oneshot::Receiver<Value>),
}

/// Transport answering from per-endpoint queues.
#[derive(Default)]
pub struct ScriptedTransport {
    queues: Mutex<HashMap<String, VecDeque<Scripted>>>,
    fallbacks: Mutex<HashMap<String, Value>>,
    streams: Mutex<VecDeque<Result<StreamResponse, TransportError>>>,
    texts: Mutex<VecDeque<Result<String, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn enqueue(&self, method: &str, scripted: Scripted) {
        self.queues
            .lock()
            .entry(method.to_string())
            .or_default()
            .push_back(scripted);
    }

    /// Queue a JSON answer for `method`.
    pub fn push_json(&self, method: &str, response: Value) {
        self.enqueue(method, Scripted::Json(response));
    }

    /// Queue a transport failure for `method`.
    pub fn push_failure(&self, method: &str, error: TransportError) {
        self.enqueue(method, Scripted::Failure(error));
    }

    /// Queue an answer that is delivered after `delay`.
    pub fn push_delayed(&self, method: &str, delay: Duration, response: Value) {
        self.enqueue(method, Scripted::Delayed(delay, response));
    }

    /// Queue an answer that is delivered when the returned sender fires.
    pub fn push_gated(&self, method: &str) -> oneshot::Sender<Value> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(method, Scripted::Gated(rx));
        tx
    }

    /// Answer used for `method` whenever its queue is empty.
    pub fn set_fallback(&self, method: &str, response: Value) {
        self.fallbacks.lock().insert(method.to_string(), response);
    }

    pub fn push_stream(&self, response: Result<StreamResponse, TransportError>) {
        self.streams.lock().push_back(response);
    }

    pub fn push_text(&self, response: Result<String, TransportError>) {
        self.texts.lock().push_back(response);
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_for(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    pub fn request_count(&self, method: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.method == method).count()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    fn record(&self, method: &str, body: Value, authorization: Option<&str>) {
        self.requests.lock().push(RecordedRequest {
            method: method.to_string(),
            body,
            authorization: authorization.map(str::to_string),
        });
    }

    fn next(&self, method: &str) -> Option<Scripted> {
        let scripted = self
            .queues
            .lock()
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        scripted.or_else(|| self.fallbacks.lock().get(method).cloned().map(Scripted::Json))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_json(
        &self,
        method: &str,
        body: &Value,
        authorization: Option<&str>,
    ) -> Result<Value, TransportError> {
        self.record(method, body.clone(), authorization);

        match self.next(method) {
            Some(Scripted::Json(value)) => Ok(value),
            Some(Scripted::Failure(error)) => Err(error),
            Some(Scripted::Delayed(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(Scripted::Gated(gate)) => gate
                .await
                .map_err(|_| TransportError::Connect("gate dropped".to_string())),
            None => Err(TransportError::Http(format!(
                "no scripted response for {}",
                method
            ))),
        }
    }

    async fn post_form(&self, method: &str, data: String) -> Result<StreamResponse, TransportError> {
        let body = serde_json::from_str(&data).unwrap_or(Value::String(data));
        self.record(method, body, None);

        self.streams.lock().pop_front().unwrap_or_else(|| {
            Err(TransportError::Http(format!(
                "no scripted stream for {}",
                method
            )))
        })
    }

    async fn get_text(&self, path: &str) -> Result<String, TransportError> {
        self.record(path, Value::Null, None);

        self.texts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Http(format!("no scripted text for {}", path))))
    }
}
