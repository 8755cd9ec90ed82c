//! The registry gateway: one request shape, one retry policy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ConsulResult;
use crate::types::Cursor;

/// A request against the Consul HTTP API.
///
/// `path` is relative to the configured base URL (e.g. `v1/kv/flatline`).
#[derive(Debug, Clone, PartialEq)]
pub struct ConsulRequest {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ConsulRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a query parameter by name.
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A decoded Consul response.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsulResponse {
    /// Decoded JSON body; `Null` for an empty body.
    pub body: Value,
    /// The `X-Consul-Index` header, if Consul sent one.
    pub index: Option<Cursor>,
}

impl ConsulResponse {
    pub fn new(body: Value) -> Self {
        Self { body, index: None }
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(Cursor::new(index));
        self
    }
}

/// Sends a single request. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: &ConsulRequest) -> ConsulResult<ConsulResponse>;
}

/// Consul client.
///
/// Cheap to clone; clones share the underlying transport.
pub struct Consul<T> {
    transport: Arc<T>,
    retry_backoff: Duration,
}

impl<T> Clone for Consul<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            retry_backoff: self.retry_backoff,
        }
    }
}

impl<T: Transport> Consul<T> {
    /// Create a gateway over `transport` with a 10s retry backoff.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            retry_backoff: Duration::from_secs(10),
        }
    }

    /// Set the sleep between attempts of a retrying call.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Issue a request.
    ///
    /// With `retry == false` the first failure is returned. With
    /// `retry == true` failures are logged and the identical request is
    /// re-sent after the backoff, indefinitely.
    pub async fn call(&self, request: ConsulRequest, retry: bool) -> ConsulResult<ConsulResponse> {
        loop {
            debug!(method = %request.method, path = %request.path, params = ?request.params, "consul request");
            match self.transport.send(&request).await {
                Ok(response) => {
                    debug!(
                        path = %request.path,
                        index = response.index.as_ref().map(Cursor::as_str),
                        "consul response"
                    );
                    return Ok(response);
                }
                Err(e) if retry => {
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        error = %e,
                        backoff = ?self.retry_backoff,
                        "consul request failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn get(&self, path: &str, retry: bool) -> ConsulResult<ConsulResponse> {
        self.call(ConsulRequest::get(path), retry).await
    }

    pub async fn put(&self, path: &str, body: Option<Value>, retry: bool) -> ConsulResult<ConsulResponse> {
        let mut request = ConsulRequest::put(path);
        request.body = body;
        self.call(request, retry).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>, retry: bool) -> ConsulResult<ConsulResponse> {
        let mut request = ConsulRequest::post(path);
        request.body = body;
        self.call(request, retry).await
    }

    pub async fn delete(&self, path: &str, retry: bool) -> ConsulResult<ConsulResponse> {
        self.call(ConsulRequest::delete(path), retry).await
    }
}
