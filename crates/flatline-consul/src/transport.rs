//! HTTP transport backed by the hyper legacy client.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, USER_AGENT};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use tracing::trace;
use url::Url;

use crate::client::{ConsulRequest, ConsulResponse, Transport};
use crate::error::{ConsulError, ConsulResult};
use crate::types::{CONSUL_INDEX_HEADER, Cursor};

/// Plain-HTTP transport to a Consul agent.
///
/// Every exchange (connect, headers, body) is bounded by `timeout`, which
/// must be longer than any blocking-query wait so a hung agent surfaces as
/// `ConsulError::Timeout` rather than stalling the caller.
pub struct HyperTransport {
    base: Url,
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HyperTransport {
    pub fn new(base_url: &str, timeout: Duration) -> ConsulResult<Self> {
        let mut base =
            Url::parse(base_url).map_err(|e| ConsulError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.scheme() != "http" {
            return Err(ConsulError::InvalidUrl(format!(
                "{base_url}: only http:// agents are supported"
            )));
        }
        // Url::join drops the last segment unless the base ends with a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder(TokioExecutor::new()).build_http();
        Ok(Self {
            base,
            client,
            timeout,
        })
    }

    /// Resolve a request path and its query parameters against the base URL.
    pub fn url_for(&self, request: &ConsulRequest) -> ConsulResult<Url> {
        let mut url = self
            .base
            .join(&request.path)
            .map_err(|e| ConsulError::InvalidUrl(format!("{}: {e}", request.path)))?;
        if !request.params.is_empty() {
            url.query_pairs_mut().extend_pairs(
                request
                    .params
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            );
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: &ConsulRequest) -> ConsulResult<ConsulResponse> {
        let url = self.url_for(request)?;
        let uri: http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: http::uri::InvalidUri| ConsulError::InvalidUrl(e.to_string()))?;

        let body = match &request.body {
            Some(value) => Bytes::from(serde_json::to_vec(value)?),
            None => Bytes::new(),
        };

        let mut builder = http::Request::builder()
            .method(request.method.clone())
            .uri(uri)
            .header(USER_AGENT, concat!("flatline/", env!("CARGO_PKG_VERSION")));
        if request.body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        let req = builder
            .body(Full::new(body))
            .map_err(|e| ConsulError::Http(e.to_string()))?;

        let exchange = async {
            let resp = self
                .client
                .request(req)
                .await
                .map_err(|e| ConsulError::Http(e.to_string()))?;
            let status = resp.status();
            let index = resp
                .headers()
                .get(CONSUL_INDEX_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(Cursor::from);
            let bytes = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| ConsulError::Http(e.to_string()))?
                .to_bytes();
            Ok::<_, ConsulError>((status, index, bytes))
        };

        let (status, index, bytes) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ConsulError::Timeout(self.timeout))??;

        trace!(%url, status = status.as_u16(), len = bytes.len(), "consul exchange complete");

        if !status.is_success() {
            return Err(ConsulError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).trim().to_string(),
            });
        }

        Ok(ConsulResponse {
            body: decode_body(&bytes)?,
            index,
        })
    }
}

fn decode_body(bytes: &[u8]) -> ConsulResult<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}
