//! Hyper-backed transport for real network calls

use std::time::Duration;

use futures_util::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use crate::cassette::{Body, Request, Response};
use crate::transport::{Reply, Transport};
use crate::{OverdubError, Result};

/// Transport that performs requests with a pooled hyper client.
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HyperTransport {
    /// Create a new transport
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build_http();

        Self { client }
    }

    async fn perform_inner(&self, request: &Request) -> Result<Reply> {
        let http_request = build_http_request(request)?;
        debug!("Performing {} {}", request.method, request.url);

        let response = self.client.request(http_request).await.map_err(|e| {
            warn!("Request failed: {e}");
            OverdubError::Transport(format!("Request failed: {e}"))
        })?;

        let status = response.status().as_u16();
        let mut head = Response::new(status, request.url.clone());
        for (name, value) in response.headers() {
            head.headers.insert(
                name.to_string(),
                value.to_str().unwrap_or("<invalid>").to_string(),
            );
        }

        let body_bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| OverdubError::Transport(format!("Failed to read response body: {e}")))?
            .to_bytes();

        let body = if body_bytes.is_empty() {
            None
        } else {
            Some(body_bytes)
        };

        Ok(Reply::ok(head, body))
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HyperTransport {
    fn perform<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Reply>> {
        Box::pin(self.perform_inner(request))
    }
}

/// Build a hyper request from a recordable one
fn build_http_request(request: &Request) -> Result<hyper::Request<Full<Bytes>>> {
    let method = request.method.parse::<Method>().map_err(|e| {
        OverdubError::Transport(format!("Invalid HTTP method '{}': {e}", request.method))
    })?;

    let uri = request
        .url
        .parse::<Uri>()
        .map_err(|e| OverdubError::Transport(format!("Invalid URL '{}': {e}", request.url)))?;

    let mut builder = hyper::Request::builder().method(method).uri(uri);
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }

    let body = request.body.as_ref().map(Body::as_bytes).unwrap_or_default();
    builder
        .body(Full::new(body))
        .map_err(|e| OverdubError::Transport(format!("Failed to build request: {e}")))
}
