//! Admission service client.
//!
//! # Responsibilities
//! - Issue the `GET /queues/{host}[/enable]` sub-request
//! - Forward the caller's cookies so the service can recognise it
//! - Hand back status, headers and, for 429 only, the buffered body
//!
//! # Design Decisions
//! - No timeout here; the server-wide request timeout bounds the call
//! - No retries; a failed call is a failed admission check

use std::future::Future;

use axum::{
    body::{Body, Bytes},
    http::{header, Method, Request, StatusCode, Uri},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::admission::error::GateError;
use crate::admission::types::{AdmissionQueryTarget, AdmissionResponse, InboundRequest};
use crate::http::request::X_REQUEST_ID;

const USER_AGENT: &str = concat!("admission-proxy/", env!("CARGO_PKG_VERSION"));

/// Transport used by the gate to reach the admission service.
pub trait AdmissionClient: Send + Sync {
    /// Perform the sub-request for `target` on behalf of `request`.
    fn fetch(
        &self,
        target: &AdmissionQueryTarget,
        request: &InboundRequest,
    ) -> impl Future<Output = Result<AdmissionResponse, GateError>> + Send;
}

/// Admission client over plain HTTP, routed to an internal address.
#[derive(Clone)]
pub struct HttpAdmissionClient {
    /// Base URL without trailing slash, e.g. `http://127.0.0.1:18080`.
    base: String,
    client: Client<HttpConnector, Body>,
    max_body_bytes: usize,
}

impl HttpAdmissionClient {
    pub fn new(service_url: &Url, max_body_bytes: usize) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            base: service_url.as_str().trim_end_matches('/').to_string(),
            client,
            max_body_bytes,
        }
    }

    /// Full URI of the query target on this service.
    pub fn uri_for(&self, target: &AdmissionQueryTarget) -> Result<Uri, GateError> {
        Ok(format!("{}{}", self.base, target).parse::<Uri>()?)
    }
}

impl AdmissionClient for HttpAdmissionClient {
    async fn fetch(
        &self,
        target: &AdmissionQueryTarget,
        request: &InboundRequest,
    ) -> Result<AdmissionResponse, GateError> {
        let uri = self.uri_for(target)?;

        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::USER_AGENT, USER_AGENT);
        for cookie in &request.cookies {
            builder = builder.header(header::COOKIE, cookie.clone());
        }
        if let Some(request_id) = &request.request_id {
            builder = builder.header(X_REQUEST_ID, request_id.as_str());
        }
        let sub_request = builder.body(Body::empty())?;

        let response = self.client.request(sub_request).await?;
        let (parts, body) = response.into_parts();
        // Only a throttle response carries a body the gate reads.
        let body = if parts.status == StatusCode::TOO_MANY_REQUESTS {
            axum::body::to_bytes(Body::new(body), self.max_body_bytes)
                .await
                .map_err(GateError::Body)?
        } else {
            Bytes::new()
        };

        Ok(AdmissionResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_uri_for_strips_trailing_slash() {
        let url = Url::parse("http://127.0.0.1:18080/").unwrap();
        let client = HttpAdmissionClient::new(&url, 1024);
        let target = AdmissionQueryTarget::new("shop.example.com", true).unwrap();
        let uri = client.uri_for(&target).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:18080/queues/shop.example.com/enable");
    }

    #[test]
    fn test_uri_for_keeps_base_path() {
        let url = Url::parse("http://waitingroom.internal/api").unwrap();
        let client = HttpAdmissionClient::new(&url, 1024);
        let target = AdmissionQueryTarget::new("example.com", false).unwrap();
        let uri = client.uri_for(&target).unwrap();
        assert_eq!(uri.path(), "/api/queues/example.com");
    }

    #[tokio::test]
    async fn test_fetch_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}", addr)).unwrap();
        let client = HttpAdmissionClient::new(&url, 1024);
        let target = AdmissionQueryTarget::new("example.com", false).unwrap();
        let err = client
            .fetch(&target, &InboundRequest::new("example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Unreachable(_)));
    }

    /// One-shot server answering `status` with `body`; yields the raw request head.
    async fn serve_once(status_line: &'static str, body: String) -> (Url, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut chunk = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            String::from_utf8_lossy(&head).to_lowercase()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn test_fetch_ignores_oversized_admit_body() {
        let (url, server) = serve_once("200 OK", "x".repeat(70 * 1024)).await;
        let client = HttpAdmissionClient::new(&url, 1024);
        let target = AdmissionQueryTarget::new("example.com", false).unwrap();
        let request = InboundRequest::new("example.com")
            .with_cookie(HeaderValue::from_static("waiting-room=ticket"))
            .with_request_id("req-42");

        let response = client.fetch(&target, &request).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.is_empty());

        let head = server.await.unwrap();
        assert!(head.starts_with("get /queues/example.com http/1.1"));
        assert!(head.contains("cookie: waiting-room=ticket"));
        assert!(head.contains("x-request-id: req-42"));
    }

    #[tokio::test]
    async fn test_fetch_caps_throttle_body() {
        let (url, _server) = serve_once("429 Too Many Requests", "x".repeat(4096)).await;
        let client = HttpAdmissionClient::new(&url, 1024);
        let target = AdmissionQueryTarget::new("example.com", false).unwrap();

        let err = client
            .fetch(&target, &InboundRequest::new("example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Body(_)));
    }
}
