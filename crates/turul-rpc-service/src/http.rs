//! Framework-agnostic HTTP boundary
//!
//! The service never sees a hosting framework's request type. Adapters build
//! an [`RpcHttpRequest`] and turn the returned [`RpcHttpResponse`] into their
//! own response type.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use std::net::SocketAddr;

/// An incoming HTTP call as the service sees it
#[derive(Debug, Clone)]
pub struct RpcHttpRequest {
    pub method: Method,
    /// Raw query string without the leading `?`
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
}

impl RpcHttpRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
        }
    }

    /// A POST carrying `body` as the JSON-RPC request object
    pub fn post(body: impl Into<Bytes>) -> Self {
        Self::new(Method::POST).with_body(body)
    }

    /// A GET with the given raw query string
    pub fn get(query: impl Into<String>) -> Self {
        Self::new(Method::GET).with_query(query)
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: &'static str, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// First value of a query parameter, percent- and `+`-decoded
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl From<http::Request<Bytes>> for RpcHttpRequest {
    fn from(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
            remote_addr: None,
        }
    }
}

/// The serialized reply to one call
#[derive(Debug, Clone, PartialEq)]
pub struct RpcHttpResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
}

impl RpcHttpResponse {
    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or_default()
    }

    pub fn into_http(self) -> Result<http::Response<Bytes>, http::Error> {
        http::Response::builder()
            .status(self.status)
            .header(CONTENT_TYPE, self.content_type)
            .body(self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_decoding() {
        let request = RpcHttpRequest::get(
            "json=%7B%22jsonrpc%22%3A+%222.0%22%7D&jsoncallback=cb&empty=",
        );
        assert_eq!(
            request.query_param("json").as_deref(),
            Some(r#"{"jsonrpc": "2.0"}"#)
        );
        assert_eq!(request.query_param("jsoncallback").as_deref(), Some("cb"));
        assert_eq!(request.query_param("empty").as_deref(), Some(""));
        assert_eq!(request.query_param("missing"), None);
    }

    #[test]
    fn test_from_http_request() {
        let request = http::Request::builder()
            .method(Method::GET)
            .uri("/rpc?json=%7B%7D")
            .body(Bytes::new())
            .unwrap();
        let rpc: RpcHttpRequest = request.into();
        assert_eq!(rpc.method, Method::GET);
        assert_eq!(rpc.query_param("json").as_deref(), Some("{}"));
    }

    #[test]
    fn test_into_http_response() {
        let response = RpcHttpResponse {
            status: StatusCode::OK,
            content_type: "application/json".to_string(),
            body: Bytes::from_static(b"{}"),
        };
        let http = response.into_http().unwrap();
        assert_eq!(http.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(http.body().as_ref(), b"{}");
    }
}
