//! HTTP request handler for JSON-RPC services

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http_body::Body;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::{Method, Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, warn};

use turul_rpc_service::{RpcHttpRequest, RpcService};

use crate::{CorsLayer, ServerConfig};

/// Routes requests on the configured path to an [`RpcService`]
#[derive(Debug, Clone)]
pub struct RpcHttpHandler {
    pub(crate) config: Arc<ServerConfig>,
    pub(crate) service: RpcService,
}

impl RpcHttpHandler {
    pub fn new(config: ServerConfig, service: RpcService) -> Self {
        Self {
            config: Arc::new(config),
            service,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle one HTTP request. Never fails: transport problems become plain
    /// HTTP error responses, JSON-RPC problems become JSON-RPC replies.
    pub async fn handle<B>(
        &self,
        req: Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        debug!("Handling {} {}", req.method(), req.uri().path());

        let mut response = if req.uri().path() != self.config.rpc_path {
            plain_response(StatusCode::NOT_FOUND, "Not Found")
        } else if *req.method() == Method::OPTIONS {
            self.handle_preflight()
        } else {
            self.handle_rpc_request(req, remote_addr).await
        };

        if self.config.enable_cors {
            CorsLayer::apply_cors_headers(response.headers_mut());
        }
        response
    }

    async fn handle_rpc_request<B>(
        &self,
        req: Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();

        let body_bytes = match Limited::new(body, self.config.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                warn!(
                    "Request body exceeds the {} byte limit",
                    self.config.max_body_size
                );
                return plain_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
            }
            Err(err) => {
                error!("Failed to read request body: {}", err);
                return plain_response(StatusCode::BAD_REQUEST, "Failed to read request body");
            }
        };

        let mut rpc_request = RpcHttpRequest::from(Request::from_parts(parts, body_bytes));
        if let Some(addr) = remote_addr {
            rpc_request = rpc_request.with_remote_addr(addr);
        }

        let reply = self.service.handle(&rpc_request).await;
        debug!("Sending JSON-RPC reply: status={}", reply.status);

        match reply.into_http() {
            Ok(response) => response.map(Full::new),
            Err(err) => {
                error!("Failed to build HTTP response: {}", err);
                plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }

    fn handle_preflight(&self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::NO_CONTENT;
        response
    }
}

fn plain_response(status: StatusCode, text: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(text.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
