//! HTTP JSON-RPC server
//!
//! One hyper HTTP/1.1 connection task per client. The service and its
//! registry are shared read-only across all of them.

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use turul_rpc_service::RpcService;

use crate::{HttpRpcError, Result, RpcHttpHandler};

/// Configuration for the HTTP JSON-RPC server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Path for the JSON-RPC endpoint
    pub rpc_path: String,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 8000)),
            rpc_path: "/rpc".to_string(),
            enable_cors: true,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Builder for the HTTP JSON-RPC server
pub struct HttpRpcServerBuilder {
    config: ServerConfig,
    service: RpcService,
}

impl HttpRpcServerBuilder {
    pub fn new(service: RpcService) -> Self {
        Self {
            config: ServerConfig::default(),
            service,
        }
    }

    /// Set the bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    /// Set the JSON-RPC endpoint path
    pub fn rpc_path(mut self, path: impl Into<String>) -> Self {
        self.config.rpc_path = path.into();
        self
    }

    /// Enable or disable CORS
    pub fn cors(mut self, enable: bool) -> Self {
        self.config.enable_cors = enable;
        self
    }

    /// Set maximum request body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<HttpRpcServer> {
        if !self.config.rpc_path.starts_with('/') {
            return Err(HttpRpcError::InvalidConfig(format!(
                "endpoint path must start with '/': {}",
                self.config.rpc_path
            )));
        }
        if self.config.max_body_size == 0 {
            return Err(HttpRpcError::InvalidConfig(
                "max_body_size must be greater than zero".to_string(),
            ));
        }
        Ok(HttpRpcServer {
            handler: RpcHttpHandler::new(self.config, self.service),
        })
    }
}

/// HTTP server around one [`RpcService`]
#[derive(Debug, Clone)]
pub struct HttpRpcServer {
    handler: RpcHttpHandler,
}

impl HttpRpcServer {
    pub fn builder(service: RpcService) -> HttpRpcServerBuilder {
        HttpRpcServerBuilder::new(service)
    }

    pub fn config(&self) -> &ServerConfig {
        self.handler.config()
    }

    pub fn handler(&self) -> &RpcHttpHandler {
        &self.handler
    }

    /// Bind the configured address and serve until an accept error
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config().bind_address).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("HTTP JSON-RPC server listening on {}", local_addr);
        info!("JSON-RPC endpoint available at: {}", self.config().rpc_path);
        info!(
            "Methods: {}",
            self.handler.service.registry().method_names().join(", ")
        );

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!("New connection from {}", peer_addr);

            let handler = self.handler.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler.handle(req, Some(peer_addr)).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    // Client disconnects are routine
                    if err.is_incomplete_message() {
                        debug!("Client disconnected: {}", err);
                    } else {
                        error!("Error serving connection: {}", err);
                    }
                }
            });
        }
    }
}
