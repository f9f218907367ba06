//! # HTTP JSON-RPC Server
//!
//! Serves a [`turul_rpc_service::RpcService`] over HTTP/1.1 with hyper.
//! POST bodies, GET `json=` requests and JSONP all arrive on one endpoint
//! path; everything else answers 404.
//!
//! ## Features
//! - CORS headers and preflight handling for browser clients
//! - Request body size limit
//! - Transport-level failures kept apart from in-band JSON-RPC errors

pub mod cors;
pub mod handler;
pub mod server;

// Re-export main types
pub use cors::CorsLayer;
pub use handler::RpcHttpHandler;
pub use server::{HttpRpcServer, HttpRpcServerBuilder, ServerConfig};

// Re-export foundational types
pub use turul_rpc_service::{RpcService, RpcServiceBuilder};

/// Result type for HTTP JSON-RPC operations
pub type Result<T> = std::result::Result<T, HttpRpcError>;

/// HTTP JSON-RPC server errors
#[derive(Debug, thiserror::Error)]
pub enum HttpRpcError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
