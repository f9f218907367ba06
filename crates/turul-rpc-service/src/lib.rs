//! # Signature-driven JSON-RPC 2.0 services
//!
//! Methods are registered with a textual declaration such as
//! `get_sum(foo=<num>, bar=<num>?) -> <num>`. The declaration is parsed once
//! and drives parameter binding, type checking and the `system.describe`
//! introspection method.
//!
//! This crate is transport-agnostic: it consumes an [`RpcHttpRequest`] and
//! produces an [`RpcHttpResponse`]. See `turul-http-rpc-server` for a hyper
//! server around it.
//!
//! ## Features
//! - POST bodies, GET requests with a `json` query parameter, and JSONP
//! - Positional or named params, optional params with registered defaults
//! - Every failure mapped onto a JSON-RPC error object, handler panics included
//! - Optional per-request debug traces
//!
//! ```rust,no_run
//! use serde_json::json;
//! use turul_rpc_service::prelude::*;
//!
//! # async fn run() -> Result<(), RegistryError> {
//! let service = RpcService::builder()
//!     .method(
//!         "get_sum(foo=<num>, bar=<num>?) -> <num>",
//!         FnHandler::new(|_, params| {
//!             let foo: f64 = params.get("foo")?;
//!             let bar: f64 = params.get_opt("bar")?.unwrap_or(2.0);
//!             Ok(json!(foo + bar))
//!         }),
//!     )?
//!     .build()?;
//!
//! let reply = service
//!     .handle(&RpcHttpRequest::post(
//!         r#"{"jsonrpc":"2.0","method":"get_sum","params":{"foo":3},"id":1}"#,
//!     ))
//!     .await;
//! assert_eq!(reply.body_str(), r#"{"jsonrpc":"2.0","result":5.0,"id":1}"#);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod debug;
pub mod describe;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod http;
pub mod json_type;
pub mod normalize;
pub mod prelude;
pub mod registry;
pub mod request;
pub mod response;
pub mod service;
pub mod signature;
pub mod types;

// Re-export main types
pub use config::{ServiceConfig, ServiceInfo};
pub use debug::{DebugTrace, TraceRecorder};
pub use describe::{ServiceDescription, describe};
pub use dispatch::{Dispatcher, bind_params};
pub use error::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, MalformedRequest, RegistryError,
    SignatureError,
};
pub use handler::{AsyncFnHandler, CallContext, FnHandler, HandlerResult, Params, RpcHandler};
pub use http::{RpcHttpRequest, RpcHttpResponse};
pub use json_type::JsonType;
pub use normalize::normalize;
pub use registry::{MethodOptions, Registry, RegistryEntry};
pub use request::{CanonicalRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse, ResponseBuilder};
pub use service::{RequestValidator, RpcService, RpcServiceBuilder};
pub use signature::{MethodSignature, ParamSpec};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
