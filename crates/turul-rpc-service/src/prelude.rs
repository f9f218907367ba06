//! # JSON-RPC Service Prelude
//!
//! ```rust
//! use turul_rpc_service::prelude::*;
//! ```

// Defining a service
pub use crate::handler::{AsyncFnHandler, CallContext, FnHandler, HandlerResult, Params, RpcHandler};
pub use crate::registry::MethodOptions;
pub use crate::service::{RequestValidator, RpcService, RpcServiceBuilder};

// Wire types
pub use crate::error::{JsonRpcErrorCode, JsonRpcErrorObject, RegistryError};
pub use crate::http::{RpcHttpRequest, RpcHttpResponse};
pub use crate::request::CanonicalRequest;
pub use crate::types::RequestId;

pub use crate::config::{ServiceConfig, ServiceInfo};

// Standard error codes
pub use crate::error_codes::*;
