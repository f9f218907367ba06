//! Reply envelopes and their serialization onto HTTP

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::config::ServiceConfig;
use crate::debug::DebugTrace;
use crate::error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
use crate::http::RpcHttpResponse;
use crate::types::{JsonRpcVersion, RequestId};

/// Body sent when a reply cannot be serialized at all
const FALLBACK_BODY: &str =
    r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Internal error"},"id":null}"#;

/// A successful JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub result: Value,
    pub id: Option<RequestId>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            result,
            id,
        }
    }
}

/// Either a successful response or an error response, never both
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Response(JsonRpcResponse),
    Error(JsonRpcError),
}

impl JsonRpcMessage {
    pub fn from_outcome(id: Option<RequestId>, outcome: Result<Value, JsonRpcErrorObject>) -> Self {
        match outcome {
            Ok(result) => Self::Response(JsonRpcResponse::success(id, result)),
            Err(error) => Self::Error(JsonRpcError::new(id, error)),
        }
    }

    pub fn error(&self) -> Option<&JsonRpcErrorObject> {
        match self {
            JsonRpcMessage::Response(_) => None,
            JsonRpcMessage::Error(err) => Some(&err.error),
        }
    }
}

/// A message plus the optional `debug` member
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    #[serde(flatten)]
    pub message: JsonRpcMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugTrace>,
}

/// Turns dispatch outcomes into HTTP replies
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    verbose: bool,
    http_error_status: bool,
    content_type: String,
    jsonp_content_type: String,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::from_config(&ServiceConfig::default())
    }
}

impl ResponseBuilder {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            verbose: config.verbose,
            http_error_status: config.http_error_status,
            content_type: config.content_type.clone(),
            jsonp_content_type: config.jsonp_content_type.clone(),
        }
    }

    pub fn build(
        &self,
        id: Option<RequestId>,
        outcome: Result<Value, JsonRpcErrorObject>,
        debug: Option<DebugTrace>,
        callback: Option<&str>,
    ) -> RpcHttpResponse {
        let envelope = ResponseEnvelope {
            message: JsonRpcMessage::from_outcome(id, outcome),
            debug,
        };
        self.serialize(&envelope, callback)
    }

    pub fn serialize(&self, envelope: &ResponseEnvelope, callback: Option<&str>) -> RpcHttpResponse {
        let status = match envelope.message.error() {
            Some(error) if self.http_error_status => status_for(error.error_code()),
            _ => StatusCode::OK,
        };

        let json = if self.verbose {
            serde_json::to_string_pretty(envelope)
        } else {
            serde_json::to_string(envelope)
        }
        .unwrap_or_else(|e| {
            error!("failed to serialize JSON-RPC reply: {}", e);
            FALLBACK_BODY.to_string()
        });

        match callback {
            Some(callback) => RpcHttpResponse {
                status,
                content_type: self.jsonp_content_type.clone(),
                body: Bytes::from(format!("{}({})", callback, json)),
            },
            None => RpcHttpResponse {
                status,
                content_type: self.content_type.clone(),
                body: Bytes::from(json),
            },
        }
    }
}

/// HTTP status used when `http_error_status` is on
pub fn status_for(code: JsonRpcErrorCode) -> StatusCode {
    match code {
        JsonRpcErrorCode::ParseError | JsonRpcErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        JsonRpcErrorCode::MethodNotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
