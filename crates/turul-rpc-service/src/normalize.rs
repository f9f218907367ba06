//! Transport normalization
//!
//! Three transport shapes carry the same request object:
//! - POST: the body is the JSON-RPC request object
//! - GET: the `json` query parameter holds the URL-encoded request object
//! - GET + JSONP: as GET, plus a callback query parameter the reply is wrapped in
//!
//! All of them end up as one [`CanonicalRequest`].

use http::Method;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

use crate::JSONRPC_VERSION;
use crate::error::{JsonRpcErrorObject, MalformedRequest};
use crate::http::RpcHttpRequest;
use crate::request::{CanonicalRequest, RequestParams, TransportMeta};
use crate::types::{JsonRpcVersion, RequestId};

/// Query parameter carrying the request object on GET
pub const GET_JSON_PARAM: &str = "json";

static CALLBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$")
        .expect("callback pattern is valid")
});

/// Turns an HTTP request into a canonical JSON-RPC request.
///
/// `padding_names` are the query parameters consulted, in order, for a JSONP
/// callback.
pub fn normalize(
    request: &RpcHttpRequest,
    padding_names: &[String],
) -> Result<CanonicalRequest, MalformedRequest> {
    let callback = jsonp_callback(request, padding_names)?;
    let fail = |error: JsonRpcErrorObject| MalformedRequest::new(error).with_callback(callback.clone());

    let object = request_object(request).map_err(fail)?;

    let id = match object.get("id") {
        Some(raw) => RequestId::from_value(raw)
            .map_err(|detail| fail(JsonRpcErrorObject::invalid_request(Some(detail))))?,
        None => None,
    };
    let fail = |error: JsonRpcErrorObject| fail(error).with_id(id.clone());

    match object.get("jsonrpc") {
        Some(Value::String(version)) if version == JSONRPC_VERSION => {}
        Some(_) => {
            return Err(fail(JsonRpcErrorObject::invalid_request(Some(format!(
                "`jsonrpc` member must be \"{}\"",
                JSONRPC_VERSION
            )))));
        }
        None => {
            return Err(fail(JsonRpcErrorObject::invalid_request(Some(
                "`jsonrpc` member required".to_string(),
            ))));
        }
    }

    let method = match object.get("method") {
        Some(Value::String(method)) => method.clone(),
        Some(_) => {
            return Err(fail(JsonRpcErrorObject::invalid_request(Some(
                "`method` member must be a string".to_string(),
            ))));
        }
        None => {
            return Err(fail(JsonRpcErrorObject::invalid_request(Some(
                "`method` member required".to_string(),
            ))));
        }
    };

    let params = match object.get("params") {
        None => RequestParams::default(),
        Some(raw @ (Value::Array(_) | Value::Object(_))) => {
            serde_json::from_value(raw.clone()).map_err(|e| {
                fail(JsonRpcErrorObject::invalid_params(&format!(
                    "`params` could not be read: {}",
                    e
                )))
            })?
        }
        Some(_) => {
            return Err(fail(JsonRpcErrorObject::invalid_params(
                "`params` member must be an array or an object",
            )));
        }
    };

    debug!(
        method = %method,
        http_method = %request.method,
        jsonp = callback.is_some(),
        "normalized JSON-RPC request"
    );

    Ok(CanonicalRequest {
        version: JsonRpcVersion::V2_0,
        method,
        params,
        id,
        transport: TransportMeta {
            http_method: request.method.clone(),
            callback,
        },
    })
}

/// The JSONP callback named by the first present, non-empty padding
/// parameter. Only GET requests are padded.
pub fn jsonp_callback(
    request: &RpcHttpRequest,
    padding_names: &[String],
) -> Result<Option<String>, MalformedRequest> {
    if request.method != Method::GET {
        return Ok(None);
    }
    let Some(callback) = padding_names
        .iter()
        .filter_map(|name| request.query_param(name))
        .find(|value| !value.is_empty())
    else {
        return Ok(None);
    };

    if CALLBACK_RE.is_match(&callback) {
        Ok(Some(callback))
    } else {
        Err(MalformedRequest::new(JsonRpcErrorObject::invalid_request(Some(
            format!("Invalid JSONP callback name \"{}\"", callback),
        ))))
    }
}

fn request_object(request: &RpcHttpRequest) -> Result<Map<String, Value>, JsonRpcErrorObject> {
    let text = if request.method == Method::POST {
        std::str::from_utf8(&request.body)
            .map_err(|_| {
                JsonRpcErrorObject::parse_error(Some("Request body must be valid UTF-8".to_string()))
            })?
            .to_string()
    } else if request.method == Method::GET {
        request.query_param(GET_JSON_PARAM).ok_or_else(|| {
            JsonRpcErrorObject::invalid_request(Some(format!(
                "In a GET request, JSON must be provided in a URL argument named \"{}\"",
                GET_JSON_PARAM
            )))
        })?
    } else {
        return Err(JsonRpcErrorObject::invalid_request(Some(format!(
            "Invalid request method. Method must be GET or POST, not {}",
            request.method
        ))));
    };

    let value: Value = serde_json::from_str(&text).map_err(|e| {
        JsonRpcErrorObject::parse_error(Some(format!(
            "There was a syntax error in the provided JSON: {}",
            e
        )))
    })?;

    match value {
        Value::Object(object) => Ok(object),
        Value::Array(_) => Err(JsonRpcErrorObject::invalid_request(Some(
            "Batch requests are not supported".to_string(),
        ))),
        _ => Err(JsonRpcErrorObject::invalid_request(Some(
            "The JSON provided must be an object".to_string(),
        ))),
    }
}
