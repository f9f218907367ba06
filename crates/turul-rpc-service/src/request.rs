use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::types::{JsonRpcVersion, RequestId};

/// Parameters for a JSON-RPC request
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequestParams {
    /// Positional parameters as an array
    Array(Vec<Value>),
    /// Named parameters as an object
    Object(HashMap<String, Value>),
}

impl RequestParams {
    /// Get a parameter by name (object params only)
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            RequestParams::Object(map) => map.get(key),
            RequestParams::Array(_) => None,
        }
    }

    /// Get a parameter by index (array params only)
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            RequestParams::Array(vec) => vec.get(index),
            RequestParams::Object(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RequestParams::Object(map) => map.len(),
            RequestParams::Array(vec) => vec.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RequestParams {
    fn default() -> Self {
        RequestParams::Object(HashMap::new())
    }
}

impl From<HashMap<String, Value>> for RequestParams {
    fn from(map: HashMap<String, Value>) -> Self {
        RequestParams::Object(map)
    }
}

impl From<Vec<Value>> for RequestParams {
    fn from(vec: Vec<Value>) -> Self {
        RequestParams::Array(vec)
    }
}

/// How the call reached the service. Not part of the JSON-RPC payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMeta {
    pub http_method: Method,
    /// JSONP callback the reply must be wrapped in
    pub callback: Option<String>,
}

impl Default for TransportMeta {
    fn default() -> Self {
        Self {
            http_method: Method::POST,
            callback: None,
        }
    }
}

/// A JSON-RPC request after transport normalization
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRequest {
    pub version: JsonRpcVersion,
    pub method: String,
    pub params: RequestParams,
    /// `None` for notifications
    pub id: Option<RequestId>,
    pub transport: TransportMeta,
}

impl CanonicalRequest {
    pub fn new(id: Option<RequestId>, method: impl Into<String>, params: RequestParams) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
            id,
            transport: TransportMeta::default(),
        }
    }

    pub fn with_transport(mut self, transport: TransportMeta) -> Self {
        self.transport = transport;
        self
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn via_get(&self) -> bool {
        self.transport.http_method == Method::GET
    }

    /// Get a parameter by name (if params are an object)
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Get a parameter by index (if params are an array)
    pub fn get_param_index(&self, index: usize) -> Option<&Value> {
        self.params.get_index(index)
    }
}
