//! Service-level configuration

use serde::Serialize;

/// Query parameters checked, in order, for a JSONP callback
pub const DEFAULT_PADDING_NAMES: [&str; 2] = ["callback", "jsoncallback"];

/// Configuration consulted at dispatch time
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Attach a debug trace to every reply and diagnostic text to internal errors
    pub debug: bool,
    /// Pretty-print reply JSON
    pub verbose: bool,
    /// Hand the HTTP request to every handler through its call context
    pub provide_request: bool,
    pub padding_names: Vec<String>,
    /// When false, only methods registered as `safe` are callable over GET
    pub allow_get: bool,
    /// Map JSON-RPC errors onto HTTP 4xx/5xx instead of always replying 200
    pub http_error_status: bool,
    pub content_type: String,
    pub jsonp_content_type: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            debug: false,
            verbose: false,
            provide_request: false,
            padding_names: DEFAULT_PADDING_NAMES.iter().map(|s| s.to_string()).collect(),
            allow_get: true,
            http_error_status: false,
            content_type: "application/json".to_string(),
            jsonp_content_type: "application/javascript".to_string(),
        }
    }
}

/// Service description metadata reported by `system.describe`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceInfo {
    /// Always "1.0"
    pub sdversion: String,
    pub name: String,
    /// Unique URI for the service
    pub id: String,
    pub version: String,
    pub summary: String,
    /// Documentation URL
    pub help: String,
    /// Endpoint URL
    pub address: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            sdversion: "1.0".to_string(),
            name: "JSON-RPC Service".to_string(),
            id: String::new(),
            version: String::new(),
            summary: String::new(),
            help: String::new(),
            address: String::new(),
        }
    }
}
