//! Validation and invocation
//!
//! Binds a canonical request's params to an entry's declared parameters,
//! checks their types, runs the handler and turns every failure into a
//! JSON-RPC error object.

use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::ServiceInfo;
use crate::debug::TraceRecorder;
use crate::describe::describe_value;
use crate::error::JsonRpcErrorObject;
use crate::handler::{CallContext, Params};
use crate::http::RpcHttpRequest;
use crate::json_type::JsonType;
use crate::registry::{MethodHandler, Registry, RegistryEntry};
use crate::request::{CanonicalRequest, RequestParams};
use crate::signature::{MethodSignature, ParamSpec};

/// Bind request params to a signature.
///
/// Positional values map onto parameters in declaration order. Named values
/// must all be declared. Omitted optional parameters, and optional ones sent
/// as `null`, take their registered default (or `null`).
pub fn bind_params(
    signature: &MethodSignature,
    params: &RequestParams,
) -> Result<Params, JsonRpcErrorObject> {
    let supplied: Vec<Option<&Value>> = match params {
        RequestParams::Object(map) => {
            check_unknown_names(signature, map)?;
            signature.params.iter().map(|p| map.get(&p.name)).collect()
        }
        RequestParams::Array(values) => {
            if values.len() > signature.params.len() {
                return Err(JsonRpcErrorObject::invalid_params(&format!(
                    "Method `{}` takes at most {} positional parameter(s), got {}",
                    signature.method_name,
                    signature.params.len(),
                    values.len()
                )));
            }
            (0..signature.params.len()).map(|i| values.get(i)).collect()
        }
    };

    signature
        .params
        .iter()
        .zip(supplied)
        .map(|(spec, value)| bind_one(spec, value).map(|bound| (spec.name.clone(), bound)))
        .collect::<Result<Vec<_>, _>>()
        .map(Params::new)
}

fn check_unknown_names(
    signature: &MethodSignature,
    map: &HashMap<String, Value>,
) -> Result<(), JsonRpcErrorObject> {
    let mut unknown: Vec<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|name| signature.param(name).is_none())
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    unknown.sort_unstable();
    Err(JsonRpcErrorObject::invalid_params(&format!(
        "Unexpected parameter(s) for `{}`: {}",
        signature.method_name,
        unknown
            .iter()
            .map(|name| format!("`{}`", name))
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

fn bind_one(spec: &ParamSpec, value: Option<&Value>) -> Result<Value, JsonRpcErrorObject> {
    match value {
        None | Some(Value::Null) if spec.optional => {
            Ok(spec.default.clone().unwrap_or(Value::Null))
        }
        None => Err(JsonRpcErrorObject::invalid_params(&format!(
            "Parameter `{}` is required, but was not provided",
            spec.name
        ))),
        Some(value) if spec.param_type.matches(value) => Ok(value.clone()),
        Some(value) => Err(JsonRpcErrorObject::invalid_params(&format!(
            "Parameter `{}` should be of type <{}>, got <{}>",
            spec.name,
            spec.param_type,
            JsonType::of(value)
        ))),
    }
}

/// Resolves and runs methods against one registry
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    info: Arc<ServiceInfo>,
    provide_request: bool,
    allow_get: bool,
    debug: bool,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, info: Arc<ServiceInfo>) -> Self {
        Self {
            registry,
            info,
            provide_request: false,
            allow_get: true,
            debug: false,
        }
    }

    pub fn provide_request(mut self, enable: bool) -> Self {
        self.provide_request = enable;
        self
    }

    pub fn allow_get(mut self, enable: bool) -> Self {
        self.allow_get = enable;
        self
    }

    pub fn debug(mut self, enable: bool) -> Self {
        self.debug = enable;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Look the method up and invoke it
    pub async fn dispatch(
        &self,
        request: &CanonicalRequest,
        http_request: Option<&RpcHttpRequest>,
        trace: &TraceRecorder,
    ) -> Result<Value, JsonRpcErrorObject> {
        let Some(entry) = self.registry.lookup(&request.method) else {
            debug!(method = %request.method, "method not found");
            return Err(JsonRpcErrorObject::method_not_found(&request.method));
        };

        if request.via_get() && !self.allow_get && !entry.options.safe {
            debug!(method = %request.method, "method not available over GET");
            return Err(JsonRpcErrorObject::new(
                crate::JsonRpcErrorCode::MethodNotFound,
                Some(format!(
                    "Method '{}' was either not found, or is not available via GET requests",
                    request.method
                )),
                None,
            ));
        }

        self.invoke(entry, request, http_request, trace).await
    }

    /// Validate params against `entry` and run its handler
    pub async fn invoke(
        &self,
        entry: &RegistryEntry,
        request: &CanonicalRequest,
        http_request: Option<&RpcHttpRequest>,
        trace: &TraceRecorder,
    ) -> Result<Value, JsonRpcErrorObject> {
        let params = bind_params(&entry.signature, &request.params).inspect_err(|e| {
            debug!(method = %request.method, error = %e.message, "invalid params");
        })?;

        let handler = match &entry.handler {
            MethodHandler::Describe => return Ok(describe_value(&self.registry, &self.info)),
            MethodHandler::Custom(handler) => Arc::clone(handler),
        };

        let http_request = if self.provide_request {
            http_request
        } else {
            None
        };
        let ctx = CallContext::new(&request.method, request.id.as_ref(), http_request, trace);

        match AssertUnwindSafe(handler.call(&ctx, params))
            .catch_unwind()
            .await
        {
            Ok(Ok(value)) => {
                debug!(method = %request.method, "handler succeeded");
                Ok(value)
            }
            Ok(Err(err)) => Err(self.handler_error(&request.method, err, trace)),
            Err(panic) => {
                let diagnostic = format!("handler panicked: {}", panic_message(panic.as_ref()));
                Err(self.internal_error(&request.method, diagnostic, trace))
            }
        }
    }

    fn handler_error(
        &self,
        method: &str,
        err: anyhow::Error,
        trace: &TraceRecorder,
    ) -> JsonRpcErrorObject {
        if let Some(rpc_error) = err.downcast_ref::<JsonRpcErrorObject>() {
            warn!(method = %method, code = rpc_error.code, "handler returned {}", rpc_error);
            trace.record_error(rpc_error.to_string());
            return rpc_error.clone();
        }
        self.internal_error(method, format!("{:?}", err), trace)
    }

    fn internal_error(
        &self,
        method: &str,
        diagnostic: String,
        trace: &TraceRecorder,
    ) -> JsonRpcErrorObject {
        error!(method = %method, "handler failed: {}", diagnostic);
        trace.record_error(diagnostic.clone());
        let error = JsonRpcErrorObject::internal_error(None);
        if self.debug {
            error.with_data(Value::String(diagnostic))
        } else {
            error
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
