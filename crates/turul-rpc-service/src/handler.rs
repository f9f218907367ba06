//! Handlers: the units of work a registered method runs

use anyhow::{Context as _, anyhow};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::debug::TraceRecorder;
use crate::http::RpcHttpRequest;
use crate::types::RequestId;

/// What a handler returns. Any error becomes an `Internal error` reply
/// unless it is a [`JsonRpcErrorObject`](crate::JsonRpcErrorObject).
pub type HandlerResult = anyhow::Result<Value>;

/// Arguments bound to a method's declared parameters, in declaration order.
///
/// Every declared parameter is present: omitted optional ones carry their
/// registered default, or `null` when none was registered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: Vec<(String, Value)>,
}

impl Params {
    pub fn new(values: Vec<(String, Value)>) -> Self {
        Self { values }
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Deserialize a parameter into `T`
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let value = self
            .value(name)
            .ok_or_else(|| anyhow!("parameter `{}` is not declared", name))?;
        serde_json::from_value(value.clone())
            .with_context(|| format!("parameter `{}` has an unexpected shape", name))
    }

    /// Like [`Params::get`], mapping `null` to `None`
    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<Option<T>> {
        match self.value(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get(name).map(Some),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Values in declaration order
    pub fn positional(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_object(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .cloned()
                .collect::<Map<String, Value>>(),
        )
    }
}

/// Per-call context handed to a handler
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub method: &'a str,
    pub request_id: Option<&'a RequestId>,
    http_request: Option<&'a RpcHttpRequest>,
    trace: &'a TraceRecorder,
}

impl<'a> CallContext<'a> {
    pub fn new(
        method: &'a str,
        request_id: Option<&'a RequestId>,
        http_request: Option<&'a RpcHttpRequest>,
        trace: &'a TraceRecorder,
    ) -> Self {
        Self {
            method,
            request_id,
            http_request,
            trace,
        }
    }

    /// The underlying HTTP request. Only provided when the service is built
    /// with `provide_request`.
    pub fn request(&self) -> Option<&'a RpcHttpRequest> {
        self.http_request
    }

    /// Record a sub-operation (a query, a cache lookup) in the debug trace
    pub fn record(&self, label: impl Into<String>, detail: impl Into<String>) {
        self.trace.record(label, detail);
    }

    pub fn trace(&self) -> &'a TraceRecorder {
        self.trace
    }

    pub fn is_debug(&self) -> bool {
        self.trace.is_enabled()
    }
}

/// Trait for the body of a registered method
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn call(&self, ctx: &CallContext<'_>, params: Params) -> HandlerResult;
}

/// A synchronous function-based handler
pub struct FnHandler<F>(F);

impl<F> FnHandler<F>
where
    F: Fn(&CallContext<'_>, Params) -> HandlerResult + Send + Sync,
{
    pub fn new(handler_fn: F) -> Self {
        Self(handler_fn)
    }
}

#[async_trait]
impl<F> RpcHandler for FnHandler<F>
where
    F: Fn(&CallContext<'_>, Params) -> HandlerResult + Send + Sync,
{
    async fn call(&self, ctx: &CallContext<'_>, params: Params) -> HandlerResult {
        (self.0)(ctx, params)
    }
}

/// An async function-based handler. The future owns its arguments, so it
/// does not see the call context.
pub struct AsyncFnHandler<F>(F);

impl<F> AsyncFnHandler<F>
where
    F: Fn(Params) -> BoxFuture<'static, HandlerResult> + Send + Sync,
{
    pub fn new(handler_fn: F) -> Self {
        Self(handler_fn)
    }
}

#[async_trait]
impl<F> RpcHandler for AsyncFnHandler<F>
where
    F: Fn(Params) -> BoxFuture<'static, HandlerResult> + Send + Sync,
{
    async fn call(&self, _ctx: &CallContext<'_>, params: Params) -> HandlerResult {
        (self.0)(params).await
    }
}
