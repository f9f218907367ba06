//! The service facade: normalize, validate, dispatch, reply

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ServiceConfig, ServiceInfo};
use crate::debug::TraceRecorder;
use crate::describe::{ServiceDescription, describe};
use crate::dispatch::Dispatcher;
use crate::error::{JsonRpcErrorObject, RegistryError};
use crate::handler::RpcHandler;
use crate::http::{RpcHttpRequest, RpcHttpResponse};
use crate::normalize::normalize;
use crate::registry::{MethodOptions, Registry};
use crate::request::CanonicalRequest;
use crate::response::ResponseBuilder;

/// Extra request checks run after normalization and before dispatch.
///
/// Returning an error skips the handler and sends that error to the caller.
pub trait RequestValidator: Send + Sync {
    fn validate(
        &self,
        http_request: &RpcHttpRequest,
        request: &CanonicalRequest,
    ) -> Result<(), JsonRpcErrorObject>;
}

impl<F> RequestValidator for F
where
    F: Fn(&RpcHttpRequest, &CanonicalRequest) -> Result<(), JsonRpcErrorObject> + Send + Sync,
{
    fn validate(
        &self,
        http_request: &RpcHttpRequest,
        request: &CanonicalRequest,
    ) -> Result<(), JsonRpcErrorObject> {
        self(http_request, request)
    }
}

/// A JSON-RPC service bound to a fixed set of methods
#[derive(Clone)]
pub struct RpcService {
    dispatcher: Dispatcher,
    config: Arc<ServiceConfig>,
    info: Arc<ServiceInfo>,
    responses: ResponseBuilder,
    validator: Option<Arc<dyn RequestValidator>>,
}

impl fmt::Debug for RpcService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcService")
            .field("methods", &self.registry().method_names())
            .field("config", &self.config)
            .field("info", &self.info)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl RpcService {
    pub fn builder() -> RpcServiceBuilder {
        RpcServiceBuilder::new()
    }

    pub fn registry(&self) -> &Registry {
        self.dispatcher.registry()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    /// The same description `system.describe` returns
    pub fn describe(&self) -> ServiceDescription {
        describe(self.registry(), &self.info)
    }

    /// Serve one HTTP request. Every outcome, including malformed input,
    /// becomes a JSON-RPC reply.
    pub async fn handle(&self, http_request: &RpcHttpRequest) -> RpcHttpResponse {
        let trace = TraceRecorder::new(self.config.debug);

        let request = match normalize(http_request, &self.config.padding_names) {
            Ok(request) => request,
            Err(malformed) => {
                debug!(
                    code = malformed.error.code,
                    "rejected malformed request: {}", malformed.error.message
                );
                trace.record_error(malformed.error.message.clone());
                return self.responses.build(
                    malformed.id,
                    Err(malformed.error),
                    trace.finish(),
                    malformed.callback.as_deref(),
                );
            }
        };

        let outcome = match self.validate(http_request, &request) {
            Ok(()) => {
                self.dispatcher
                    .dispatch(&request, Some(http_request), &trace)
                    .await
            }
            Err(error) => {
                debug!(method = %request.method, "request refused by validator: {}", error.message);
                trace.record_error(error.message.clone());
                Err(error)
            }
        };

        match &outcome {
            Ok(_) => debug!(method = %request.method, id = ?request.id, "JSON-RPC call succeeded"),
            Err(error) => debug!(
                method = %request.method,
                id = ?request.id,
                code = error.code,
                "JSON-RPC call failed"
            ),
        }

        self.responses.build(
            request.id,
            outcome,
            trace.finish(),
            request.transport.callback.as_deref(),
        )
    }

    fn validate(
        &self,
        http_request: &RpcHttpRequest,
        request: &CanonicalRequest,
    ) -> Result<(), JsonRpcErrorObject> {
        match &self.validator {
            Some(validator) => validator.validate(http_request, request),
            None => Ok(()),
        }
    }
}

/// Defines a service: its methods, metadata and dispatch options
pub struct RpcServiceBuilder {
    registry: Registry,
    config: ServiceConfig,
    info: ServiceInfo,
    validator: Option<Arc<dyn RequestValidator>>,
}

impl Default for RpcServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcServiceBuilder {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            config: ServiceConfig::default(),
            info: ServiceInfo::default(),
            validator: None,
        }
    }

    /// Register a public method under the name its declaration gives
    pub fn method<H>(self, declaration: &str, handler: H) -> Result<Self, RegistryError>
    where
        H: RpcHandler + 'static,
    {
        self.method_with(declaration, handler, MethodOptions::new())
    }

    pub fn method_with<H>(
        mut self,
        declaration: &str,
        handler: H,
        options: MethodOptions,
    ) -> Result<Self, RegistryError>
    where
        H: RpcHandler + 'static,
    {
        self.registry
            .register_declared(handler, declaration, options)?;
        Ok(self)
    }

    /// Register under an explicit name, which must match the declaration
    pub fn register<H>(
        mut self,
        name: &str,
        handler: H,
        declaration: &str,
        options: MethodOptions,
    ) -> Result<Self, RegistryError>
    where
        H: RpcHandler + 'static,
    {
        self.registry.register(name, handler, declaration, options)?;
        Ok(self)
    }

    /// Replace every dispatch option at once
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn debug(mut self, enable: bool) -> Self {
        self.config.debug = enable;
        self
    }

    pub fn verbose(mut self, enable: bool) -> Self {
        self.config.verbose = enable;
        self
    }

    pub fn provide_request(mut self, enable: bool) -> Self {
        self.config.provide_request = enable;
        self
    }

    pub fn padding_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.padding_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_get(mut self, enable: bool) -> Self {
        self.config.allow_get = enable;
        self
    }

    pub fn http_error_status(mut self, enable: bool) -> Self {
        self.config.http_error_status = enable;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.config.content_type = content_type.into();
        self
    }

    pub fn info(mut self, info: ServiceInfo) -> Self {
        self.info = info;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.info.name = name.into();
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.info.id = id.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.info.version = version.into();
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.info.summary = summary.into();
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.info.help = help.into();
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.info.address = address.into();
        self
    }

    pub fn validator<V>(mut self, validator: V) -> Self
    where
        V: RequestValidator + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn build(mut self) -> Result<RpcService, RegistryError> {
        self.registry.ensure_describe()?;

        info!(
            service = %self.info.name,
            methods = self.registry.len(),
            debug = self.config.debug,
            "JSON-RPC service ready"
        );

        let registry = Arc::new(self.registry);
        let info = Arc::new(self.info);
        let dispatcher = Dispatcher::new(registry, Arc::clone(&info))
            .provide_request(self.config.provide_request)
            .allow_get(self.config.allow_get)
            .debug(self.config.debug);

        Ok(RpcService {
            dispatcher,
            responses: ResponseBuilder::from_config(&self.config),
            config: Arc::new(self.config),
            info,
            validator: self.validator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::FnHandler;
    use crate::registry::DESCRIBE_METHOD;
    use serde_json::{Value, json};

    fn echo_service() -> RpcServiceBuilder {
        RpcService::builder()
            .method(
                "echo(message=<str>) -> <str>",
                FnHandler::new(|_, params| Ok(json!(params.get::<String>("message")?))),
            )
            .unwrap()
    }

    fn body(response: &RpcHttpResponse) -> Value {
        serde_json::from_str(response.body_str()).unwrap()
    }

    #[test]
    fn test_build_adds_describe() {
        let service = echo_service().build().unwrap();
        assert!(service.registry().contains(DESCRIBE_METHOD));
        assert_eq!(service.describe().procs.len(), 1);
    }

    #[test]
    fn test_failed_registration_is_reported() {
        let err = echo_service()
            .method("echo(x=<str>) -> <str>", FnHandler::new(|_, _| Ok(json!(null))))
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::DuplicateMethod("echo".to_string()));
    }

    #[tokio::test]
    async fn test_handle_post() {
        let service = echo_service().build().unwrap();
        let reply = service
            .handle(&RpcHttpRequest::post(
                r#"{"jsonrpc":"2.0","method":"echo","params":["hi"],"id":"a"}"#,
            ))
            .await;
        assert_eq!(reply.body_str(), r#"{"jsonrpc":"2.0","result":"hi","id":"a"}"#);
    }

    #[tokio::test]
    async fn test_malformed_request_keeps_callback() {
        let service = echo_service().build().unwrap();
        let reply = service
            .handle(&RpcHttpRequest::get("json=%7Bnot+json&callback=cb"))
            .await;
        assert_eq!(reply.content_type, "application/javascript");
        let text = reply.body_str();
        assert!(text.starts_with("cb(") && text.ends_with(')'));
        let value: Value = serde_json::from_str(&text[3..text.len() - 1]).unwrap();
        assert_eq!(value["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_validator_refuses_before_dispatch() {
        let service = echo_service()
            .validator(|http: &RpcHttpRequest, _: &CanonicalRequest| {
                match http.header("x-api-key") {
                    Some("secret") => Ok(()),
                    _ => Err(JsonRpcErrorObject::server_error(-32001, "Unauthorized", None)),
                }
            })
            .build()
            .unwrap();
        let call = r#"{"jsonrpc":"2.0","method":"echo","params":{"message":"x"},"id":1}"#;

        let refused = service.handle(&RpcHttpRequest::post(call)).await;
        assert_eq!(body(&refused)["error"]["code"], -32001);

        let allowed = service
            .handle(
                &RpcHttpRequest::post(call)
                    .with_header("x-api-key", http::HeaderValue::from_static("secret")),
            )
            .await;
        assert_eq!(body(&allowed)["result"], "x");
    }

    #[tokio::test]
    async fn test_debug_trace_attached_to_malformed_reply() {
        let service = echo_service().debug(true).build().unwrap();
        let reply = service.handle(&RpcHttpRequest::post("[]")).await;
        let value = body(&reply);
        assert_eq!(value["error"]["code"], -32600);
        assert_eq!(value["debug"]["operations"]["count"], 0);
        assert_eq!(value["debug"]["error"], "Batch requests are not supported");
    }
}
