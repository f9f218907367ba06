//! Method registry
//!
//! Built once while a service is defined and read-only afterwards. Only
//! methods registered here are reachable by callers.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::RegistryError;
use crate::handler::RpcHandler;
use crate::json_type::JsonType;
use crate::signature::MethodSignature;

/// Name of the built-in introspection method
pub const DESCRIBE_METHOD: &str = "system.describe";

/// Declaration of the built-in introspection method
pub const DESCRIBE_SIGNATURE: &str = "system.describe() -> <object>";

/// Registration options for one method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodOptions {
    /// Listed by `system.describe`
    pub public: bool,
    /// Callable over GET when the service restricts GET access
    pub safe: bool,
    pub summary: Option<String>,
    /// Documentation URL
    pub help: Option<String>,
    pub idempotent: bool,
    /// Values bound to omitted optional parameters
    pub defaults: Vec<(String, Value)>,
}

impl Default for MethodOptions {
    fn default() -> Self {
        Self {
            public: true,
            safe: false,
            summary: None,
            help: None,
            idempotent: false,
            defaults: Vec::new(),
        }
    }
}

impl MethodOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide the method from `system.describe`
    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn safe(mut self) -> Self {
        self.safe = true;
        self
    }

    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn help(mut self, url: impl Into<String>) -> Self {
        self.help = Some(url.into());
        self
    }

    pub fn default_value(mut self, param: impl Into<String>, value: Value) -> Self {
        self.defaults.push((param.into(), value));
        self
    }
}

/// What runs when an entry is dispatched
#[derive(Clone)]
pub enum MethodHandler {
    Custom(Arc<dyn RpcHandler>),
    /// Renders the registry itself
    Describe,
}

impl fmt::Debug for MethodHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodHandler::Custom(_) => f.write_str("Custom(..)"),
            MethodHandler::Describe => f.write_str("Describe"),
        }
    }
}

/// One registered method
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Parsed contract, with registered defaults attached to its params
    pub signature: MethodSignature,
    pub handler: MethodHandler,
    pub options: MethodOptions,
}

impl RegistryEntry {
    pub fn name(&self) -> &str {
        &self.signature.method_name
    }
}

/// Method name -> entry, remembering registration order
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, Arc<RegistryEntry>>,
    order: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`.
    ///
    /// The declaration must declare the same method name. Nothing is added
    /// when any check fails.
    pub fn register<H>(
        &mut self,
        name: &str,
        handler: H,
        declaration: &str,
        options: MethodOptions,
    ) -> Result<(), RegistryError>
    where
        H: RpcHandler + 'static,
    {
        let signature = MethodSignature::parse(declaration)?;
        if signature.method_name != name {
            return Err(RegistryError::NameMismatch {
                registered: name.to_string(),
                declared: signature.method_name,
            });
        }
        self.insert(signature, MethodHandler::Custom(Arc::new(handler)), options)
    }

    /// Register `handler` under the name its declaration gives
    pub fn register_declared<H>(
        &mut self,
        handler: H,
        declaration: &str,
        options: MethodOptions,
    ) -> Result<(), RegistryError>
    where
        H: RpcHandler + 'static,
    {
        let signature = MethodSignature::parse(declaration)?;
        self.insert(signature, MethodHandler::Custom(Arc::new(handler)), options)
    }

    /// Add the built-in `system.describe` unless the service registered its own
    pub fn ensure_describe(&mut self) -> Result<(), RegistryError> {
        if self.contains(DESCRIBE_METHOD) {
            debug!("service overrides {}", DESCRIBE_METHOD);
            return Ok(());
        }
        let signature = MethodSignature::parse(DESCRIBE_SIGNATURE)?;
        self.insert(
            signature,
            MethodHandler::Describe,
            MethodOptions::new().private().safe().idempotent(),
        )
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<RegistryEntry>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entries in registration order
    pub fn entries(&self) -> impl Iterator<Item = &Arc<RegistryEntry>> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    pub fn method_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(
        &mut self,
        mut signature: MethodSignature,
        handler: MethodHandler,
        options: MethodOptions,
    ) -> Result<(), RegistryError> {
        let name = signature.method_name.clone();
        if self.contains(&name) {
            return Err(RegistryError::DuplicateMethod(name));
        }
        apply_defaults(&mut signature, &options.defaults)?;

        debug!(method = %name, signature = %signature, "registered JSON-RPC method");
        self.order.push(name.clone());
        self.entries.insert(
            name,
            Arc::new(RegistryEntry {
                signature,
                handler,
                options,
            }),
        );
        Ok(())
    }
}

fn apply_defaults(
    signature: &mut MethodSignature,
    defaults: &[(String, Value)],
) -> Result<(), RegistryError> {
    let method = signature.method_name.clone();
    for (param, value) in defaults {
        let invalid = |reason: String| RegistryError::InvalidDefault {
            method: method.clone(),
            param: param.clone(),
            reason,
        };
        let spec = signature
            .param_mut(param)
            .ok_or_else(|| invalid("no such parameter is declared".to_string()))?;
        if !spec.optional {
            return Err(invalid(
                "only optional parameters take defaults".to_string(),
            ));
        }
        if !value.is_null() && !spec.param_type.matches(value) {
            return Err(invalid(format!(
                "expected <{}>, got <{}>",
                spec.param_type,
                JsonType::of(value)
            )));
        }
        spec.default = Some(value.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SignatureError;
    use crate::handler::{CallContext, FnHandler, HandlerResult, Params};
    use serde_json::json;

    fn noop() -> FnHandler<impl Fn(&CallContext<'_>, Params) -> HandlerResult + Send + Sync> {
        FnHandler::new(|_, _| Ok(Value::Null))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        registry
            .register(
                "get_sum",
                noop(),
                "get_sum(foo=<num>, bar=<num>?) -> <num>",
                MethodOptions::new().default_value("bar", json!(2)),
            )
            .unwrap();

        let entry = registry.lookup("get_sum").unwrap();
        assert_eq!(entry.name(), "get_sum");
        assert_eq!(entry.signature.param("bar").unwrap().default, Some(json!(2)));
        assert!(registry.lookup("get_product").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = Registry::new();
        registry
            .register_declared(noop(), "ping() -> <str>", MethodOptions::new())
            .unwrap();
        let err = registry
            .register_declared(noop(), "ping(x=<num>) -> <str>", MethodOptions::new())
            .unwrap_err();

        assert_eq!(err, RegistryError::DuplicateMethod("ping".to_string()));
        assert!(registry.lookup("ping").unwrap().signature.params.is_empty());
    }

    #[test]
    fn test_malformed_declaration_adds_nothing() {
        let mut registry = Registry::new();
        let err = registry
            .register("broken", noop(), "broken(a=<num> -> <num>", MethodOptions::new())
            .unwrap_err();

        assert!(matches!(
            err,
            RegistryError::Signature(SignatureError::Malformed { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_name_must_match_declaration() {
        let mut registry = Registry::new();
        let err = registry
            .register("add", noop(), "sum(a=<num>) -> <num>", MethodOptions::new())
            .unwrap_err();
        assert!(matches!(err, RegistryError::NameMismatch { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_defaults() {
        let cases = [
            MethodOptions::new().default_value("missing", json!(1)),
            MethodOptions::new().default_value("foo", json!(1)),
            MethodOptions::new().default_value("bar", json!("two")),
        ];
        for options in cases {
            let mut registry = Registry::new();
            let err = registry
                .register_declared(noop(), "get_sum(foo=<num>, bar=<num>?) -> <num>", options)
                .unwrap_err();
            assert!(matches!(err, RegistryError::InvalidDefault { .. }), "{err}");
            assert!(registry.is_empty());
        }
    }

    #[test]
    fn test_describe_builtin_and_override() {
        let mut registry = Registry::new();
        registry.ensure_describe().unwrap();
        let entry = registry.lookup(DESCRIBE_METHOD).unwrap();
        assert!(matches!(entry.handler, MethodHandler::Describe));
        assert!(!entry.options.public);

        let mut custom = Registry::new();
        custom
            .register_declared(noop(), "system.describe() -> <obj>", MethodOptions::new())
            .unwrap();
        custom.ensure_describe().unwrap();
        assert!(matches!(
            custom.lookup(DESCRIBE_METHOD).unwrap().handler,
            MethodHandler::Custom(_)
        ));

        let err = custom
            .register_declared(noop(), "system.describe() -> <obj>", MethodOptions::new())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateMethod(_)));
    }

    #[test]
    fn test_entries_keep_registration_order() {
        let mut registry = Registry::new();
        for declaration in ["b() -> <nil>", "a() -> <nil>", "c() -> <nil>"] {
            registry
                .register_declared(noop(), declaration, MethodOptions::new())
                .unwrap();
        }
        let names: Vec<_> = registry.entries().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(registry.method_names(), names);
    }
}
