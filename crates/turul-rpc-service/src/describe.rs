//! `system.describe`: the service description rebuilt from the registry.
//! Only signatures and options are read; no handler runs.

use serde::Serialize;
use serde_json::Value;

use crate::config::ServiceInfo;
use crate::json_type::JsonType;
use crate::registry::{Registry, RegistryEntry};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: JsonType,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureDescription {
    pub name: String,
    pub summary: Option<String>,
    pub help: Option<String>,
    pub idempotent: bool,
    pub params: Vec<ParamDescription>,
    pub returns: JsonType,
    /// Canonical form of the declaration
    pub signature: String,
}

impl From<&RegistryEntry> for ProcedureDescription {
    fn from(entry: &RegistryEntry) -> Self {
        let signature = &entry.signature;
        Self {
            name: signature.method_name.clone(),
            summary: entry.options.summary.clone(),
            help: entry.options.help.clone(),
            idempotent: entry.options.idempotent,
            params: signature
                .params
                .iter()
                .map(|p| ParamDescription {
                    name: p.name.clone(),
                    param_type: p.param_type,
                    optional: p.optional,
                })
                .collect(),
            returns: signature.return_type,
            signature: signature.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDescription {
    #[serde(flatten)]
    pub info: ServiceInfo,
    pub procs: Vec<ProcedureDescription>,
}

/// Describe every public entry, in registration order
pub fn describe(registry: &Registry, info: &ServiceInfo) -> ServiceDescription {
    ServiceDescription {
        info: info.clone(),
        procs: registry
            .entries()
            .filter(|entry| entry.options.public)
            .map(|entry| ProcedureDescription::from(entry.as_ref()))
            .collect(),
    }
}

pub fn describe_value(registry: &Registry, info: &ServiceInfo) -> Value {
    serde_json::to_value(describe(registry, info)).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::FnHandler;
    use crate::registry::MethodOptions;
    use crate::signature::MethodSignature;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_describe_shape() {
        let mut registry = Registry::new();
        registry
            .register_declared(
                FnHandler::new(|_, _| Ok(json!(0))),
                "get_sum(foo=<num>, bar=<num>?) -> <num>",
                MethodOptions::new()
                    .summary("Adds two numbers")
                    .idempotent()
                    .default_value("bar", json!(2)),
            )
            .unwrap();
        registry.ensure_describe().unwrap();

        let info = ServiceInfo {
            name: "Calculator".to_string(),
            ..Default::default()
        };
        let value = describe_value(&registry, &info);

        assert_eq!(value["sdversion"], "1.0");
        assert_eq!(value["name"], "Calculator");
        assert_eq!(value["procs"].as_array().unwrap().len(), 1);
        assert_eq!(
            value["procs"][0],
            json!({
                "name": "get_sum",
                "summary": "Adds two numbers",
                "help": null,
                "idempotent": true,
                "params": [
                    {"name": "foo", "type": "num", "optional": false},
                    {"name": "bar", "type": "num", "optional": true}
                ],
                "returns": "num",
                "signature": "get_sum(foo=<num>, bar=<num>?) -> <num>"
            })
        );
    }

    #[test]
    fn test_private_methods_hidden() {
        let mut registry = Registry::new();
        registry
            .register_declared(
                FnHandler::new(|_, _| Ok(Value::Null)),
                "internal() -> <nil>",
                MethodOptions::new().private(),
            )
            .unwrap();
        let description = describe(&registry, &ServiceInfo::default());
        assert!(description.procs.is_empty());
    }

    #[test]
    fn test_describe_never_runs_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = Registry::new();
        registry
            .register_declared(
                FnHandler::new(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Null)
                }),
                "touch(x=<any>?) -> <nil>",
                MethodOptions::new(),
            )
            .unwrap();

        describe(&registry, &ServiceInfo::default());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_signature_round_trip() {
        let declarations = [
            "get_sum(foo=<num>, bar=<num>?) -> <num>",
            "echo(text=<str>) -> <str>",
            "store(key=<str>, value=<any>, ttl=<num>?, tags=<array>?) -> <bool>",
            "noop() -> <nil>",
        ];
        let mut registry = Registry::new();
        for declaration in declarations {
            registry
                .register_declared(
                    FnHandler::new(|_, _| Ok(Value::Null)),
                    declaration,
                    MethodOptions::new(),
                )
                .unwrap();
        }

        let description = describe(&registry, &ServiceInfo::default());
        for (declaration, proc_) in declarations.iter().zip(&description.procs) {
            let parsed = MethodSignature::parse(declaration).unwrap();
            let rendered: Vec<_> = proc_
                .params
                .iter()
                .map(|p| (p.name.as_str(), p.param_type, p.optional))
                .collect();
            let expected: Vec<_> = parsed
                .params
                .iter()
                .map(|p| (p.name.as_str(), p.param_type, p.optional))
                .collect();
            assert_eq!(rendered, expected);
            assert_eq!(proc_.returns, parsed.return_type);
            assert_eq!(&proc_.signature, declaration);
        }
    }
}
