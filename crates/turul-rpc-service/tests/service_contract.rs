//! End-to-end behaviour of a service: HTTP-shaped request in, reply out.

use async_trait::async_trait;
use serde_json::{Number, Value, json};
use std::net::SocketAddr;

use turul_rpc_service::prelude::*;
use turul_rpc_service::{JsonType, MethodSignature};

/// Reports the caller address, when the service hands over the request
struct Whoami;

#[async_trait]
impl RpcHandler for Whoami {
    async fn call(&self, ctx: &CallContext<'_>, _params: Params) -> HandlerResult {
        let addr = ctx
            .request()
            .and_then(|request| request.remote_addr)
            .map(|addr| addr.to_string());
        ctx.record("lookup", "remote address");
        Ok(json!(addr))
    }
}

fn add(a: Number, b: Number) -> HandlerResult {
    match (a.as_i64(), b.as_i64()) {
        (Some(a), Some(b)) => Ok(json!(a + b)),
        _ => Ok(json!(a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default())),
    }
}

fn calculator() -> RpcServiceBuilder {
    RpcService::builder()
        .name("Calculator")
        .id("urn:example:calculator")
        .version("1.0")
        .method_with(
            "get_sum(foo=<num>, bar=<num>?) -> <num>",
            FnHandler::new(|_, params| add(params.get("foo")?, params.get("bar")?)),
            MethodOptions::new()
                .summary("Adds two numbers")
                .default_value("bar", json!(2)),
        )
        .unwrap()
        .method_with(
            "add_ints(a=<num>, b=<num>) -> <num>",
            FnHandler::new(|_, params| add(params.get("a")?, params.get("b")?)),
            MethodOptions::new().idempotent(),
        )
        .unwrap()
        .method(
            "fail() -> <nil>",
            FnHandler::new(|_, _| Err(anyhow::anyhow!("database connection refused"))),
        )
        .unwrap()
        .method_with("whoami() -> <str>", Whoami, MethodOptions::new().private())
        .unwrap()
}

async fn post(service: &RpcService, body: Value) -> Value {
    let reply = service.handle(&RpcHttpRequest::post(body.to_string())).await;
    assert_eq!(reply.status, http::StatusCode::OK);
    serde_json::from_str(reply.body_str()).unwrap()
}

fn call(method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "method": method, "params": params, "id": 1})
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[tokio::test]
async fn optional_param_takes_registered_default() {
    let service = calculator().build().unwrap();
    let reply = service
        .handle(&RpcHttpRequest::post(
            r#"{"jsonrpc":"2.0","method":"get_sum","params":{"foo":3},"id":1}"#,
        ))
        .await;
    assert_eq!(reply.content_type, "application/json");
    assert_eq!(reply.body_str(), r#"{"jsonrpc":"2.0","result":5,"id":1}"#);
}

#[tokio::test]
async fn get_with_jsonp_callback() {
    let service = calculator().build().unwrap();
    let query = format!(
        "json={}&jsoncallback=mycallback",
        encode(r#"{"jsonrpc":"2.0","method":"add_ints","params":[50,25],"id":1}"#)
    );
    let reply = service.handle(&RpcHttpRequest::get(query)).await;
    assert_eq!(reply.content_type, "application/javascript");
    assert_eq!(
        reply.body_str(),
        r#"mycallback({"jsonrpc":"2.0","result":75,"id":1})"#
    );
}

#[tokio::test]
async fn plain_get_is_not_padded() {
    let service = calculator().build().unwrap();
    let query = format!("json={}", encode(&call("add_ints", json!([1, 2])).to_string()));
    let reply = service.handle(&RpcHttpRequest::get(query)).await;
    assert_eq!(reply.content_type, "application/json");
    assert_eq!(reply.body_str(), r#"{"jsonrpc":"2.0","result":3,"id":1}"#);
}

#[tokio::test]
async fn extra_padding_names_are_honoured() {
    let service = calculator().padding_names(["cb"]).build().unwrap();
    let json = encode(&call("add_ints", json!([1, 2])).to_string());

    let reply = service
        .handle(&RpcHttpRequest::get(format!("json={}&cb=f", json)))
        .await;
    assert_eq!(reply.content_type, "application/javascript");
    assert_eq!(reply.body_str(), r#"f({"jsonrpc":"2.0","result":3,"id":1})"#);

    let reply = service
        .handle(&RpcHttpRequest::get(format!("json={}&callback=f", json)))
        .await;
    assert_eq!(reply.content_type, "application/json");
    assert_eq!(reply.body_str(), r#"{"jsonrpc":"2.0","result":3,"id":1}"#);
}

#[tokio::test]
async fn num_params_accept_fractions() {
    let service = calculator().build().unwrap();
    let reply = post(&service, call("get_sum", json!({"foo": 2.5}))).await;
    assert_eq!(reply["result"], json!(4.5));

    let reply = post(&service, call("add_ints", json!([0.5, 0.25]))).await;
    assert_eq!(reply["result"], json!(0.75));
}

#[tokio::test]
async fn result_and_id_echoed() {
    let service = calculator().build().unwrap();
    let reply = post(
        &service,
        json!({"jsonrpc": "2.0", "method": "get_sum", "params": [10, 5], "id": "req-7"}),
    )
    .await;
    assert_eq!(reply["result"], 15);
    assert_eq!(reply["id"], "req-7");
    assert!(reply.get("error").is_none());
}

#[tokio::test]
async fn notification_still_gets_a_reply() {
    let service = calculator().build().unwrap();
    let reply = post(
        &service,
        json!({"jsonrpc": "2.0", "method": "add_ints", "params": [1, 1]}),
    )
    .await;
    assert_eq!(reply["result"], 2);
    assert_eq!(reply["id"], Value::Null);
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let service = calculator().build().unwrap();
    let reply = post(&service, call("multiply", json!([2, 3]))).await;
    assert_eq!(reply["error"]["code"], -32601);
    assert_eq!(reply["id"], 1);
}

#[tokio::test]
async fn missing_required_param_is_named() {
    let service = calculator().build().unwrap();
    let reply = post(&service, call("get_sum", json!({"bar": 4}))).await;
    assert_eq!(reply["error"]["code"], -32602);
    assert!(reply["error"]["message"].as_str().unwrap().contains("foo"));
}

#[tokio::test]
async fn wrong_param_type_is_invalid_params() {
    let service = calculator().build().unwrap();
    let reply = post(&service, call("add_ints", json!(["NO!", 25]))).await;
    assert_eq!(reply["error"]["code"], -32602);
    assert!(reply["error"]["message"].as_str().unwrap().contains("`a`"));
}

#[tokio::test]
async fn malformed_payloads() {
    let service = calculator().build().unwrap();

    let reply = service.handle(&RpcHttpRequest::post("{\"jsonrpc\":")).await;
    let reply: Value = serde_json::from_str(reply.body_str()).unwrap();
    assert_eq!(reply["error"]["code"], -32700);
    assert_eq!(reply["id"], Value::Null);

    let reply = post(&service, json!({"jsonrpc": "1.0", "method": "add_ints", "id": 9})).await;
    assert_eq!(reply["error"]["code"], -32600);
    assert_eq!(reply["id"], 9);

    let reply = post(&service, json!({"jsonrpc": "2.0", "method": "add_ints", "params": 4, "id": 2})).await;
    assert_eq!(reply["error"]["code"], -32602);

    let reply = service.handle(&RpcHttpRequest::get("callback=cb")).await;
    assert!(reply.body_str().starts_with("cb("));
    assert!(reply.body_str().contains("-32600"));
}

#[tokio::test]
async fn handler_failure_hides_details_without_debug() {
    let service = calculator().build().unwrap();
    let reply = post(&service, call("fail", json!([]))).await;
    assert_eq!(reply["error"]["code"], -32603);
    assert!(reply["error"].get("data").is_none());
    assert!(reply.get("debug").is_none());
    assert!(!reply.to_string().contains("database"));
}

#[tokio::test]
async fn handler_failure_carries_diagnostics_with_debug() {
    let service = calculator().debug(true).build().unwrap();
    let reply = post(&service, call("fail", json!([]))).await;
    assert_eq!(reply["error"]["code"], -32603);
    let data = reply["error"]["data"].as_str().unwrap();
    assert!(data.contains("database connection refused"));
    assert!(reply["debug"]["error"].as_str().unwrap().contains("database"));
    assert!(reply["debug"]["elapsed_ms"].is_number());
}

#[tokio::test]
async fn debug_trace_collects_handler_operations() {
    let service = calculator().debug(true).provide_request(true).build().unwrap();
    let addr: SocketAddr = "10.0.0.7:4242".parse().unwrap();
    let reply = service
        .handle(
            &RpcHttpRequest::post(call("whoami", json!({})).to_string()).with_remote_addr(addr),
        )
        .await;
    let reply: Value = serde_json::from_str(reply.body_str()).unwrap();
    assert_eq!(reply["result"], "10.0.0.7:4242");
    assert_eq!(reply["debug"]["operations"]["count"], 1);
    assert_eq!(reply["debug"]["operations"]["data"][0]["label"], "lookup");
}

#[tokio::test]
async fn request_hidden_unless_provided() {
    let service = calculator().build().unwrap();
    let addr: SocketAddr = "10.0.0.7:4242".parse().unwrap();
    let reply = service
        .handle(
            &RpcHttpRequest::post(call("whoami", json!({})).to_string()).with_remote_addr(addr),
        )
        .await;
    let reply: Value = serde_json::from_str(reply.body_str()).unwrap();
    assert_eq!(reply["result"], Value::Null);
}

#[tokio::test]
async fn get_can_be_limited_to_safe_methods() {
    let service = calculator().allow_get(false).build().unwrap();
    let get = |body: Value| RpcHttpRequest::get(format!("json={}", encode(&body.to_string())));

    let reply = service.handle(&get(call("add_ints", json!([1, 2])))).await;
    let reply: Value = serde_json::from_str(reply.body_str()).unwrap();
    assert_eq!(reply["error"]["code"], -32601);

    // the built-in describe is safe
    let reply = service.handle(&get(call("system.describe", json!([])))).await;
    let reply: Value = serde_json::from_str(reply.body_str()).unwrap();
    assert_eq!(reply["result"]["name"], "Calculator");

    let reply = post(&service, call("add_ints", json!([1, 2]))).await;
    assert_eq!(reply["result"], 3);
}

#[tokio::test]
async fn describe_lists_public_methods_from_signatures() {
    let service = calculator().build().unwrap();
    let reply = post(&service, call("system.describe", json!({}))).await;
    let description = &reply["result"];

    assert_eq!(description["sdversion"], "1.0");
    assert_eq!(description["id"], "urn:example:calculator");
    let procs = description["procs"].as_array().unwrap();
    let names: Vec<_> = procs.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["get_sum", "add_ints", "fail"]);

    let get_sum = &procs[0];
    assert_eq!(get_sum["summary"], "Adds two numbers");
    assert_eq!(get_sum["returns"], "num");
    assert_eq!(
        get_sum["params"],
        json!([
            {"name": "foo", "type": "num", "optional": false},
            {"name": "bar", "type": "num", "optional": true}
        ])
    );
    assert_eq!(procs[1]["idempotent"], true);
}

#[tokio::test]
async fn described_signatures_parse_back_to_the_same_contract() {
    let service = calculator().build().unwrap();
    for proc in service.describe().procs {
        let reparsed = MethodSignature::parse(&proc.signature).unwrap();
        assert_eq!(reparsed.method_name, proc.name);
        assert_eq!(reparsed.return_type, proc.returns);
        let params: Vec<(String, JsonType, bool)> = reparsed
            .params
            .into_iter()
            .map(|p| (p.name, p.param_type, p.optional))
            .collect();
        let described: Vec<(String, JsonType, bool)> = proc
            .params
            .into_iter()
            .map(|p| (p.name, p.param_type, p.optional))
            .collect();
        assert_eq!(params, described);
    }
}

#[test]
fn malformed_declarations_add_nothing() {
    let mut registry = turul_rpc_service::Registry::new();
    for declaration in [
        "get_sum(foo=<num>, bar=<num>?",
        "get_sum(foo=<number>) -> <num>",
        "get_sum(foo) -> <num>",
        "get_sum(foo=<num>, foo=<str>) -> <num>",
    ] {
        let err = registry
            .register_declared(
                FnHandler::new(|_, _| Ok(json!(null))),
                declaration,
                MethodOptions::new(),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::Signature(_)), "{declaration}: {err}");
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn concurrent_requests_share_the_registry() {
    let service = calculator().build().unwrap();
    let tasks: Vec<_> = (0..16i64)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let reply = post(&service, call("add_ints", json!([i, i]))).await;
                reply["result"].as_i64()
            })
        })
        .collect();
    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), Some(2 * i as i64));
    }
}
