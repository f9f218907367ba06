//! # Calculator JSON-RPC Server
//!
//! Serves a few methods on `http://127.0.0.1:8000/rpc`:
//!
//! ```text
//! curl -s localhost:8000/rpc -d '{"jsonrpc":"2.0","method":"get_sum","params":{"foo":3},"id":1}'
//! curl -s 'localhost:8000/rpc?json=%7B%22jsonrpc%22%3A%222.0%22%2C%22method%22%3A%22add_ints%22%2C%22params%22%3A%5B50%2C25%5D%2C%22id%22%3A1%7D&jsoncallback=mycallback'
//! curl -s localhost:8000/rpc -d '{"jsonrpc":"2.0","method":"system.describe","id":2}'
//! ```
//!
//! Set `RPC_DEBUG=1` to attach debug traces to replies, and `RUST_LOG` to
//! change log verbosity.

use futures::FutureExt;
use serde_json::{Number, Value, json};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use turul_http_rpc_server::HttpRpcServer;
use turul_rpc_service::prelude::*;

/// Adds two JSON numbers, staying integral while both operands are integers
fn add_numbers(a: &Number, b: &Number) -> anyhow::Result<Value> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        let sum = a
            .checked_add(b)
            .ok_or_else(|| JsonRpcErrorObject::server_error(-32010, "Integer overflow", None))?;
        return Ok(json!(sum));
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => Ok(json!(a + b)),
        _ => Err(anyhow::anyhow!("cannot add {} and {}", a, b)),
    }
}

async fn echo(params: Params) -> HandlerResult {
    let message: String = params.get("message")?;
    let times = params.get_opt::<usize>("times")?.unwrap_or(1);
    Ok(json!(vec![message; times]))
}

fn build_service(debug: bool) -> Result<RpcService, RegistryError> {
    RpcService::builder()
        .name("Calculator")
        .id("urn:turul:calculator")
        .version(env!("CARGO_PKG_VERSION"))
        .summary("Arithmetic over JSON-RPC")
        .address("http://127.0.0.1:8000/rpc")
        .debug(debug)
        .provide_request(true)
        .method_with(
            "get_sum(foo=<num>, bar=<num>?) -> <num>",
            FnHandler::new(|_, params| add_numbers(&params.get("foo")?, &params.get("bar")?)),
            MethodOptions::new()
                .summary("Adds foo and bar; bar defaults to 2")
                .idempotent()
                .default_value("bar", json!(2)),
        )?
        .method_with(
            "add_ints(a=<num>, b=<num>) -> <num>",
            FnHandler::new(|ctx, params| {
                let started = Instant::now();
                let sum = add_numbers(&params.get("a")?, &params.get("b")?)?;
                ctx.trace().record_timed("add", sum.to_string(), started.elapsed());
                Ok(json!(sum))
            }),
            MethodOptions::new().summary("Adds two numbers").safe().idempotent(),
        )?
        .method(
            "echo(message=<str>, times=<num>?) -> <array>",
            AsyncFnHandler::new(|params| echo(params).boxed()),
        )?
        .method(
            "whoami() -> <any>",
            FnHandler::new(|ctx, _| {
                let addr = ctx.request().and_then(|request| request.remote_addr);
                ctx.record("whoami", "read remote address");
                Ok(json!(addr.map(|addr| addr.to_string())))
            }),
        )?
        .method_with(
            "fail(reason=<str>?) -> <nil>",
            FnHandler::new(|_, params| {
                let reason = params
                    .get_opt::<String>("reason")?
                    .unwrap_or_else(|| "no reason given".to_string());
                Err(anyhow::anyhow!("requested failure: {}", reason))
            }),
            MethodOptions::new().private(),
        )?
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let debug_enabled = std::env::var("RPC_DEBUG").is_ok_and(|value| value == "1");
    info!("Starting calculator JSON-RPC server (debug: {})", debug_enabled);

    let service = build_service(debug_enabled)?;
    let server = HttpRpcServer::builder(service)
        .bind_address("127.0.0.1:8000".parse()?)
        .build()?;

    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(value: Value) -> Number {
        match value {
            Value::Number(n) => n,
            other => panic!("not a number: {other}"),
        }
    }

    #[test]
    fn test_integer_sum_stays_integral() {
        let sum = add_numbers(&num(json!(50)), &num(json!(25))).unwrap();
        assert_eq!(sum.to_string(), "75");
    }

    #[test]
    fn test_fractional_operands() {
        let sum = add_numbers(&num(json!(2.5)), &num(json!(2))).unwrap();
        assert_eq!(sum, json!(4.5));
    }

    #[test]
    fn test_integer_overflow_is_reported() {
        let err = add_numbers(&num(json!(i64::MAX)), &num(json!(1))).unwrap_err();
        let error = err.downcast_ref::<JsonRpcErrorObject>().unwrap();
        assert_eq!(error.code, -32010);
    }

    #[tokio::test]
    async fn test_get_sum_accepts_fractions() {
        let service = build_service(false).unwrap();
        let reply = service
            .handle(&RpcHttpRequest::post(
                r#"{"jsonrpc":"2.0","method":"get_sum","params":{"foo":2.5},"id":1}"#,
            ))
            .await;
        assert_eq!(reply.body_str(), r#"{"jsonrpc":"2.0","result":4.5,"id":1}"#);
    }
}
