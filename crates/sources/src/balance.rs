use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use solboard_core_types::LAMPORTS_PER_SOL;

use crate::http_utils::{build_blocking_client, post_rpc};
use crate::BalanceSource;

#[derive(Debug, Clone)]
pub struct RpcBalanceSource {
    endpoint: String,
    client: Client,
}

impl RpcBalanceSource {
    pub fn new(http_url: &str, timeout_ms: u64) -> Result<Self> {
        let endpoint = http_url.trim();
        if endpoint.is_empty() {
            return Err(anyhow!("rpc endpoint is empty"));
        }
        Ok(Self {
            endpoint: endpoint.to_string(),
            client: build_blocking_client(timeout_ms)?,
        })
    }

    fn query_balance_lamports(&self, wallet: &str) -> Result<u64> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getBalance",
            "params": [wallet]
        });
        let body = post_rpc(&self.client, &self.endpoint, &payload)?;
        parse_balance_lamports_from_rpc_body(&body)
    }
}

impl BalanceSource for RpcBalanceSource {
    fn balance_sol(&self, wallet: &str) -> Result<f64> {
        let lamports = self.query_balance_lamports(wallet)?;
        Ok(lamports_to_sol(lamports))
    }
}

pub(crate) fn parse_balance_lamports_from_rpc_body(body: &Value) -> Result<u64> {
    if let Some(error_payload) = body.get("error") {
        return Err(anyhow!("rpc returned error payload: {}", error_payload));
    }
    body.get("result")
        .and_then(|result| result.get("value"))
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("missing result.value lamports"))
}

fn lamports_to_sol(lamports: u64) -> f64 {
    (lamports as f64) / LAMPORTS_PER_SOL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_balance_lamports_from_rpc_body_returns_value() -> Result<()> {
        let body = json!({
            "jsonrpc": "2.0",
            "result": {
                "context": {"slot": 1},
                "value": 12_000_000_000u64
            },
            "id": 1
        });
        let lamports = parse_balance_lamports_from_rpc_body(&body)?;
        assert_eq!(lamports, 12_000_000_000);
        assert_eq!(lamports_to_sol(lamports), 12.0);
        Ok(())
    }

    #[test]
    fn parse_balance_lamports_from_rpc_body_errors_on_error_payload() {
        let body = json!({
            "jsonrpc": "2.0",
            "error": {"code": -32602, "message": "Invalid param: WrongSize"},
            "id": 1
        });
        assert!(parse_balance_lamports_from_rpc_body(&body).is_err());
    }

    #[test]
    fn parse_balance_lamports_from_rpc_body_errors_on_missing_value() {
        let body = json!({"jsonrpc": "2.0", "result": {"context": {"slot": 1}}, "id": 1});
        assert!(parse_balance_lamports_from_rpc_body(&body).is_err());
    }

    #[test]
    fn new_rejects_empty_endpoint() {
        assert!(RpcBalanceSource::new("  ", 1_000).is_err());
    }
}
