use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use solboard_core_types::Holdings;
use std::thread;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};

use crate::http_utils::{
    build_blocking_client, post_rpc, read_json_response, redacted_endpoint_label, value_as_f64,
    value_as_u32,
};
use crate::{accumulate, scale_raw_amount, HoldingsSource};

const SPL_TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPfvXJ4bKbPDPqbL6tLZvg";

#[derive(Debug, Clone)]
pub struct RpcTokenAccountsClient {
    endpoint: String,
    request_delay: StdDuration,
    client: Client,
}

impl RpcTokenAccountsClient {
    pub fn new(http_url: &str, timeout_ms: u64, request_delay_ms: u64) -> Result<Self> {
        let endpoint = http_url.trim();
        if endpoint.is_empty() {
            return Err(anyhow!("rpc endpoint is empty"));
        }
        Ok(Self {
            endpoint: endpoint.to_string(),
            request_delay: StdDuration::from_millis(request_delay_ms),
            client: build_blocking_client(timeout_ms)?,
        })
    }

    pub fn token_holdings(&self, wallet: &str) -> Result<Holdings> {
        if !self.request_delay.is_zero() {
            thread::sleep(self.request_delay);
        }
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getTokenAccountsByOwner",
            "params": [
                wallet,
                { "programId": SPL_TOKEN_PROGRAM_ID },
                { "encoding": "jsonParsed" }
            ]
        });
        let body = post_rpc(&self.client, &self.endpoint, &payload)?;
        let (holdings, skipped) = parse_token_accounts_from_rpc_body(&body)?;
        debug!(
            wallet,
            tokens = holdings.len(),
            skipped,
            "rpc token accounts parsed"
        );
        Ok(holdings)
    }
}

#[derive(Debug, Clone)]
pub struct HeliusBalancesClient {
    api_base: String,
    api_key: String,
    client: Client,
}

impl HeliusBalancesClient {
    pub fn new(api_base: &str, api_key: &str, timeout_ms: u64) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() || api_key.contains("REPLACE_ME") {
            return Err(anyhow!("helius api key is not configured"));
        }
        Ok(Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: build_blocking_client(timeout_ms)?,
        })
    }

    pub fn token_holdings(&self, wallet: &str) -> Result<Holdings> {
        let url = format!("{}/v0/addresses/{}/balances", self.api_base, wallet);
        let response = self
            .client
            .get(&url)
            .query(&[("api-key", self.api_key.as_str())])
            .send()
            .with_context(|| {
                format!(
                    "helius balances request failed endpoint={}",
                    redacted_endpoint_label(&url)
                )
            })?;
        let body = read_json_response(response, &url)?;
        let (holdings, skipped) = parse_helius_balances_body(&body)?;
        debug!(
            wallet,
            tokens = holdings.len(),
            skipped,
            "helius balances parsed"
        );
        Ok(holdings)
    }
}

/// Current token balances: Solana RPC first, Helius when the RPC yields nothing.
#[derive(Debug, Clone)]
pub struct LiveHoldingsSource {
    rpc: RpcTokenAccountsClient,
    helius: Option<HeliusBalancesClient>,
}

impl LiveHoldingsSource {
    pub fn new(rpc: RpcTokenAccountsClient, helius: Option<HeliusBalancesClient>) -> Self {
        Self { rpc, helius }
    }
}

impl HoldingsSource for LiveHoldingsSource {
    fn name(&self) -> &'static str {
        "live"
    }

    fn holdings(&self, wallet: &str) -> Result<Holdings> {
        let rpc_result = self.rpc.token_holdings(wallet);
        let Some(helius) = self.helius.as_ref() else {
            return rpc_result;
        };
        match rpc_result {
            Ok(holdings) if !holdings.is_empty() => Ok(holdings),
            Ok(_) => {
                debug!(wallet, "rpc returned no tokens, trying helius fallback");
                helius.token_holdings(wallet)
            }
            Err(error) => {
                warn!(
                    wallet,
                    error = %error,
                    "rpc token accounts lookup failed, trying helius fallback"
                );
                helius.token_holdings(wallet)
            }
        }
    }
}

pub(crate) fn parse_token_accounts_from_rpc_body(body: &Value) -> Result<(Holdings, usize)> {
    if let Some(error_payload) = body.get("error") {
        return Err(anyhow!("rpc returned error payload: {}", error_payload));
    }
    let accounts = body
        .get("result")
        .and_then(|result| result.get("value"))
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("missing result.value token accounts array"))?;

    let mut holdings = Holdings::new();
    let mut skipped = 0;
    for account in accounts {
        let Some(info) = account.pointer("/account/data/parsed/info") else {
            skipped += 1;
            continue;
        };
        let mint = info.get("mint").and_then(Value::as_str).unwrap_or_default();
        let token_amount = info.get("tokenAmount");
        let raw_amount = token_amount
            .and_then(|amount| amount.get("amount"))
            .and_then(value_as_f64);
        let decimals = token_amount
            .and_then(|amount| amount.get("decimals"))
            .and_then(value_as_u32);
        let amount = match (raw_amount, decimals) {
            (Some(raw), Some(decimals)) => Some(scale_raw_amount(raw, decimals)),
            _ => token_amount
                .and_then(|amount| amount.get("uiAmount"))
                .and_then(value_as_f64),
        };
        let Some(amount) = amount else {
            skipped += 1;
            continue;
        };
        if !accumulate(&mut holdings, mint, amount) {
            skipped += 1;
        }
    }
    Ok((holdings, skipped))
}

pub(crate) fn parse_helius_balances_body(body: &Value) -> Result<(Holdings, usize)> {
    let tokens = body
        .get("tokens")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("missing tokens array in helius balances response"))?;

    let mut holdings = Holdings::new();
    let mut skipped = 0;
    for token in tokens {
        let mint = token.get("mint").and_then(Value::as_str).unwrap_or_default();
        let raw_amount = token.get("amount").and_then(value_as_f64);
        let decimals = token.get("decimals").and_then(value_as_u32).unwrap_or(0);
        let Some(raw_amount) = raw_amount else {
            skipped += 1;
            continue;
        };
        if !accumulate(&mut holdings, mint, scale_raw_amount(raw_amount, decimals)) {
            skipped += 1;
        }
    }
    Ok((holdings, skipped))
}
