use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde_json::Value;
use solboard_core_types::Holdings;
use tracing::debug;

use crate::http_utils::{
    build_blocking_client, read_json_response, redacted_endpoint_label, value_as_f64, value_as_u32,
};
use crate::{accumulate, scale_raw_amount, HoldingsSource};

/// Holdings rebuilt from incoming SPL transfers since the challenge started.
///
/// Only inflows count: a wallet that sells keeps the received quantity.
#[derive(Debug, Clone)]
pub struct TransferHoldingsSource {
    base_url: String,
    api_key: Option<String>,
    page_limit: u32,
    window_start: DateTime<Utc>,
    client: Client,
}

impl TransferHoldingsSource {
    pub fn new(
        base_url: &str,
        api_key: &str,
        page_limit: u32,
        window_start: DateTime<Utc>,
        timeout_ms: u64,
    ) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(anyhow!("solscan base url is empty"));
        }
        let api_key = Some(api_key.trim())
            .filter(|key| !key.is_empty())
            .map(str::to_string);
        Ok(Self {
            base_url: base_url.to_string(),
            api_key,
            page_limit: page_limit.max(1),
            window_start,
            client: build_blocking_client(timeout_ms)?,
        })
    }
}

impl HoldingsSource for TransferHoldingsSource {
    fn name(&self) -> &'static str {
        "transfers"
    }

    fn holdings(&self, wallet: &str) -> Result<Holdings> {
        let url = format!("{}/account/splTransfers", self.base_url);
        let limit = self.page_limit.to_string();
        let mut request = self
            .client
            .get(&url)
            .query(&[("account", wallet), ("limit", limit.as_str())]);
        if let Some(api_key) = self.api_key.as_deref() {
            request = request.header("token", api_key);
        }
        let response = request.send().with_context(|| {
            format!(
                "solscan transfers request failed endpoint={}",
                redacted_endpoint_label(&url)
            )
        })?;
        let body = read_json_response(response, &url)?;
        let (holdings, skipped) = parse_spl_transfers(&body, wallet, self.window_start)?;
        debug!(
            wallet,
            tokens = holdings.len(),
            skipped,
            "solscan transfers accumulated"
        );
        Ok(holdings)
    }
}

/// Returns accumulated holdings and the number of entries that failed to parse.
/// Transfers to other destinations or before `window_start` are filtered, not
/// counted as skipped.
pub(crate) fn parse_spl_transfers(
    body: &Value,
    wallet: &str,
    window_start: DateTime<Utc>,
) -> Result<(Holdings, usize)> {
    let transfers = body
        .as_array()
        .or_else(|| body.get("data").and_then(Value::as_array))
        .ok_or_else(|| anyhow!("solscan transfers response is not an array"))?;

    let start_ts = window_start.timestamp();
    let mut holdings = Holdings::new();
    let mut skipped = 0;
    for transfer in transfers {
        if transfer.get("destination").and_then(Value::as_str) != Some(wallet) {
            continue;
        }
        let Some(block_time) = transfer.get("blockTime").and_then(Value::as_i64) else {
            skipped += 1;
            continue;
        };
        if block_time < start_ts {
            continue;
        }
        let mint = transfer
            .get("tokenAddress")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let raw_amount = transfer.get("changeAmount").and_then(value_as_f64);
        let decimals = transfer.get("tokenDecimal").and_then(value_as_u32);
        let (Some(raw_amount), Some(decimals)) = (raw_amount, decimals) else {
            skipped += 1;
            continue;
        };
        if !accumulate(&mut holdings, mint, scale_raw_amount(raw_amount, decimals)) {
            skipped += 1;
        }
    }
    Ok((holdings, skipped))
}
