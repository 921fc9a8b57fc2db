use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use solboard_sources::http_utils::{
    build_blocking_client, read_json_response, redacted_endpoint_label, value_as_f64,
};
use std::cmp::Ordering;
use tracing::debug;

use crate::{QuoteDenomination, QuoteProvider};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DexPair {
    base_token: DexToken,
    quote_token: DexToken,
    #[serde(default)]
    price_usd: Option<Value>,
    #[serde(default)]
    liquidity: Option<DexLiquidity>,
}

#[derive(Debug, Clone, Deserialize)]
struct DexToken {
    address: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DexLiquidity {
    #[serde(default)]
    usd: Option<f64>,
}

impl DexPair {
    fn liquidity_usd(&self) -> f64 {
        self.liquidity
            .as_ref()
            .and_then(|liquidity| liquidity.usd)
            .filter(|usd| usd.is_finite())
            .unwrap_or(0.0)
    }

    fn price_usd(&self) -> Option<f64> {
        self.price_usd.as_ref().and_then(value_as_f64)
    }
}

/// Liquidity-ranked USD quotes from DexScreener.
#[derive(Debug, Clone)]
pub struct DexScreenerClient {
    base_url: String,
    client: Client,
}

impl DexScreenerClient {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(anyhow!("dexscreener base url is empty"));
        }
        Ok(Self {
            base_url: base_url.to_string(),
            client: build_blocking_client(timeout_ms)?,
        })
    }

    fn fetch_pairs(&self, url: &str, query: Option<(&str, &str)>) -> Result<Vec<Value>> {
        let mut request = self.client.get(url);
        if let Some(query) = query {
            request = request.query(&[query]);
        }
        let response = request.send().with_context(|| {
            format!(
                "dexscreener request failed endpoint={}",
                redacted_endpoint_label(url)
            )
        })?;
        let body = read_json_response(response, url)?;
        Ok(pairs_from_body(&body))
    }
}

impl QuoteProvider for DexScreenerClient {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    fn denomination(&self) -> QuoteDenomination {
        QuoteDenomination::Usd
    }

    fn quote(&self, mint: &str) -> Result<Option<f64>> {
        let tokens_url = format!("{}/dex/tokens/{}", self.base_url, mint);
        let mut pairs = self.fetch_pairs(&tokens_url, None)?;
        if pairs.is_empty() {
            debug!(mint, "no dexscreener pairs by token address, trying search");
            let search_url = format!("{}/dex/search", self.base_url);
            pairs = self.fetch_pairs(&search_url, Some(("q", mint)))?;
        }
        Ok(select_usd_price(&pairs, mint))
    }
}

/// `pairs` is `null` when DexScreener knows nothing about the token.
fn pairs_from_body(body: &Value) -> Vec<Value> {
    body.get("pairs")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Picks the USD price of `mint` from the deepest pool that lists it.
///
/// Pairs that fail to deserialize or carry a non-positive price are skipped.
/// When the mint is the quote side, the inverse of `priceUsd` is used.
pub(crate) fn select_usd_price(pairs: &[Value], mint: &str) -> Option<f64> {
    let mut parsed: Vec<DexPair> = pairs
        .iter()
        .filter_map(|pair| serde_json::from_value::<DexPair>(pair.clone()).ok())
        .collect();
    parsed.sort_by(|a, b| {
        b.liquidity_usd()
            .partial_cmp(&a.liquidity_usd())
            .unwrap_or(Ordering::Equal)
    });

    parsed.iter().find_map(|pair| {
        let price_usd = pair.price_usd()?;
        if price_usd <= 0.0 {
            return None;
        }
        let price = if pair.base_token.address == mint {
            price_usd
        } else if pair.quote_token.address == mint {
            1.0 / price_usd
        } else {
            return None;
        };
        (price.is_finite() && price > 0.0).then_some(price)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_http::spawn_scripted_server;
    use serde_json::json;

    fn pair(base: &str, quote: &str, price_usd: Value, liquidity_usd: Value) -> Value {
        json!({
            "chainId": "solana",
            "dexId": "raydium",
            "baseToken": {"address": base, "symbol": "BASE"},
            "quoteToken": {"address": quote, "symbol": "QUOTE"},
            "priceUsd": price_usd,
            "liquidity": {"usd": liquidity_usd}
        })
    }

    #[test]
    fn select_usd_price_prefers_deepest_pool() {
        let pairs = vec![
            pair("mint-a", "sol", json!("0.10"), json!(1_000.0)),
            pair("mint-a", "usdc", json!("0.12"), json!(250_000.0)),
            pair("mint-a", "sol", json!("0.11"), json!(5_000.0)),
        ];
        assert_eq!(select_usd_price(&pairs, "mint-a"), Some(0.12));
    }

    #[test]
    fn select_usd_price_keeps_provider_order_on_equal_liquidity() {
        let pairs = vec![
            pair("mint-a", "sol", json!("0.20"), json!(100.0)),
            pair("mint-a", "usdc", json!("0.30"), json!(100.0)),
        ];
        assert_eq!(select_usd_price(&pairs, "mint-a"), Some(0.20));
    }

    #[test]
    fn select_usd_price_inverts_quote_side_price() {
        let pairs = vec![pair("other", "mint-q", json!("4"), json!(10.0))];
        assert_eq!(select_usd_price(&pairs, "mint-q"), Some(0.25));
    }

    #[test]
    fn select_usd_price_skips_unusable_pairs() {
        let pairs = vec![
            pair("mint-a", "sol", json!("0"), json!(900_000.0)),
            pair("mint-a", "sol", json!("garbage"), json!(800_000.0)),
            json!({"baseToken": "not-an-object"}),
            pair("unrelated", "sol", json!("7"), json!(700_000.0)),
            pair("mint-a", "sol", json!(0.05), json!(null)),
        ];
        assert_eq!(select_usd_price(&pairs, "mint-a"), Some(0.05));
    }

    #[test]
    fn select_usd_price_returns_none_without_pairs() {
        assert_eq!(select_usd_price(&[], "mint-a"), None);
    }

    #[test]
    fn pairs_from_body_treats_null_as_empty() {
        assert!(pairs_from_body(&json!({"schemaVersion": "1.0.0", "pairs": null})).is_empty());
        assert_eq!(pairs_from_body(&json!({"pairs": [{}]})).len(), 1);
    }

    #[test]
    fn quote_falls_back_to_search_when_token_lookup_is_empty() -> Result<()> {
        let Some((base_url, server)) = spawn_scripted_server(vec![
            (200, json!({"schemaVersion": "1.0.0", "pairs": null})),
            (
                200,
                json!({"pairs": [pair("MINTX", "usdc", json!("2.5"), json!(40_000.0))]}),
            ),
        ]) else {
            return Ok(());
        };
        let client = DexScreenerClient::new(&base_url, 2_000)?;
        assert_eq!(client.quote("MINTX")?, Some(2.5));
        let targets = server.join().expect("server thread");
        assert_eq!(targets, vec!["/dex/tokens/MINTX", "/dex/search?q=MINTX"]);
        Ok(())
    }

    #[test]
    fn quote_skips_search_when_token_lookup_has_pairs() -> Result<()> {
        let Some((base_url, server)) = spawn_scripted_server(vec![(
            200,
            json!({"pairs": [pair("other", "MINTQ", json!("4"), json!(10.0))]}),
        )]) else {
            return Ok(());
        };
        let client = DexScreenerClient::new(&base_url, 2_000)?;
        assert_eq!(client.quote("MINTQ")?, Some(0.25));
        assert_eq!(server.join().expect("server thread"), vec!["/dex/tokens/MINTQ"]);
        Ok(())
    }

    #[test]
    fn quote_propagates_http_status_errors() -> Result<()> {
        let Some((base_url, server)) =
            spawn_scripted_server(vec![(429, json!({"error": "rate limited"}))])
        else {
            return Ok(());
        };
        let client = DexScreenerClient::new(&base_url, 2_000)?;
        let err = client.quote("MINTX").expect_err("rate limited");
        assert!(format!("{err:#}").contains("http status=429"));
        server.join().expect("server thread");
        Ok(())
    }
}
