use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use solboard_sources::http_utils::{
    build_blocking_client, classify_request_error, is_network_error, read_json_response,
    redacted_endpoint_label, value_as_f64,
};
use tracing::debug;

use crate::{QuoteDenomination, QuoteProvider};

#[derive(Debug)]
pub(crate) struct QuoteAttemptError {
    error: anyhow::Error,
    retryable: bool,
}

impl QuoteAttemptError {
    pub(crate) fn retryable(error: anyhow::Error) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    pub(crate) fn terminal(error: anyhow::Error) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

/// Jupiter price API quoted against a fixed `vsToken`.
#[derive(Debug, Clone)]
pub struct JupiterPriceClient {
    price_url: String,
    vs_token: String,
    denomination: QuoteDenomination,
    max_attempts: u32,
    client: Client,
}

impl JupiterPriceClient {
    pub fn new(
        price_url: &str,
        vs_token: &str,
        denomination: QuoteDenomination,
        max_attempts: u32,
        timeout_ms: u64,
    ) -> Result<Self> {
        let price_url = price_url.trim();
        if price_url.is_empty() {
            return Err(anyhow!("jupiter price url is empty"));
        }
        if max_attempts == 0 {
            return Err(anyhow!("jupiter max attempts must be >= 1"));
        }
        Ok(Self {
            price_url: price_url.to_string(),
            vs_token: vs_token.trim().to_string(),
            denomination,
            max_attempts,
            client: build_blocking_client(timeout_ms)?,
        })
    }

    fn fetch_once(&self, mint: &str) -> std::result::Result<Option<f64>, QuoteAttemptError> {
        let response = self
            .client
            .get(&self.price_url)
            .query(&[("ids", mint), ("vsToken", self.vs_token.as_str())])
            .send()
            .map_err(|error| {
                let class = classify_request_error(&error);
                let wrapped = anyhow!(
                    "jupiter request failed class={} endpoint={}: {}",
                    class,
                    redacted_endpoint_label(&self.price_url),
                    error
                );
                if is_network_error(&error) {
                    QuoteAttemptError::retryable(wrapped)
                } else {
                    QuoteAttemptError::terminal(wrapped)
                }
            })?;
        let body =
            read_json_response(response, &self.price_url).map_err(QuoteAttemptError::terminal)?;
        Ok(parse_jupiter_price(&body, mint))
    }
}

impl QuoteProvider for JupiterPriceClient {
    fn name(&self) -> &'static str {
        "jupiter"
    }

    fn denomination(&self) -> QuoteDenomination {
        self.denomination
    }

    fn quote(&self, mint: &str) -> Result<Option<f64>> {
        run_with_attempt_budget(self.max_attempts, |attempt| {
            debug!(mint, attempt, vs_token = %self.vs_token, "jupiter price attempt");
            self.fetch_once(mint)
        })
    }
}

/// Runs `attempt` until it succeeds, fails terminally or the budget is spent.
/// There is no delay between attempts.
pub(crate) fn run_with_attempt_budget<F>(max_attempts: u32, mut attempt: F) -> Result<Option<f64>>
where
    F: FnMut(u32) -> std::result::Result<Option<f64>, QuoteAttemptError>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt_no = 1;
    loop {
        match attempt(attempt_no) {
            Ok(price) => return Ok(price.filter(|price| price.is_finite() && *price > 0.0)),
            Err(failure) if failure.retryable && attempt_no < max_attempts => {
                debug!(
                    attempt = attempt_no,
                    max_attempts,
                    error = %failure.error,
                    "retrying jupiter price after network error"
                );
                attempt_no += 1;
            }
            Err(failure) => {
                return Err(failure
                    .error
                    .context(format!("jupiter price failed after {attempt_no} attempt(s)")));
            }
        }
    }
}

/// `data` is keyed by the requested id and omits ids Jupiter cannot price.
pub(crate) fn parse_jupiter_price(body: &Value, mint: &str) -> Option<f64> {
    body.get("data")
        .and_then(|data| data.get(mint))
        .and_then(|entry| entry.get("price"))
        .and_then(value_as_f64)
        .filter(|price| *price > 0.0)
}
