use anyhow::{anyhow, Result};
use solboard_config::{AppConfig, HoldingsMode};
use solboard_core_types::{ChallengeWindow, Holdings};
use tracing::debug;

mod balance;
pub mod http_utils;
mod live_holdings;
mod transfers;

pub use self::balance::RpcBalanceSource;
pub use self::live_holdings::{HeliusBalancesClient, LiveHoldingsSource, RpcTokenAccountsClient};
pub use self::transfers::TransferHoldingsSource;

/// Native SOL balance lookup for a wallet address.
pub trait BalanceSource: Send + Sync {
    fn balance_sol(&self, wallet: &str) -> Result<f64>;
}

/// Token holdings lookup for a wallet address.
///
/// Implementations drop malformed or non-positive entries themselves and only
/// return `Err` when the whole lookup failed.
pub trait HoldingsSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn holdings(&self, wallet: &str) -> Result<Holdings>;
}

/// Builds the holdings source selected by `holdings.mode`.
pub fn build_holdings_source(
    config: &AppConfig,
    window: &ChallengeWindow,
) -> Result<Box<dyn HoldingsSource>> {
    let holdings = &config.holdings;
    let mode = holdings
        .holdings_mode()
        .ok_or_else(|| anyhow!("holdings.mode must be one of live|transfers"))?;
    debug!(mode = mode.as_str(), "building holdings source");
    match mode {
        HoldingsMode::Live => {
            let rpc = RpcTokenAccountsClient::new(
                &config.rpc.http_url,
                holdings.timeout_ms,
                config.rpc.request_delay_ms,
            )?;
            let helius = if holdings.helius_fallback_enabled {
                Some(HeliusBalancesClient::new(
                    &holdings.helius_api_base,
                    &holdings.helius_api_key,
                    holdings.timeout_ms,
                )?)
            } else {
                None
            };
            Ok(Box::new(LiveHoldingsSource::new(rpc, helius)))
        }
        HoldingsMode::Transfers => Ok(Box::new(TransferHoldingsSource::new(
            &holdings.solscan_base_url,
            &holdings.solscan_api_key,
            holdings.transfer_page_limit,
            window.start,
            holdings.timeout_ms,
        )?)),
    }
}

pub(crate) fn accumulate(holdings: &mut Holdings, mint: &str, amount: f64) -> bool {
    if mint.trim().is_empty() || !amount.is_finite() || amount <= 0.0 {
        return false;
    }
    *holdings.entry(mint.to_string()).or_insert(0.0) += amount;
    true
}

pub(crate) fn scale_raw_amount(raw: f64, decimals: u32) -> f64 {
    raw / 10f64.powi(decimals.min(64) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_sums_and_skips_non_positive() {
        let mut holdings = Holdings::new();
        assert!(accumulate(&mut holdings, "mint-a", 1.5));
        assert!(accumulate(&mut holdings, "mint-a", 2.0));
        assert!(!accumulate(&mut holdings, "mint-b", 0.0));
        assert!(!accumulate(&mut holdings, "mint-c", -3.0));
        assert!(!accumulate(&mut holdings, "", 1.0));
        assert!(!accumulate(&mut holdings, "mint-d", f64::NAN));
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings.get("mint-a"), Some(&3.5));
    }

    #[test]
    fn build_holdings_source_follows_configured_mode() -> Result<()> {
        use chrono::{TimeZone, Utc};
        let window = ChallengeWindow {
            start: Utc.with_ymd_and_hms(2025, 7, 27, 22, 0, 1).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 8, 10, 22, 0, 0).unwrap(),
        };
        let mut config = AppConfig::default();
        config.holdings.helius_api_key = "test-key".to_string();
        assert_eq!(build_holdings_source(&config, &window)?.name(), "live");

        config.holdings.mode = "transfers".to_string();
        assert_eq!(build_holdings_source(&config, &window)?.name(), "transfers");

        config.holdings.mode = "ledger".to_string();
        assert!(build_holdings_source(&config, &window).is_err());
        Ok(())
    }

    #[test]
    fn scale_raw_amount_applies_decimals() {
        assert_eq!(scale_raw_amount(1_500_000.0, 6), 1.5);
        assert_eq!(scale_raw_amount(42.0, 0), 42.0);
    }
}
