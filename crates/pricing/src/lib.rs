use anyhow::Result;
use solboard_config::PricingConfig;
use solboard_core_types::SOL_MINT;

mod cache;
mod dexscreener;
mod jupiter;
mod resolver;
#[cfg(test)]
mod test_http;

pub use self::cache::QuoteCache;
pub use self::dexscreener::DexScreenerClient;
pub use self::jupiter::JupiterPriceClient;
pub use self::resolver::{PriceResolution, PriceResolver, ReferenceRateResolver};

/// Unit a provider quotes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteDenomination {
    Usd,
    Native,
}

impl QuoteDenomination {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Native => "native",
        }
    }
}

/// One external price source.
///
/// `Ok(None)` means the provider answered but had no usable price for the
/// mint; `Err` means the lookup itself failed. Callers treat both as
/// "try the next provider".
pub trait QuoteProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn denomination(&self) -> QuoteDenomination;
    fn quote(&self, mint: &str) -> Result<Option<f64>>;
}

/// Token price chain: DexScreener (USD) first, Jupiter vs SOL second.
pub fn build_price_resolver(config: &PricingConfig) -> Result<PriceResolver> {
    let dexscreener = DexScreenerClient::new(&config.dexscreener_base_url, config.timeout_ms)?;
    let jupiter = JupiterPriceClient::new(
        &config.jupiter_price_url,
        SOL_MINT,
        QuoteDenomination::Native,
        config.jupiter_max_attempts,
        config.timeout_ms,
    )?;
    Ok(PriceResolver::new(vec![
        Box::new(dexscreener),
        Box::new(jupiter),
    ]))
}

/// SOL/USD chain: Jupiter vs the USD reference mint first, DexScreener second.
pub fn build_reference_rate_resolver(config: &PricingConfig) -> Result<ReferenceRateResolver> {
    let jupiter = JupiterPriceClient::new(
        &config.jupiter_price_url,
        &config.usd_reference_mint,
        QuoteDenomination::Usd,
        config.jupiter_max_attempts,
        config.timeout_ms,
    )?;
    let dexscreener = DexScreenerClient::new(&config.dexscreener_base_url, config.timeout_ms)?;
    Ok(ReferenceRateResolver::new(vec![
        Box::new(jupiter),
        Box::new(dexscreener),
    ]))
}
