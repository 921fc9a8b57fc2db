use solboard_core_types::{Valued, SOL_MINT};
use tracing::{debug, warn};

use crate::{QuoteDenomination, QuoteProvider};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceResolution {
    /// Price in SOL; 0 when no provider produced a usable quote.
    pub price_native: f64,
    pub source: Option<&'static str>,
}

impl PriceResolution {
    pub fn unresolved() -> Self {
        Self {
            price_native: 0.0,
            source: None,
        }
    }

    pub fn valued(&self) -> Valued {
        Valued::positive(self.price_native)
    }
}

/// Ordered provider chain converting a mint into a SOL price.
pub struct PriceResolver {
    providers: Vec<Box<dyn QuoteProvider>>,
}

impl PriceResolver {
    pub fn new(providers: Vec<Box<dyn QuoteProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    /// USD quotes need `native_usd_rate > 0`; with no rate those providers
    /// are passed over and the chain continues with native-denominated ones.
    pub fn resolve(&self, mint: &str, native_usd_rate: f64) -> PriceResolution {
        let rate_available = native_usd_rate.is_finite() && native_usd_rate > 0.0;
        for provider in &self.providers {
            let denomination = provider.denomination();
            if denomination == QuoteDenomination::Usd && !rate_available {
                debug!(
                    mint,
                    provider = provider.name(),
                    "skipping usd provider without sol/usd rate"
                );
                continue;
            }
            let quote = match provider.quote(mint) {
                Ok(Some(quote)) => quote,
                Ok(None) => {
                    debug!(mint, provider = provider.name(), "provider has no price");
                    continue;
                }
                Err(error) => {
                    debug!(
                        mint,
                        provider = provider.name(),
                        denomination = denomination.as_str(),
                        error = %error,
                        "provider quote failed"
                    );
                    continue;
                }
            };
            let price_native = match denomination {
                QuoteDenomination::Usd => quote / native_usd_rate,
                QuoteDenomination::Native => quote,
            };
            if price_native.is_finite() && price_native > 0.0 {
                debug!(
                    mint,
                    provider = provider.name(),
                    denomination = denomination.as_str(),
                    quote,
                    price_native,
                    "mint priced"
                );
                return PriceResolution {
                    price_native,
                    source: Some(provider.name()),
                };
            }
            debug!(
                mint,
                provider = provider.name(),
                quote,
                "provider returned non-positive price"
            );
        }
        warn!(mint, unresolved = true, "no price provider resolved mint");
        PriceResolution::unresolved()
    }
}

/// SOL/USD rate chain. Every provider is expected to quote in USD.
pub struct ReferenceRateResolver {
    providers: Vec<Box<dyn QuoteProvider>>,
}

impl ReferenceRateResolver {
    pub fn new(providers: Vec<Box<dyn QuoteProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    pub fn resolve(&self) -> Valued {
        for provider in &self.providers {
            match provider.quote(SOL_MINT) {
                Ok(Some(rate)) if rate.is_finite() && rate > 0.0 => {
                    debug!(provider = provider.name(), rate, "sol/usd rate resolved");
                    return Valued::Resolved(rate);
                }
                Ok(_) => {
                    debug!(provider = provider.name(), "no usable sol/usd rate");
                }
                Err(error) => {
                    warn!(
                        provider = provider.name(),
                        error = %error,
                        "sol/usd rate lookup failed"
                    );
                }
            }
        }
        warn!(unresolved = true, "sol/usd rate unavailable");
        Valued::Unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Scripted {
        Price(f64),
        Missing,
        Fails,
    }

    struct FakeProvider {
        name: &'static str,
        denomination: QuoteDenomination,
        quotes: HashMap<String, Scripted>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeProvider {
        fn new(name: &'static str, denomination: QuoteDenomination) -> Self {
            Self {
                name,
                denomination,
                quotes: HashMap::new(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn with(mut self, mint: &str, quote: Scripted) -> Self {
            self.quotes.insert(mint.to_string(), quote);
            self
        }
    }

    impl QuoteProvider for FakeProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn denomination(&self) -> QuoteDenomination {
            self.denomination
        }

        fn quote(&self, mint: &str) -> Result<Option<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.quotes.get(mint) {
                Some(Scripted::Price(price)) => Ok(Some(*price)),
                Some(Scripted::Missing) | None => Ok(None),
                Some(Scripted::Fails) => Err(anyhow!("connection refused")),
            }
        }
    }

    #[test]
    fn usd_quote_is_converted_with_reference_rate() {
        let resolver = PriceResolver::new(vec![Box::new(
            FakeProvider::new("dex", QuoteDenomination::Usd).with("mint-a", Scripted::Price(1.5)),
        )]);
        let resolution = resolver.resolve("mint-a", 150.0);
        assert!((resolution.price_native - 0.01).abs() < 1e-12);
        assert_eq!(resolution.source, Some("dex"));
    }

    #[test]
    fn falls_through_to_native_provider_when_first_fails() {
        let resolver = PriceResolver::new(vec![
            Box::new(FakeProvider::new("dex", QuoteDenomination::Usd).with("mint-a", Scripted::Fails)),
            Box::new(
                FakeProvider::new("jup", QuoteDenomination::Native)
                    .with("mint-a", Scripted::Price(0.02)),
            ),
        ]);
        let resolution = resolver.resolve("mint-a", 150.0);
        assert_eq!(resolution.price_native, 0.02);
        assert_eq!(resolution.source, Some("jup"));
    }

    #[test]
    fn zero_rate_skips_usd_providers_without_calling_them() {
        let dex = FakeProvider::new("dex", QuoteDenomination::Usd).with("mint-a", Scripted::Price(3.0));
        let dex_calls = Arc::clone(&dex.calls);
        let resolver = PriceResolver::new(vec![
            Box::new(dex),
            Box::new(
                FakeProvider::new("jup", QuoteDenomination::Native)
                    .with("mint-a", Scripted::Price(0.04)),
            ),
        ]);
        let resolution = resolver.resolve("mint-a", 0.0);
        assert_eq!(resolution.price_native, 0.04);
        assert_eq!(dex_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn all_providers_failing_yields_zero() {
        let resolver = PriceResolver::new(vec![
            Box::new(FakeProvider::new("dex", QuoteDenomination::Usd).with("mint-b", Scripted::Price(0.0))),
            Box::new(FakeProvider::new("jup", QuoteDenomination::Native).with("mint-b", Scripted::Fails)),
        ]);
        let resolution = resolver.resolve("mint-b", 150.0);
        assert_eq!(resolution, PriceResolution::unresolved());
        assert_eq!(resolution.valued(), Valued::Unresolved);
    }

    #[test]
    fn reference_rate_falls_back_and_reports_unresolved() {
        let resolver = ReferenceRateResolver::new(vec![
            Box::new(FakeProvider::new("jup", QuoteDenomination::Usd).with(SOL_MINT, Scripted::Fails)),
            Box::new(FakeProvider::new("dex", QuoteDenomination::Usd).with(SOL_MINT, Scripted::Price(172.5))),
        ]);
        assert_eq!(resolver.resolve(), Valued::Resolved(172.5));

        let empty = ReferenceRateResolver::new(vec![Box::new(
            FakeProvider::new("jup", QuoteDenomination::Usd).with(SOL_MINT, Scripted::Missing),
        )]);
        assert_eq!(empty.resolve(), Valued::Unresolved);
    }
}
