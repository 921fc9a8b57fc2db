use std::collections::HashMap;
use std::sync::Mutex;

use crate::{PriceResolution, PriceResolver};

/// Per-cycle memo of mint prices shared by all wallet workers.
///
/// The lock is not held while a provider is queried, so two workers may
/// resolve the same mint concurrently; the first stored result wins.
#[derive(Debug, Default)]
pub struct QuoteCache {
    entries: Mutex<HashMap<String, PriceResolution>>,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, mint: &str) -> Option<PriceResolution> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(mint)
            .copied()
    }

    pub fn get_or_resolve_with<F>(&self, mint: &str, resolve: F) -> PriceResolution
    where
        F: FnOnce() -> PriceResolution,
    {
        if let Some(cached) = self.get(mint) {
            return cached;
        }
        let resolved = resolve();
        *self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(mint.to_string())
            .or_insert(resolved)
    }

    pub fn price(
        &self,
        resolver: &PriceResolver,
        mint: &str,
        native_usd_rate: f64,
    ) -> PriceResolution {
        self.get_or_resolve_with(mint, || resolver.resolve(mint, native_usd_rate))
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
