use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use solboard_core_types::{ChallengeWindow, Holdings, LeaderboardSnapshot, WalletEntry};
use solboard_pricing::{QuoteDenomination, QuoteProvider};
use solboard_sources::{BalanceSource, HoldingsSource};
use solboard_storage::SnapshotStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::TrackedWallet;

pub(crate) fn window() -> ChallengeWindow {
    ChallengeWindow {
        start: Utc.with_ymd_and_hms(2025, 7, 27, 22, 0, 1).unwrap(),
        end: Utc.with_ymd_and_hms(2025, 8, 10, 22, 0, 0).unwrap(),
    }
}

pub(crate) fn before_end() -> DateTime<Utc> {
    window().end - chrono::Duration::hours(1)
}

pub(crate) fn tracked(wallet: &str, start_value: f64) -> TrackedWallet {
    TrackedWallet {
        entry: WalletEntry::new(wallet, None),
        start_value,
    }
}

/// Wallets missing from the map fail their lookup.
#[derive(Default)]
pub(crate) struct FakeBalanceSource {
    balances: HashMap<String, f64>,
}

impl FakeBalanceSource {
    pub(crate) fn with(mut self, wallet: &str, balance: f64) -> Self {
        self.balances.insert(wallet.to_string(), balance);
        self
    }
}

impl BalanceSource for FakeBalanceSource {
    fn balance_sol(&self, wallet: &str) -> Result<f64> {
        self.balances
            .get(wallet)
            .copied()
            .ok_or_else(|| anyhow!("rpc request failed endpoint=fake"))
    }
}

/// Holdings are swappable between cycles to simulate market movement.
#[derive(Default, Clone)]
pub(crate) struct FakeHoldingsSource {
    holdings: Arc<Mutex<HashMap<String, Holdings>>>,
    failing: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
}

impl FakeHoldingsSource {
    pub(crate) fn with(self, wallet: &str, holdings: &[(&str, f64)]) -> Self {
        self.set(wallet, holdings);
        self
    }

    pub(crate) fn failing(self, wallet: &str) -> Self {
        self.failing
            .lock()
            .unwrap()
            .push(wallet.to_string());
        self
    }

    pub(crate) fn set(&self, wallet: &str, holdings: &[(&str, f64)]) {
        let holdings: Holdings = holdings
            .iter()
            .map(|(mint, quantity)| (mint.to_string(), *quantity))
            .collect();
        self.holdings
            .lock()
            .unwrap()
            .insert(wallet.to_string(), holdings);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HoldingsSource for FakeHoldingsSource {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn holdings(&self, wallet: &str) -> Result<Holdings> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().iter().any(|w| w == wallet) {
            return Err(anyhow!("holdings request failed"));
        }
        Ok(self
            .holdings
            .lock()
            .unwrap()
            .get(wallet)
            .cloned()
            .unwrap_or_default())
    }
}

/// Mints without a scripted price fail the quote.
pub(crate) struct FakeQuoteProvider {
    name: &'static str,
    denomination: QuoteDenomination,
    prices: HashMap<String, f64>,
    calls: Arc<AtomicUsize>,
}

impl FakeQuoteProvider {
    pub(crate) fn new(name: &'static str, denomination: QuoteDenomination) -> Self {
        Self {
            name,
            denomination,
            prices: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with(mut self, mint: &str, price: f64) -> Self {
        self.prices.insert(mint.to_string(), price);
        self
    }

    pub(crate) fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl QuoteProvider for FakeQuoteProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn denomination(&self) -> QuoteDenomination {
        self.denomination
    }

    fn quote(&self, mint: &str) -> Result<Option<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prices
            .get(mint)
            .map(|price| Some(*price))
            .ok_or_else(|| anyhow!("connect error for {mint}"))
    }
}

/// Snapshot store keeping the last saved snapshot in memory.
#[derive(Default, Clone)]
pub(crate) struct MemorySnapshotStore {
    saved: Arc<Mutex<Option<LeaderboardSnapshot>>>,
    seeded_tokens: Arc<Mutex<HashMap<String, f64>>>,
    broken: bool,
    load_calls: Arc<AtomicUsize>,
}

impl MemorySnapshotStore {
    pub(crate) fn with_tokens(values: &[(&str, f64)]) -> Self {
        let store = Self::default();
        *store.seeded_tokens.lock().unwrap() = values
            .iter()
            .map(|(wallet, tokens)| (wallet.to_string(), *tokens))
            .collect();
        store
    }

    pub(crate) fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub(crate) fn saved(&self) -> Option<LeaderboardSnapshot> {
        self.saved.lock().unwrap().clone()
    }

    pub(crate) fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load_holdings_values(&self) -> Result<HashMap<String, f64>> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(anyhow!("failed parsing snapshot"));
        }
        if let Some(snapshot) = self.saved.lock().unwrap().as_ref() {
            return Ok(snapshot
                .data
                .iter()
                .map(|row| (row.wallet.clone(), row.tokens))
                .collect());
        }
        Ok(self.seeded_tokens.lock().unwrap().clone())
    }

    fn save(&self, snapshot: &LeaderboardSnapshot) -> Result<()> {
        if self.broken {
            return Err(anyhow!("failed replacing snapshot"));
        }
        *self.saved.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }
}
