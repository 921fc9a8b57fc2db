use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use solboard_core_types::{
    round_to, ChallengeWindow, LeaderboardSnapshot, StartingValues, Valued, WalletEntry, WinnerPot,
};
use solboard_pricing::{PriceResolver, QuoteCache, ReferenceRateResolver};
use solboard_sources::{BalanceSource, HoldingsSource};
use solboard_storage::SnapshotStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{build_leaderboard, FreezeController, TrackedWallet, WalletValuation, WalletValuator};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub window: ChallengeWindow,
    pub winner_pot_wallet: String,
    pub concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub snapshot: LeaderboardSnapshot,
    pub frozen: bool,
    pub native_usd_rate: Option<Valued>,
    pub wallets_processed: usize,
    pub wallets_skipped: usize,
    pub unresolved_balances: usize,
    pub unresolved_holdings: usize,
    pub unresolved_prices: usize,
    pub elapsed_ms: u64,
}

/// One refresh cycle: value every tracked wallet, rank, and persist.
pub struct LeaderboardPipeline {
    balance: Box<dyn BalanceSource>,
    holdings: Box<dyn HoldingsSource>,
    prices: PriceResolver,
    reference_rate: ReferenceRateResolver,
    store: Box<dyn SnapshotStore>,
    settings: PipelineSettings,
}

impl LeaderboardPipeline {
    pub fn new(
        balance: Box<dyn BalanceSource>,
        holdings: Box<dyn HoldingsSource>,
        prices: PriceResolver,
        reference_rate: ReferenceRateResolver,
        store: Box<dyn SnapshotStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            balance,
            holdings,
            prices,
            reference_rate,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Individual lookup failures are absorbed as zero values. `Err` means the
    /// cycle was abandoned and nothing was written.
    pub fn run_cycle(
        &self,
        wallets: &[WalletEntry],
        start_values: &StartingValues,
        now: DateTime<Utc>,
    ) -> Result<CycleReport> {
        let started = Instant::now();
        let cycle_id = Uuid::new_v4();
        let freeze = FreezeController::evaluate(&self.settings.window, now, self.store.as_ref())?;

        let tracked = track_wallets(wallets, start_values);
        let wallets_skipped = wallets.len() - tracked.len();

        // Prices only feed live token values.
        let native_usd_rate = if freeze.is_frozen() {
            None
        } else {
            Some(self.reference_rate.resolve())
        };
        let rate = native_usd_rate.map(Valued::amount).unwrap_or(0.0);

        let valuator = WalletValuator::new(
            self.balance.as_ref(),
            self.holdings.as_ref(),
            &self.prices,
        );
        let cache = QuoteCache::new();
        let valuations = self.valuate_all(&valuator, &tracked, rate, &freeze, &cache)?;

        let unresolved_balances = valuations
            .iter()
            .filter(|valuation| !valuation.sol.is_resolved())
            .count();
        let unresolved_holdings = valuations
            .iter()
            .filter(|valuation| valuation.tokens.holdings_unresolved)
            .count();
        let unresolved_prices = valuations
            .iter()
            .map(|valuation| valuation.tokens.unresolved_prices)
            .sum();
        let wallets_processed = valuations.len();

        let data = build_leaderboard(valuations);
        let winner_pot = WinnerPot {
            wallet: self.settings.winner_pot_wallet.clone(),
            balance: round_to(self.winner_pot_balance(&valuator), 4),
        };
        let snapshot = LeaderboardSnapshot {
            updated: now,
            data,
            winner_pot,
            challenge_ended: freeze.is_frozen(),
            challenge_end_date: self.settings.window.end,
        };
        self.store
            .save(&snapshot)
            .context("failed persisting leaderboard snapshot")?;

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            cycle_id = %cycle_id,
            freeze_state = freeze.state().as_str(),
            wallets_processed,
            wallets_skipped,
            unresolved_balances,
            unresolved_holdings,
            unresolved_prices,
            priced_mints = cache.len(),
            winner_pot_balance = snapshot.winner_pot.balance,
            elapsed_ms,
            "leaderboard cycle completed"
        );

        Ok(CycleReport {
            cycle_id,
            snapshot,
            frozen: freeze.is_frozen(),
            native_usd_rate,
            wallets_processed,
            wallets_skipped,
            unresolved_balances,
            unresolved_holdings,
            unresolved_prices,
            elapsed_ms,
        })
    }

    fn valuate_all(
        &self,
        valuator: &WalletValuator<'_>,
        tracked: &[TrackedWallet],
        rate: f64,
        freeze: &FreezeController,
        cache: &QuoteCache,
    ) -> Result<Vec<WalletValuation>> {
        let workers = self.settings.concurrency.max(1).min(tracked.len().max(1));
        let next = AtomicUsize::new(0);

        let mut indexed = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut done = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            let Some(wallet) = tracked.get(index) else {
                                break;
                            };
                            done.push((index, valuator.valuate(wallet, rate, freeze, cache)));
                        }
                        done
                    })
                })
                .collect();
            let mut indexed = Vec::with_capacity(tracked.len());
            for handle in handles {
                let done = handle
                    .join()
                    .map_err(|_| anyhow!("wallet valuation worker panicked"))?;
                indexed.extend(done);
            }
            Ok::<_, anyhow::Error>(indexed)
        })?;

        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, valuation)| valuation).collect())
    }

    fn winner_pot_balance(&self, valuator: &WalletValuator<'_>) -> f64 {
        let wallet = self.settings.winner_pot_wallet.trim();
        if wallet.is_empty() {
            return 0.0;
        }
        valuator.native_balance(wallet).amount()
    }
}

/// Keeps wallet-list order; wallets without a starting value are dropped.
fn track_wallets(wallets: &[WalletEntry], start_values: &StartingValues) -> Vec<TrackedWallet> {
    wallets
        .iter()
        .filter_map(|entry| match start_values.get(&entry.wallet) {
            Some(start_value) => Some(TrackedWallet {
                entry: entry.clone(),
                start_value: *start_value,
            }),
            None => {
                warn!(wallet = %entry.wallet, "no starting value, wallet excluded");
                None
            }
        })
        .collect()
}
