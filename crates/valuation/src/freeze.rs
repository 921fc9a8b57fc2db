use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use solboard_core_types::ChallengeWindow;
use solboard_storage::SnapshotStore;
use std::collections::HashMap;
use tracing::info;

use crate::TokenValuation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeState {
    Active,
    Frozen,
}

impl FreezeState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Frozen => "frozen",
        }
    }
}

/// Gate deciding whether token values are computed live or carried forward.
///
/// Re-evaluated every cycle from the wall clock. Once frozen, token values
/// come from the last persisted snapshot and the live closure is never run.
#[derive(Debug, Clone)]
pub struct FreezeController {
    state: FreezeState,
    frozen_values: HashMap<String, f64>,
}

impl FreezeController {
    pub fn evaluate(
        window: &ChallengeWindow,
        now: DateTime<Utc>,
        store: &dyn SnapshotStore,
    ) -> Result<Self> {
        if !window.has_ended(now) {
            return Ok(Self::active());
        }
        let frozen_values = store
            .load_holdings_values()
            .context("failed loading prior snapshot for frozen valuation")?;
        info!(
            end = %window.end,
            carried_wallets = frozen_values.len(),
            "challenge ended, token values frozen"
        );
        Ok(Self {
            state: FreezeState::Frozen,
            frozen_values,
        })
    }

    pub fn active() -> Self {
        Self {
            state: FreezeState::Active,
            frozen_values: HashMap::new(),
        }
    }

    pub fn state(&self) -> FreezeState {
        self.state
    }

    pub fn is_frozen(&self) -> bool {
        self.state == FreezeState::Frozen
    }

    /// Wallets absent from the prior snapshot are frozen at 0.
    pub fn holdings_value<F>(&self, wallet: &str, live: F) -> TokenValuation
    where
        F: FnOnce() -> TokenValuation,
    {
        match self.state {
            FreezeState::Active => live(),
            FreezeState::Frozen => {
                TokenValuation::carried(self.frozen_values.get(wallet).copied().unwrap_or(0.0))
            }
        }
    }
}
