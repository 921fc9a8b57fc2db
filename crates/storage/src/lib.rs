use anyhow::Result;
use solboard_core_types::LeaderboardSnapshot;
use std::collections::HashMap;

mod atomic;
mod inputs;
mod snapshot;

pub use self::inputs::{
    load_starting_values, load_wallets, register_wallet, RegistrationError, WalletRegistration,
};
pub use self::snapshot::JsonSnapshotStore;

/// Persistence contract for leaderboard snapshots.
///
/// `load_holdings_values` exposes only what the freeze gate needs: the token
/// value last written for each wallet. A missing snapshot is an empty map;
/// an unreadable one is an error.
pub trait SnapshotStore: Send + Sync {
    fn load_holdings_values(&self) -> Result<HashMap<String, f64>>;
    fn save(&self, snapshot: &LeaderboardSnapshot) -> Result<()>;
}
