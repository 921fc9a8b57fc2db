mod aggregator;
mod freeze;
mod leaderboard;
mod pipeline;

#[cfg(test)]
mod test_support;

pub use self::aggregator::{TokenValuation, TrackedWallet, WalletValuation, WalletValuator};
pub use self::freeze::{FreezeController, FreezeState};
pub use self::leaderboard::{build_leaderboard, change_percent};
pub use self::pipeline::{CycleReport, LeaderboardPipeline, PipelineSettings};
