use solboard_core_types::{round_to, LeaderboardRow};
use std::cmp::Ordering;

use crate::WalletValuation;

const VALUE_DECIMALS: i32 = 4;
const CHANGE_DECIMALS: i32 = 2;

/// Percent change against the starting value; 0 when the start is not positive.
pub fn change_percent(total: f64, start_value: f64) -> f64 {
    if !(start_value.is_finite() && start_value > 0.0) {
        return 0.0;
    }
    (total - start_value) / start_value * 100.0
}

/// Ranks wallets by total, descending. Equal totals keep input order.
pub fn build_leaderboard(valuations: Vec<WalletValuation>) -> Vec<LeaderboardRow> {
    let mut rows: Vec<LeaderboardRow> = valuations
        .into_iter()
        .map(|valuation| {
            let sol = valuation.sol.amount();
            let tokens = valuation.tokens.value;
            let total = sol + tokens;
            LeaderboardRow {
                username: valuation.wallet.entry.display_name(),
                change_pct: round_to(
                    change_percent(total, valuation.wallet.start_value),
                    CHANGE_DECIMALS,
                ),
                wallet: valuation.wallet.entry.wallet,
                sol: round_to(sol, VALUE_DECIMALS),
                tokens: round_to(tokens, VALUE_DECIMALS),
                total: round_to(total, VALUE_DECIMALS),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));
    rows
}
