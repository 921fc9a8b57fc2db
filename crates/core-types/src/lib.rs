use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qFJEAEeoGx6a1wRxmCRG4ixLiN";
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

const DEFAULT_USERNAME_CHARS: usize = 6;

/// Token quantities keyed by mint, already normalized by decimals.
pub type Holdings = BTreeMap<String, f64>;

/// Wallet address -> SOL value recorded at challenge start.
pub type StartingValues = HashMap<String, f64>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletEntry {
    pub wallet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl WalletEntry {
    pub fn new(wallet: impl Into<String>, username: Option<String>) -> Self {
        Self {
            wallet: wallet.into(),
            username,
        }
    }

    pub fn display_name(&self) -> String {
        match self.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.wallet.chars().take(DEFAULT_USERNAME_CHARS).collect(),
        }
    }
}

/// A looked-up amount that may have failed to resolve.
///
/// `Unresolved` still counts as zero in every sum, but keeps the failure
/// visible to logging and cycle counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Valued {
    Resolved(f64),
    Unresolved,
}

impl Valued {
    /// Non-finite and non-positive amounts are treated as unresolved.
    pub fn positive(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            Self::Resolved(value)
        } else {
            Self::Unresolved
        }
    }

    pub fn amount(self) -> f64 {
        match self {
            Self::Resolved(value) => value,
            Self::Unresolved => 0.0,
        }
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChallengeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ChallengeWindow {
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardRow {
    pub username: String,
    pub wallet: String,
    pub sol: f64,
    pub tokens: f64,
    pub total: f64,
    pub change_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WinnerPot {
    pub wallet: String,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardSnapshot {
    pub updated: DateTime<Utc>,
    pub data: Vec<LeaderboardRow>,
    pub winner_pot: WinnerPot,
    pub challenge_ended: bool,
    pub challenge_end_date: DateTime<Utc>,
}

pub fn round_to(value: f64, places: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_address_prefix() {
        let entry = WalletEntry::new("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin", None);
        assert_eq!(entry.display_name(), "9xQeWv");

        let blank = WalletEntry::new("abc", Some("   ".to_string()));
        assert_eq!(blank.display_name(), "abc");

        let named = WalletEntry::new("abc", Some("alice".to_string()));
        assert_eq!(named.display_name(), "alice");
    }

    #[test]
    fn valued_positive_rejects_zero_negative_and_nan() {
        assert_eq!(Valued::positive(0.0), Valued::Unresolved);
        assert_eq!(Valued::positive(-1.0), Valued::Unresolved);
        assert_eq!(Valued::positive(f64::NAN), Valued::Unresolved);
        assert_eq!(Valued::positive(2.5).amount(), 2.5);
        assert_eq!(Valued::Unresolved.amount(), 0.0);
    }

    #[test]
    fn round_to_handles_presentation_precision() {
        assert_eq!(round_to(12.345_67, 4), 12.3457);
        assert_eq!(round_to(29.999_9, 2), 30.0);
        assert_eq!(round_to(f64::INFINITY, 4), 0.0);
    }

    #[test]
    fn wallet_entry_deserializes_without_username() {
        let entry: WalletEntry =
            serde_json::from_str(r#"{"wallet":"abc"}"#).expect("wallet entry json");
        assert_eq!(entry.username, None);
        assert_eq!(entry.display_name(), "abc");
    }

    #[test]
    fn challenge_window_ends_at_cutoff_inclusive() {
        let end = DateTime::parse_from_rfc3339("2025-08-10T22:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        let window = ChallengeWindow {
            start: end - chrono::Duration::days(14),
            end,
        };
        assert!(!window.has_ended(end - chrono::Duration::seconds(1)));
        assert!(window.has_ended(end));
    }
}
