use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use solboard_core_types::{StartingValues, WalletEntry};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::atomic::write_json_atomic;

/// Reads `[{"wallet": "...", "username": "..."}, ...]`.
///
/// Blank addresses and repeated wallets are dropped with a warning; the
/// first occurrence keeps its position.
pub fn load_wallets(path: &Path) -> Result<Vec<WalletEntry>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading wallet list {}", path.display()))?;
    let entries: Vec<WalletEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing wallet list {}", path.display()))?;

    let mut seen = HashSet::new();
    let mut wallets = Vec::with_capacity(entries.len());
    for mut entry in entries {
        entry.wallet = entry.wallet.trim().to_string();
        if entry.wallet.is_empty() {
            warn!(path = %path.display(), "skipping wallet entry with empty address");
            continue;
        }
        if !seen.insert(entry.wallet.clone()) {
            warn!(wallet = %entry.wallet, "skipping duplicate wallet entry");
            continue;
        }
        wallets.push(entry);
    }
    Ok(wallets)
}

/// Reads `{"<wallet>": <number>, ...}`. Numeric strings are accepted;
/// other values are skipped with a warning.
pub fn load_starting_values(path: &Path) -> Result<StartingValues> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading starting values {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing starting values {}", path.display()))?;
    let object = parsed
        .as_object()
        .ok_or_else(|| anyhow!("starting values {} must be a JSON object", path.display()))?;

    let mut values = StartingValues::with_capacity(object.len());
    for (wallet, value) in object {
        let amount = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(raw) => raw.trim().parse::<f64>().ok(),
            _ => None,
        };
        match amount.filter(|amount| amount.is_finite()) {
            Some(amount) => {
                values.insert(wallet.trim().to_string(), amount);
            }
            None => warn!(wallet = %wallet, "skipping non-numeric starting value"),
        }
    }
    Ok(values)
}

/// A participant to append to the wallet list and starting values.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WalletRegistration {
    pub username: String,
    pub wallet: String,
    pub start_balance: f64,
}

#[derive(Debug)]
pub enum RegistrationError {
    Invalid(&'static str),
    Duplicate(String),
    Storage(anyhow::Error),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(reason) => write!(f, "{reason}"),
            Self::Duplicate(wallet) => write!(f, "wallet already exists: {wallet}"),
            Self::Storage(error) => write!(f, "failed storing wallet: {error:#}"),
        }
    }
}

impl std::error::Error for RegistrationError {}

impl From<anyhow::Error> for RegistrationError {
    fn from(error: anyhow::Error) -> Self {
        Self::Storage(error)
    }
}

/// Appends a participant to both input files.
///
/// Username and wallet must be non-empty and the start balance positive; a
/// wallet already on the list is rejected. Starting values are written
/// before the wallet list, so an interrupted registration never lists a
/// wallet without its start balance. Callers serialize registrations.
pub fn register_wallet(
    wallets_path: &Path,
    start_values_path: &Path,
    registration: &WalletRegistration,
) -> Result<WalletEntry, RegistrationError> {
    let username = registration.username.trim();
    let wallet = registration.wallet.trim();
    if username.is_empty() || wallet.is_empty() {
        return Err(RegistrationError::Invalid(
            "username and wallet address are required",
        ));
    }
    if !registration.start_balance.is_finite() || registration.start_balance <= 0.0 {
        return Err(RegistrationError::Invalid(
            "start balance must be greater than 0",
        ));
    }

    let mut wallets = read_json_or_default(wallets_path, || Value::Array(Vec::new()))?;
    let entries = wallets
        .as_array_mut()
        .ok_or_else(|| anyhow!("wallet list {} must be a JSON array", wallets_path.display()))?;
    let exists = entries.iter().any(|entry| {
        entry
            .get("wallet")
            .and_then(Value::as_str)
            .is_some_and(|existing| existing.trim() == wallet)
    });
    if exists {
        return Err(RegistrationError::Duplicate(wallet.to_string()));
    }

    let mut start_values =
        read_json_or_default(start_values_path, || Value::Object(Map::new()))?;
    let balances = start_values.as_object_mut().ok_or_else(|| {
        anyhow!(
            "starting values {} must be a JSON object",
            start_values_path.display()
        )
    })?;
    balances.insert(wallet.to_string(), json!(registration.start_balance));
    entries.push(json!({ "username": username, "wallet": wallet }));

    write_json_atomic(start_values_path, &start_values)?;
    write_json_atomic(wallets_path, &wallets)?;
    info!(
        wallet,
        username,
        start_balance = registration.start_balance,
        "wallet registered"
    );
    Ok(WalletEntry::new(wallet, Some(username.to_string())))
}

fn read_json_or_default(path: &Path, default: impl FnOnce() -> Value) -> Result<Value> {
    match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", path.display())),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(default()),
        Err(error) => Err(error).with_context(|| format!("failed reading {}", path.display())),
    }
}
