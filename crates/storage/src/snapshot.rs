use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use solboard_core_types::LeaderboardSnapshot;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::atomic::write_json_atomic;
use crate::SnapshotStore;

/// Leaderboard snapshot persisted as a single JSON document.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when nothing has been written yet.
    pub fn load_snapshot(&self) -> Result<Option<LeaderboardSnapshot>> {
        let Some(raw) = self.read_raw()? else {
            return Ok(None);
        };
        let snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing snapshot {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    fn read_raw(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error)
                .with_context(|| format!("failed reading snapshot {}", self.path.display())),
        }
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load_holdings_values(&self) -> Result<HashMap<String, f64>> {
        let Some(raw) = self.read_raw()? else {
            debug!(path = %self.path.display(), "no prior snapshot");
            return Ok(HashMap::new());
        };
        let body: Value = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing snapshot {}", self.path.display()))?;
        holdings_values_from_snapshot(&body)
            .with_context(|| format!("invalid snapshot {}", self.path.display()))
    }

    fn save(&self, snapshot: &LeaderboardSnapshot) -> Result<()> {
        write_json_atomic(&self.path, snapshot).context("failed persisting snapshot")?;
        debug!(
            path = %self.path.display(),
            rows = snapshot.data.len(),
            "snapshot persisted"
        );
        Ok(())
    }
}

/// Rows with a missing wallet or non-numeric `tokens` are ignored.
fn holdings_values_from_snapshot(body: &Value) -> Result<HashMap<String, f64>> {
    let rows = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("snapshot has no data array"))?;
    let mut values = HashMap::with_capacity(rows.len());
    for row in rows {
        let wallet = row.get("wallet").and_then(Value::as_str);
        let tokens = row
            .get("tokens")
            .and_then(Value::as_f64)
            .filter(|tokens| tokens.is_finite());
        if let (Some(wallet), Some(tokens)) = (wallet, tokens) {
            values.insert(wallet.to_string(), tokens);
        }
    }
    Ok(values)
}
