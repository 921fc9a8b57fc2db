use chrono::{DateTime, Utc};
use serde::Serialize;
use solboard_config::AppConfig;
use solboard_core_types::Holdings;
use solboard_sources::{BalanceSource, HeliusBalancesClient, RpcBalanceSource};
use solboard_storage::{load_wallets, JsonSnapshotStore};
use std::path::Path;

/// System program id; every RPC node can answer a balance query for it.
const RPC_PROBE_WALLET: &str = "11111111111111111111111111111111";

const HELIUS_NOT_CONFIGURED: &str = "no key configured";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct FileStatus {
    pub path: String,
    pub present: bool,
}

impl FileStatus {
    fn of(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            present: path.is_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct LeaderSummary {
    pub username: String,
    pub wallet: String,
    pub total: f64,
    pub change_pct: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct RpcProbe {
    pub ok: bool,
    pub balance: Option<f64>,
    pub error: Option<String>,
}

/// Holdings API reachability. `configured == false` is reported but does not
/// make the node unhealthy.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct HoldingsApiProbe {
    pub configured: bool,
    pub ok: bool,
    pub tokens: Option<usize>,
    pub error: Option<String>,
}

impl HoldingsApiProbe {
    fn not_configured() -> Self {
        Self {
            configured: false,
            ok: false,
            tokens: None,
            error: Some(HELIUS_NOT_CONFIGURED.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StatusReport {
    pub checked_at: DateTime<Utc>,
    pub config: FileStatus,
    pub wallets: FileStatus,
    pub start_values: FileStatus,
    pub snapshot: FileStatus,
    pub tracked_wallets: Option<usize>,
    pub snapshot_age_seconds: Option<i64>,
    pub snapshot_error: Option<String>,
    pub challenge_ended: Option<bool>,
    pub leader: Option<LeaderSummary>,
    pub rpc: RpcProbe,
    /// `None` when the Helius fallback is disabled.
    pub helius: Option<HoldingsApiProbe>,
}

impl StatusReport {
    pub(crate) fn healthy(&self) -> bool {
        self.config.present
            && self.wallets.present
            && self.start_values.present
            && self.snapshot_error.is_none()
            && self.rpc.ok
            && self
                .helius
                .as_ref()
                .map_or(true, |probe| !probe.configured || probe.ok)
    }
}

/// Blocking: builds HTTP clients. Run it off the async runtime.
pub(crate) fn run_status_check(
    config: &AppConfig,
    config_path: &Path,
    now: DateTime<Utc>,
) -> StatusReport {
    let rpc = match RpcBalanceSource::new(&config.rpc.http_url, config.rpc.timeout_ms) {
        Ok(source) => probe_rpc(&source),
        Err(error) => RpcProbe {
            ok: false,
            balance: None,
            error: Some(format!("{error:#}")),
        },
    };
    let helius = config.holdings.helius_fallback_enabled.then(|| {
        match HeliusBalancesClient::new(
            &config.holdings.helius_api_base,
            &config.holdings.helius_api_key,
            config.holdings.timeout_ms,
        ) {
            Ok(client) => probe_holdings_api(|wallet| client.token_holdings(wallet)),
            Err(_) => HoldingsApiProbe::not_configured(),
        }
    });
    let mut report = collect_status(config, config_path, now, rpc);
    report.helius = helius;
    report
}

pub(crate) fn probe_rpc(balance: &dyn BalanceSource) -> RpcProbe {
    match balance.balance_sol(RPC_PROBE_WALLET) {
        Ok(sol) => RpcProbe {
            ok: true,
            balance: Some(sol),
            error: None,
        },
        Err(error) => RpcProbe {
            ok: false,
            balance: None,
            error: Some(format!("{error:#}")),
        },
    }
}

pub(crate) fn probe_holdings_api(
    lookup: impl FnOnce(&str) -> anyhow::Result<Holdings>,
) -> HoldingsApiProbe {
    match lookup(RPC_PROBE_WALLET) {
        Ok(holdings) => HoldingsApiProbe {
            configured: true,
            ok: true,
            tokens: Some(holdings.len()),
            error: None,
        },
        Err(error) => HoldingsApiProbe {
            configured: true,
            ok: false,
            tokens: None,
            error: Some(format!("{error:#}")),
        },
    }
}

fn collect_status(
    config: &AppConfig,
    config_path: &Path,
    now: DateTime<Utc>,
    rpc: RpcProbe,
) -> StatusReport {
    let wallets_path = Path::new(&config.paths.wallets_path);
    let tracked_wallets = load_wallets(wallets_path).ok().map(|wallets| wallets.len());

    let store = JsonSnapshotStore::new(&config.paths.snapshot_path);
    let (snapshot, snapshot_error) = match store.load_snapshot() {
        Ok(snapshot) => (snapshot, None),
        Err(error) => (None, Some(format!("{error:#}"))),
    };
    let leader = snapshot
        .as_ref()
        .and_then(|snapshot| snapshot.data.first())
        .map(|row| LeaderSummary {
            username: row.username.clone(),
            wallet: row.wallet.clone(),
            total: row.total,
            change_pct: row.change_pct,
        });

    StatusReport {
        checked_at: now,
        config: FileStatus::of(config_path),
        wallets: FileStatus::of(wallets_path),
        start_values: FileStatus::of(Path::new(&config.paths.start_values_path)),
        snapshot: FileStatus::of(store.path()),
        tracked_wallets,
        snapshot_age_seconds: snapshot
            .as_ref()
            .map(|snapshot| now.signed_duration_since(snapshot.updated).num_seconds()),
        snapshot_error,
        challenge_ended: snapshot.as_ref().map(|snapshot| snapshot.challenge_ended),
        leader,
        rpc,
        helius: None,
    }
}
