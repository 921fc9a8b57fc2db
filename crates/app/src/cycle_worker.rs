use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use solboard_config::{challenge_window, AppConfig};
use solboard_pricing::{build_price_resolver, build_reference_rate_resolver};
use solboard_sources::{build_holdings_source, RpcBalanceSource};
use solboard_storage::{load_starting_values, load_wallets, JsonSnapshotStore};
use solboard_valuation::{CycleReport, LeaderboardPipeline, PipelineSettings};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleTrigger {
    Startup,
    Scheduled,
    Manual,
    StaleRead,
}

impl CycleTrigger {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
            Self::StaleRead => "stale_read",
        }
    }
}

#[derive(Debug)]
pub(crate) enum CycleRunError {
    Busy,
    Unavailable,
    Failed(anyhow::Error),
}

impl fmt::Display for CycleRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "update already running"),
            Self::Unavailable => write!(f, "cycle worker is not running"),
            Self::Failed(error) => write!(f, "cycle failed: {error:#}"),
        }
    }
}

/// Runs one leaderboard cycle on the worker thread.
pub(crate) trait CycleRunner {
    fn run(&mut self, trigger: CycleTrigger) -> Result<CycleReport>;
}

/// Production runner: reloads the wallet inputs every cycle.
pub(crate) struct PipelineRunner {
    pipeline: LeaderboardPipeline,
    wallets_path: PathBuf,
    start_values_path: PathBuf,
}

impl PipelineRunner {
    /// Builds blocking HTTP clients; call it on the worker thread.
    pub(crate) fn from_config(config: &AppConfig) -> Result<Self> {
        let window = challenge_window(config)?;
        let balance = RpcBalanceSource::new(&config.rpc.http_url, config.rpc.timeout_ms)
            .context("failed to initialize rpc balance source")?;
        let holdings = build_holdings_source(config, &window)
            .context("failed to initialize holdings source")?;
        let prices = build_price_resolver(&config.pricing)
            .context("failed to initialize price resolver")?;
        let reference_rate = build_reference_rate_resolver(&config.pricing)
            .context("failed to initialize sol/usd rate resolver")?;
        let store = JsonSnapshotStore::new(&config.paths.snapshot_path);
        let pipeline = LeaderboardPipeline::new(
            Box::new(balance),
            holdings,
            prices,
            reference_rate,
            Box::new(store),
            PipelineSettings {
                window,
                winner_pot_wallet: config.challenge.winner_pot_wallet.trim().to_string(),
                concurrency: config.system.cycle_concurrency,
            },
        );
        Ok(Self {
            pipeline,
            wallets_path: PathBuf::from(&config.paths.wallets_path),
            start_values_path: PathBuf::from(&config.paths.start_values_path),
        })
    }
}

impl CycleRunner for PipelineRunner {
    fn run(&mut self, _trigger: CycleTrigger) -> Result<CycleReport> {
        let wallets = load_wallets(&self.wallets_path)?;
        let start_values = load_starting_values(&self.start_values_path)?;
        self.pipeline.run_cycle(&wallets, &start_values, Utc::now())
    }
}

struct CycleRequest {
    trigger: CycleTrigger,
    reply: Option<oneshot::Sender<Result<CycleReport>>>,
}

/// Async-side handle to the single cycle worker thread.
///
/// At most one cycle is in flight: `busy` is claimed before a request is
/// queued and released by the worker once the cycle finishes.
#[derive(Clone)]
pub(crate) struct CycleWorkerHandle {
    tx: mpsc::Sender<CycleRequest>,
    busy: Arc<AtomicBool>,
}

impl CycleWorkerHandle {
    /// Spawns the worker thread and waits until `build_runner` has succeeded
    /// on it. A build error is returned here and the thread exits.
    pub(crate) async fn spawn<R, F>(build_runner: F) -> Result<(Self, thread::JoinHandle<()>)>
    where
        R: CycleRunner,
        F: FnOnce() -> Result<R> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<CycleRequest>(1);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let busy = Arc::new(AtomicBool::new(false));
        let worker_busy = Arc::clone(&busy);

        let join = thread::Builder::new()
            .name("solboard-cycle".to_string())
            .spawn(move || {
                let mut runner = match build_runner() {
                    Ok(runner) => {
                        let _ = ready_tx.send(Ok(()));
                        runner
                    }
                    Err(error) => {
                        let _ = ready_tx.send(Err(error));
                        return;
                    }
                };
                while let Some(request) = rx.blocking_recv() {
                    debug!(trigger = request.trigger.as_str(), "cycle started");
                    let outcome = runner.run(request.trigger);
                    worker_busy.store(false, Ordering::Release);
                    if let Err(error) = &outcome {
                        warn!(
                            trigger = request.trigger.as_str(),
                            error = %format!("{error:#}"),
                            "leaderboard cycle failed"
                        );
                    }
                    if let Some(reply) = request.reply {
                        let _ = reply.send(outcome);
                    }
                }
                info!("cycle worker stopped");
            })
            .context("failed to spawn cycle worker thread")?;

        ready_rx
            .await
            .map_err(|_| anyhow!("cycle worker exited during startup"))??;
        Ok((Self { tx, busy }, join))
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Fire-and-forget trigger; dropped when a cycle is already running.
    pub(crate) fn try_trigger(&self, trigger: CycleTrigger) -> Result<(), CycleRunError> {
        self.enqueue(trigger, None)
    }

    /// Runs a cycle and waits for its report.
    pub(crate) async fn run(&self, trigger: CycleTrigger) -> Result<CycleReport, CycleRunError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(trigger, Some(reply_tx))?;
        match reply_rx.await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(error)) => Err(CycleRunError::Failed(error)),
            Err(_) => Err(CycleRunError::Unavailable),
        }
    }

    fn enqueue(
        &self,
        trigger: CycleTrigger,
        reply: Option<oneshot::Sender<Result<CycleReport>>>,
    ) -> Result<(), CycleRunError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CycleRunError::Busy);
        }
        match self.tx.try_send(CycleRequest { trigger, reply }) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.busy.store(false, Ordering::Release);
                Err(CycleRunError::Busy)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.busy.store(false, Ordering::Release);
                Err(CycleRunError::Unavailable)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use solboard_core_types::{LeaderboardSnapshot, WinnerPot};
    use std::sync::mpsc as std_mpsc;
    use std::sync::Mutex;
    use uuid::Uuid;

    pub(crate) fn report(rows: usize) -> CycleReport {
        let updated = Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap();
        CycleReport {
            cycle_id: Uuid::new_v4(),
            snapshot: LeaderboardSnapshot {
                updated,
                data: Vec::new(),
                winner_pot: WinnerPot {
                    wallet: String::new(),
                    balance: 0.0,
                },
                challenge_ended: false,
                challenge_end_date: Utc.with_ymd_and_hms(2025, 8, 10, 22, 0, 0).unwrap(),
            },
            frozen: false,
            native_usd_rate: None,
            wallets_processed: rows,
            wallets_skipped: 0,
            unresolved_balances: 0,
            unresolved_holdings: 0,
            unresolved_prices: 0,
            elapsed_ms: 1,
        }
    }

    /// Blocks each cycle until the test releases it.
    pub(crate) struct GatedRunner {
        pub(crate) gate: Arc<Mutex<std_mpsc::Receiver<()>>>,
        pub(crate) fail: bool,
    }

    impl CycleRunner for GatedRunner {
        fn run(&mut self, _trigger: CycleTrigger) -> Result<CycleReport> {
            let _ = self.gate.lock().unwrap().recv();
            if self.fail {
                return Err(anyhow!("wallet list missing"));
            }
            Ok(report(2))
        }
    }

    pub(crate) struct InstantRunner;

    impl CycleRunner for InstantRunner {
        fn run(&mut self, _trigger: CycleTrigger) -> Result<CycleReport> {
            Ok(report(3))
        }
    }

    #[tokio::test]
    async fn run_returns_cycle_report() -> Result<()> {
        let (worker, _join) = CycleWorkerHandle::spawn(|| Ok(InstantRunner)).await?;
        let report = worker
            .run(CycleTrigger::Manual)
            .await
            .map_err(|error| anyhow!("{error}"))?;
        assert_eq!(report.wallets_processed, 3);
        assert!(!worker.is_busy());
        Ok(())
    }

    #[tokio::test]
    async fn overlapping_trigger_is_rejected_while_cycle_runs() -> Result<()> {
        let (release, gate) = std_mpsc::channel();
        let gate = Arc::new(Mutex::new(gate));
        let (worker, _join) =
            CycleWorkerHandle::spawn(move || Ok(GatedRunner { gate, fail: false })).await?;

        let running = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run(CycleTrigger::Manual).await })
        };
        while !worker.is_busy() {
            tokio::task::yield_now().await;
        }
        assert!(matches!(
            worker.try_trigger(CycleTrigger::Scheduled),
            Err(CycleRunError::Busy)
        ));

        release.send(())?;
        let report = running
            .await?
            .map_err(|error| anyhow!("{error}"))?;
        assert_eq!(report.wallets_processed, 2);
        Ok(())
    }

    #[tokio::test]
    async fn failed_cycle_is_reported_and_worker_keeps_running() -> Result<()> {
        let (release, gate) = std_mpsc::channel();
        let gate = Arc::new(Mutex::new(gate));
        let (worker, _join) =
            CycleWorkerHandle::spawn(move || Ok(GatedRunner { gate, fail: true })).await?;
        release.send(())?;
        release.send(())?;

        let first = worker.run(CycleTrigger::Manual).await;
        assert!(matches!(first, Err(CycleRunError::Failed(_))));
        let second = worker.run(CycleTrigger::Manual).await;
        assert!(matches!(second, Err(CycleRunError::Failed(_))));
        Ok(())
    }

    #[tokio::test]
    async fn runner_build_error_is_returned_from_spawn() {
        let result =
            CycleWorkerHandle::spawn(|| Err::<InstantRunner, _>(anyhow!("bad rpc url"))).await;
        let err = result.err().expect("build error must surface");
        assert!(err.to_string().contains("bad rpc url"));
    }
}
