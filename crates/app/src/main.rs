use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use solboard_config::{challenge_window, load_from_env_or_default, AppConfig};
use std::env;
use std::path::{Path, PathBuf};
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod cycle_worker;
mod status;
mod web;

use crate::cycle_worker::{CycleRunError, CycleTrigger, CycleWorkerHandle, PipelineRunner};
use crate::web::WebRuntimeHandle;

const DEFAULT_CONFIG_PATH: &str = "configs/dev.toml";
const MIN_REFRESH_SECONDS: u64 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CliArgs {
    config: Option<PathBuf>,
    once: bool,
    status: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_cli_args(env::args().skip(1));
    let default_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let (config, loaded_config_path) = load_from_env_or_default(&default_path)?;

    init_tracing(&config.system.log_level, config.system.log_json);
    info!(
        config_path = %loaded_config_path.display(),
        env = %config.system.env,
        holdings_mode = %config.holdings.mode,
        "configuration loaded"
    );

    if cli.status {
        return run_status(config, loaded_config_path).await;
    }

    let runner_config = config.clone();
    let (worker, worker_thread) =
        CycleWorkerHandle::spawn(move || PipelineRunner::from_config(&runner_config))
            .await
            .context("failed to initialize leaderboard pipeline")?;

    if cli.once {
        let outcome = worker.run(CycleTrigger::Startup).await;
        drop(worker);
        join_worker(worker_thread).await;
        let report = outcome.map_err(|error| anyhow!("{error}"))?;
        info!(
            cycle_id = %report.cycle_id,
            wallets = report.wallets_processed,
            snapshot_path = %config.paths.snapshot_path,
            "single leaderboard update written"
        );
        return Ok(());
    }

    if config.web.enabled {
        let window = challenge_window(&config)?;
        let web = WebRuntimeHandle::new(&config, &window, worker.clone());
        let web_config = config.web.clone();
        tokio::spawn(async move {
            if let Err(error) = web.run_server(web_config).await {
                error!(error = %format!("{error:#}"), "web server stopped");
            }
        });
    }

    run_refresh_loop(&worker, config.system.refresh_seconds).await;
    drop(worker);
    join_worker(worker_thread).await;
    Ok(())
}

fn parse_cli_args<I>(args: I) -> CliArgs
where
    I: IntoIterator<Item = String>,
{
    let mut cli = CliArgs::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            cli.config = args.next().map(PathBuf::from);
        } else if let Some(inline) = arg.strip_prefix("--config=") {
            cli.config = Some(PathBuf::from(inline));
        } else if arg == "--once" {
            cli.once = true;
        } else if arg == "--status" {
            cli.status = true;
        }
    }
    cli
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    if json {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_env_filter(filter)
            .json()
            .compact()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_env_filter(filter)
            .compact()
            .init();
    }
}

async fn run_status(config: AppConfig, config_path: PathBuf) -> Result<()> {
    let report = tokio::task::spawn_blocking(move || {
        status::run_status_check(&config, Path::new(&config_path), Utc::now())
    })
    .await
    .context("status check task failed")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed serializing status report")?
    );
    if !report.healthy() {
        return Err(anyhow!("status check found problems"));
    }
    Ok(())
}

async fn run_refresh_loop(worker: &CycleWorkerHandle, refresh_seconds: u64) {
    let mut interval = time::interval(Duration::from_secs(
        refresh_seconds.max(MIN_REFRESH_SECONDS),
    ));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut trigger = CycleTrigger::Startup;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match worker.try_trigger(trigger) {
                    Ok(()) => debug!(trigger = trigger.as_str(), "leaderboard update queued"),
                    Err(CycleRunError::Busy) => {
                        info!(trigger = trigger.as_str(), "update already running, skipping");
                    }
                    Err(error) => {
                        warn!(error = %error, "cycle worker unavailable, stopping refresh loop");
                        break;
                    }
                }
                trigger = CycleTrigger::Scheduled;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }
}

async fn join_worker(worker_thread: std::thread::JoinHandle<()>) {
    match tokio::task::spawn_blocking(move || worker_thread.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => warn!("cycle worker thread panicked"),
        Err(error) => warn!(error = %error, "failed joining cycle worker thread"),
    }
}
