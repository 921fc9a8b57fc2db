use anyhow::{Context, Result};
use solboard_core_types::ChallengeWindow;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::env_parsing::{parse_challenge_window, parse_env_bool, validate_app_config};
use super::AppConfig;

pub fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
    Ok(cfg)
}

pub fn load_from_env_or_default(default_path: &Path) -> Result<(AppConfig, PathBuf)> {
    let configured = env::var("SOLBOARD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_path.to_path_buf());
    let mut config = load_from_path(&configured)?;

    if let Ok(log_level) = env::var("SOLBOARD_LOG_LEVEL") {
        let trimmed = log_level.trim();
        if !trimmed.is_empty() {
            config.system.log_level = trimmed.to_string();
        }
    }
    if let Some(log_json) = env::var("SOLBOARD_LOG_JSON").ok().and_then(parse_env_bool) {
        config.system.log_json = log_json;
    }
    if let Some(refresh_seconds) = env::var("SOLBOARD_REFRESH_SECONDS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
    {
        config.system.refresh_seconds = refresh_seconds;
    }
    if let Some(cycle_concurrency) = env::var("SOLBOARD_CYCLE_CONCURRENCY")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
    {
        config.system.cycle_concurrency = cycle_concurrency;
    }
    if let Ok(wallets_path) = env::var("SOLBOARD_WALLETS_PATH") {
        config.paths.wallets_path = wallets_path;
    }
    if let Ok(start_values_path) = env::var("SOLBOARD_START_VALUES_PATH") {
        config.paths.start_values_path = start_values_path;
    }
    if let Ok(snapshot_path) = env::var("SOLBOARD_SNAPSHOT_PATH") {
        config.paths.snapshot_path = snapshot_path;
    }
    if let Ok(http_url) = env::var("SOLBOARD_RPC_HTTP_URL") {
        config.rpc.http_url = http_url;
    }
    if let Some(timeout_ms) = env::var("SOLBOARD_RPC_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
    {
        config.rpc.timeout_ms = timeout_ms;
    }
    if let Ok(mode) = env::var("SOLBOARD_HOLDINGS_MODE") {
        let trimmed = mode.trim();
        if !trimmed.is_empty() {
            config.holdings.mode = trimmed.to_string();
        }
    }
    if let Ok(api_key) = env::var("SOLBOARD_HELIUS_API_KEY") {
        config.holdings.helius_api_key = api_key.trim().to_string();
    }
    if let Some(enabled) = env::var("SOLBOARD_HELIUS_FALLBACK_ENABLED")
        .ok()
        .and_then(parse_env_bool)
    {
        config.holdings.helius_fallback_enabled = enabled;
    }
    if let Ok(api_key) = env::var("SOLBOARD_SOLSCAN_API_KEY") {
        config.holdings.solscan_api_key = api_key.trim().to_string();
    }
    if let Some(max_attempts) = env::var("SOLBOARD_JUPITER_MAX_ATTEMPTS")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
    {
        config.pricing.jupiter_max_attempts = max_attempts;
    }
    if let Ok(start_date) = env::var("SOLBOARD_CHALLENGE_START_DATE") {
        config.challenge.start_date = start_date;
    }
    if let Ok(end_date) = env::var("SOLBOARD_CHALLENGE_END_DATE") {
        config.challenge.end_date = end_date;
    }
    if let Ok(wallet) = env::var("SOLBOARD_WINNER_POT_WALLET") {
        config.challenge.winner_pot_wallet = wallet.trim().to_string();
    }
    if let Some(enabled) = env::var("SOLBOARD_WEB_ENABLED").ok().and_then(parse_env_bool) {
        config.web.enabled = enabled;
    }
    if let Some(port) = env::var("SOLBOARD_WEB_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        config.web.port = port;
    }
    if let Ok(auth_token) = env::var("SOLBOARD_WEB_AUTH_TOKEN") {
        config.web.auth_token = auth_token.trim().to_string();
    }

    validate_app_config(&config)?;

    Ok((config, configured))
}

pub fn challenge_window(config: &AppConfig) -> Result<ChallengeWindow> {
    parse_challenge_window(config)
}
