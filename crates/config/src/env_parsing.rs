use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use solboard_core_types::ChallengeWindow;

use super::{AppConfig, HoldingsMode};

pub(crate) fn parse_env_bool(value: String) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_challenge_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(anyhow!("timestamp is empty"));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed.and_utc());
        }
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("unrecognized timestamp format: {value}"))?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow!("invalid midnight for date {value}"))
}

pub(crate) fn parse_challenge_window(config: &AppConfig) -> Result<ChallengeWindow> {
    let start = parse_challenge_timestamp(&config.challenge.start_date)
        .context("challenge.start_date is invalid")?;
    let end = parse_challenge_timestamp(&config.challenge.end_date)
        .context("challenge.end_date is invalid")?;
    if end <= start {
        return Err(anyhow!(
            "challenge.end_date ({}) must be after challenge.start_date ({})",
            end.to_rfc3339(),
            start.to_rfc3339()
        ));
    }
    Ok(ChallengeWindow { start, end })
}

pub(crate) fn validate_app_config(config: &AppConfig) -> Result<()> {
    parse_challenge_window(config)?;

    let Some(mode) = config.holdings.holdings_mode() else {
        return Err(anyhow!(
            "holdings.mode must be one of live|transfers, got {:?} (check SOLBOARD_HOLDINGS_MODE)",
            config.holdings.mode
        ));
    };
    if mode == HoldingsMode::Live && config.holdings.helius_fallback_enabled {
        let key = config.holdings.helius_api_key.trim();
        if key.is_empty() || key.contains("REPLACE_ME") {
            return Err(anyhow!(
                "holdings.helius_api_key is required when holdings.helius_fallback_enabled=true (check SOLBOARD_HELIUS_API_KEY)"
            ));
        }
    }

    for (name, url) in [
        ("rpc.http_url", config.rpc.http_url.as_str()),
        (
            "pricing.dexscreener_base_url",
            config.pricing.dexscreener_base_url.as_str(),
        ),
        (
            "pricing.jupiter_price_url",
            config.pricing.jupiter_price_url.as_str(),
        ),
    ] {
        if url.trim().is_empty() {
            return Err(anyhow!("{name} must not be empty"));
        }
    }
    if mode == HoldingsMode::Transfers && config.holdings.solscan_base_url.trim().is_empty() {
        return Err(anyhow!(
            "holdings.solscan_base_url must not be empty in transfers mode"
        ));
    }
    if config.pricing.jupiter_max_attempts == 0 {
        return Err(anyhow!("pricing.jupiter_max_attempts must be >= 1"));
    }
    if config.system.cycle_concurrency == 0 {
        return Err(anyhow!("system.cycle_concurrency must be >= 1"));
    }

    Ok(())
}
