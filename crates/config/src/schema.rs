use serde::Deserialize;
use solboard_core_types::USDC_MINT;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub system: SystemConfig,
    pub paths: PathsConfig,
    pub rpc: RpcConfig,
    pub holdings: HoldingsConfig,
    pub pricing: PricingConfig,
    pub challenge: ChallengeConfig,
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub env: String,
    pub log_level: String,
    pub log_json: bool,
    pub refresh_seconds: u64,
    pub cycle_concurrency: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            env: "dev".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            refresh_seconds: 30,
            cycle_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub wallets_path: String,
    pub start_values_path: String,
    pub snapshot_path: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            wallets_path: "config/wallets.json".to_string(),
            start_values_path: "data/start_sol_balances.json".to_string(),
            snapshot_path: "data/leaderboard.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub http_url: String,
    pub timeout_ms: u64,
    /// Pause before each token-account query; public RPC nodes rate limit aggressively.
    pub request_delay_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            http_url: "https://api.mainnet-beta.solana.com".to_string(),
            timeout_ms: 10_000,
            request_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldingsMode {
    Live,
    Transfers,
}

impl HoldingsMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "live" | "balances" => Some(Self::Live),
            "transfers" | "transfer" => Some(Self::Transfers),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Transfers => "transfers",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HoldingsConfig {
    pub mode: String,
    pub timeout_ms: u64,
    pub helius_fallback_enabled: bool,
    pub helius_api_base: String,
    pub helius_api_key: String,
    pub solscan_base_url: String,
    pub solscan_api_key: String,
    pub transfer_page_limit: u32,
}

impl Default for HoldingsConfig {
    fn default() -> Self {
        Self {
            mode: "live".to_string(),
            timeout_ms: 10_000,
            helius_fallback_enabled: true,
            helius_api_base: "https://api.helius.xyz".to_string(),
            helius_api_key: String::new(),
            solscan_base_url: "https://public-api.solscan.io".to_string(),
            solscan_api_key: String::new(),
            transfer_page_limit: 1_000,
        }
    }
}

impl HoldingsConfig {
    pub fn holdings_mode(&self) -> Option<HoldingsMode> {
        HoldingsMode::parse(&self.mode)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub timeout_ms: u64,
    pub dexscreener_base_url: String,
    pub jupiter_price_url: String,
    pub jupiter_max_attempts: u32,
    /// Mint used as the USD leg when asking Jupiter for the SOL reference rate.
    pub usd_reference_mint: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 8_000,
            dexscreener_base_url: "https://api.dexscreener.com/latest".to_string(),
            jupiter_price_url: "https://price.jup.ag/v4/price".to_string(),
            jupiter_max_attempts: 3,
            usd_reference_mint: USDC_MINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChallengeConfig {
    pub start_date: String,
    pub end_date: String,
    pub winner_pot_wallet: String,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            start_date: "2025-07-27T22:00:01Z".to_string(),
            end_date: String::new(),
            winner_pot_wallet: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub auth_token: String,
    pub cache_timeout_seconds: u64,
    pub public_base_url: String,
    pub timezone: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 8080,
            auth_token: String::new(),
            cache_timeout_seconds: 30,
            public_base_url: "/api".to_string(),
            timezone: "Europe/Berlin".to_string(),
        }
    }
}
