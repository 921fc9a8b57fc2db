#[cfg(test)]
use std::fs;
#[cfg(test)]
use std::path::{Path, PathBuf};

mod env_parsing;
mod loader;
mod schema;

pub use self::env_parsing::parse_challenge_timestamp;
pub use self::loader::{challenge_window, load_from_env_or_default, load_from_path};
pub use self::schema::{
    AppConfig, ChallengeConfig, HoldingsConfig, HoldingsMode, PathsConfig, PricingConfig,
    RpcConfig, SystemConfig, WebConfig,
};
