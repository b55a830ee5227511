use crate::error::{ConfigError, Result};
use std::env;
use std::path::PathBuf;

const DEFAULT_PROJECTS_DIR: &str = "./projects";
const DEFAULT_DB_PATH: &str = "watcher.db";
const DEFAULT_RPC_RETRIES: usize = 2;
const MAX_RPC_RETRIES: usize = 8;
const DEFAULT_DIGEST_LOCAL_HOUR: u32 = 9;
const DEFAULT_DIGEST_UTC_OFFSET_HOURS: i32 = 2;

/// Runtime settings resolved from the environment at startup.
///
/// Everything here is read once in `main`; the watch cycle itself only sees
/// the components built from these values.
#[derive(Debug, Clone)]
pub struct Settings {
    pub eth_rpc_url: String,
    pub projects_dir: PathBuf,
    pub db_path: PathBuf,
    pub rpc_retries: usize,
    pub digest_local_hour: u32,
    pub digest_utc_offset_hours: i32,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let eth_rpc_url = env::var("ETH_RPC_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingConfig("ETH_RPC_URL".to_string()))?;
        validate_http_url("ETH_RPC_URL", &eth_rpc_url)?;

        Ok(Self {
            eth_rpc_url,
            projects_dir: PathBuf::from(load_trimmed_env("PROJECTS_DIR", DEFAULT_PROJECTS_DIR)),
            db_path: PathBuf::from(load_trimmed_env("WATCHER_DB_PATH", DEFAULT_DB_PATH)),
            rpc_retries: load_rpc_retries(),
            digest_local_hour: load_clamped("DIGEST_LOCAL_HOUR", DEFAULT_DIGEST_LOCAL_HOUR, 0, 23),
            digest_utc_offset_hours: load_clamped(
                "DIGEST_UTC_OFFSET_HOURS",
                DEFAULT_DIGEST_UTC_OFFSET_HOURS,
                -12,
                14,
            ),
        })
    }
}

fn load_trimmed_env(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn load_rpc_retries() -> usize {
    env::var("RPC_RETRIES")
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .map(|v| v.min(MAX_RPC_RETRIES))
        .unwrap_or(DEFAULT_RPC_RETRIES)
}

fn load_clamped<T: std::str::FromStr + Ord + Copy>(key: &str, default: T, min: T, max: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .map(|v| v.clamp(min, max))
        .unwrap_or(default)
}

fn validate_http_url(name: &str, raw: &str) -> Result<()> {
    let parsed = raw.parse::<reqwest::Url>().map_err(|e| {
        ConfigError::InvalidConfig(format!("{name} must be a valid URL, got `{raw}`: {e}"))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidConfig(format!(
            "{name} must use http(s) scheme, got `{other}`"
        ))
        .into()),
    }
}
