//! Server configuration
//!
//! Listener and storage settings come from flags or the environment; the
//! sign-in policy is read from an optional TOML file and then overridden by
//! the `SIWF_*`, `JWT_*` and registry environment variables.

use clap::Parser;
use siwf_auth::{Result, SiwfConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "siwf-server", version, about = "Sign-In With Farcaster gateway")]
pub struct Config {
    /// Sign-in policy file (TOML)
    #[arg(long, env = "SIWF_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "SIWF_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "SIWF_SERVER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Postgres URL; without it the ledger lives in process memory
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "SIWF_DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Seconds between expired-nonce sweeps
    #[arg(long, env = "SIWF_SWEEP_INTERVAL_SECS", default_value_t = 300)]
    pub sweep_interval_secs: u64,

    /// Emit logs as JSON
    #[arg(long, env = "SIWF_LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Load, override and validate the sign-in configuration
    pub fn load_siwf_config(&self) -> Result<SiwfConfig> {
        let mut siwf = match &self.config {
            Some(path) => SiwfConfig::load(path)?,
            None => SiwfConfig::default(),
        };
        siwf.apply_env()?;
        siwf.validate()?;
        Ok(siwf)
    }
}
