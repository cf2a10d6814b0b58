//! Sign-in configuration
//!
//! Loaded from TOML, then overridden from the environment. Durations use
//! humantime notation (`"10m"`, `"30days"`).

use crate::{
    address::Address,
    error::{Result, SiwfError},
    nonce::NonceMode,
    session::MIN_SECRET_LENGTH,
    DEFAULT_ID_REGISTRY, DEFAULT_RPC_URL, FARCASTER_CHAIN_ID,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upper bound for every configured lifetime (nonce ttl, retention, session ttl)
pub const MAX_TTL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiwfConfig {
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Message policy and nonce handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Accepted authorities, matched exactly
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default = "PolicyConfig::default_chain_id")]
    pub chain_id: u64,
    #[serde(default)]
    pub nonce_mode: NonceMode,
    /// Lifetime of server-issued nonces
    #[serde(default = "PolicyConfig::default_nonce_ttl", with = "humantime_serde")]
    pub nonce_ttl: Duration,
    /// Minimum retention of tombstoned client nonces
    #[serde(
        default = "PolicyConfig::default_first_use_retention",
        with = "humantime_serde"
    )]
    pub first_use_retention: Duration,
}

impl PolicyConfig {
    fn default_chain_id() -> u64 {
        FARCASTER_CHAIN_ID
    }

    fn default_nonce_ttl() -> Duration {
        Duration::from_secs(10 * 60)
    }

    fn default_first_use_retention() -> Duration {
        Duration::from_secs(24 * 60 * 60)
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_domains: Vec::new(),
            chain_id: Self::default_chain_id(),
            nonce_mode: NonceMode::default(),
            nonce_ttl: Self::default_nonce_ttl(),
            first_use_retention: Self::default_first_use_retention(),
        }
    }
}

/// IdRegistry access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "RegistryConfig::default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "RegistryConfig::default_id_registry")]
    pub id_registry_address: String,
    /// Per-attempt timeout
    #[serde(default = "RegistryConfig::default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Total attempts on retryable failures
    #[serde(default = "RegistryConfig::default_attempts")]
    pub attempts: u32,
}

impl RegistryConfig {
    fn default_rpc_url() -> String {
        DEFAULT_RPC_URL.to_string()
    }

    fn default_id_registry() -> String {
        DEFAULT_ID_REGISTRY.to_string()
    }

    fn default_timeout() -> Duration {
        Duration::from_secs(15)
    }

    fn default_attempts() -> u32 {
        2
    }

    /// Parsed registry contract address
    pub fn registry_address(&self) -> Result<Address> {
        self.id_registry_address.parse().map_err(|e| {
            SiwfError::ConfigError(format!("invalid id_registry_address: {}", e))
        })
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            rpc_url: Self::default_rpc_url(),
            id_registry_address: Self::default_id_registry(),
            timeout: Self::default_timeout(),
            attempts: Self::default_attempts(),
        }
    }
}

/// Session credential settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret; usually supplied through `JWT_SECRET`
    #[serde(default)]
    pub secret: String,
    #[serde(default = "SessionConfig::default_ttl", with = "humantime_serde")]
    pub ttl: Duration,
    #[serde(default = "SessionConfig::default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "SessionConfig::default_issuer")]
    pub issuer: String,
}

impl SessionConfig {
    fn default_ttl() -> Duration {
        Duration::from_secs(43_200 * 60)
    }

    fn default_cookie_name() -> String {
        "siwf_session".to_string()
    }

    fn default_issuer() -> String {
        "siwf-gateway".to_string()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl: Self::default_ttl(),
            cookie_name: Self::default_cookie_name(),
            issuer: Self::default_issuer(),
        }
    }
}

impl SiwfConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SiwfError::ConfigError(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply environment overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(domains) = lookup("SIWF_ALLOWED_DOMAINS") {
            self.policy.allowed_domains = domains
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(chain_id) = lookup("SIWF_CHAIN_ID") {
            self.policy.chain_id = chain_id
                .trim()
                .parse()
                .map_err(|e| SiwfError::ConfigError(format!("invalid SIWF_CHAIN_ID: {}", e)))?;
        }
        if let Some(mode) = lookup("SIWF_NONCE_MODE") {
            self.policy.nonce_mode = mode.parse()?;
        }
        if let Some(url) = lookup("OPTIMISM_RPC_URL") {
            self.registry.rpc_url = url;
        }
        if let Some(address) = lookup("ID_REGISTRY_ADDRESS") {
            self.registry.id_registry_address = address;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.session.secret = secret;
        }
        if let Some(minutes) = lookup("ACCESS_TOKEN_EXPIRES_MINUTES") {
            let minutes: u64 = minutes.trim().parse().map_err(|e| {
                SiwfError::ConfigError(format!("invalid ACCESS_TOKEN_EXPIRES_MINUTES: {}", e))
            })?;
            let seconds = minutes.checked_mul(60).ok_or_else(|| {
                SiwfError::ConfigError(format!(
                    "ACCESS_TOKEN_EXPIRES_MINUTES out of range: {}",
                    minutes
                ))
            })?;
            self.session.ttl = Duration::from_secs(seconds);
        }
        if let Some(name) = lookup("SESSION_COOKIE_NAME") {
            self.session.cookie_name = name;
        }
        Ok(())
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.policy.allowed_domains.is_empty() {
            return Err(SiwfError::ConfigError(
                "policy.allowed_domains must not be empty".to_string(),
            ));
        }
        if self.policy.nonce_ttl.is_zero() {
            return Err(SiwfError::ConfigError("policy.nonce_ttl must be positive".to_string()));
        }
        if self.registry.attempts == 0 {
            return Err(SiwfError::ConfigError("registry.attempts must be at least 1".to_string()));
        }
        if self.registry.timeout.is_zero() {
            return Err(SiwfError::ConfigError("registry.timeout must be positive".to_string()));
        }
        self.registry.registry_address()?;
        if self.session.secret.len() < MIN_SECRET_LENGTH {
            return Err(SiwfError::ConfigError(format!(
                "session.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if self.session.ttl.is_zero() {
            return Err(SiwfError::ConfigError("session.ttl must be positive".to_string()));
        }
        for (name, ttl) in [
            ("policy.nonce_ttl", self.policy.nonce_ttl),
            ("policy.first_use_retention", self.policy.first_use_retention),
            ("session.ttl", self.session.ttl),
        ] {
            if ttl > MAX_TTL {
                return Err(SiwfError::ConfigError(format!(
                    "{} must not exceed {} days",
                    name,
                    MAX_TTL.as_secs() / 86_400
                )));
            }
        }
        Ok(())
    }
}
