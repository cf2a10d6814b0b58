//! Nonce ledger
//!
//! The single piece of shared mutable state in the sign-in flow. A nonce
//! moves `unknown -> issued -> consumed`, or straight `unknown -> consumed`
//! for client-minted nonces. Consumption must be one atomic conditional
//! transition in the backing store so that, of any number of concurrent
//! callers presenting the same nonce, exactly one succeeds.

use crate::error::{Result, SiwfError};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Which nonces a ledger accepts on consumption
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonceMode {
    /// Only nonces previously issued by the server
    Issued,
    /// Any nonce, accepted only on its first appearance
    FirstUse,
    /// Issued nonces are consumed; unknown nonces are tombstoned on first use
    #[default]
    Either,
}

impl NonceMode {
    /// Stable configuration name
    pub fn as_str(&self) -> &'static str {
        match self {
            NonceMode::Issued => "issued",
            NonceMode::FirstUse => "first_use",
            NonceMode::Either => "either",
        }
    }
}

impl fmt::Display for NonceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NonceMode {
    type Err = SiwfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "issued" => Ok(NonceMode::Issued),
            "first_use" | "first-use" => Ok(NonceMode::FirstUse),
            "either" => Ok(NonceMode::Either),
            other => Err(SiwfError::ConfigError(format!(
                "unknown nonce mode '{}' (expected issued, first_use or either)",
                other
            ))),
        }
    }
}

/// Stored nonce state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceRecord {
    pub nonce: String,
    pub consumed: bool,
    /// Identity bound at consumption
    pub fid: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Freshly issued nonce, as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedNonce {
    pub nonce: String,
    /// Seconds until expiry
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
}

/// Arguments for a single consume attempt
#[derive(Debug, Clone)]
pub struct ConsumeRequest<'a> {
    pub nonce: &'a str,
    pub fid: u64,
    pub mode: NonceMode,
    pub now: DateTime<Utc>,
    /// Retention of the consumed row
    pub tombstone_expires_at: DateTime<Utc>,
}

/// Retention of a first-use tombstone.
///
/// The tombstone must outlive the signed message: a message with no
/// expiration stays replayable forever, so its tombstone is never swept.
pub fn tombstone_expiry(
    now: DateTime<Utc>,
    message_expiration: Option<DateTime<Utc>>,
    retention: Duration,
) -> DateTime<Utc> {
    match message_expiration {
        Some(expires_at) => {
            let minimum = chrono::Duration::from_std(retention)
                .ok()
                .and_then(|retention| now.checked_add_signed(retention))
                .unwrap_or(expires_at);
            expires_at.max(minimum)
        }
        None => Utc
            .with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}

/// Mint a new random nonce (32 hex characters)
pub fn generate_nonce() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Durable nonce store with an atomic consume
#[async_trait]
pub trait NonceLedger: Send + Sync {
    /// Store a server-issued, unconsumed nonce
    async fn record_issued(&self, record: NonceRecord) -> Result<()>;

    /// Consume a nonce exactly once.
    ///
    /// Returns `NonceAlreadyUsed` or `NonceNotFound` when the transition
    /// does not apply. Never succeeds twice for the same nonce.
    async fn consume(&self, request: ConsumeRequest<'_>) -> Result<()>;

    /// Read a nonce record (diagnostics and tests)
    async fn get(&self, nonce: &str) -> Result<Option<NonceRecord>>;

    /// Delete rows whose retention ended; returns the number removed
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Issue a new nonce valid for `ttl`
    async fn issue(&self, ttl: Duration, now: DateTime<Utc>) -> Result<IssuedNonce> {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| SiwfError::ConfigError(format!("nonce ttl {:?} out of range", ttl)))?;
        let nonce = generate_nonce();

        self.record_issued(NonceRecord {
            nonce: nonce.clone(),
            consumed: false,
            fid: None,
            created_at: now,
            expires_at,
        })
        .await?;

        debug!(expires_at = %expires_at, "nonce issued");
        Ok(IssuedNonce {
            nonce,
            expires_in: ttl.as_secs(),
            expires_at,
        })
    }
}

/// Why a consume attempt matched nothing, from a read of the current row
pub fn diagnose_unconsumable(nonce: &str, existing: Option<&NonceRecord>) -> SiwfError {
    match existing {
        Some(record) if record.consumed => SiwfError::NonceAlreadyUsed(nonce.to_string()),
        _ => SiwfError::NonceNotFound(nonce.to_string()),
    }
}

/// In-process ledger.
///
/// The mutex makes every transition atomic within one process only. Use a
/// shared database ledger when more than one instance serves sign-ins.
#[derive(Debug, Default)]
pub struct MemoryNonceLedger {
    records: Mutex<HashMap<String, NonceRecord>>,
}

impl MemoryNonceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, NonceRecord>>> {
        self.records
            .lock()
            .map_err(|_| SiwfError::StorageUnavailable("nonce ledger lock poisoned".to_string()))
    }
}

#[async_trait]
impl NonceLedger for MemoryNonceLedger {
    async fn record_issued(&self, record: NonceRecord) -> Result<()> {
        let mut records = self.lock()?;
        if records.contains_key(&record.nonce) {
            return Err(SiwfError::StorageUnavailable(format!(
                "nonce '{}' already exists",
                record.nonce
            )));
        }
        records.insert(record.nonce.clone(), record);
        Ok(())
    }

    async fn consume(&self, request: ConsumeRequest<'_>) -> Result<()> {
        let mut records = self.lock()?;

        // Issued path: unconsumed and unexpired
        if matches!(request.mode, NonceMode::Issued | NonceMode::Either) {
            if let Some(record) = records.get_mut(request.nonce) {
                if !record.consumed && record.expires_at > request.now {
                    record.consumed = true;
                    record.fid = Some(request.fid);
                    // Consumed rows are retained like tombstones
                    record.expires_at = record.expires_at.max(request.tombstone_expires_at);
                    return Ok(());
                }
                return Err(diagnose_unconsumable(request.nonce, Some(record)));
            }
        }

        // First-use path: insert already consumed, guarded by key uniqueness
        if matches!(request.mode, NonceMode::FirstUse | NonceMode::Either) {
            if let Some(existing) = records.get(request.nonce) {
                // Known nonces are never re-admitted, expired or not
                return Err(match request.mode {
                    NonceMode::FirstUse => SiwfError::NonceAlreadyUsed(request.nonce.to_string()),
                    _ => diagnose_unconsumable(request.nonce, Some(existing)),
                });
            }
            records.insert(
                request.nonce.to_string(),
                NonceRecord {
                    nonce: request.nonce.to_string(),
                    consumed: true,
                    fid: Some(request.fid),
                    created_at: request.now,
                    expires_at: request.tombstone_expires_at,
                },
            );
            return Ok(());
        }

        Err(SiwfError::NonceNotFound(request.nonce.to_string()))
    }

    async fn get(&self, nonce: &str) -> Result<Option<NonceRecord>> {
        Ok(self.lock()?.get(nonce).cloned())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, record| record.expires_at > now);
        let removed = (before - records.len()) as u64;
        if removed > 0 {
            info!(removed, "swept expired nonces");
        }
        Ok(removed)
    }
}
