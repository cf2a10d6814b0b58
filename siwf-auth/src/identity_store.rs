//! Identity records written after a successful sign-in

use crate::{
    address::Address,
    error::{Result, SiwfError},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Identity row owned by the sign-in flow. Profile columns belong to the
/// surrounding application and are never touched here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub fid: u64,
    pub custody_address: Address,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert or refresh the identity row keyed by `fid`
    async fn upsert(&self, fid: u64, signer: &Address, seen_at: DateTime<Utc>)
        -> Result<IdentityRecord>;

    async fn get(&self, fid: u64) -> Result<Option<IdentityRecord>>;
}

/// In-process identity store
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    records: Mutex<HashMap<u64, IdentityRecord>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn upsert(
        &self,
        fid: u64,
        signer: &Address,
        seen_at: DateTime<Utc>,
    ) -> Result<IdentityRecord> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| SiwfError::StorageUnavailable("identity store lock poisoned".to_string()))?;

        let record = records
            .entry(fid)
            .and_modify(|record| {
                record.custody_address = *signer;
                record.last_seen_at = seen_at;
            })
            .or_insert_with(|| IdentityRecord {
                fid,
                custody_address: *signer,
                created_at: seen_at,
                last_seen_at: seen_at,
            });
        Ok(record.clone())
    }

    async fn get(&self, fid: u64) -> Result<Option<IdentityRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| SiwfError::StorageUnavailable("identity store lock poisoned".to_string()))?;
        Ok(records.get(&fid).cloned())
    }
}
