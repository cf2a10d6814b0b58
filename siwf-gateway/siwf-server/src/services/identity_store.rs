//! Postgres identity store

use super::{db_fid, from_db_fid, storage_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use siwf_auth::{
    error::{Result, SiwfError},
    Address, IdentityRecord, IdentityStore,
};
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow)]
struct IdentityRow {
    fid: i64,
    custody_address: String,
    created_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
}

impl TryFrom<IdentityRow> for IdentityRecord {
    type Error = SiwfError;

    fn try_from(row: IdentityRow) -> Result<Self> {
        let custody_address: Address = row.custody_address.parse().map_err(|e| {
            SiwfError::StorageUnavailable(format!("stored custody address is invalid: {}", e))
        })?;

        Ok(IdentityRecord {
            fid: from_db_fid(row.fid)?,
            custody_address,
            created_at: row.created_at,
            last_seen_at: row.last_seen_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn upsert(
        &self,
        fid: u64,
        signer: &Address,
        seen_at: DateTime<Utc>,
    ) -> Result<IdentityRecord> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "INSERT INTO siwf_identities (fid, custody_address, created_at, last_seen_at) \
             VALUES ($1, $2, $3, $3) \
             ON CONFLICT (fid) DO UPDATE \
             SET custody_address = EXCLUDED.custody_address, last_seen_at = EXCLUDED.last_seen_at \
             RETURNING fid, custody_address, created_at, last_seen_at",
        )
        .bind(db_fid(fid)?)
        .bind(signer.to_checksum())
        .bind(seen_at)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        row.try_into()
    }

    async fn get(&self, fid: u64) -> Result<Option<IdentityRecord>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT fid, custody_address, created_at, last_seen_at FROM siwf_identities WHERE fid = $1",
        )
        .bind(db_fid(fid)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(IdentityRecord::try_from).transpose()
    }
}
