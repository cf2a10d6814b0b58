//! Postgres nonce ledger
//!
//! Every consumption is a single conditional statement, so the
//! exactly-once guarantee holds across all gateway instances sharing the
//! database, not just within one process.

use super::{db_fid, from_db_fid, storage_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use siwf_auth::{
    error::{Result, SiwfError},
    nonce::{diagnose_unconsumable, ConsumeRequest, NonceLedger, NonceMode, NonceRecord},
};
use sqlx::PgPool;
use tracing::{debug, info};

#[derive(Debug, sqlx::FromRow)]
struct NonceRow {
    nonce: String,
    consumed: bool,
    fid: Option<i64>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<NonceRow> for NonceRecord {
    type Error = SiwfError;

    fn try_from(row: NonceRow) -> Result<Self> {
        Ok(NonceRecord {
            nonce: row.nonce,
            consumed: row.consumed,
            fid: row.fid.map(from_db_fid).transpose()?,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgNonceLedger {
    pool: PgPool,
}

impl PgNonceLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// unconsumed + unexpired → consumed
    async fn consume_issued(&self, request: &ConsumeRequest<'_>, fid: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE siwf_nonces \
             SET consumed = TRUE, fid = $2, expires_at = GREATEST(expires_at, $4) \
             WHERE nonce = $1 AND consumed = FALSE AND expires_at > $3",
        )
        .bind(request.nonce)
        .bind(fid)
        .bind(request.now)
        .bind(request.tombstone_expires_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(result.rows_affected() == 1)
    }

    /// unknown → consumed, guarded by the primary key
    async fn consume_first_use(&self, request: &ConsumeRequest<'_>, fid: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO siwf_nonces (nonce, consumed, fid, created_at, expires_at) \
             VALUES ($1, TRUE, $2, $3, $4) \
             ON CONFLICT (nonce) DO NOTHING",
        )
        .bind(request.nonce)
        .bind(fid)
        .bind(request.now)
        .bind(request.tombstone_expires_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl NonceLedger for PgNonceLedger {
    async fn record_issued(&self, record: NonceRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO siwf_nonces (nonce, consumed, fid, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&record.nonce)
        .bind(record.consumed)
        .bind(record.fid.map(db_fid).transpose()?)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn consume(&self, request: ConsumeRequest<'_>) -> Result<()> {
        let fid = db_fid(request.fid)?;

        if matches!(request.mode, NonceMode::Issued | NonceMode::Either)
            && self.consume_issued(&request, fid).await?
        {
            debug!(fid = request.fid, "issued nonce consumed");
            return Ok(());
        }

        if matches!(request.mode, NonceMode::FirstUse | NonceMode::Either) {
            if self.consume_first_use(&request, fid).await? {
                debug!(fid = request.fid, "client nonce tombstoned");
                return Ok(());
            }
            if request.mode == NonceMode::FirstUse {
                return Err(SiwfError::NonceAlreadyUsed(request.nonce.to_string()));
            }
        }

        // Read-only diagnosis; the transition has already been refused
        let existing = self.get(request.nonce).await?;
        Err(diagnose_unconsumable(request.nonce, existing.as_ref()))
    }

    async fn get(&self, nonce: &str) -> Result<Option<NonceRecord>> {
        let row = sqlx::query_as::<_, NonceRow>(
            "SELECT nonce, consumed, fid, created_at, expires_at FROM siwf_nonces WHERE nonce = $1",
        )
        .bind(nonce)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(NonceRecord::try_from).transpose()
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM siwf_nonces WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!(removed, "swept expired nonces");
        }
        Ok(removed)
    }
}
