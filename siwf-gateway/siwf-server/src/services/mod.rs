pub mod identity_store;
pub mod nonce_ledger;
pub mod sweeper;

pub use identity_store::PgIdentityStore;
pub use nonce_ledger::PgNonceLedger;

use siwf_auth::error::SiwfError;

fn storage_error(err: sqlx::Error) -> SiwfError {
    SiwfError::StorageUnavailable(err.to_string())
}

/// FIDs are stored as BIGINT
fn db_fid(fid: u64) -> Result<i64, SiwfError> {
    i64::try_from(fid)
        .map_err(|_| SiwfError::StorageUnavailable(format!("fid {} exceeds BIGINT range", fid)))
}

fn from_db_fid(fid: i64) -> Result<u64, SiwfError> {
    u64::try_from(fid)
        .map_err(|_| SiwfError::StorageUnavailable(format!("stored fid {} is negative", fid)))
}
