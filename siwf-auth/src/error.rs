//! Error types for sign-in verification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for sign-in operations
pub type Result<T> = std::result::Result<T, SiwfError>;

/// Which policy check rejected a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyReason {
    /// Authority is not on the allow-list
    Domain,
    /// Chain identifier differs from the required one
    Chain,
    /// Expiration time is at or before now
    Expired,
    /// Not-before time is still in the future
    NotYetValid,
    /// Message nonce differs from the expected pre-issued nonce
    Nonce,
}

impl PolicyReason {
    /// Stable machine-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyReason::Domain => "domain",
            PolicyReason::Chain => "chain",
            PolicyReason::Expired => "expired",
            PolicyReason::NotYetValid => "not_yet_valid",
            PolicyReason::Nonce => "nonce",
        }
    }
}

impl fmt::Display for PolicyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sign-in errors, one variant per failure kind
#[derive(Debug, thiserror::Error)]
pub enum SiwfError {
    /// No message text at any accepted envelope depth
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Message text is missing a required field or has a malformed one
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A policy check rejected the message
    #[error("Policy violation ({reason}): {detail}")]
    PolicyViolation {
        /// Which check failed
        reason: PolicyReason,
        /// Human-readable detail
        detail: String,
    },

    /// Signature could not be decoded or no signer could be recovered
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    /// No resource URI carried an identity number
    #[error("No identity number found in message resources")]
    IdentityNotFound,

    /// Resolved identity differs from the one the caller expects
    #[error("Identity mismatch: message claims {resolved}, request expects {expected}")]
    IdentityMismatch {
        /// Identity number found in the message
        resolved: u64,
        /// Identity number supplied by the caller
        expected: u64,
    },

    /// Registry lookup failed in transport; safe to retry
    #[error("Custody oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// Registry reports no custody address for the identity
    #[error("Identity {0} is not registered")]
    IdentityUnregistered(u64),

    /// Recovered signer is not the identity's current custody address
    #[error("Signer {signer} is not the custody address for identity {fid}")]
    SignerNotAuthorized {
        /// Identity number
        fid: u64,
        /// Recovered signer address (checksummed)
        signer: String,
    },

    /// Nonce was consumed before
    #[error("Nonce already used: {0}")]
    NonceAlreadyUsed(String),

    /// Nonce was never issued or has expired
    #[error("Nonce not found or expired: {0}")]
    NonceNotFound(String),

    /// Session credential could not be minted
    #[error("Credential issuance failed: {0}")]
    CredentialIssuanceFailed(String),

    /// Session credential failed validation
    #[error("Invalid session: {0}")]
    SessionInvalid(String),

    /// Ledger or identity store failed
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Machine-readable error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedPayload,
    ParseError,
    PolicyViolation,
    SignatureInvalid,
    IdentityNotFound,
    IdentityMismatch,
    OracleUnavailable,
    IdentityUnregistered,
    SignerNotAuthorized,
    NonceAlreadyUsed,
    NonceNotFound,
    CredentialIssuanceFailed,
    SessionInvalid,
    StorageUnavailable,
    ConfigError,
    /// External class covering signature and authorization failures
    AuthenticationFailed,
}

impl ErrorKind {
    /// Stable machine-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedPayload => "malformed_payload",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::PolicyViolation => "policy_violation",
            ErrorKind::SignatureInvalid => "signature_invalid",
            ErrorKind::IdentityNotFound => "identity_not_found",
            ErrorKind::IdentityMismatch => "identity_mismatch",
            ErrorKind::OracleUnavailable => "oracle_unavailable",
            ErrorKind::IdentityUnregistered => "identity_unregistered",
            ErrorKind::SignerNotAuthorized => "signer_not_authorized",
            ErrorKind::NonceAlreadyUsed => "nonce_already_used",
            ErrorKind::NonceNotFound => "nonce_not_found",
            ErrorKind::CredentialIssuanceFailed => "credential_issuance_failed",
            ErrorKind::SessionInvalid => "session_invalid",
            ErrorKind::StorageUnavailable => "storage_unavailable",
            ErrorKind::ConfigError => "config_error",
            ErrorKind::AuthenticationFailed => "authentication_failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SiwfError {
    /// Build a policy violation
    pub fn policy(reason: PolicyReason, detail: impl Into<String>) -> Self {
        SiwfError::PolicyViolation {
            reason,
            detail: detail.into(),
        }
    }

    /// Internal kind, for logs and metrics
    pub fn kind(&self) -> ErrorKind {
        match self {
            SiwfError::MalformedPayload(_) => ErrorKind::MalformedPayload,
            SiwfError::ParseError(_) => ErrorKind::ParseError,
            SiwfError::PolicyViolation { .. } => ErrorKind::PolicyViolation,
            SiwfError::SignatureInvalid(_) => ErrorKind::SignatureInvalid,
            SiwfError::IdentityNotFound => ErrorKind::IdentityNotFound,
            SiwfError::IdentityMismatch { .. } => ErrorKind::IdentityMismatch,
            SiwfError::OracleUnavailable(_) => ErrorKind::OracleUnavailable,
            SiwfError::IdentityUnregistered(_) => ErrorKind::IdentityUnregistered,
            SiwfError::SignerNotAuthorized { .. } => ErrorKind::SignerNotAuthorized,
            SiwfError::NonceAlreadyUsed(_) => ErrorKind::NonceAlreadyUsed,
            SiwfError::NonceNotFound(_) => ErrorKind::NonceNotFound,
            SiwfError::CredentialIssuanceFailed(_) => ErrorKind::CredentialIssuanceFailed,
            SiwfError::SessionInvalid(_) => ErrorKind::SessionInvalid,
            SiwfError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            SiwfError::ConfigError(_) => ErrorKind::ConfigError,
        }
    }

    /// Kind reported to clients.
    ///
    /// Signature and authorization failures collapse into
    /// `AuthenticationFailed` so a caller iterating guesses cannot tell a
    /// malformed signature from a valid signature by the wrong key.
    pub fn public_kind(&self) -> ErrorKind {
        match self.kind() {
            ErrorKind::SignatureInvalid
            | ErrorKind::IdentityUnregistered
            | ErrorKind::SignerNotAuthorized => ErrorKind::AuthenticationFailed,
            kind => kind,
        }
    }

    /// Reason string safe to return to clients
    pub fn public_reason(&self) -> String {
        match self.public_kind() {
            ErrorKind::AuthenticationFailed => "Authentication failed".to_string(),
            _ => self.to_string(),
        }
    }

    /// Policy reason, if this is a policy violation
    pub fn policy_reason(&self) -> Option<PolicyReason> {
        match self {
            SiwfError::PolicyViolation { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Check if error is retryable.
    ///
    /// Only registry transport failures qualify: no ledger mutation has
    /// happened at that point. Every other kind needs a fresh nonce.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SiwfError::OracleUnavailable(_))
    }
}

impl From<serde_json::Error> for SiwfError {
    fn from(err: serde_json::Error) -> Self {
        SiwfError::MalformedPayload(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for SiwfError {
    fn from(err: reqwest::Error) -> Self {
        SiwfError::OracleUnavailable(err.to_string())
    }
}

impl From<toml::de::Error> for SiwfError {
    fn from(err: toml::de::Error) -> Self {
        SiwfError::ConfigError(format!("Failed to parse config: {}", err))
    }
}
