//! Common types for the SIWF Gateway

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siwf_auth::{
    error::PolicyReason, IdentityRecord, IssuedNonce, MessageEnvelope, SessionClaims,
    SignInOutcome, SignInRequest,
};
use validator::Validate;

/// Sign-in verification request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VerifyRequest {
    /// Signed message, bare or wrapped in `{ "message": ... }`
    pub message: MessageEnvelope,

    /// Hex signature over the message
    #[validate(length(min = 1, max = 200))]
    pub signature: String,

    /// Identity number the client expects to sign in as
    #[serde(default)]
    #[validate(range(min = 1))]
    pub identity_hint: Option<u64>,

    /// Pre-issued nonce the message must carry
    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    pub nonce: Option<String>,
}

impl From<VerifyRequest> for SignInRequest {
    fn from(request: VerifyRequest) -> Self {
        SignInRequest {
            message: request.message,
            signature: request.signature,
            identity_hint: request.identity_hint,
            nonce: request.nonce,
        }
    }
}

/// Nonce issuance response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
    /// Seconds until the nonce expires
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedNonce> for NonceResponse {
    fn from(issued: IssuedNonce) -> Self {
        Self {
            nonce: issued.nonce,
            expires_in: issued.expires_in,
            expires_at: issued.expires_at,
        }
    }
}

/// Successful sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInResponse {
    pub identity_number: u64,
    /// Checksummed recovered signer
    pub signer_address: String,
    pub session_token: String,
    pub authority: String,
    pub expires_at: DateTime<Utc>,
}

impl From<SignInOutcome> for SignInResponse {
    fn from(outcome: SignInOutcome) -> Self {
        Self {
            identity_number: outcome.identity.fid,
            signer_address: outcome.identity.signer.to_checksum(),
            session_token: outcome.session_token,
            authority: outcome.identity.authority,
            expires_at: outcome.session_expires_at,
        }
    }
}

/// Current session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub identity_number: u64,
    pub signer_address: String,
    pub domain: String,
    pub expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityRecord>,
}

impl SessionResponse {
    pub fn new(claims: SessionClaims, identity: Option<IdentityRecord>) -> Self {
        Self {
            identity_number: claims.fid,
            signer_address: claims.signer.to_checksum(),
            domain: claims.domain,
            expires_at: claims.exp,
            identity,
        }
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable kind
    pub error: String,
    /// Human-readable reason
    pub reason: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_reason: Option<PolicyReason>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            reason: reason.into(),
            retryable: false,
            policy_reason: None,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
