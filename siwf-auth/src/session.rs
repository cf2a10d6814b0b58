//! Session credential issuance
//!
//! After the nonce is consumed, the verified identity is turned into an
//! HS256 JWT that downstream middleware validates with the shared secret.

use crate::{
    address::Address,
    error::{Result, SiwfError},
    verification::VerifiedIdentity,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Minimum HMAC secret length in bytes
pub const MIN_SECRET_LENGTH: usize = 32;

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Identity number as a string
    pub sub: String,
    pub fid: u64,
    /// Recovered signer address
    pub signer: Address,
    /// Authenticated authority
    pub domain: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Minted session token
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints and validates session credentials
pub trait SessionIssuer: Send + Sync {
    fn issue(&self, identity: &VerifiedIdentity, now: DateTime<Utc>) -> Result<IssuedSession>;

    fn validate(&self, token: &str) -> Result<SessionClaims>;

    /// Session lifetime
    fn ttl(&self) -> Duration;
}

/// HS256 session issuer
pub struct JwtSessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtSessionIssuer {
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl: Duration) -> Result<Self> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(SiwfError::ConfigError(format!(
                "session secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            ttl,
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation
    }
}

impl SessionIssuer for JwtSessionIssuer {
    fn issue(&self, identity: &VerifiedIdentity, now: DateTime<Utc>) -> Result<IssuedSession> {
        let ttl = chrono::Duration::from_std(self.ttl).map_err(|e| {
            SiwfError::CredentialIssuanceFailed(format!("session ttl out of range: {}", e))
        })?;
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            SiwfError::CredentialIssuanceFailed(format!(
                "session expiry overflows with ttl {:?}",
                self.ttl
            ))
        })?;

        let claims = SessionClaims {
            sub: identity.fid.to_string(),
            fid: identity.fid,
            signer: identity.signer,
            domain: identity.authority.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                SiwfError::CredentialIssuanceFailed(format!("Failed to encode JWT: {}", e))
            })?;

        debug!(fid = identity.fid, jti = %claims.jti, "session issued");
        Ok(IssuedSession { token, expires_at })
    }

    fn validate(&self, token: &str) -> Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation())
            .map_err(|e| SiwfError::SessionInvalid(format!("Failed to decode JWT: {}", e)))?;

        if data.claims.sub != data.claims.fid.to_string() {
            return Err(SiwfError::SessionInvalid(
                "subject does not match identity number".to_string(),
            ));
        }
        Ok(data.claims)
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
