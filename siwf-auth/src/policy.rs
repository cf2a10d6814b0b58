//! Message policy checks
//!
//! Domain allow-list, required chain, freshness and the optional expected
//! nonce. Each failure names its reason so callers can alert on it.

use crate::{
    error::{PolicyReason, Result, SiwfError},
    message::SignInMessage,
};
use chrono::{DateTime, Utc};

/// Policy applied to every parsed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    allowed_domains: Vec<String>,
    chain_id: u64,
}

impl Policy {
    /// Create a policy from an allow-list and the required chain id
    pub fn new<I, S>(allowed_domains: I, chain_id: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_domains: allowed_domains.into_iter().map(Into::into).collect(),
            chain_id,
        }
    }

    /// Allow-listed authorities
    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed_domains
    }

    /// Required chain id
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Check a message against the policy.
    ///
    /// Order: domain, chain, expiry, not-before, expected nonce.
    pub fn check(
        &self,
        message: &SignInMessage,
        now: DateTime<Utc>,
        expected_nonce: Option<&str>,
    ) -> Result<()> {
        // Exact match only; "evil.example.com" must not pass for "example.com"
        if !self
            .allowed_domains
            .iter()
            .any(|allowed| allowed == &message.authority)
        {
            return Err(SiwfError::policy(
                PolicyReason::Domain,
                format!("authority '{}' is not allowed", message.authority),
            ));
        }

        if message.chain_id != self.chain_id {
            return Err(SiwfError::policy(
                PolicyReason::Chain,
                format!(
                    "chain id {} does not match required {}",
                    message.chain_id, self.chain_id
                ),
            ));
        }

        if let Some(expires_at) = message.expiration_time {
            if now >= expires_at {
                return Err(SiwfError::policy(
                    PolicyReason::Expired,
                    format!("message expired at {}", expires_at.to_rfc3339()),
                ));
            }
        }

        if let Some(not_before) = message.not_before {
            if now < not_before {
                return Err(SiwfError::policy(
                    PolicyReason::NotYetValid,
                    format!("message not valid before {}", not_before.to_rfc3339()),
                ));
            }
        }

        if let Some(expected) = expected_nonce {
            if expected != message.nonce {
                return Err(SiwfError::policy(
                    PolicyReason::Nonce,
                    "nonce does not match the issued nonce",
                ));
            }
        }

        Ok(())
    }
}
