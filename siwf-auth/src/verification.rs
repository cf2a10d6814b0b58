//! Sign-in verification pipeline
//!
//! Parser → policy → signature recovery → identity resolution → custody
//! check → nonce consumption → session issuance. The first five stages are
//! read-only and may be cancelled or retried freely. Nothing is written
//! until the nonce ledger commits, and once it has, the nonce stays
//! consumed whatever happens later.

use crate::{
    address::Address,
    config::SiwfConfig,
    custody::{check_custody, CustodyOracle, RpcCustodyOracle},
    error::{Result, SiwfError},
    identity::resolve_identity,
    identity_store::IdentityStore,
    message::{MessageEnvelope, SignInMessage},
    nonce::{tombstone_expiry, ConsumeRequest, IssuedNonce, NonceLedger, NonceMode},
    policy::Policy,
    session::{JwtSessionIssuer, SessionIssuer},
    signature::recover_signer,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Signed sign-in payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    /// Message text, bare or wrapped once more
    pub message: MessageEnvelope,

    /// Hex signature over the message text
    pub signature: String,

    /// Identity number the caller expects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_hint: Option<u64>,

    /// Pre-issued nonce the message must carry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl SignInRequest {
    pub fn new(message: impl Into<MessageEnvelope>, signature: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            signature: signature.into(),
            identity_hint: None,
            nonce: None,
        }
    }

    pub fn with_identity_hint(mut self, fid: u64) -> Self {
        self.identity_hint = Some(fid);
        self
    }

    pub fn with_expected_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }
}

/// Result of the read-only stages
#[derive(Debug, Clone)]
pub struct AuthenticatedSignIn {
    pub message: SignInMessage,
    pub fid: u64,
    /// Recovered signer, confirmed as the custody address
    pub signer: Address,
}

/// Identity proven by a completed sign-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub fid: u64,
    pub signer: Address,
    pub authority: String,
    /// The nonce this sign-in consumed
    pub nonce: String,
}

/// Completed sign-in
#[derive(Debug, Clone)]
pub struct SignInOutcome {
    pub identity: VerifiedIdentity,
    pub session_token: String,
    pub session_expires_at: DateTime<Utc>,
}

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    pub policy: Policy,
    pub nonce_mode: NonceMode,
    pub nonce_ttl: Duration,
    pub first_use_retention: Duration,
    /// Bound on a single custody lookup
    pub oracle_timeout: Duration,
    /// Total custody lookup attempts on retryable failures
    pub oracle_attempts: u32,
}

impl VerifierSettings {
    pub fn from_config(config: &SiwfConfig) -> Self {
        Self {
            policy: Policy::new(
                config.policy.allowed_domains.iter().cloned(),
                config.policy.chain_id,
            ),
            nonce_mode: config.policy.nonce_mode,
            nonce_ttl: config.policy.nonce_ttl,
            first_use_retention: config.policy.first_use_retention,
            oracle_timeout: config.registry.timeout,
            oracle_attempts: config.registry.attempts.max(1),
        }
    }
}

/// Sign-in verifier
#[derive(Clone)]
pub struct SignInVerifier {
    settings: VerifierSettings,
    oracle: Arc<dyn CustodyOracle>,
    ledger: Arc<dyn NonceLedger>,
    identities: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionIssuer>,
}

impl SignInVerifier {
    pub fn new(
        settings: VerifierSettings,
        oracle: Arc<dyn CustodyOracle>,
        ledger: Arc<dyn NonceLedger>,
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionIssuer>,
    ) -> Self {
        Self {
            settings,
            oracle,
            ledger,
            identities,
            sessions,
        }
    }

    /// Build a verifier with the JSON-RPC oracle and JWT sessions from config
    pub fn from_config(
        config: &SiwfConfig,
        ledger: Arc<dyn NonceLedger>,
        identities: Arc<dyn IdentityStore>,
    ) -> Result<Self> {
        config.validate()?;

        let oracle = RpcCustodyOracle::new(
            config.registry.rpc_url.clone(),
            config.registry.registry_address()?,
            config.registry.timeout,
        )?;
        let sessions = JwtSessionIssuer::new(
            config.session.secret.as_bytes(),
            config.session.issuer.clone(),
            config.session.ttl,
        )?;

        Ok(Self::new(
            VerifierSettings::from_config(config),
            Arc::new(oracle),
            ledger,
            identities,
            Arc::new(sessions),
        ))
    }

    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &Arc<dyn NonceLedger> {
        &self.ledger
    }

    pub fn identities(&self) -> &Arc<dyn IdentityStore> {
        &self.identities
    }

    pub fn sessions(&self) -> &Arc<dyn SessionIssuer> {
        &self.sessions
    }

    /// Issue a server nonce with the configured TTL
    pub async fn issue_nonce(&self) -> Result<IssuedNonce> {
        self.ledger.issue(self.settings.nonce_ttl, Utc::now()).await
    }

    /// Run the read-only stages. Nothing is persisted.
    pub async fn authenticate(
        &self,
        request: &SignInRequest,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedSignIn> {
        let text = request.message.text()?;
        let message = SignInMessage::parse(text)?;

        self.settings
            .policy
            .check(&message, now, request.nonce.as_deref())?;

        // Hash exactly the text the client signed
        let signer = recover_signer(message.raw(), &request.signature)?;
        if signer != message.address {
            warn!(
                claimed = %message.address,
                recovered = %signer,
                "message address differs from recovered signer"
            );
        }

        let fid = resolve_identity(&message.resources, request.identity_hint)?;
        let custody = self.lookup_custody(fid).await?;
        check_custody(fid, &signer, custody)?;

        debug!(fid, signer = %signer, domain = %message.authority, "sign-in authenticated");
        Ok(AuthenticatedSignIn {
            message,
            fid,
            signer,
        })
    }

    /// Full sign-in at the current time
    pub async fn sign_in(&self, request: &SignInRequest) -> Result<SignInOutcome> {
        self.sign_in_at(request, Utc::now()).await
    }

    /// Full sign-in at `now`
    pub async fn sign_in_at(
        &self,
        request: &SignInRequest,
        now: DateTime<Utc>,
    ) -> Result<SignInOutcome> {
        let result = self.run_sign_in(request, now).await;

        match &result {
            Ok(outcome) => info!(
                fid = outcome.identity.fid,
                signer = %outcome.identity.signer,
                domain = %outcome.identity.authority,
                "sign-in succeeded"
            ),
            Err(err) => warn!(
                kind = %err.kind(),
                policy_reason = ?err.policy_reason(),
                retryable = err.is_retryable(),
                error = %err,
                "sign-in rejected"
            ),
        }

        result
    }

    async fn run_sign_in(
        &self,
        request: &SignInRequest,
        now: DateTime<Utc>,
    ) -> Result<SignInOutcome> {
        let authenticated = self.authenticate(request, now).await?;
        let message = &authenticated.message;

        self.ledger
            .consume(ConsumeRequest {
                nonce: &message.nonce,
                fid: authenticated.fid,
                mode: self.settings.nonce_mode,
                now,
                tombstone_expires_at: tombstone_expiry(
                    now,
                    message.expiration_time,
                    self.settings.first_use_retention,
                ),
            })
            .await?;

        // Nonce is consumed from here on; later failures never release it
        self.identities
            .upsert(authenticated.fid, &authenticated.signer, now)
            .await?;

        let identity = VerifiedIdentity {
            fid: authenticated.fid,
            signer: authenticated.signer,
            authority: message.authority.clone(),
            nonce: message.nonce.clone(),
        };
        let session = self.sessions.issue(&identity, now)?;

        Ok(SignInOutcome {
            identity,
            session_token: session.token,
            session_expires_at: session.expires_at,
        })
    }

    /// Custody lookup with a per-attempt timeout, retrying only retryable failures
    async fn lookup_custody(&self, fid: u64) -> Result<Option<Address>> {
        let attempts = self.settings.oracle_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result =
                match tokio::time::timeout(self.settings.oracle_timeout, self.oracle.custody_of(fid))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(SiwfError::OracleUnavailable(format!(
                        "custody lookup timed out after {:?}",
                        self.settings.oracle_timeout
                    ))),
                };

            match result {
                Err(err) if err.is_retryable() && attempt < attempts => {
                    warn!(fid, attempt, error = %err, "custody lookup failed, retrying");
                }
                other => return other,
            }
        }
    }
}
