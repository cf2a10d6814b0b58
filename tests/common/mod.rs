//! Common test utilities shared across integration and E2E tests

use chrono::{DateTime, Utc};
use k256::ecdsa::SigningKey;
use siwf_auth::{
    signature::personal_message_hash, verification::VerifierSettings, Address, CustodyOracle,
    JwtSessionIssuer, MemoryIdentityStore, MemoryNonceLedger, NonceMode, Policy, SignInVerifier,
};
use std::sync::Arc;
use std::time::Duration;

pub const SESSION_SECRET: &[u8] = b"integration-session-secret-0123456789";
pub const ALLOWED_DOMAIN: &str = "app.example.com";

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Deterministic wallet key
pub fn wallet(seed: u8) -> SigningKey {
    SigningKey::from_slice(&[seed; 32]).expect("valid secp256k1 scalar")
}

pub fn address_of(key: &SigningKey) -> Address {
    Address::from_public_key(key.verifying_key())
}

/// `personal_sign` over `message`, hex with `v` in 27/28 form
pub fn personal_sign(key: &SigningKey, message: &str) -> String {
    let (sig, recid) = key
        .sign_prehash_recoverable(&personal_message_hash(message))
        .expect("signing succeeds");
    let mut bytes = sig.to_bytes().to_vec();
    bytes.push(recid.to_byte() + 27);
    format!("0x{}", hex::encode(bytes))
}

/// Builder for sign-in message text
pub struct MessageBuilder {
    pub authority: String,
    pub address: Address,
    pub chain_id: u64,
    pub nonce: String,
    pub expiration: Option<DateTime<Utc>>,
    pub resources: Vec<String>,
}

impl MessageBuilder {
    pub fn new(address: Address, nonce: &str) -> Self {
        Self {
            authority: ALLOWED_DOMAIN.to_string(),
            address,
            chain_id: 10,
            nonce: nonce.to_string(),
            expiration: None,
            resources: vec!["farcaster://fid/42".to_string()],
        }
    }

    pub fn authority(mut self, authority: &str) -> Self {
        self.authority = authority.to_string();
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expiration = Some(at);
        self
    }

    pub fn resources(mut self, resources: &[&str]) -> Self {
        self.resources = resources.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn build(&self) -> String {
        let mut text = format!(
            "{} wants you to sign in with your Ethereum account:\n{}\n\nFarcaster Auth\n\n\
             URI: https://{}/login\nVersion: 1\nChain ID: {}\nNonce: {}\nIssued At: {}",
            self.authority,
            self.address,
            self.authority,
            self.chain_id,
            self.nonce,
            Utc::now().to_rfc3339(),
        );
        if let Some(expiration) = self.expiration {
            text.push_str(&format!("\nExpiration Time: {}", expiration.to_rfc3339()));
        }
        if !self.resources.is_empty() {
            text.push_str("\nResources:");
            for resource in &self.resources {
                text.push_str(&format!("\n- {}", resource));
            }
        }
        text
    }
}

pub fn settings(mode: NonceMode) -> VerifierSettings {
    VerifierSettings {
        policy: Policy::new([ALLOWED_DOMAIN], 10),
        nonce_mode: mode,
        nonce_ttl: Duration::from_secs(15 * 60),
        first_use_retention: Duration::from_secs(24 * 3600),
        oracle_timeout: Duration::from_secs(2),
        oracle_attempts: 2,
    }
}

/// Verifier over in-memory storage and the given oracle
pub fn verifier(oracle: Arc<dyn CustodyOracle>, mode: NonceMode) -> SignInVerifier {
    SignInVerifier::new(
        settings(mode),
        oracle,
        Arc::new(MemoryNonceLedger::new()),
        Arc::new(MemoryIdentityStore::new()),
        Arc::new(
            JwtSessionIssuer::new(SESSION_SECRET, "siwf-gateway", Duration::from_secs(3600))
                .expect("valid session secret"),
        ),
    )
}

/// ABI word returned by `custodyOf` for `address`
pub fn custody_word(address: &Address) -> String {
    format!("0x{}{}", "0".repeat(24), hex::encode(address.as_bytes()))
}
