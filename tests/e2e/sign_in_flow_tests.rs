//! End-to-end sign-in flows over in-memory storage

use crate::common::{
    address_of, personal_sign, setup_test_logging, verifier, wallet, MessageBuilder,
    ALLOWED_DOMAIN, SESSION_SECRET,
};
use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use siwf_auth::{
    error::PolicyReason, NonceMode, NonceRecord, SessionIssuer, SignInRequest, SiwfError,
    StaticCustodyOracle,
};
use std::sync::Arc;

#[tokio::test]
async fn test_issued_nonce_sign_in_then_replay() {
    setup_test_logging();
    let key = wallet(31);
    let oracle = Arc::new(StaticCustodyOracle::new().with_custody(42, address_of(&key)));
    let verifier = verifier(oracle, NonceMode::Issued);

    let now = Utc::now();
    verifier
        .ledger()
        .record_issued(NonceRecord {
            nonce: "abc123".to_string(),
            consumed: false,
            fid: None,
            created_at: now,
            expires_at: now + Duration::minutes(15),
        })
        .await
        .unwrap();

    let text = MessageBuilder::new(address_of(&key), "abc123").build();
    let request = SignInRequest::new(text.as_str(), personal_sign(&key, &text));

    let outcome = verifier.sign_in(&request).await.unwrap();
    assert_eq!(outcome.identity.fid, 42);
    assert_eq!(outcome.identity.signer, address_of(&key));
    assert_eq!(outcome.identity.authority, ALLOWED_DOMAIN);
    assert_eq!(outcome.identity.nonce, "abc123");

    let record = verifier.ledger().get("abc123").await.unwrap().unwrap();
    assert!(record.consumed);
    assert_eq!(record.fid, Some(42));

    let stored = verifier.identities().get(42).await.unwrap().unwrap();
    assert_eq!(stored.custody_address, address_of(&key));

    let claims = verifier.sessions().validate(&outcome.session_token).unwrap();
    assert_eq!(claims.fid, 42);
    assert_eq!(claims.sub, "42");
    assert_eq!(claims.domain, ALLOWED_DOMAIN);

    assert_matches!(
        verifier.sign_in(&request).await,
        Err(SiwfError::NonceAlreadyUsed(nonce)) if nonce == "abc123"
    );
}

#[tokio::test]
async fn test_session_token_rejected_by_other_secret() {
    setup_test_logging();
    let key = wallet(32);
    let oracle = Arc::new(StaticCustodyOracle::new().with_custody(42, address_of(&key)));
    let verifier = verifier(oracle, NonceMode::FirstUse);

    let text = MessageBuilder::new(address_of(&key), "secretcheck1").build();
    let outcome = verifier
        .sign_in(&SignInRequest::new(text.as_str(), personal_sign(&key, &text)))
        .await
        .unwrap();

    let mut other_secret = SESSION_SECRET.to_vec();
    other_secret.reverse();
    let other = siwf_auth::JwtSessionIssuer::new(
        &other_secret,
        "siwf-gateway",
        std::time::Duration::from_secs(3600),
    )
    .unwrap();
    assert_matches!(
        other.validate(&outcome.session_token),
        Err(SiwfError::SessionInvalid(_))
    );
}

#[tokio::test]
async fn test_lookalike_domain_rejected() {
    setup_test_logging();
    let key = wallet(33);
    let oracle = Arc::new(StaticCustodyOracle::new().with_custody(42, address_of(&key)));
    let verifier = verifier(oracle, NonceMode::FirstUse);

    for authority in ["evil.example.com", "app.example.com.evil.io", "APP.example.com"] {
        let text = MessageBuilder::new(address_of(&key), "lookalike01")
            .authority(authority)
            .build();
        let err = verifier
            .sign_in(&SignInRequest::new(text.as_str(), personal_sign(&key, &text)))
            .await
            .unwrap_err();
        assert_eq!(err.policy_reason(), Some(PolicyReason::Domain), "{}", authority);
    }

    // Rejected attempts never touch the ledger
    assert!(verifier.ledger().get("lookalike01").await.unwrap().is_none());
}

#[tokio::test]
async fn test_first_resource_wins() {
    setup_test_logging();
    let key = wallet(34);
    let oracle = Arc::new(StaticCustodyOracle::new().with_custody(7, address_of(&key)));
    let verifier = verifier(oracle, NonceMode::FirstUse);

    let text = MessageBuilder::new(address_of(&key), "precedence01")
        .resources(&[
            "https://app.example.com/terms",
            "farcaster://user?id=7",
            "farcaster://fid/42",
        ])
        .build();
    let request = SignInRequest::new(text.as_str(), personal_sign(&key, &text));

    let outcome = verifier.sign_in(&request).await.unwrap();
    assert_eq!(outcome.identity.fid, 7);
}

#[tokio::test]
async fn test_identity_hint_must_match() {
    setup_test_logging();
    let key = wallet(35);
    let oracle = Arc::new(StaticCustodyOracle::new().with_custody(42, address_of(&key)));
    let verifier = verifier(oracle, NonceMode::FirstUse);

    let text = MessageBuilder::new(address_of(&key), "hintcheck01").build();
    let request =
        SignInRequest::new(text.as_str(), personal_sign(&key, &text)).with_identity_hint(43);

    assert_matches!(
        verifier.sign_in(&request).await,
        Err(SiwfError::IdentityMismatch {
            resolved: 42,
            expected: 43
        })
    );
}

#[tokio::test]
async fn test_missing_identity_resource() {
    setup_test_logging();
    let key = wallet(36);
    let oracle = Arc::new(StaticCustodyOracle::new().with_custody(42, address_of(&key)));
    let verifier = verifier(oracle, NonceMode::FirstUse);

    let text = MessageBuilder::new(address_of(&key), "noresource01")
        .resources(&[])
        .build();
    assert_matches!(
        verifier
            .sign_in(&SignInRequest::new(text.as_str(), personal_sign(&key, &text)))
            .await,
        Err(SiwfError::IdentityNotFound)
    );
}

#[tokio::test]
async fn test_expiration_boundary() {
    setup_test_logging();
    let key = wallet(37);
    let oracle = Arc::new(StaticCustodyOracle::new().with_custody(42, address_of(&key)));
    let verifier = verifier(oracle, NonceMode::FirstUse);

    let expires_at = Utc::now() + Duration::minutes(5);
    let text = MessageBuilder::new(address_of(&key), "boundary01")
        .expires_at(expires_at)
        .build();
    let request = SignInRequest::new(text.as_str(), personal_sign(&key, &text));

    // Exactly at expiration is already too late
    let err = verifier.sign_in_at(&request, expires_at).await.unwrap_err();
    assert_eq!(err.policy_reason(), Some(PolicyReason::Expired));

    let outcome = verifier
        .sign_in_at(&request, expires_at - Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(outcome.identity.fid, 42);
}

#[tokio::test]
async fn test_tampered_message_does_not_recover_custody() {
    setup_test_logging();
    let key = wallet(38);
    let oracle = Arc::new(StaticCustodyOracle::new().with_custody(42, address_of(&key)));
    let verifier = verifier(oracle, NonceMode::FirstUse);

    let text = MessageBuilder::new(address_of(&key), "tamper01").build();
    let signature = personal_sign(&key, &text);
    let tampered = text.replace("https://app.example.com/login", "https://app.example.com/logout");

    let err = verifier
        .sign_in(&SignInRequest::new(tampered.as_str(), signature))
        .await
        .unwrap_err();
    assert_matches!(err, SiwfError::SignerNotAuthorized { fid: 42, .. });
    assert!(verifier.ledger().get("tamper01").await.unwrap().is_none());
}
