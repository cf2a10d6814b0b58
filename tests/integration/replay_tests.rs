//! Concurrent replay of one signed payload

use crate::common::{address_of, personal_sign, setup_test_logging, verifier, wallet, MessageBuilder};
use assert_matches::assert_matches;
use futures::future::join_all;
use siwf_auth::{NonceMode, SignInRequest, SiwfError, StaticCustodyOracle};
use std::sync::Arc;
use std::time::Duration;

async fn race(mode: NonceMode, nonce: &str, preissue: bool) {
    let key = wallet(21);
    let oracle = Arc::new(StaticCustodyOracle::new().with_custody(42, address_of(&key)));
    let verifier = verifier(oracle, mode);

    if preissue {
        verifier
            .ledger()
            .record_issued(siwf_auth::NonceRecord {
                nonce: nonce.to_string(),
                consumed: false,
                fid: None,
                created_at: chrono::Utc::now(),
                expires_at: chrono::Utc::now() + chrono::Duration::minutes(15),
            })
            .await
            .unwrap();
    }

    let text = MessageBuilder::new(address_of(&key), nonce).build();
    let request = SignInRequest::new(text.as_str(), personal_sign(&key, &text));

    let attempts = (0..32).map(|_| {
        let verifier = verifier.clone();
        let request = request.clone();
        tokio::spawn(async move { verifier.sign_in(&request).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one attempt must consume the nonce");

    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(
            result,
            Err(SiwfError::NonceAlreadyUsed(_)) | Err(SiwfError::NonceNotFound(_))
        );
    }

    let record = verifier.ledger().get(nonce).await.unwrap().unwrap();
    assert!(record.consumed);
    assert_eq!(record.fid, Some(42));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_replay_race_issued_nonce() {
    setup_test_logging();
    race(NonceMode::Issued, "issuedrace01", true).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_replay_race_first_use_nonce() {
    setup_test_logging();
    race(NonceMode::FirstUse, "clientrace01", false).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_replay_race_either_mode() {
    setup_test_logging();
    race(NonceMode::Either, "eitherrace01", false).await;
    race(NonceMode::Either, "eitherrace02", true).await;
}

#[tokio::test]
async fn test_tombstone_outlives_message_and_blocks_resubmission() {
    setup_test_logging();
    let key = wallet(22);
    let oracle = Arc::new(StaticCustodyOracle::new().with_custody(42, address_of(&key)));
    let verifier = verifier(oracle, NonceMode::FirstUse);

    let text = MessageBuilder::new(address_of(&key), "sequential01")
        .expires_at(chrono::Utc::now() + chrono::Duration::minutes(10))
        .build();
    let request = SignInRequest::new(text.as_str(), personal_sign(&key, &text));

    assert!(verifier.sign_in(&request).await.is_ok());

    let record = verifier.ledger().get("sequential01").await.unwrap().unwrap();
    // Tombstone outlives the message
    assert!(record.expires_at >= chrono::Utc::now() + chrono::Duration::hours(23));

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_matches!(
        verifier.sign_in(&request).await,
        Err(SiwfError::NonceAlreadyUsed(_))
    );
}
