//! Sign-in against a JSON-RPC registry endpoint

use crate::common::{
    address_of, custody_word, personal_sign, setup_test_logging, verifier, wallet, MessageBuilder,
};
use assert_matches::assert_matches;
use siwf_auth::{
    custody::custody_of_calldata, Address, NonceMode, RpcCustodyOracle, SignInRequest, SiwfError,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REGISTRY: &str = "0x00000000fc6c5f01fc30151999387bb99a9f489b";

fn rpc_result(result: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result,
    }))
}

async fn mount_custody(server: &MockServer, fid: u64, custody: &Address) {
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "params": [{ "data": custody_of_calldata(fid) }, "latest"]
        })))
        .respond_with(rpc_result(custody_word(custody)))
        .mount(server)
        .await;
}

fn rpc_oracle(server: &MockServer) -> Arc<RpcCustodyOracle> {
    Arc::new(
        RpcCustodyOracle::new(
            server.uri(),
            REGISTRY.parse().unwrap(),
            Duration::from_secs(1),
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn test_sign_in_with_registry_custody() {
    setup_test_logging();
    let server = MockServer::start().await;
    let key = wallet(11);
    mount_custody(&server, 42, &address_of(&key)).await;

    let verifier = verifier(rpc_oracle(&server), NonceMode::FirstUse);
    let text = MessageBuilder::new(address_of(&key), "clientnonce01").build();
    let outcome = verifier
        .sign_in(&SignInRequest::new(text.as_str(), personal_sign(&key, &text)))
        .await
        .unwrap();

    assert_eq!(outcome.identity.fid, 42);
    assert_eq!(outcome.identity.signer, address_of(&key));
}

#[tokio::test]
async fn test_registry_reports_other_custody() {
    setup_test_logging();
    let server = MockServer::start().await;
    let key = wallet(11);
    let custodian = wallet(12);
    mount_custody(&server, 42, &address_of(&custodian)).await;

    let verifier = verifier(rpc_oracle(&server), NonceMode::FirstUse);
    // Claims the custodian's address in the text, signed by someone else
    let text = MessageBuilder::new(address_of(&custodian), "clientnonce02").build();
    let err = verifier
        .sign_in(&SignInRequest::new(text.as_str(), personal_sign(&key, &text)))
        .await
        .unwrap_err();

    assert_matches!(err, SiwfError::SignerNotAuthorized { fid: 42, .. });
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unregistered_identity_zero_word() {
    setup_test_logging();
    let server = MockServer::start().await;
    let key = wallet(11);
    mount_custody(&server, 42, &Address::ZERO).await;

    let verifier = verifier(rpc_oracle(&server), NonceMode::FirstUse);
    let text = MessageBuilder::new(address_of(&key), "clientnonce03").build();
    let err = verifier
        .sign_in(&SignInRequest::new(text.as_str(), personal_sign(&key, &text)))
        .await
        .unwrap_err();

    assert_matches!(err, SiwfError::IdentityUnregistered(42));
}

#[tokio::test]
async fn test_transient_rpc_failure_is_retried() {
    setup_test_logging();
    let server = MockServer::start().await;
    let key = wallet(11);

    // First call fails, the retry succeeds
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_custody(&server, 42, &address_of(&key)).await;

    let verifier = verifier(rpc_oracle(&server), NonceMode::FirstUse);
    let text = MessageBuilder::new(address_of(&key), "clientnonce04").build();
    let outcome = verifier
        .sign_in(&SignInRequest::new(text.as_str(), personal_sign(&key, &text)))
        .await
        .unwrap();
    assert_eq!(outcome.identity.fid, 42);
}

#[tokio::test]
async fn test_persistent_rpc_failure_leaves_nonce_reusable() {
    setup_test_logging();
    let server = MockServer::start().await;
    let key = wallet(11);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let verifier = verifier(rpc_oracle(&server), NonceMode::FirstUse);
    let text = MessageBuilder::new(address_of(&key), "clientnonce05").build();
    let request = SignInRequest::new(text.as_str(), personal_sign(&key, &text));

    let err = verifier.sign_in(&request).await.unwrap_err();
    assert_matches!(err, SiwfError::OracleUnavailable(_));
    assert!(err.is_retryable());

    // Nothing was written, so the same payload can be retried once the registry is back
    assert!(verifier.ledger().get("clientnonce05").await.unwrap().is_none());

    server.reset().await;
    mount_custody(&server, 42, &address_of(&key)).await;
    assert!(verifier.sign_in(&request).await.is_ok());
}
