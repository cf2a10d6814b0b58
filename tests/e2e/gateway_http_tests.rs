//! HTTP surface backed by a mocked registry RPC

use crate::common::{
    address_of, custody_word, personal_sign, settings, setup_test_logging, wallet,
    MessageBuilder, SESSION_SECRET,
};
use actix_web::{http::StatusCode, test, web, App};
use siwf_auth::{
    custody::custody_of_calldata, error::PolicyReason, Address, JwtSessionIssuer,
    MemoryIdentityStore, MemoryNonceLedger, NonceMode, RpcCustodyOracle, SignInVerifier,
};
use siwf_common::types::{ErrorBody, SessionResponse, SignInResponse};
use siwf_server::{routes, AppState};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COOKIE: &str = "siwf_session";

fn state(server: &MockServer) -> AppState {
    let oracle = RpcCustodyOracle::new(
        server.uri(),
        siwf_auth::DEFAULT_ID_REGISTRY.parse().unwrap(),
        Duration::from_secs(1),
    )
    .unwrap();
    let verifier = SignInVerifier::new(
        settings(NonceMode::Either),
        Arc::new(oracle),
        Arc::new(MemoryNonceLedger::new()),
        Arc::new(MemoryIdentityStore::new()),
        Arc::new(JwtSessionIssuer::new(SESSION_SECRET, "siwf-gateway", Duration::from_secs(600)).unwrap()),
    );
    AppState::new(verifier, COOKIE)
}

async fn mount_custody(server: &MockServer, fid: u64, custody: &Address) {
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "params": [{ "data": custody_of_calldata(fid) }, "latest"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": custody_word(custody),
        })))
        .mount(server)
        .await;
}

#[actix_web::test]
async fn test_client_nonce_sign_in_over_http() {
    setup_test_logging();
    let server = MockServer::start().await;
    let key = wallet(41);
    mount_custody(&server, 42, &address_of(&key)).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(&server)))
            .configure(routes::configure),
    )
    .await;

    let text = MessageBuilder::new(address_of(&key), "httpclient01").build();
    let body = serde_json::json!({
        "message": text,
        "signature": personal_sign(&key, &text),
        "identity_hint": 42,
    });

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/verify")
            .set_json(&body)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == COOKIE)
        .map(|c| c.into_owned())
        .unwrap();
    assert_eq!(cookie.secure(), Some(true));

    let signed_in: SignInResponse = test::read_body_json(resp).await;
    assert_eq!(signed_in.identity_number, 42);
    assert_eq!(signed_in.signer_address, address_of(&key).to_checksum());

    let session: SessionResponse = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/auth/session")
            .cookie(cookie)
            .to_request(),
    )
    .await;
    assert_eq!(session.identity_number, 42);
    assert_eq!(session.domain, "app.example.com");

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/verify")
            .set_json(&body)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let error: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(error.error, "nonce_already_used");
    assert!(!error.retryable);
}

#[actix_web::test]
async fn test_registry_outage_is_retryable_503() {
    setup_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let key = wallet(42);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(&server)))
            .configure(routes::configure),
    )
    .await;

    let text = MessageBuilder::new(address_of(&key), "httpoutage01").build();
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/verify")
            .set_json(serde_json::json!({
                "message": { "message": text },
                "signature": personal_sign(&key, &text),
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let error: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(error.error, "oracle_unavailable");
    assert!(error.retryable);
}

#[actix_web::test]
async fn test_wrong_signer_and_policy_errors_over_http() {
    setup_test_logging();
    let server = MockServer::start().await;
    let custodian = wallet(43);
    let intruder = wallet(44);
    mount_custody(&server, 42, &address_of(&custodian)).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(&server)))
            .configure(routes::configure),
    )
    .await;

    // Signed by a key that does not hold custody
    let text = MessageBuilder::new(address_of(&custodian), "httpintruder1").build();
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/verify")
            .set_json(serde_json::json!({
                "message": text,
                "signature": personal_sign(&intruder, &text),
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let error: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(error.error, "authentication_failed");

    // Wrong chain
    let mut builder = MessageBuilder::new(address_of(&custodian), "httpchain01");
    builder.chain_id = 1;
    let text = builder.build();
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/verify")
            .set_json(serde_json::json!({
                "message": text,
                "signature": personal_sign(&custodian, &text),
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let error: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(error.error, "policy_violation");
    assert_eq!(error.policy_reason, Some(PolicyReason::Chain));
}
