//! Nonce issuance endpoint
//!
//! POST /auth/nonce

use crate::AppState;
use actix_web::{post, web, HttpResponse};
use siwf_common::{types::NonceResponse, Result};

#[post("/nonce")]
pub async fn issue_nonce(state: web::Data<AppState>) -> Result<HttpResponse> {
    let issued = state.verifier.issue_nonce().await?;
    Ok(HttpResponse::Ok()
        .insert_header(("Cache-Control", "no-store"))
        .json(NonceResponse::from(issued)))
}
