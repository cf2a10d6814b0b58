//! Session introspection endpoint
//!
//! GET /auth/session
//! Accepts `Authorization: Bearer <token>` or the session cookie.

use crate::AppState;
use actix_web::{get, http::header, web, HttpRequest, HttpResponse};
use siwf_common::{types::SessionResponse, GatewayError, Result};

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

#[get("/session")]
pub async fn current_session(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let token = bearer_token(&req)
        .or_else(|| req.cookie(&state.cookie_name).map(|c| c.value().to_string()))
        .ok_or_else(|| GatewayError::Unauthorized("Missing session token".to_string()))?;

    let claims = state.verifier.sessions().validate(&token)?;
    let identity = state.verifier.identities().get(claims.fid).await?;

    Ok(HttpResponse::Ok().json(SessionResponse::new(claims, identity)))
}
