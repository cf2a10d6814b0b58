//! Sign-in verification endpoint
//!
//! POST /auth/verify
//! Verifies a signed message, consumes its nonce and sets the session cookie.

use crate::AppState;
use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    post, web, HttpResponse,
};
use siwf_auth::SignInRequest;
use siwf_common::{
    types::{SignInResponse, VerifyRequest},
    Result,
};
use validator::Validate;

#[post("/verify")]
pub async fn verify_sign_in(
    state: web::Data<AppState>,
    body: web::Json<VerifyRequest>,
) -> Result<HttpResponse> {
    body.validate()?;

    let request = SignInRequest::from(body.into_inner());
    let outcome = state.verifier.sign_in(&request).await?;

    let max_age = state.verifier.sessions().ttl().as_secs();
    let cookie = Cookie::build(state.cookie_name.clone(), outcome.session_token.clone())
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(i64::try_from(max_age).unwrap_or(i64::MAX)))
        .finish();

    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(SignInResponse::from(outcome)))
}
