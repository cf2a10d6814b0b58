//! SIWF Gateway Server
//!
//! HTTP surface for Sign-In With Farcaster: nonce issuance, sign-in
//! verification, session introspection and health.

pub mod config;
pub mod routes;
pub mod services;

pub use config::Config;

use siwf_auth::SignInVerifier;

#[derive(Clone)]
pub struct AppState {
    pub verifier: SignInVerifier,
    pub cookie_name: String,
}

impl AppState {
    pub fn new(verifier: SignInVerifier, cookie_name: impl Into<String>) -> Self {
        Self {
            verifier,
            cookie_name: cookie_name.into(),
        }
    }
}
