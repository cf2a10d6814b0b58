pub mod health;
pub mod nonce;
pub mod session;
pub mod verify;

use actix_web::web;
use siwf_common::GatewayError;

/// Register all routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| GatewayError::InvalidRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/auth")
            .service(nonce::issue_nonce)
            .service(verify::verify_sign_in)
            .service(session::current_session),
    )
    .service(health::health_check);
}
