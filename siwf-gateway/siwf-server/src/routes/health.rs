//! Health check endpoint

use actix_web::{get, HttpResponse, Responder};
use siwf_common::types::HealthResponse;

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
