//! SIWF Gateway common types
//!
//! Request/response bodies and the HTTP error mapping shared by the
//! gateway server and its tests.

pub mod error;
pub mod types;

pub use error::{GatewayError, Result};
