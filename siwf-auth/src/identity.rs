//! Identity resolution from message resources

use crate::error::{Result, SiwfError};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Accepted identity URI shapes, tried in this order against each resource
static IDENTITY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("canonical", r"^farcaster://fid/(\d+)$"),
        ("plural", r"^farcaster://fids/(\d+)$"),
        ("short", r"^fc://fid/(\d+)$"),
        ("query", r"^farcaster://user\?id=(\d+)$"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("identity pattern is valid")))
    .collect()
});

/// Match one resource against the accepted patterns
pub fn identity_from_resource(resource: &str) -> Option<u64> {
    let resource = resource.trim();
    IDENTITY_PATTERNS.iter().find_map(|(name, pattern)| {
        let fid = pattern
            .captures(resource)?
            .get(1)?
            .as_str()
            .parse::<u64>()
            .ok()
            .filter(|fid| *fid > 0)?;
        debug!(fid, pattern = *name, "identity resolved from resource");
        Some(fid)
    })
}

/// Resolve the claimed identity number.
///
/// Resources are scanned in message order and the first entry matching any
/// accepted pattern wins. When `expected` is given the result must equal it.
pub fn resolve_identity(resources: &[String], expected: Option<u64>) -> Result<u64> {
    let fid = resources
        .iter()
        .find_map(|resource| identity_from_resource(resource))
        .ok_or(SiwfError::IdentityNotFound)?;

    match expected {
        Some(expected) if expected != fid => Err(SiwfError::IdentityMismatch {
            resolved: fid,
            expected,
        }),
        _ => Ok(fid),
    }
}
