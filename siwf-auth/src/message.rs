//! Sign-in message parsing
//!
//! Turns the EIP-4361 challenge text a wallet signed into a structured
//! [`SignInMessage`]. Only the fields the sign-in flow consumes are
//! interpreted; the original text is kept verbatim because it is what the
//! signature covers.
//!
//! ```text
//! app.example.com wants you to sign in with your Ethereum account:
//! 0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266
//!
//! Farcaster Auth
//!
//! URI: https://app.example.com/login
//! Version: 1
//! Chain ID: 10
//! Nonce: abc123def
//! Issued At: 2025-01-01T00:00:00Z
//! Resources:
//! - farcaster://fid/42
//! ```

use crate::{
    address::Address,
    error::{Result, SiwfError},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::trace;

const HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account:";
const RESOURCES_TAG: &str = "Resources:";

/// Transport envelope around the message text.
///
/// Clients send the message either as a bare string or wrapped once more
/// in an object (`{"message": {"message": "..."}}` at the request level).
/// Anything else is kept as-is so it can be rejected as a malformed payload
/// rather than a deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageEnvelope {
    /// `"message": "<text>"`
    Text(String),

    /// `"message": { "message": "<text>" }`
    Wrapped {
        /// Inner message text
        message: String,
    },

    /// Any other shape
    Unrecognized(serde_json::Value),
}

impl MessageEnvelope {
    /// Unwrap to the raw message text
    pub fn text(&self) -> Result<&str> {
        match self {
            MessageEnvelope::Text(text) | MessageEnvelope::Wrapped { message: text } => Ok(text),
            MessageEnvelope::Unrecognized(value) => Err(SiwfError::MalformedPayload(format!(
                "expected message text at depth one or two, got {}",
                json_type_name(value)
            ))),
        }
    }
}

impl From<&str> for MessageEnvelope {
    fn from(text: &str) -> Self {
        MessageEnvelope::Text(text.to_string())
    }
}

impl From<String> for MessageEnvelope {
    fn from(text: String) -> Self {
        MessageEnvelope::Text(text)
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Parsed sign-in message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInMessage {
    /// Host that wants the user to sign in
    pub authority: String,

    /// Address the message claims signed it (not trusted)
    pub address: Address,

    /// Optional human-readable statement
    pub statement: Option<String>,

    /// URI the sign-in refers to
    pub uri: Option<String>,

    /// Message version
    pub version: Option<String>,

    /// Chain identifier
    pub chain_id: u64,

    /// Single-use nonce
    pub nonce: String,

    /// Issuance time
    pub issued_at: Option<DateTime<Utc>>,

    /// Expiration time
    pub expiration_time: Option<DateTime<Utc>>,

    /// Not-before time
    pub not_before: Option<DateTime<Utc>>,

    /// Optional request identifier
    pub request_id: Option<String>,

    /// Resource URIs, in message order
    pub resources: Vec<String>,

    raw: String,
}

impl SignInMessage {
    /// Parse message text
    pub fn parse(raw: &str) -> Result<Self> {
        MessageParser::new(raw).parse()
    }

    /// The exact text that was parsed (and signed)
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl FromStr for SignInMessage {
    type Err = SiwfError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Tagged fields collected while scanning
#[derive(Default)]
struct Fields {
    uri: Option<String>,
    version: Option<String>,
    chain_id: Option<String>,
    nonce: Option<String>,
    issued_at: Option<String>,
    expiration_time: Option<String>,
    not_before: Option<String>,
    request_id: Option<String>,
}

impl Fields {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            "URI" => Some(&mut self.uri),
            "Version" => Some(&mut self.version),
            "Chain ID" => Some(&mut self.chain_id),
            "Nonce" => Some(&mut self.nonce),
            "Issued At" => Some(&mut self.issued_at),
            "Expiration Time" => Some(&mut self.expiration_time),
            "Not Before" => Some(&mut self.not_before),
            "Request ID" => Some(&mut self.request_id),
            _ => None,
        }
    }
}

struct MessageParser<'a> {
    raw: &'a str,
}

impl<'a> MessageParser<'a> {
    fn new(raw: &'a str) -> Self {
        Self { raw }
    }

    fn parse(self) -> Result<SignInMessage> {
        // Line endings only matter for tokenising; the raw text is hashed as sent
        let normalized = self.raw.replace("\r\n", "\n");
        let mut lines = normalized.lines();

        let header = lines
            .next()
            .ok_or_else(|| SiwfError::ParseError("message is empty".to_string()))?;
        let authority = header
            .trim()
            .strip_suffix(HEADER_SUFFIX)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| SiwfError::ParseError("missing authority header line".to_string()))?
            .to_string();

        let address_line = lines
            .next()
            .ok_or_else(|| SiwfError::ParseError("missing address line".to_string()))?;
        let address: Address = address_line
            .trim()
            .parse()
            .map_err(|e| SiwfError::ParseError(format!("invalid address: {}", e)))?;

        let mut fields = Fields::default();
        let mut statement: Vec<&str> = Vec::new();
        let mut resources = Vec::new();
        let mut seen_tag = false;
        let mut in_resources = false;

        for line in lines {
            if in_resources {
                if let Some(resource) = line.trim_start().strip_prefix("- ") {
                    resources.push(resource.trim().to_string());
                    continue;
                }
                in_resources = false;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if trimmed == RESOURCES_TAG {
                seen_tag = true;
                in_resources = true;
                continue;
            }

            if let Some((key, value)) = trimmed.split_once(": ") {
                if let Some(slot) = fields.slot(key) {
                    if slot.is_some() {
                        return Err(SiwfError::ParseError(format!("duplicate field '{}'", key)));
                    }
                    *slot = Some(value.trim().to_string());
                    seen_tag = true;
                    continue;
                }
            }

            if seen_tag {
                trace!(line = trimmed, "ignoring unrecognized message line");
            } else {
                statement.push(trimmed);
            }
        }

        let chain_id = fields
            .chain_id
            .ok_or_else(|| SiwfError::ParseError("missing 'Chain ID'".to_string()))?;
        let chain_id = chain_id
            .parse::<u64>()
            .map_err(|_| SiwfError::ParseError(format!("invalid chain id '{}'", chain_id)))?;

        let nonce = fields
            .nonce
            .ok_or_else(|| SiwfError::ParseError("missing 'Nonce'".to_string()))?;
        validate_nonce(&nonce)?;

        Ok(SignInMessage {
            authority,
            address,
            statement: (!statement.is_empty()).then(|| statement.join("\n")),
            uri: fields.uri,
            version: fields.version,
            chain_id,
            nonce,
            issued_at: parse_timestamp("Issued At", fields.issued_at)?,
            expiration_time: parse_timestamp("Expiration Time", fields.expiration_time)?,
            not_before: parse_timestamp("Not Before", fields.not_before)?,
            request_id: fields.request_id,
            resources,
            raw: self.raw.to_string(),
        })
    }
}

fn validate_nonce(nonce: &str) -> Result<()> {
    if nonce.is_empty() || !nonce.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SiwfError::ParseError(
            "nonce must be non-empty and alphanumeric".to_string(),
        ));
    }
    Ok(())
}

fn parse_timestamp(field: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|v| {
            DateTime::parse_from_rfc3339(&v)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| SiwfError::ParseError(format!("invalid '{}': {}", field, e)))
        })
        .transpose()
}
