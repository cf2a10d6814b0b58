//! Custody oracle
//!
//! Reads the address currently authorized for an identity number from the
//! on-chain IdRegistry. The read is idempotent, so transport failures are
//! reported as retryable [`SiwfError::OracleUnavailable`] and kept apart
//! from "no custody" (an unregistered identity).

use crate::{
    address::{keccak256, Address},
    error::{Result, SiwfError},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Source of truth for identity custody
#[async_trait]
pub trait CustodyOracle: Send + Sync {
    /// Current custody address, or `None` when the identity is unregistered
    async fn custody_of(&self, fid: u64) -> Result<Option<Address>>;
}

/// Compare the recovered signer with the registry's custody address
pub fn check_custody(fid: u64, signer: &Address, custody: Option<Address>) -> Result<()> {
    match custody {
        None => Err(SiwfError::IdentityUnregistered(fid)),
        Some(custody) if custody == *signer => Ok(()),
        Some(_) => Err(SiwfError::SignerNotAuthorized {
            fid,
            signer: signer.to_checksum(),
        }),
    }
}

/// `custodyOf(uint256)` call data for an identity number
pub fn custody_of_calldata(fid: u64) -> String {
    let selector = &keccak256(b"custodyOf(uint256)")[..4];
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&fid.to_be_bytes());
    format!("0x{}{}", hex::encode(selector), hex::encode(word))
}

/// Decode an ABI-encoded `address` return word
fn decode_address_word(result: &str) -> Result<Option<Address>> {
    let hex_part = result.strip_prefix("0x").unwrap_or(result);
    let bytes = hex::decode(hex_part)
        .map_err(|e| SiwfError::OracleUnavailable(format!("malformed eth_call result: {}", e)))?;

    if bytes.len() != 32 {
        return Err(SiwfError::OracleUnavailable(format!(
            "eth_call returned {} bytes, expected 32",
            bytes.len()
        )));
    }

    let address = Address::from_slice(&bytes[12..])
        .ok_or_else(|| SiwfError::OracleUnavailable("malformed address word".to_string()))?;
    Ok((!address.is_zero()).then_some(address))
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: (CallObject<'a>, &'static str),
}

#[derive(Debug, Serialize)]
struct CallObject<'a> {
    to: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// IdRegistry reader over Ethereum JSON-RPC (`eth_call`)
#[derive(Clone)]
pub struct RpcCustodyOracle {
    client: reqwest::Client,
    rpc_url: String,
    registry: String,
}

impl RpcCustodyOracle {
    /// Create a new oracle with a bounded request timeout
    pub fn new(rpc_url: impl Into<String>, registry: Address, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SiwfError::ConfigError(format!("Failed to build RPC client: {}", e)))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            registry: registry.to_checksum(),
        })
    }
}

#[async_trait]
impl CustodyOracle for RpcCustodyOracle {
    async fn custody_of(&self, fid: u64) -> Result<Option<Address>> {
        let data = custody_of_calldata(fid);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_call",
            params: (
                CallObject {
                    to: &self.registry,
                    data: &data,
                },
                "latest",
            ),
        };

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SiwfError::OracleUnavailable(format!(
                "RPC endpoint returned {}",
                response.status()
            )));
        }

        let body: RpcResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(SiwfError::OracleUnavailable(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }

        let result = body
            .result
            .ok_or_else(|| SiwfError::OracleUnavailable("RPC response has no result".to_string()))?;
        let custody = decode_address_word(&result)?;

        debug!(fid, custody = ?custody, "custody lookup complete");
        Ok(custody)
    }
}

/// Fixed custody table, for local development and tests
#[derive(Debug, Clone, Default)]
pub struct StaticCustodyOracle {
    custody: HashMap<u64, Address>,
}

impl StaticCustodyOracle {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custody address
    pub fn with_custody(mut self, fid: u64, address: Address) -> Self {
        self.custody.insert(fid, address);
        self
    }
}

#[async_trait]
impl CustodyOracle for StaticCustodyOracle {
    async fn custody_of(&self, fid: u64) -> Result<Option<Address>> {
        Ok(self.custody.get(&fid).copied())
    }
}
