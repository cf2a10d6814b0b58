//! Personal-message signature recovery
//!
//! Recovers the signing address from an EIP-191 `personal_sign` signature.
//! The recovered address is the only one the sign-in flow trusts.

use crate::{
    address::{keccak256, Address},
    error::{Result, SiwfError},
};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

/// Signature length: r (32) || s (32) || v (1)
pub const SIGNATURE_LENGTH: usize = 65;

/// EIP-191 personal message digest
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let bytes = message.as_bytes();
    let mut data = format!("\x19Ethereum Signed Message:\n{}", bytes.len()).into_bytes();
    data.extend_from_slice(bytes);
    keccak256(&data)
}

/// Decode a hex signature, with or without `0x`, into its fixed-length form
pub fn decode_signature(signature_hex: &str) -> Result<[u8; SIGNATURE_LENGTH]> {
    let trimmed = signature_hex.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    let bytes = hex::decode(hex_part)
        .map_err(|e| SiwfError::SignatureInvalid(format!("invalid signature hex: {}", e)))?;

    bytes.as_slice().try_into().map_err(|_| {
        SiwfError::SignatureInvalid(format!(
            "signature must be {} bytes, got {}",
            SIGNATURE_LENGTH,
            bytes.len()
        ))
    })
}

fn recovery_id(v: u8) -> Result<RecoveryId> {
    let id = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        _ => {
            return Err(SiwfError::SignatureInvalid(format!(
                "recovery id must be 0/1 or 27/28, got {}",
                v
            )))
        }
    };
    RecoveryId::from_byte(id)
        .ok_or_else(|| SiwfError::SignatureInvalid("invalid recovery id".to_string()))
}

/// Recover the address that signed `message`
pub fn recover_signer(message: &str, signature_hex: &str) -> Result<Address> {
    let bytes = decode_signature(signature_hex)?;

    let mut signature = Signature::from_slice(&bytes[..64])
        .map_err(|e| SiwfError::SignatureInvalid(format!("invalid ECDSA signature: {}", e)))?;
    let mut recid = recovery_id(bytes[64])?;

    // High-S signatures are valid for personal_sign; fold them into low-S
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recid = RecoveryId::new(!recid.is_y_odd(), recid.is_x_reduced());
    }

    let prehash = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&prehash, &signature, recid)
        .map_err(|e| SiwfError::SignatureInvalid(format!("signer recovery failed: {}", e)))?;

    Ok(Address::from_public_key(&key))
}
