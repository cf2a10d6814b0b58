//! # siwf-auth: Sign-In With Farcaster verification
//!
//! Authenticates a signed EIP-4361 style sign-in message, resolves the
//! Farcaster identity number (FID) it claims, checks the recovered signer
//! against the on-chain IdRegistry custody address, consumes the message
//! nonce exactly once, and mints a session credential.
//!
//! ## Pipeline
//!
//! ```text
//!   signed payload
//!         ↓
//!   ┌──────────────┐   ┌────────┐   ┌───────────┐   ┌──────────┐   ┌─────────┐
//!   │ MessageParser│ → │ Policy │ → │ Signature │ → │ Identity │ → │ Custody │
//!   └──────────────┘   └────────┘   └───────────┘   └──────────┘   └─────────┘
//!                         read-only, safe to cancel or retry            ↓
//!                                                              ┌──────────────┐
//!                                                              │ NonceLedger  │  atomic consume
//!                                                              └──────────────┘
//!                                                                      ↓
//!                                                              ┌──────────────┐
//!                                                              │SessionIssuer │
//!                                                              └──────────────┘
//! ```
//!
//! The nonce ledger is the only shared mutable state. Once a nonce is
//! consumed it stays consumed, even if a later stage fails.

pub mod address;
pub mod config;
pub mod custody;
pub mod error;
pub mod identity;
pub mod identity_store;
pub mod message;
pub mod nonce;
pub mod policy;
pub mod session;
pub mod signature;
pub mod verification;

// Re-exports for convenience
pub use address::Address;
pub use config::SiwfConfig;
pub use custody::{CustodyOracle, RpcCustodyOracle, StaticCustodyOracle};
pub use error::{ErrorKind, PolicyReason, Result, SiwfError};
pub use identity_store::{IdentityRecord, IdentityStore, MemoryIdentityStore};
pub use message::{MessageEnvelope, SignInMessage};
pub use nonce::{IssuedNonce, MemoryNonceLedger, NonceLedger, NonceMode, NonceRecord};
pub use policy::Policy;
pub use session::{JwtSessionIssuer, SessionClaims, SessionIssuer};
pub use verification::{
    AuthenticatedSignIn, SignInOutcome, SignInRequest, SignInVerifier, VerifiedIdentity,
    VerifierSettings,
};

/// OP Mainnet, where the Farcaster IdRegistry lives
pub const FARCASTER_CHAIN_ID: u64 = 10;

/// IdRegistry contract on OP Mainnet
pub const DEFAULT_ID_REGISTRY: &str = "0x00000000fc6c5f01fc30151999387bb99a9f489b";

/// Public OP Mainnet RPC endpoint
pub const DEFAULT_RPC_URL: &str = "https://mainnet.optimism.io";
