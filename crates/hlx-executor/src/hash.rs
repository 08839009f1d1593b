//! Action hash builder.
//!
//! Preimage layout, in order:
//!
//! ```text
//! encoded_action
//! nonce                      8 bytes, big-endian
//! 0x00                       no vault address
//!   | 0x01 || address        20 raw bytes
//! [0x00 || expires_after]    8 bytes, big-endian; absent when None
//! ```
//!
//! The digest is Keccak-256 of the concatenation. Note the asymmetry: an
//! absent vault still writes its marker byte, an absent expiry writes nothing.

use alloy::primitives::{keccak256, Address, B256};

use crate::error::EncodingError;
use crate::wire::{encode, OrderAction};

/// Hash already-encoded action bytes.
pub fn build_hash(
    encoded_action: &[u8],
    nonce: u64,
    vault_address: Option<Address>,
    expires_after: Option<u64>,
) -> B256 {
    let mut data = Vec::with_capacity(encoded_action.len() + 8 + 21 + 9);
    data.extend_from_slice(encoded_action);
    data.extend_from_slice(&nonce.to_be_bytes());

    match vault_address {
        None => data.push(0x00),
        Some(addr) => {
            data.push(0x01);
            data.extend_from_slice(addr.as_slice());
        }
    }

    if let Some(expires) = expires_after {
        data.push(0x00);
        data.extend_from_slice(&expires.to_be_bytes());
    }

    keccak256(&data)
}

/// Everything that goes into one action hash.
#[derive(Debug, Clone)]
pub struct SigningInput {
    pub action: OrderAction,
    pub nonce: u64,
    /// None = trading for the signer's own account.
    pub vault_address: Option<Address>,
    pub expires_after: Option<u64>,
}

impl SigningInput {
    pub fn new(action: OrderAction, nonce: u64) -> Self {
        Self {
            action,
            nonce,
            vault_address: None,
            expires_after: None,
        }
    }

    /// Encode the action and hash it with the rest of the input.
    pub fn action_hash(&self) -> Result<B256, EncodingError> {
        let encoded = encode(&self.action)?;
        Ok(build_hash(
            &encoded,
            self.nonce,
            self.vault_address,
            self.expires_after,
        ))
    }
}
