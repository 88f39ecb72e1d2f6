// chain-crypto/src/address.rs

use crate::{CryptoError, CryptoResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address size in bytes
pub const ADDRESS_SIZE: usize = 20;

/// A 20-byte account address. Opaque to the consensus layer; punishment
/// records and agent/deposit payloads carry these without inspecting them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// Create address from bytes
    pub fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create an address from a slice (returns error if wrong length)
    pub fn from_slice(slice: &[u8]) -> CryptoResult<Self> {
        if slice.len() != ADDRESS_SIZE {
            return Err(CryptoError::InvalidAddress);
        }
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)
            .map_err(|e| CryptoError::DeserializationError(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn zero() -> Self {
        Self([0u8; ADDRESS_SIZE])
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let addr = Address::new([7u8; ADDRESS_SIZE]);
        assert_eq!(Address::from_hex(&addr.to_hex()).unwrap(), addr);
    }

    #[test]
    fn test_bad_length_rejected() {
        assert!(Address::from_slice(&[1, 2, 3]).is_err());
        assert!(Address::from_hex("0xdead").is_err());
    }
}
