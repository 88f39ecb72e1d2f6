// chain-crypto/src/lib.rs

//! Cryptographic primitives for the delegated-PoS chain
//!
//! This crate provides:
//! - Content hashing (SHA256, SHA3)
//! - The `Hash` identifier used to address transactions and consensus records
//! - Opaque account addresses

pub mod address;
pub mod hash;

pub use address::Address;
pub use hash::{Hash, HashAlgorithm, Hashable};

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid hash")]
    InvalidHash,

    #[error("Invalid address")]
    InvalidAddress,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_basics() {
        // Basic smoke test
        let digest = b"join-consensus".as_slice().content_hash();
        assert_eq!(Hash::from_hex(&digest.to_hex()).unwrap(), digest);
    }
}
