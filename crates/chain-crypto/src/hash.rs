// chain-crypto/src/hash.rs

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Sha3_256;
use std::fmt;

/// Hash output size in bytes
pub const HASH_SIZE: usize = 32;

/// Supported hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Sha256,
    Sha3_256,
}

/// A 32-byte content hash, the canonical identifier for transactions and
/// consensus records.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    /// Create a new hash from bytes
    pub fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a hash from a slice (returns error if wrong length)
    pub fn from_slice(slice: &[u8]) -> Result<Self, crate::CryptoError> {
        if slice.len() != HASH_SIZE {
            return Err(crate::CryptoError::InvalidHash);
        }
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the hash as a fixed-size array
    pub fn to_bytes(&self) -> [u8; HASH_SIZE] {
        self.0
    }

    /// The all-zero hash. Used as the "unset" reference; record constructors
    /// reject it as a foreign key.
    pub fn zero() -> Self {
        Self([0u8; HASH_SIZE])
    }

    /// Check whether this is the all-zero hash
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_SIZE]
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self, crate::CryptoError> {
        let bytes = hex::decode(s)
            .map_err(|e| crate::CryptoError::DeserializationError(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hash({}...{})",
            hex::encode(&self.0[..4]),
            hex::encode(&self.0[28..])
        )
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::zero()
    }
}

/// Trait for byte-level content hashing
pub trait Hashable {
    fn content_hash(&self) -> Hash;
    fn content_hash_with(&self, algorithm: HashAlgorithm) -> Hash;
}

impl Hashable for [u8] {
    fn content_hash(&self) -> Hash {
        self.content_hash_with(HashAlgorithm::Sha256)
    }

    fn content_hash_with(&self, algorithm: HashAlgorithm) -> Hash {
        match algorithm {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(self);
                Hash::new(hasher.finalize().into())
            }
            HashAlgorithm::Sha3_256 => {
                let mut hasher = Sha3_256::new();
                hasher.update(self);
                Hash::new(hasher.finalize().into())
            }
        }
    }
}

impl Hashable for Vec<u8> {
    fn content_hash(&self) -> Hash {
        self.as_slice().content_hash()
    }

    fn content_hash_with(&self, algorithm: HashAlgorithm) -> Hash {
        self.as_slice().content_hash_with(algorithm)
    }
}

/// Hash any serializable value through its bincode encoding
pub fn hash_of<T: serde::Serialize>(value: &T) -> Result<Hash, crate::CryptoError> {
    let bytes = bincode::serialize(value)
        .map_err(|e| crate::CryptoError::SerializationError(e.to_string()))?;
    Ok(bytes.content_hash())
}
