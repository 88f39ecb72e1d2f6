// chain-core/src/lib.rs

//! Core data model for the delegated-PoS chain
//!
//! This crate provides:
//! - Primitive chain types (block numbers, millisecond timestamps, amounts)
//! - The consensus record model (agents, deposits, the `Consensus` envelope)
//! - Transaction payloads for registering, joining, and exiting consensus

pub mod record;
pub mod transaction;
pub mod types;

pub use record::{
    Agent, AgentStatus, Consensus, Deposit, DepositFilter, DepositPatch, DepositStatus,
    StoredAgent, StoredDeposit,
};
pub use transaction::{Transaction, TransactionPayload};
pub use types::*;

use chain_crypto::Hash;

/// Result type for record-model operations
pub type RecordResult<T> = Result<T, RecordError>;

/// Errors raised by the consensus record model
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Deposit must reference an agent: agent hash is zero")]
    MissingAgentReference,

    #[error("Transaction {0} is not an exit-consensus transaction")]
    NotAnExit(Hash),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Cryptographic error: {0}")]
    CryptoError(#[from] chain_crypto::CryptoError),
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_basic_imports() {
        // Smoke test to ensure all modules compile
    }
}
