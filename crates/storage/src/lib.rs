// storage/src/lib.rs

//! Persistent storage layer and collaborator interfaces
//!
//! This crate provides:
//! - The `RecordStore`/`RecordSession` interface: agent and deposit rows with
//!   point lookup, selective update, filtered listing, and tombstoning
//!   deletes, all inside a caller-held atomic session
//! - The `FundLockLedger` interface: per-transaction fund locks with
//!   approve/permanent/rollback unlock transitions
//! - The `TransactionLedger` interface over confirmed transactions
//! - A RocksDB implementation of all three, and in-memory implementations
//!   for tests and light tooling

pub mod db;
pub mod memory;
pub mod traits;

pub use db::{ColumnFamily, Database, DatabaseConfig};
pub use memory::{MemoryFundLockLedger, MemoryRecordStore, MemoryTransactionLedger};
pub use traits::{
    FundLock, FundLockLedger, LockStatus, RecordSession, RecordStore, TransactionLedger,
};

use chain_crypto::Hash;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for fund-lock ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur during fund-lock ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("No fund lock recorded for transaction {0}")]
    UnknownLock(Hash),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
