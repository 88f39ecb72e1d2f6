// consensus/src/lib.rs

//! Exit-consensus transaction engine
//!
//! This crate drives the three-phase lifecycle of exit-consensus
//! transactions:
//! - approval: tentative fund-unlock while a block is being assembled
//! - commit: permanent record removal and fund release when the block
//!   becomes final
//! - rollback: exact restoration of records and locks when the block is
//!   discarded on a reorg
//!
//! An agent exit cascades to every deposit following the agent; a deposit
//! exit touches a single record.

pub mod cache;
pub mod engine;
pub mod notice;
pub mod punish;

pub use cache::ConfirmingTxCache;
pub use engine::ExitConsensusEngine;
pub use notice::{ConsensusNotice, NoticeBus};
pub use punish::YellowPunishRecord;

use chain_crypto::Hash;
use storage::{LedgerError, StorageError};

/// Mandatory cooling-off period after deregistering as an agent, in days
pub const STOP_AGENT_LOCK_DAYS: u64 = 3;

/// The cooling-off period in milliseconds; an agent exit's funds unlock at
/// `tx.time + STOP_AGENT_LOCK_DURATION_MS`
pub const STOP_AGENT_LOCK_DURATION_MS: u64 = STOP_AGENT_LOCK_DAYS * 24 * 3600 * 1000;

/// Result type for consensus operations
pub type ConsensusResult<T> = Result<T, ConsensusError>;

/// Errors that can occur during consensus operations
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    /// The referenced join transaction is in neither the confirmed ledger
    /// nor the confirming cache. Fatal: the enclosing block must be
    /// rejected, never retried.
    #[error("Cannot resolve referenced transaction {0}")]
    UnresolvedReference(Hash),

    /// A prior consistency bug surfaced mid-cascade; must never be skipped
    #[error("Consensus invariant violated: {0}")]
    InvariantViolation(String),

    /// The transaction cannot be classified (e.g. an exit referencing
    /// another exit)
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Record error: {0}")]
    Record(#[from] chain_core::RecordError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}
