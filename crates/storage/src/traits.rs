// storage/src/traits.rs

use crate::{LedgerResult, StorageResult};
use chain_core::{
    BlockNumber, DepositFilter, DepositPatch, StoredAgent, StoredDeposit, Timestamp, Transaction,
};
use chain_crypto::Hash;
use serde::{Deserialize, Serialize};

/// Lifecycle of the funds referenced by one join/registration transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockStatus {
    /// Funds are locked behind a live registration or deposit
    Locked,
    /// An exit has been tentatively approved during block assembly
    UnlockApproved,
    /// The exit committed; funds spendable once `unlock_at` passes
    Unlocked,
}

/// Fund-lock row, keyed by the originating transaction's hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundLock {
    pub tx_hash: Hash,
    pub status: LockStatus,
    /// Epoch-millisecond instant the funds become spendable; 0 means
    /// immediately on unlock
    pub unlock_at: Timestamp,
}

impl FundLock {
    /// Fresh lock as written when a join/registration transaction commits
    pub fn locked(tx_hash: Hash) -> Self {
        Self {
            tx_hash,
            status: LockStatus::Locked,
            unlock_at: 0,
        }
    }
}

/// Durable store of agent and deposit rows. `begin` opens the atomic session
/// every mutating engine phase runs inside.
pub trait RecordStore: Send + Sync {
    fn begin(&self) -> StorageResult<Box<dyn RecordSession + '_>>;
}

/// One atomic unit of record-store work.
///
/// Mutations are buffered until `commit`; dropping a session without
/// committing discards every buffered mutation, which is what guarantees a
/// mid-cascade failure leaves no partial state. Reads observe the session's
/// own uncommitted writes.
pub trait RecordSession {
    /// Active agent row by envelope hash
    fn agent(&self, hash: &Hash) -> StorageResult<Option<StoredAgent>>;

    /// Insert or replace an agent row. Also clears any tombstone for the
    /// same hash, so re-saving during rollback undeletes the agent.
    fn put_agent(&mut self, row: StoredAgent) -> StorageResult<()>;

    /// Remove an agent from the active set, recording a tombstone row
    /// stamped with `del_height` for audit. Deleting an absent key is a
    /// no-op.
    fn delete_agent(&mut self, hash: &Hash, del_height: BlockNumber) -> StorageResult<()>;

    /// Tombstone row written by `delete_agent`, if any
    fn agent_tombstone(&self, hash: &Hash) -> StorageResult<Option<StoredAgent>>;

    /// Deposit row by envelope hash, tombstoned or not
    fn deposit(&self, hash: &Hash) -> StorageResult<Option<StoredDeposit>>;

    /// Insert or replace a deposit row
    fn put_deposit(&mut self, row: StoredDeposit) -> StorageResult<()>;

    /// Selective update of one deposit row; `None` patch fields are left
    /// untouched. Patching an absent key is a no-op.
    fn update_deposit(&mut self, hash: &Hash, patch: &DepositPatch) -> StorageResult<()>;

    /// Selective bulk update of every deposit row matching the filter.
    /// Returns the number of rows touched.
    fn update_deposits(
        &mut self,
        filter: &DepositFilter,
        patch: &DepositPatch,
    ) -> StorageResult<usize>;

    /// All deposit rows matching the filter
    fn list_deposits(&self, filter: &DepositFilter) -> StorageResult<Vec<StoredDeposit>>;

    /// Tombstone one deposit: stamp `del_height` and mark it exited. The row
    /// stays in place so a later rollback can restore it. Deleting an absent
    /// key is a no-op.
    fn delete_deposit(&mut self, hash: &Hash, del_height: BlockNumber) -> StorageResult<()>;

    /// Tombstone every still-active deposit following one agent. Deposits
    /// already tombstoned by an earlier exit keep their original stamp.
    /// Returns the number of rows touched.
    fn delete_deposits_by_agent(
        &mut self,
        agent_hash: &Hash,
        del_height: BlockNumber,
    ) -> StorageResult<usize>;

    /// Atomically apply every buffered mutation
    fn commit(self: Box<Self>) -> StorageResult<()>;
}

/// Per-transaction fund locks. Unlock operations are idempotent:
/// permanently unlocking an already-unlocked hash is a no-op, never an
/// error.
pub trait FundLockLedger: Send + Sync {
    /// Record a fresh lock for a committed join/registration transaction
    fn lock(&self, tx_hash: Hash) -> LedgerResult<()>;

    /// Tentatively approve an unlock during block assembly
    fn approve_unlock(&self, tx_hash: &Hash, unlock_at: Timestamp) -> LedgerResult<()>;

    /// Permanently release the lock; funds spendable at `unlock_at`
    /// (0 = immediately)
    fn permanent_unlock(&self, tx_hash: &Hash, unlock_at: Timestamp) -> LedgerResult<()>;

    /// Revert an approved or committed unlock back to the locked state
    fn rollback_unlock(&self, tx_hash: &Hash) -> LedgerResult<()>;

    /// Current lock state, if one was ever recorded
    fn lock_state(&self, tx_hash: &Hash) -> LedgerResult<Option<FundLock>>;
}

/// Read access to durably confirmed transactions
pub trait TransactionLedger: Send + Sync {
    fn get_tx(&self, hash: &Hash) -> StorageResult<Option<Transaction>>;
}
