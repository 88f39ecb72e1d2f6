// storage/src/memory.rs

//! In-memory implementations of the storage interfaces.
//!
//! Sessions copy the shared state on `begin` and swap it back on `commit`,
//! giving the same all-or-nothing boundary as the RocksDB sessions. Engine
//! tests and light tooling run against these.

use crate::{
    traits::{FundLock, FundLockLedger, LockStatus, RecordSession, RecordStore, TransactionLedger},
    LedgerError, LedgerResult, StorageResult,
};
use chain_core::{
    BlockNumber, DepositFilter, DepositPatch, DepositStatus, StoredAgent, StoredDeposit,
    Timestamp, Transaction,
};
use chain_crypto::Hash;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Full record-store contents, comparable for snapshot assertions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordState {
    pub agents: HashMap<Hash, StoredAgent>,
    pub agent_tombstones: HashMap<Hash, StoredAgent>,
    pub deposits: HashMap<Hash, StoredDeposit>,
}

/// In-memory record store
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    state: Arc<Mutex<RecordState>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed state, for test assertions
    pub fn snapshot(&self) -> RecordState {
        self.state.lock().unwrap().clone()
    }
}

impl RecordStore for MemoryRecordStore {
    fn begin(&self) -> StorageResult<Box<dyn RecordSession + '_>> {
        let working = self.state.lock().unwrap().clone();
        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.state),
            working,
        }))
    }
}

struct MemorySession {
    shared: Arc<Mutex<RecordState>>,
    working: RecordState,
}

impl RecordSession for MemorySession {
    fn agent(&self, hash: &Hash) -> StorageResult<Option<StoredAgent>> {
        Ok(self.working.agents.get(hash).cloned())
    }

    fn put_agent(&mut self, row: StoredAgent) -> StorageResult<()> {
        self.working.agent_tombstones.remove(&row.hash);
        self.working.agents.insert(row.hash, row);
        Ok(())
    }

    fn delete_agent(&mut self, hash: &Hash, del_height: BlockNumber) -> StorageResult<()> {
        if let Some(mut row) = self.working.agents.remove(hash) {
            row.del_height = del_height;
            self.working.agent_tombstones.insert(*hash, row);
        }
        Ok(())
    }

    fn agent_tombstone(&self, hash: &Hash) -> StorageResult<Option<StoredAgent>> {
        Ok(self.working.agent_tombstones.get(hash).cloned())
    }

    fn deposit(&self, hash: &Hash) -> StorageResult<Option<StoredDeposit>> {
        Ok(self.working.deposits.get(hash).cloned())
    }

    fn put_deposit(&mut self, row: StoredDeposit) -> StorageResult<()> {
        self.working.deposits.insert(row.hash, row);
        Ok(())
    }

    fn update_deposit(&mut self, hash: &Hash, patch: &DepositPatch) -> StorageResult<()> {
        if let Some(row) = self.working.deposits.get_mut(hash) {
            row.apply(patch);
        }
        Ok(())
    }

    fn update_deposits(
        &mut self,
        filter: &DepositFilter,
        patch: &DepositPatch,
    ) -> StorageResult<usize> {
        let mut touched = 0;
        for row in self.working.deposits.values_mut() {
            if filter.matches(row) {
                row.apply(patch);
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn list_deposits(&self, filter: &DepositFilter) -> StorageResult<Vec<StoredDeposit>> {
        let mut rows: Vec<_> = self
            .working
            .deposits
            .values()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.hash);
        Ok(rows)
    }

    fn delete_deposit(&mut self, hash: &Hash, del_height: BlockNumber) -> StorageResult<()> {
        self.update_deposit(
            hash,
            &DepositPatch {
                status: Some(DepositStatus::Exited),
                del_height: Some(del_height),
                block_height: None,
            },
        )
    }

    fn delete_deposits_by_agent(
        &mut self,
        agent_hash: &Hash,
        del_height: BlockNumber,
    ) -> StorageResult<usize> {
        self.update_deposits(
            &DepositFilter::active_by_agent(*agent_hash),
            &DepositPatch {
                status: Some(DepositStatus::Exited),
                del_height: Some(del_height),
                block_height: None,
            },
        )
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        *self.shared.lock().unwrap() = self.working;
        Ok(())
    }
}

/// In-memory fund-lock ledger
#[derive(Clone, Default)]
pub struct MemoryFundLockLedger {
    locks: Arc<Mutex<HashMap<Hash, FundLock>>>,
}

impl MemoryFundLockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every lock state, for test assertions
    pub fn snapshot(&self) -> HashMap<Hash, FundLock> {
        self.locks.lock().unwrap().clone()
    }
}

impl FundLockLedger for MemoryFundLockLedger {
    fn lock(&self, tx_hash: Hash) -> LedgerResult<()> {
        self.locks
            .lock()
            .unwrap()
            .insert(tx_hash, FundLock::locked(tx_hash));
        Ok(())
    }

    fn approve_unlock(&self, tx_hash: &Hash, unlock_at: Timestamp) -> LedgerResult<()> {
        let mut locks = self.locks.lock().unwrap();
        let lock = locks
            .get_mut(tx_hash)
            .ok_or(LedgerError::UnknownLock(*tx_hash))?;
        lock.status = LockStatus::UnlockApproved;
        lock.unlock_at = unlock_at;
        Ok(())
    }

    fn permanent_unlock(&self, tx_hash: &Hash, unlock_at: Timestamp) -> LedgerResult<()> {
        let mut locks = self.locks.lock().unwrap();
        let lock = locks
            .get_mut(tx_hash)
            .ok_or(LedgerError::UnknownLock(*tx_hash))?;
        if lock.status == LockStatus::Unlocked {
            return Ok(());
        }
        lock.status = LockStatus::Unlocked;
        lock.unlock_at = unlock_at;
        Ok(())
    }

    fn rollback_unlock(&self, tx_hash: &Hash) -> LedgerResult<()> {
        let mut locks = self.locks.lock().unwrap();
        let lock = locks
            .get_mut(tx_hash)
            .ok_or(LedgerError::UnknownLock(*tx_hash))?;
        lock.status = LockStatus::Locked;
        lock.unlock_at = 0;
        Ok(())
    }

    fn lock_state(&self, tx_hash: &Hash) -> LedgerResult<Option<FundLock>> {
        Ok(self.locks.lock().unwrap().get(tx_hash).copied())
    }
}

/// In-memory confirmed-transaction ledger
#[derive(Clone, Default)]
pub struct MemoryTransactionLedger {
    txs: Arc<Mutex<HashMap<Hash, Transaction>>>,
}

impl MemoryTransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_tx(&self, tx: Transaction) {
        self.txs.lock().unwrap().insert(tx.hash(), tx);
    }
}

impl TransactionLedger for MemoryTransactionLedger {
    fn get_tx(&self, hash: &Hash) -> StorageResult<Option<Transaction>> {
        Ok(self.txs.lock().unwrap().get(hash).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_core::{Agent, Amount, Consensus};
    use chain_crypto::Address;

    fn agent_row(seed: u8) -> StoredAgent {
        let record = Consensus::new(Agent::new(
            Address::new([seed; 20]),
            Amount::from_tokens(20_000),
            500,
        ))
        .unwrap();
        StoredAgent::from_consensus(&record, Hash::new([seed; 32]))
    }

    #[test]
    fn test_session_isolation() {
        let store = MemoryRecordStore::new();
        let row = agent_row(1);
        let hash = row.hash;

        {
            let mut session = store.begin().unwrap();
            session.put_agent(row.clone()).unwrap();
            // not yet visible outside the session
            assert!(store.snapshot().agents.is_empty());
        }
        // dropped without commit: discarded
        assert!(store.snapshot().agents.is_empty());

        let mut session = store.begin().unwrap();
        session.put_agent(row).unwrap();
        session.commit().unwrap();
        assert!(store.snapshot().agents.contains_key(&hash));
    }

    #[test]
    fn test_delete_and_undelete() {
        let store = MemoryRecordStore::new();
        let row = agent_row(2);
        let hash = row.hash;

        let mut session = store.begin().unwrap();
        session.put_agent(row.clone()).unwrap();
        session.delete_agent(&hash, 10).unwrap();
        assert!(session.agent(&hash).unwrap().is_none());
        assert_eq!(session.agent_tombstone(&hash).unwrap().unwrap().del_height, 10);

        session.put_agent(row).unwrap();
        assert!(session.agent_tombstone(&hash).unwrap().is_none());
        assert!(session.agent(&hash).unwrap().is_some());
    }
}
