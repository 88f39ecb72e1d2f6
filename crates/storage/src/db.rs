// storage/src/db.rs

use crate::{
    traits::{FundLock, FundLockLedger, LockStatus, RecordSession, RecordStore, TransactionLedger},
    LedgerError, LedgerResult, StorageError, StorageResult,
};
use chain_core::{
    BlockNumber, DepositFilter, DepositPatch, DepositStatus, StoredAgent, StoredDeposit,
    Timestamp, Transaction,
};
use chain_crypto::{hash::HASH_SIZE, Hash};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Column families for different data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnFamily {
    Agents,
    AgentTombstones,
    Deposits,
    /// Secondary index: `agent_hash || deposit_hash -> ()`
    DepositsByAgent,
    Transactions,
    FundLocks,
}

impl ColumnFamily {
    fn as_str(&self) -> &'static str {
        match self {
            ColumnFamily::Agents => "agents",
            ColumnFamily::AgentTombstones => "agent_tombstones",
            ColumnFamily::Deposits => "deposits",
            ColumnFamily::DepositsByAgent => "deposits_by_agent",
            ColumnFamily::Transactions => "transactions",
            ColumnFamily::FundLocks => "fund_locks",
        }
    }

    fn all() -> Vec<Self> {
        vec![
            Self::Agents,
            Self::AgentTombstones,
            Self::Deposits,
            Self::DepositsByAgent,
            Self::Transactions,
            Self::FundLocks,
        ]
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
    pub create_if_missing: bool,
    pub max_open_files: i32,
    pub write_buffer_size: usize,
    pub max_write_buffer_number: i32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
            create_if_missing: true,
            max_open_files: 1024,
            write_buffer_size: 64 * 1024 * 1024, // 64 MB
            max_write_buffer_number: 3,
        }
    }
}

/// RocksDB-backed record store, fund-lock ledger, and transaction ledger
pub struct Database {
    db: Arc<DB>,
    config: DatabaseConfig,
}

fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    bincode::deserialize(bytes).map_err(|e| StorageError::SerializationError(e.to_string()))
}

fn index_key(agent_hash: &Hash, deposit_hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(HASH_SIZE * 2);
    key.extend_from_slice(agent_hash.as_bytes());
    key.extend_from_slice(deposit_hash.as_bytes());
    key
}

impl Database {
    /// Open or create database
    pub fn open(config: DatabaseConfig) -> StorageResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.increase_parallelism(num_cpus::get() as i32);

        let cfs: Vec<_> = ColumnFamily::all().iter().map(|cf| cf.as_str()).collect();

        let db = DB::open_cf(&opts, &config.path, &cfs)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        tracing::info!("Database opened at {}", config.path);

        Ok(Self {
            db: Arc::new(db),
            config,
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn cf(&self, cf: ColumnFamily) -> StorageResult<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(cf.as_str())
            .ok_or_else(|| StorageError::DatabaseError(format!("missing column family {:?}", cf)))
    }

    fn get_raw(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.db
            .get_cf(self.cf(cf)?, key)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn put_raw(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.db
            .put_cf(self.cf(cf)?, key, value)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    /// Store a confirmed transaction, keyed by its identity hash
    pub fn put_tx(&self, tx: &Transaction) -> StorageResult<()> {
        self.put_raw(ColumnFamily::Transactions, tx.hash().as_bytes(), &encode(tx)?)
    }
}

impl RecordStore for Database {
    fn begin(&self) -> StorageResult<Box<dyn RecordSession + '_>> {
        Ok(Box::new(DbSession {
            db: Arc::clone(&self.db),
            batch: WriteBatch::default(),
            overlay: HashMap::new(),
        }))
    }
}

impl TransactionLedger for Database {
    fn get_tx(&self, hash: &Hash) -> StorageResult<Option<Transaction>> {
        match self.get_raw(ColumnFamily::Transactions, hash.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl FundLockLedger for Database {
    fn lock(&self, tx_hash: Hash) -> LedgerResult<()> {
        let lock = FundLock::locked(tx_hash);
        self.put_raw(ColumnFamily::FundLocks, tx_hash.as_bytes(), &encode(&lock)?)?;
        Ok(())
    }

    fn approve_unlock(&self, tx_hash: &Hash, unlock_at: Timestamp) -> LedgerResult<()> {
        let mut lock = self
            .lock_state(tx_hash)?
            .ok_or(LedgerError::UnknownLock(*tx_hash))?;
        lock.status = LockStatus::UnlockApproved;
        lock.unlock_at = unlock_at;
        self.put_raw(ColumnFamily::FundLocks, tx_hash.as_bytes(), &encode(&lock)?)?;
        Ok(())
    }

    fn permanent_unlock(&self, tx_hash: &Hash, unlock_at: Timestamp) -> LedgerResult<()> {
        let mut lock = self
            .lock_state(tx_hash)?
            .ok_or(LedgerError::UnknownLock(*tx_hash))?;
        if lock.status == LockStatus::Unlocked {
            // releasing an already-released lock is a no-op
            return Ok(());
        }
        lock.status = LockStatus::Unlocked;
        lock.unlock_at = unlock_at;
        self.put_raw(ColumnFamily::FundLocks, tx_hash.as_bytes(), &encode(&lock)?)?;
        Ok(())
    }

    fn rollback_unlock(&self, tx_hash: &Hash) -> LedgerResult<()> {
        let mut lock = self
            .lock_state(tx_hash)?
            .ok_or(LedgerError::UnknownLock(*tx_hash))?;
        lock.status = LockStatus::Locked;
        lock.unlock_at = 0;
        self.put_raw(ColumnFamily::FundLocks, tx_hash.as_bytes(), &encode(&lock)?)?;
        Ok(())
    }

    fn lock_state(&self, tx_hash: &Hash) -> LedgerResult<Option<FundLock>> {
        match self.get_raw(ColumnFamily::FundLocks, tx_hash.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// One atomic batch of record mutations.
///
/// Writes go into a `WriteBatch` plus a read overlay so the session observes
/// its own uncommitted state; `commit` applies the batch in one RocksDB
/// write. Dropping the session discards everything.
struct DbSession {
    db: Arc<DB>,
    batch: WriteBatch,
    overlay: HashMap<(ColumnFamily, Vec<u8>), Option<Vec<u8>>>,
}

impl DbSession {
    fn cf(&self, cf: ColumnFamily) -> StorageResult<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(cf.as_str())
            .ok_or_else(|| StorageError::DatabaseError(format!("missing column family {:?}", cf)))
    }

    fn read(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        if let Some(entry) = self.overlay.get(&(cf, key.to_vec())) {
            return Ok(entry.clone());
        }
        self.db
            .get_cf(self.cf(cf)?, key)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn write(&mut self, cf: ColumnFamily, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        let handle = self
            .db
            .cf_handle(cf.as_str())
            .ok_or_else(|| StorageError::DatabaseError(format!("missing column family {:?}", cf)))?;
        self.batch.put_cf(handle, &key, &value);
        self.overlay.insert((cf, key), Some(value));
        Ok(())
    }

    fn erase(&mut self, cf: ColumnFamily, key: Vec<u8>) -> StorageResult<()> {
        let handle = self
            .db
            .cf_handle(cf.as_str())
            .ok_or_else(|| StorageError::DatabaseError(format!("missing column family {:?}", cf)))?;
        self.batch.delete_cf(handle, &key);
        self.overlay.insert((cf, key), None);
        Ok(())
    }

    /// Deposit hashes indexed under one agent, overlay included
    fn deposit_hashes_by_agent(&self, agent_hash: &Hash) -> StorageResult<BTreeSet<Hash>> {
        let prefix = agent_hash.as_bytes();
        let mut hashes = BTreeSet::new();

        let cf = self.cf(ColumnFamily::DepositsByAgent)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item.map_err(|e| StorageError::DatabaseError(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            hashes.insert(Hash::from_slice(&key[HASH_SIZE..]).map_err(|_| {
                StorageError::Corruption("malformed deposit index key".to_string())
            })?);
        }

        for ((cf, key), value) in &self.overlay {
            if *cf != ColumnFamily::DepositsByAgent || !key.starts_with(prefix) {
                continue;
            }
            let hash = Hash::from_slice(&key[HASH_SIZE..]).map_err(|_| {
                StorageError::Corruption("malformed deposit index key".to_string())
            })?;
            match value {
                Some(_) => hashes.insert(hash),
                None => hashes.remove(&hash),
            };
        }

        Ok(hashes)
    }

    /// Every deposit key, overlay included. Only the unfiltered listing path
    /// needs a full scan.
    fn all_deposit_hashes(&self) -> StorageResult<BTreeSet<Hash>> {
        let mut hashes = BTreeSet::new();

        let cf = self.cf(ColumnFamily::Deposits)?;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| StorageError::DatabaseError(e.to_string()))?;
            hashes.insert(
                Hash::from_slice(&key)
                    .map_err(|_| StorageError::Corruption("malformed deposit key".to_string()))?,
            );
        }

        for ((cf, key), value) in &self.overlay {
            if *cf != ColumnFamily::Deposits {
                continue;
            }
            let hash = Hash::from_slice(key)
                .map_err(|_| StorageError::Corruption("malformed deposit key".to_string()))?;
            match value {
                Some(_) => hashes.insert(hash),
                None => hashes.remove(&hash),
            };
        }

        Ok(hashes)
    }
}

impl RecordSession for DbSession {
    fn agent(&self, hash: &Hash) -> StorageResult<Option<StoredAgent>> {
        match self.read(ColumnFamily::Agents, hash.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_agent(&mut self, row: StoredAgent) -> StorageResult<()> {
        let key = row.hash.as_bytes().to_vec();
        self.write(ColumnFamily::Agents, key.clone(), encode(&row)?)?;
        // re-saving undeletes: clear any tombstone for the same hash
        self.erase(ColumnFamily::AgentTombstones, key)
    }

    fn delete_agent(&mut self, hash: &Hash, del_height: BlockNumber) -> StorageResult<()> {
        let Some(mut row) = self.agent(hash)? else {
            return Ok(());
        };
        row.del_height = del_height;
        self.write(
            ColumnFamily::AgentTombstones,
            hash.as_bytes().to_vec(),
            encode(&row)?,
        )?;
        self.erase(ColumnFamily::Agents, hash.as_bytes().to_vec())
    }

    fn agent_tombstone(&self, hash: &Hash) -> StorageResult<Option<StoredAgent>> {
        match self.read(ColumnFamily::AgentTombstones, hash.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn deposit(&self, hash: &Hash) -> StorageResult<Option<StoredDeposit>> {
        match self.read(ColumnFamily::Deposits, hash.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_deposit(&mut self, row: StoredDeposit) -> StorageResult<()> {
        let idx = index_key(&row.agent_hash, &row.hash);
        let key = row.hash.as_bytes().to_vec();
        self.write(ColumnFamily::Deposits, key, encode(&row)?)?;
        self.write(ColumnFamily::DepositsByAgent, idx, Vec::new())
    }

    fn update_deposit(&mut self, hash: &Hash, patch: &DepositPatch) -> StorageResult<()> {
        let Some(mut row) = self.deposit(hash)? else {
            return Ok(());
        };
        row.apply(patch);
        self.write(ColumnFamily::Deposits, hash.as_bytes().to_vec(), encode(&row)?)
    }

    fn update_deposits(
        &mut self,
        filter: &DepositFilter,
        patch: &DepositPatch,
    ) -> StorageResult<usize> {
        let rows = self.list_deposits(filter)?;
        let touched = rows.len();
        for mut row in rows {
            row.apply(patch);
            self.write(
                ColumnFamily::Deposits,
                row.hash.as_bytes().to_vec(),
                encode(&row)?,
            )?;
        }
        Ok(touched)
    }

    fn list_deposits(&self, filter: &DepositFilter) -> StorageResult<Vec<StoredDeposit>> {
        let hashes = match filter.agent_hash {
            Some(agent_hash) => self.deposit_hashes_by_agent(&agent_hash)?,
            None => self.all_deposit_hashes()?,
        };

        let mut rows = Vec::new();
        for hash in hashes {
            if let Some(row) = self.deposit(&hash)? {
                if filter.matches(&row) {
                    rows.push(row);
                }
            }
        }
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
        let this = *self;
        let count = this.batch.len();
        this.db
            .write(this.batch)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        tracing::debug!("Record session committed: {} writes", count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_core::{Agent, Amount, Consensus, Deposit};
    use chain_crypto::Address;

    fn open_temp() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().to_str().unwrap().to_string(),
            ..Default::default()
        };
        let db = Database::open(config).unwrap();
        (dir, db)
    }

    fn agent_row(seed: u8) -> StoredAgent {
        let record = Consensus::new(Agent::new(
            Address::new([seed; 20]),
            Amount::from_tokens(20_000),
            500,
        ))
        .unwrap();
        StoredAgent::from_consensus(&record, Hash::new([seed; 32]))
    }

    fn deposit_row(agent_hash: Hash, seed: u8) -> StoredDeposit {
        let record = Consensus::new(
            Deposit::new(agent_hash, Address::new([seed; 20]), Amount::from_u64(500)).unwrap(),
        )
        .unwrap();
        StoredDeposit::from_consensus(&record, Hash::new([seed; 32]))
    }

    #[test]
    fn test_session_commit_persists() {
        let (_dir, db) = open_temp();
        let row = agent_row(1);
        let hash = row.hash;

        let mut session = db.begin().unwrap();
        session.put_agent(row.clone()).unwrap();
        // session reads its own write
        assert_eq!(session.agent(&hash).unwrap().unwrap(), row);
        session.commit().unwrap();

        let session = db.begin().unwrap();
        assert_eq!(session.agent(&hash).unwrap().unwrap(), row);
    }

    #[test]
    fn test_dropped_session_discards() {
        let (_dir, db) = open_temp();
        let row = agent_row(2);
        let hash = row.hash;

        {
            let mut session = db.begin().unwrap();
            session.put_agent(row).unwrap();
            // dropped without commit
        }

        let session = db.begin().unwrap();
        assert!(session.agent(&hash).unwrap().is_none());
    }

    #[test]
    fn test_agent_delete_writes_tombstone() {
        let (_dir, db) = open_temp();
        let row = agent_row(3);
        let hash = row.hash;

        let mut session = db.begin().unwrap();
        session.put_agent(row.clone()).unwrap();
        session.delete_agent(&hash, 100).unwrap();
        session.commit().unwrap();

        let session = db.begin().unwrap();
        assert!(session.agent(&hash).unwrap().is_none());
        let tombstone = session.agent_tombstone(&hash).unwrap().unwrap();
        assert_eq!(tombstone.del_height, 100);

        // deleting an absent key is a no-op
        let mut session = db.begin().unwrap();
        session.delete_agent(&Hash::new([9; 32]), 5).unwrap();
        session.commit().unwrap();
    }

    #[test]
    fn test_put_agent_clears_tombstone() {
        let (_dir, db) = open_temp();
        let row = agent_row(4);
        let hash = row.hash;

        let mut session = db.begin().unwrap();
        session.put_agent(row.clone()).unwrap();
        session.delete_agent(&hash, 50).unwrap();
        session.put_agent(row.clone()).unwrap();
        session.commit().unwrap();

        let session = db.begin().unwrap();
        assert_eq!(session.agent(&hash).unwrap().unwrap(), row);
        assert!(session.agent_tombstone(&hash).unwrap().is_none());
    }

    #[test]
    fn test_deposit_listing_by_agent() {
        let (_dir, db) = open_temp();
        let agent = agent_row(5);
        let d1 = deposit_row(agent.hash, 10);
        let d2 = deposit_row(agent.hash, 11);
        let other = deposit_row(Hash::new([42; 32]), 12);

        let mut session = db.begin().unwrap();
        session.put_deposit(d1.clone()).unwrap();
        session.put_deposit(d2.clone()).unwrap();
        session.put_deposit(other).unwrap();
        session.commit().unwrap();

        let session = db.begin().unwrap();
        let listed = session
            .list_deposits(&DepositFilter::by_agent(agent.hash))
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|d| d.agent_hash == agent.hash));
    }

    #[test]
    fn test_cascade_delete_skips_tombstoned() {
        let (_dir, db) = open_temp();
        let agent = agent_row(6);
        let d1 = deposit_row(agent.hash, 20);
        let d2 = deposit_row(agent.hash, 21);

        let mut session = db.begin().unwrap();
        session.put_deposit(d1.clone()).unwrap();
        session.put_deposit(d2.clone()).unwrap();
        // d1 exited on its own at height 40
        session.delete_deposit(&d1.hash, 40).unwrap();
        session.commit().unwrap();

        let mut session = db.begin().unwrap();
        let touched = session.delete_deposits_by_agent(&agent.hash, 100).unwrap();
        assert_eq!(touched, 1);
        session.commit().unwrap();

        let session = db.begin().unwrap();
        assert_eq!(session.deposit(&d1.hash).unwrap().unwrap().del_height, 40);
        assert_eq!(session.deposit(&d2.hash).unwrap().unwrap().del_height, 100);
    }

    #[test]
    fn test_fund_lock_transitions() {
        let (_dir, db) = open_temp();
        let tx_hash = Hash::new([7; 32]);

        assert!(matches!(
            db.approve_unlock(&tx_hash, 10),
            Err(LedgerError::UnknownLock(_))
        ));

        db.lock(tx_hash).unwrap();
        db.approve_unlock(&tx_hash, 1_000).unwrap();
        let lock = db.lock_state(&tx_hash).unwrap().unwrap();
        assert_eq!(lock.status, LockStatus::UnlockApproved);
        assert_eq!(lock.unlock_at, 1_000);

        db.permanent_unlock(&tx_hash, 1_000).unwrap();
        // idempotent: second release keeps the original expiry
        db.permanent_unlock(&tx_hash, 9_999).unwrap();
        let lock = db.lock_state(&tx_hash).unwrap().unwrap();
        assert_eq!(lock.status, LockStatus::Unlocked);
        assert_eq!(lock.unlock_at, 1_000);

        db.rollback_unlock(&tx_hash).unwrap();
        let lock = db.lock_state(&tx_hash).unwrap().unwrap();
        assert_eq!(lock.status, LockStatus::Locked);
        assert_eq!(lock.unlock_at, 0);
    }

    #[test]
    fn test_transaction_round_trip() {
        let (_dir, db) = open_temp();
        let record = Consensus::new(Agent::new(
            Address::new([8; 20]),
            Amount::from_tokens(20_000),
            500,
        ))
        .unwrap();
        let tx = Transaction::new(
            chain_core::TransactionPayload::RegisterAgent(record),
            1_700_000_000_000,
        );

        db.put_tx(&tx).unwrap();
        assert_eq!(db.get_tx(&tx.hash()).unwrap().unwrap(), tx);
        assert!(db.get_tx(&Hash::new([1; 32])).unwrap().is_none());
    }
}
