// consensus/src/cache.rs

use chain_core::Transaction;
use chain_crypto::Hash;
use std::collections::HashMap;
use std::sync::RwLock;

/// Transactions accepted into the current in-flight block but not yet
/// durably confirmed.
///
/// Consulted only during approval, so a join and its exit landing in the
/// same block batch still resolve; by commit time the join must be in the
/// confirmed ledger.
#[derive(Debug, Default)]
pub struct ConfirmingTxCache {
    txs: RwLock<HashMap<Hash, Transaction>>,
}

impl ConfirmingTxCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tx: Transaction) {
        self.txs.write().unwrap().insert(tx.hash(), tx);
    }

    pub fn lookup(&self, hash: &Hash) -> Option<Transaction> {
        self.txs.read().unwrap().get(hash).cloned()
    }

    pub fn remove(&self, hash: &Hash) -> Option<Transaction> {
        self.txs.write().unwrap().remove(hash)
    }

    /// Drop every in-flight transaction, e.g. when the block they were
    /// batched into has been fully processed
    pub fn clear(&self) {
        self.txs.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.txs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_core::{Agent, Amount, Consensus, TransactionPayload};
    use chain_crypto::Address;

    fn sample_tx() -> Transaction {
        let record = Consensus::new(Agent::new(
            Address::new([1u8; 20]),
            Amount::from_tokens(20_000),
            500,
        ))
        .unwrap();
        Transaction::new(TransactionPayload::RegisterAgent(record), 1_700_000_000_000)
    }

    #[test]
    fn test_insert_lookup_remove() {
        let cache = ConfirmingTxCache::new();
        let tx = sample_tx();
        let hash = tx.hash();

        assert!(cache.lookup(&hash).is_none());
        cache.insert(tx.clone());
        assert_eq!(cache.lookup(&hash).unwrap(), tx);

        cache.remove(&hash);
        assert!(cache.lookup(&hash).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = ConfirmingTxCache::new();
        cache.insert(sample_tx());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
