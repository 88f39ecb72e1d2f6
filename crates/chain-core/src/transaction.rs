// chain-core/src/transaction.rs

use crate::{
    record::{Agent, Consensus, Deposit},
    types::*,
    RecordError, RecordResult,
};
use chain_crypto::{Hash, Hashable};
use serde::{Deserialize, Serialize};

/// Consensus transaction payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionPayload {
    /// Register a candidate block producer
    RegisterAgent(Consensus<Agent>),
    /// Delegate stake to an agent
    JoinConsensus(Consensus<Deposit>),
    /// Reverse a prior registration or delegation
    ExitConsensus {
        /// Hash of the join/registration transaction being reversed
        join_tx_hash: Hash,
    },
}

/// A consensus transaction as the block pipeline hands it to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub payload: TransactionPayload,
    /// Transaction timestamp, epoch milliseconds
    pub time: Timestamp,
    /// Height of the containing block; 0 until included
    pub block_height: BlockNumber,
}

impl Transaction {
    pub fn new(payload: TransactionPayload, time: Timestamp) -> Self {
        Self {
            payload,
            time,
            block_height: 0,
        }
    }

    /// Transaction identity hash. Computed over payload and timestamp only,
    /// so inclusion height does not change identity across reorgs.
    pub fn hash(&self) -> Hash {
        let bytes = bincode::serialize(&(&self.payload, self.time)).unwrap();
        bytes.content_hash()
    }

    /// The join transaction this exit reverses
    pub fn exit_target(&self) -> RecordResult<Hash> {
        match &self.payload {
            TransactionPayload::ExitConsensus { join_tx_hash } => Ok(*join_tx_hash),
            _ => Err(RecordError::NotAnExit(self.hash())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_crypto::Address;

    fn register_tx() -> Transaction {
        let record = Consensus::new(Agent::new(
            Address::new([1u8; 20]),
            Amount::from_tokens(20_000),
            500,
        ))
        .unwrap();
        Transaction::new(TransactionPayload::RegisterAgent(record), 1_700_000_000_000)
    }

    #[test]
    fn test_hash_ignores_block_height() {
        let mut tx = register_tx();
        let before = tx.hash();
        tx.block_height = 99;
        assert_eq!(tx.hash(), before);
    }

    #[test]
    fn test_hash_covers_time() {
        let mut tx = register_tx();
        let before = tx.hash();
        tx.time += 1;
        assert_ne!(tx.hash(), before);
    }

    #[test]
    fn test_exit_target() {
        let join = register_tx();
        let exit = Transaction::new(
            TransactionPayload::ExitConsensus {
                join_tx_hash: join.hash(),
            },
            join.time + 10,
        );
        assert_eq!(exit.exit_target().unwrap(), join.hash());
        assert!(matches!(join.exit_target(), Err(RecordError::NotAnExit(_))));
    }
}
