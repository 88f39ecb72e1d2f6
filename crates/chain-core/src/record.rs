// chain-core/src/record.rs

use crate::{types::*, RecordError, RecordResult};
use chain_crypto::{hash::hash_of, Address, Hash};
use serde::{Deserialize, Serialize};

/// Agent lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    /// Registered but not yet an active block producer
    Waiting,
    /// Actively producing blocks
    In,
    /// Deregistered
    Exited,
}

/// Deposit lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositStatus {
    /// Stake is backing an agent
    In,
    /// Stake withdrawn
    Exited,
}

/// A candidate block producer backed by locked registration funds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Operator address
    pub address: Address,
    /// Locked registration deposit
    pub deposit: StakeAmount,
    /// Commission rate (basis points, 0-10000)
    pub commission_rate: u16,
    /// Current status
    pub status: AgentStatus,
}

impl Agent {
    pub fn new(address: Address, deposit: StakeAmount, commission_rate: u16) -> Self {
        Self {
            address,
            deposit,
            commission_rate: commission_rate.min(10_000),
            status: AgentStatus::Waiting,
        }
    }
}

/// Stake delegated by a holder to one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    /// Agent this stake follows
    pub agent_hash: Hash,
    /// Delegator address
    pub address: Address,
    /// Delegated amount
    pub amount: StakeAmount,
    /// Current status
    pub status: DepositStatus,
}

impl Deposit {
    /// Create a new deposit. Rejects a zero agent hash: every deposit must
    /// reference a real agent record.
    pub fn new(agent_hash: Hash, address: Address, amount: StakeAmount) -> RecordResult<Self> {
        if agent_hash.is_zero() {
            return Err(RecordError::MissingAgentReference);
        }
        Ok(Self {
            agent_hash,
            address,
            amount,
            status: DepositStatus::In,
        })
    }
}

/// Generic consensus envelope around an [`Agent`] or [`Deposit`] payload.
///
/// The hash is content-derived at construction and never recomputed; the
/// block height is rewritten only when a rollback restores the record to its
/// registering transaction's height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consensus<T> {
    hash: Hash,
    /// Height at which this record became effective
    pub block_height: BlockNumber,
    /// Status-bearing payload
    pub extend: T,
}

impl<T: Serialize> Consensus<T> {
    /// Wrap a payload, deriving the envelope hash from its content
    pub fn new(extend: T) -> RecordResult<Self> {
        let hash = hash_of(&extend)?;
        Ok(Self {
            hash,
            block_height: 0,
            extend,
        })
    }

    /// Content-derived identifier, fixed at construction
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Hex rendering of the identifier
    pub fn hex_hash(&self) -> String {
        self.hash.to_hex()
    }

    /// Re-attach a persisted envelope. Only the storage projections use
    /// this; it never derives a fresh hash.
    pub(crate) fn restore(hash: Hash, block_height: BlockNumber, extend: T) -> Self {
        Self {
            hash,
            block_height,
            extend,
        }
    }
}

/// Storage row for an agent record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAgent {
    /// Envelope hash (primary key)
    pub hash: Hash,
    /// Hash of the registration transaction (fund-lock key)
    pub tx_hash: Hash,
    pub address: Address,
    pub deposit: StakeAmount,
    pub commission_rate: u16,
    pub status: AgentStatus,
    /// Height of the registering transaction
    pub block_height: BlockNumber,
    /// 0 while active; the exiting block's height once removed
    pub del_height: BlockNumber,
}

impl StoredAgent {
    pub fn from_consensus(record: &Consensus<Agent>, tx_hash: Hash) -> Self {
        Self {
            hash: record.hash(),
            tx_hash,
            address: record.extend.address,
            deposit: record.extend.deposit.clone(),
            commission_rate: record.extend.commission_rate,
            status: record.extend.status,
            block_height: record.block_height,
            del_height: 0,
        }
    }

    pub fn to_consensus(&self) -> Consensus<Agent> {
        let extend = Agent {
            address: self.address,
            deposit: self.deposit.clone(),
            commission_rate: self.commission_rate,
            status: self.status,
        };
        Consensus::restore(self.hash, self.block_height, extend)
    }
}

/// Storage row for a deposit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDeposit {
    /// Envelope hash (primary key)
    pub hash: Hash,
    /// Hash of the join transaction (fund-lock key)
    pub tx_hash: Hash,
    /// Foreign key to [`StoredAgent::hash`]
    pub agent_hash: Hash,
    pub address: Address,
    pub amount: StakeAmount,
    pub status: DepositStatus,
    pub block_height: BlockNumber,
    /// 0 while active; the exiting block's height once removed
    pub del_height: BlockNumber,
}

impl StoredDeposit {
    pub fn from_consensus(record: &Consensus<Deposit>, tx_hash: Hash) -> Self {
        Self {
            hash: record.hash(),
            tx_hash,
            agent_hash: record.extend.agent_hash,
            address: record.extend.address,
            amount: record.extend.amount.clone(),
            status: record.extend.status,
            block_height: record.block_height,
            del_height: 0,
        }
    }

    pub fn to_consensus(&self) -> Consensus<Deposit> {
        let extend = Deposit {
            agent_hash: self.agent_hash,
            address: self.address,
            amount: self.amount.clone(),
            status: self.status,
        };
        Consensus::restore(self.hash, self.block_height, extend)
    }

    /// Apply a selective update, overwriting only the fields the patch sets
    pub fn apply(&mut self, patch: &DepositPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(del_height) = patch.del_height {
            self.del_height = del_height;
        }
        if let Some(block_height) = patch.block_height {
            self.block_height = block_height;
        }
    }
}

/// Selective-update shape for deposit rows; `None` fields are left untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DepositPatch {
    pub status: Option<DepositStatus>,
    pub del_height: Option<BlockNumber>,
    pub block_height: Option<BlockNumber>,
}

impl DepositPatch {
    /// Patch that marks a row active again
    pub fn restored() -> Self {
        Self {
            status: Some(DepositStatus::In),
            del_height: Some(0),
            block_height: None,
        }
    }
}

/// Filtered-listing shape for deposit rows; `None` fields match everything
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DepositFilter {
    pub agent_hash: Option<Hash>,
    pub status: Option<DepositStatus>,
    pub del_height: Option<BlockNumber>,
}

impl DepositFilter {
    pub fn by_agent(agent_hash: Hash) -> Self {
        Self {
            agent_hash: Some(agent_hash),
            ..Self::default()
        }
    }

    /// Active deposits following one agent
    pub fn active_by_agent(agent_hash: Hash) -> Self {
        Self {
            agent_hash: Some(agent_hash),
            del_height: Some(0),
            ..Self::default()
        }
    }

    pub fn matches(&self, row: &StoredDeposit) -> bool {
        if let Some(agent_hash) = self.agent_hash {
            if row.agent_hash != agent_hash {
                return false;
            }
        }
        if let Some(status) = self.status {
            if row.status != status {
                return false;
            }
        }
        if let Some(del_height) = self.del_height {
            if row.del_height != del_height {
                return false;
            }
        }
        true
    }
}
