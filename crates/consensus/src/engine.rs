// consensus/src/engine.rs

use crate::{
    cache::ConfirmingTxCache,
    notice::{ConsensusNotice, NoticeBus},
    ConsensusError, ConsensusResult, STOP_AGENT_LOCK_DURATION_MS,
};
use chain_core::{
    Agent, AgentStatus, BlockNumber, Consensus, Deposit, DepositFilter, DepositPatch,
    StoredAgent, Transaction, TransactionPayload,
};
use std::sync::Arc;
use storage::{FundLockLedger, RecordSession, TransactionLedger};

/// Classification of the join transaction an exit reverses
enum JoinKind {
    /// The exit deregisters an agent
    AgentRegistration {
        record: Consensus<Agent>,
        /// Height of the registering transaction itself
        registered_at: BlockNumber,
    },
    /// The exit withdraws a single deposit
    Delegation { record: Consensus<Deposit> },
}

/// Drives the approve/commit/rollback lifecycle of exit-consensus
/// transactions against the record store and fund-lock ledger.
///
/// The engine owns no durable state. Every mutating phase runs inside a
/// caller-held [`RecordSession`]; the caller commits the session only after
/// the phase returns `Ok`, so any error leaves no partial state behind.
pub struct ExitConsensusEngine {
    txs: Arc<dyn TransactionLedger>,
    locks: Arc<dyn FundLockLedger>,
    confirming: Arc<ConfirmingTxCache>,
    notices: NoticeBus,
}

impl ExitConsensusEngine {
    pub fn new(
        txs: Arc<dyn TransactionLedger>,
        locks: Arc<dyn FundLockLedger>,
        confirming: Arc<ConfirmingTxCache>,
        notices: NoticeBus,
    ) -> Self {
        Self {
            txs,
            locks,
            confirming,
            notices,
        }
    }

    /// Look up and classify the join transaction behind `exit`. The
    /// confirming cache is consulted only when `allow_unconfirmed` is set,
    /// i.e. during approval.
    fn resolve(&self, exit: &Transaction, allow_unconfirmed: bool) -> ConsensusResult<JoinKind> {
        let target = exit.exit_target()?;

        let join_tx = match self.txs.get_tx(&target)? {
            Some(tx) => tx,
            None => {
                let cached = if allow_unconfirmed {
                    self.confirming.lookup(&target)
                } else {
                    None
                };
                cached.ok_or(ConsensusError::UnresolvedReference(target))?
            }
        };

        let registered_at = join_tx.block_height;
        match join_tx.payload {
            TransactionPayload::RegisterAgent(record) => Ok(JoinKind::AgentRegistration {
                record,
                registered_at,
            }),
            TransactionPayload::JoinConsensus(record) => Ok(JoinKind::Delegation { record }),
            TransactionPayload::ExitConsensus { .. } => Err(ConsensusError::InvalidTransaction(
                format!("exit transaction {} references another exit", target),
            )),
        }
    }

    /// Tentative phase, while the containing block is assembled or
    /// validated. Only touches the fund-lock ledger; no cascade yet.
    pub fn on_approval(&self, tx: &Transaction) -> ConsensusResult<()> {
        let target = tx.exit_target()?;
        match self.resolve(tx, true)? {
            JoinKind::AgentRegistration { record, .. } => {
                let unlock_at = tx.time + STOP_AGENT_LOCK_DURATION_MS;
                self.locks.approve_unlock(&target, unlock_at)?;
                tracing::debug!(
                    agent = %record.hash(),
                    unlock_at,
                    "Approved agent exit"
                );
            }
            JoinKind::Delegation { record } => {
                self.locks.approve_unlock(&target, 0)?;
                tracing::debug!(deposit = %record.hash(), "Approved deposit exit");
            }
        }
        Ok(())
    }

    /// Permanent phase, once the containing block is final
    pub fn on_commit(
        &self,
        tx: &Transaction,
        session: &mut dyn RecordSession,
    ) -> ConsensusResult<()> {
        let target = tx.exit_target()?;
        match self.resolve(tx, false)? {
            JoinKind::AgentRegistration { record, .. } => {
                let agent_hash = record.hash();
                if session.agent(&agent_hash)?.is_none() {
                    return Err(ConsensusError::InvariantViolation(format!(
                        "agent {} already removed at exit commit",
                        agent_hash
                    )));
                }

                self.locks
                    .permanent_unlock(&target, tx.time + STOP_AGENT_LOCK_DURATION_MS)?;

                let deposits =
                    session.list_deposits(&DepositFilter::active_by_agent(agent_hash))?;
                for deposit in &deposits {
                    self.locks.permanent_unlock(&deposit.tx_hash, 0)?;
                }

                session.delete_agent(&agent_hash, tx.block_height)?;
                session.delete_deposits_by_agent(&agent_hash, tx.block_height)?;

                tracing::info!(
                    agent = %agent_hash,
                    deposits = deposits.len(),
                    height = tx.block_height,
                    "Committed agent exit"
                );
            }
            JoinKind::Delegation { record } => {
                let deposit_hash = record.hash();
                let row = session.deposit(&deposit_hash)?.ok_or_else(|| {
                    ConsensusError::InvariantViolation(format!(
                        "deposit {} already removed at exit commit",
                        deposit_hash
                    ))
                })?;
                if session.agent(&row.agent_hash)?.is_none() {
                    return Err(ConsensusError::InvariantViolation(format!(
                        "deposit {} references removed agent {}",
                        deposit_hash, row.agent_hash
                    )));
                }

                session.delete_deposit(&deposit_hash, tx.block_height)?;
                self.locks.permanent_unlock(&target, 0)?;

                tracing::info!(
                    deposit = %deposit_hash,
                    height = tx.block_height,
                    "Committed deposit exit"
                );
            }
        }
        Ok(())
    }

    /// Reversal phase, when the containing block is discarded on a fork
    /// switch. The exact algebraic inverse of [`on_commit`] for the same
    /// transaction.
    ///
    /// [`on_commit`]: ExitConsensusEngine::on_commit
    pub fn on_rollback(
        &self,
        tx: &Transaction,
        session: &mut dyn RecordSession,
    ) -> ConsensusResult<()> {
        let target = tx.exit_target()?;
        match self.resolve(tx, false)? {
            JoinKind::AgentRegistration {
                mut record,
                registered_at,
            } => {
                record.block_height = registered_at;
                record.extend.status = AgentStatus::Waiting;
                let agent_hash = record.hash();
                session.put_agent(StoredAgent::from_consensus(&record, target))?;

                self.locks.rollback_unlock(&target)?;

                // only rows stamped by this exit's cascade come back;
                // deposits exited in earlier blocks keep their stamp
                let filter = DepositFilter {
                    agent_hash: Some(agent_hash),
                    del_height: Some(tx.block_height),
                    status: None,
                };
                let cascaded = session.list_deposits(&filter)?;
                session.update_deposits(&filter, &DepositPatch::restored())?;
                for deposit in &cascaded {
                    self.locks.rollback_unlock(&deposit.tx_hash)?;
                }

                self.notices.publish(ConsensusNotice::Cancelled(tx.clone()));
                tracing::info!(
                    agent = %agent_hash,
                    deposits = cascaded.len(),
                    height = registered_at,
                    "Rolled back agent exit"
                );
            }
            JoinKind::Delegation { record } => {
                let deposit_hash = record.hash();
                session.update_deposit(&deposit_hash, &DepositPatch::restored())?;

                self.notices.publish(ConsensusNotice::Stopped(tx.clone()));
                self.locks.rollback_unlock(&target)?;

                tracing::info!(deposit = %deposit_hash, "Rolled back deposit exit");
            }
        }
        Ok(())
    }
}
