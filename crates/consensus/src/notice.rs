// consensus/src/notice.rs

use chain_core::Transaction;
use tokio::sync::broadcast;

/// Local notifications published after a rollback restores records
#[derive(Debug, Clone)]
pub enum ConsensusNotice {
    /// An agent's exit was rolled back: its registration is live again
    Cancelled(Transaction),
    /// A deposit's exit was rolled back: the delegation is live again
    Stopped(Transaction),
}

const NOTICE_CHANNEL_CAPACITY: usize = 256;

/// Local fan-out bus for consensus notices. Publishing with no subscribers
/// is fine; notices are best-effort signals, not state.
#[derive(Debug, Clone)]
pub struct NoticeBus {
    sender: broadcast::Sender<ConsensusNotice>,
}

impl NoticeBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsensusNotice> {
        self.sender.subscribe()
    }

    pub fn publish(&self, notice: ConsensusNotice) {
        // a send error only means no live subscribers
        let _ = self.sender.send(notice);
    }
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new()
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
    fn test_publish_without_subscribers() {
        let bus = NoticeBus::new();
        bus.publish(ConsensusNotice::Stopped(sample_tx()));
    }

    #[test]
    fn test_subscriber_receives() {
        let bus = NoticeBus::new();
        let mut rx = bus.subscribe();
        let tx = sample_tx();
        bus.publish(ConsensusNotice::Cancelled(tx.clone()));

        match rx.try_recv().unwrap() {
            ConsensusNotice::Cancelled(received) => assert_eq!(received, tx),
            other => panic!("unexpected notice: {:?}", other),
        }
    }
}
