// node/src/runtime.rs
use crate::NodeConfig;
use consensus::{ConfirmingTxCache, ConsensusNotice, ExitConsensusEngine, NoticeBus};
use std::sync::Arc;
use storage::{Database, DatabaseConfig};

/// Wires the local components: the database (record store, fund-lock
/// ledger, and confirmed-transaction ledger in one), the confirming cache,
/// the notice bus, and the exit-consensus engine. The block pipeline driving
/// the engine lives outside this node.
pub struct Node {
    config: NodeConfig,
    database: Arc<Database>,
    confirming: Arc<ConfirmingTxCache>,
    notices: NoticeBus,
    engine: Arc<ExitConsensusEngine>,
}

impl Node {
    pub fn new(config: NodeConfig) -> anyhow::Result<Self> {
        tracing::info!("Initializing node components");

        let db_config = DatabaseConfig {
            path: format!("{}/db", config.data_dir),
            max_open_files: config.storage.max_open_files,
            write_buffer_size: config.storage.write_buffer_mb * 1024 * 1024,
            max_write_buffer_number: config.storage.max_write_buffer_number,
            ..Default::default()
        };
        let database = Arc::new(Database::open(db_config)?);

        let confirming = Arc::new(ConfirmingTxCache::new());
        let notices = NoticeBus::new();
        let engine = Arc::new(ExitConsensusEngine::new(
            Arc::clone(&database) as Arc<dyn storage::TransactionLedger>,
            Arc::clone(&database) as Arc<dyn storage::FundLockLedger>,
            Arc::clone(&confirming),
            notices.clone(),
        ));

        tracing::info!("✓ Exit-consensus engine wired");

        Ok(Self {
            config,
            database,
            confirming,
            notices,
            engine,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn confirming_cache(&self) -> &Arc<ConfirmingTxCache> {
        &self.confirming
    }

    pub fn engine(&self) -> &Arc<ExitConsensusEngine> {
        &self.engine
    }

    /// Run until interrupted, logging consensus notices as they arrive
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut notices = self.notices.subscribe();
        tracing::info!("Node running; data_dir={}", self.config.data_dir);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received");
                    return Ok(());
                }
                notice = notices.recv() => {
                    match notice {
                        Ok(ConsensusNotice::Cancelled(tx)) => {
                            tracing::info!(tx = %tx.hash(), "Agent exit rolled back");
                        }
                        Ok(ConsensusNotice::Stopped(tx)) => {
                            tracing::info!(tx = %tx.hash(), "Deposit exit rolled back");
                        }
                        Err(_) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_wiring() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            data_dir: dir.path().to_str().unwrap().to_string(),
            ..Default::default()
        };
        let node = Node::new(config).unwrap();
        assert!(node.confirming_cache().is_empty());
    }
}
