// node/src/lib.rs

//! Node shell: configuration and component wiring for the delegated-PoS
//! chain. The block pipeline itself is external; this crate hosts the
//! storage, cache, notice bus, and exit-consensus engine it drives.

pub mod config;
pub mod runtime;

pub use config::{NodeConfig, StorageConfig};
pub use runtime::Node;
