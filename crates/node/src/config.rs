// node/src/config.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub data_dir: String,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub max_open_files: i32,
    pub write_buffer_mb: usize,
    pub max_write_buffer_number: i32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".into(),
            storage: StorageConfig {
                max_open_files: 1024,
                write_buffer_mb: 64,
                max_write_buffer_number: 3,
            },
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
