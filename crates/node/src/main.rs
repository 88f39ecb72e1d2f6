// node/src/main.rs
use clap::{Parser, Subcommand};
use node::{Node, NodeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dpos-node")]
#[command(about = "Delegated-PoS Chain Node", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the node
    Start {
        /// Configuration file path
        #[arg(short, long, default_value = "./config.toml")]
        config: String,

        /// Override data directory
        #[arg(short, long)]
        data_dir: Option<String>,
    },

    /// Write a default configuration file
    Init {
        /// Configuration file path
        #[arg(short, long, default_value = "./config.toml")]
        config: String,

        /// Data directory
        #[arg(short, long, default_value = "./data")]
        data_dir: String,
    },

    /// Open the database and report health
    Status {
        /// Configuration file path
        #[arg(short, long, default_value = "./config.toml")]
        config: String,
    },
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Commands::Start { config, data_dir } => {
            let mut config = NodeConfig::from_file(&config)?;
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            let node = Node::new(config)?;
            node.run().await
        }
        Commands::Init { config, data_dir } => {
            let node_config = NodeConfig {
                data_dir,
                ..Default::default()
            };
            node_config.to_file(&config)?;
            tracing::info!("Wrote default configuration to {}", config);
            Ok(())
        }
        Commands::Status { config } => {
            let config = NodeConfig::from_file(&config)?;
            let node = Node::new(config)?;
            tracing::info!(
                "Database healthy at {}/db",
                node.config().data_dir
            );
            Ok(())
        }
    }
}
