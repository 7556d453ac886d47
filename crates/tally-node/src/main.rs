use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tally_node::{api, config::NodeConfig, logging, TallyNode};
use tracing::info;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Tally - payment settlement and reputation core", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the settlement node
    Start {
        /// Port for the HTTP API, overriding the config file
        #[arg(long)]
        api_port: Option<u16>,
    },

    /// Write a commented default configuration file
    Init {
        /// Output directory for the configuration
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { output } => {
            let path = output.join("tally.toml");
            NodeConfig::default().save(&path)?;
            println!("Wrote default configuration to {}", path.display());
            println!("Set [chain] stablecoin and rpc_url before starting the node.");
            Ok(())
        }
        Commands::Start { api_port } => {
            let mut config = NodeConfig::load(cli.config.as_deref())?;
            if let Some(port) = api_port {
                config.api.port = port;
            }

            logging::init_logging(&config.logging, cli.verbose)?;
            info!(name = %config.node.name, "Starting tally node");

            let host = config.api.host.clone();
            let port = config.api.port;
            let node = Arc::new(TallyNode::new(config)?);

            api::serve(node, &host, port).await
        }
    }
}
