//! modhost - Entry Point
//!
//! | Command | Description |
//! |---------|-------------|
//! | `modhost run [--config FILE]` | Boot every discovered module, unload on Ctrl+C |
//! | `modhost list` | Print registered linked units and module entries |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line interface for modhost
#[derive(Parser, Debug)]
#[command(name = "modhost")]
#[command(about = "Module lifecycle runtime")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Boot discovered modules and run until Ctrl+C
    Run {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List registered linked units and module entries
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Command::Run { config } => modhost::run(config.as_deref()).await,
        Command::List => {
            let (units, modules) = modhost::registrations();
            println!("Linked units:");
            for (name, description) in units {
                println!("  {name:<24} {description}");
            }
            println!("Module entries:");
            for (name, description) in modules {
                println!("  {name:<24} {description}");
            }
            Ok(())
        }
    }
}
