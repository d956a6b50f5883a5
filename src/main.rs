//! torembed - run a Tor client as a supervised background process
//!
//! # Usage
//!
//! ```bash
//! # Versions of tor, OpenSSL and libevent
//! torembed versions
//!
//! # Show what tor would be started with
//! torembed args --config torembed.toml
//!
//! # Launch and bootstrap, then keep running until Ctrl-C
//! torembed run --config torembed.toml
//!
//! # Query a running instance
//! torembed status --config torembed.toml
//! ```

use anyhow::Result;
use clap::Parser;
use torembed::cli::{self, Cli, Commands};
use torembed::logging;
use tracing::Level;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        logging::init_with_level(Level::DEBUG);
    } else {
        logging::init();
    }

    match &cli.command {
        Commands::Versions(args) => {
            cli::run_versions(args)?;
        },
        Commands::Args(args) => {
            cli::run_args(args)?;
        },
        Commands::Run(args) => {
            cli::run_proxy(args).await?;
        },
        Commands::Status(args) => {
            cli::run_status(args).await?;
        },
    }

    Ok(())
}
