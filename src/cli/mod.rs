//! Command-line interface for torembed
//!
//! Provides main commands:
//! - `versions` - Show Tor, OpenSSL and libevent versions
//! - `args` - Print the parameter list Tor would be launched with
//! - `run` - Launch Tor and keep it running until Ctrl-C
//! - `status` - Query a running Tor over its control port

mod run;
mod status;
mod versions;

pub use run::{run_args, run_proxy};
pub use status::run_status;
pub use versions::run_versions;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// torembed - launch and supervise an embedded Tor client
#[derive(Parser, Debug)]
#[command(name = "torembed")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the versions of Tor and the libraries it links
    Versions(VersionsArgs),

    /// Print the launch parameter list, one entry per line
    Args(ConfigArgs),

    /// Launch Tor, wait for bootstrap and keep it running
    Run(ConfigArgs),

    /// Show bootstrap phase and version of a running Tor
    Status(StatusArgs),
}

/// Output format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

/// Arguments for versions command
#[derive(Parser, Debug)]
pub struct VersionsArgs {
    /// Tor binary to query instead of `tor` from PATH
    #[arg(long)]
    pub tor_binary: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

/// Arguments for commands that only need the configuration
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Path to config file (defaults to ./torembed.toml, then /etc/torembed/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Arguments for status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Path to config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}
