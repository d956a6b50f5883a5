//! torembed library crate
//!
//! Runs a Tor client as a background child process and exposes the
//! versions of Tor and the libraries it is built against.
//!
//! # Modules
//!
//! - [`tor`] - Launcher, version accessors and ControlPort protocol
//! - [`manager`] - Bootstrap supervision up to a usable SOCKS proxy
//! - [`config`] - Configuration loading and validation
//! - [`cli`] - Command-line interface (versions, args, run, status)
//! - [`util`] - Time formatting, randomization

// Allow common stylistic patterns during development.
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::use_self)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::single_match_else)]
#![allow(clippy::unnecessary_debug_formatting)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod tor;
pub mod util;

pub use config::TorConfig;
pub use error::{Error, Result};
pub use manager::{BootstrapProgress, ControlPortStatus, ProxyManager, SocksProxy, Status};
pub use tor::{libevent_version, openssl_version, tor_main, tor_version, ControlConnection, TorProcess};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
