//! Run command - launch Tor and supervise it until interrupted

use super::ConfigArgs;
use crate::config::file::load_or_default;
use crate::manager::{BootstrapProgress, ProxyManager};
use crate::tor::build_args;
use crate::util::time::format_duration;
use anyhow::{Context, Result};
use std::time::Instant;
use tracing::info;

/// Print the parameter list `run` would launch Tor with
pub fn run_args(args: &ConfigArgs) -> Result<()> {
    let config = load_or_default(args.config.as_deref())?;
    for param in build_args(&config.tor) {
        println!("{}", param);
    }
    Ok(())
}

/// Run Tor in the foreground
pub async fn run_proxy(args: &ConfigArgs) -> Result<()> {
    info!("torembed v{} starting", crate::VERSION);

    let config = load_or_default(args.config.as_deref())?;
    let mut manager = ProxyManager::new(config.tor);
    let started = Instant::now();

    let setup = tokio::select! {
        result = manager.setup(print_progress) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let proxy = match setup {
        Some(Ok(proxy)) => proxy,
        Some(Err(e)) => {
            manager.shutdown().await?;
            return Err(e).context("Tor did not finish bootstrapping");
        },
        None => {
            info!("Interrupted during bootstrap");
            manager.shutdown().await?;
            return Ok(());
        },
    };

    println!(
        "Tor ready after {}, SOCKS proxy at {}",
        format_duration(started.elapsed()),
        proxy
    );
    println!("Press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutting down");
    manager.shutdown().await?;
    Ok(())
}

fn print_progress(progress: &BootstrapProgress) {
    match &progress.summary {
        Some(summary) => println!("[{:>3}%] {}", progress.progress, summary),
        None => println!("[{:>3}%]", progress.progress),
    }
}
