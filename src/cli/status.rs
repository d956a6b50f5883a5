//! Status command - bootstrap phase and version of a running Tor
//!
//! Attaches to the control port derived from the configured SOCKS port.

use super::{Format, StatusArgs};
use crate::config::file::load_or_default;
use crate::manager::{authenticate, BootstrapProgress};
use crate::tor::command::STATUS_BOOTSTRAP_PHASE;
use crate::tor::event::parse_status;
use crate::tor::ControlConnection;
use anyhow::{bail, Context, Result};

/// Run the status command
pub async fn run_status(args: &StatusArgs) -> Result<()> {
    let mut config = load_or_default(args.config.as_deref())?.tor;
    if config.socks_port.is_none() && !config.use_default_socks_port {
        bail!("status needs tor.socks_port or tor.use_default_socks_port to find the control port");
    }
    // Nothing is launched here, so the absence of a cookie is not temporary
    config.launch = false;

    let host = config.socks_host();
    let port = config.control_port();
    let control = ControlConnection::connect(host, port)
        .await
        .with_context(|| format!("No Tor control port at {}:{}", host, port))?;
    authenticate(&control, &config)
        .await
        .context("Failed to authenticate to Tor")?;

    let phase = control.get_info(STATUS_BOOTSTRAP_PHASE).await?;
    let progress = parse_status(&phase).and_then(|d| BootstrapProgress::from_status(&d));
    let version = control.tor_version().await?;

    match args.format {
        Format::Json => {
            let json = serde_json::json!({
                "control_port": port,
                "socks_port": config.socks_port(),
                "version": version,
                "bootstrap": progress.as_ref().map(|p| serde_json::json!({
                    "progress": p.progress,
                    "summary": p.summary,
                    "tag": p.tag,
                })),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        },
        Format::Text => {
            println!("Tor {} on control port {}", version, port);
            println!("SOCKS proxy: {}:{}", host, config.socks_port());
            match progress {
                Some(p) => println!(
                    "Bootstrapped {}%: {}",
                    p.progress,
                    p.summary.as_deref().unwrap_or("")
                ),
                None => println!("Bootstrap phase unknown: {}", phase),
            }
        },
    }

    Ok(())
}
