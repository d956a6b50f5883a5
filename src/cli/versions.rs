//! Versions command - Tor and library versions

use super::{Format, VersionsArgs};
use crate::tor::version::LibraryVersions;
use crate::tor::{libevent_version, openssl_version, tor_version};
use anyhow::{Context, Result};

/// Run the versions command
pub fn run_versions(args: &VersionsArgs) -> Result<()> {
    let versions = match &args.tor_binary {
        Some(binary) => LibraryVersions::query(binary)
            .with_context(|| format!("Failed to query versions of {:?}", binary))?,
        None => LibraryVersions {
            tor: tor_version().context("Failed to query the Tor version")?,
            openssl: openssl_version().ok(),
            libevent: libevent_version().ok(),
        },
    };

    match args.format {
        Format::Json => {
            let json = serde_json::json!({
                "tor": versions.tor,
                "openssl": versions.openssl,
                "libevent": versions.libevent,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        },
        Format::Text => {
            println!("Tor:      {}", versions.tor);
            println!("OpenSSL:  {}", versions.openssl.as_deref().unwrap_or("unknown"));
            println!("Libevent: {}", versions.libevent.as_deref().unwrap_or("unknown"));
        },
    }

    Ok(())
}
