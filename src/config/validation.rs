//! Configuration validation
//!
//! Fail-fast validation of configuration invariants.

use super::TorConfig;
use crate::error::{Error, Result};

/// Validate configuration invariants
pub fn validate(config: &TorConfig) -> Result<()> {
    validate_ports(config)?;
    validate_timing(config)?;

    if config.tor_binary.as_os_str().is_empty() {
        return Err(Error::Config("tor.tor_binary cannot be empty".into()));
    }

    Ok(())
}

fn validate_ports(config: &TorConfig) -> Result<()> {
    match config.socks_port {
        Some(0) => Err(Error::Config("tor.socks_port cannot be 0".into())),
        // The control port sits right above the SOCKS port
        Some(u16::MAX) => Err(Error::Config(format!(
            "tor.socks_port must be below {} to leave room for the control port",
            u16::MAX
        ))),
        _ => Ok(()),
    }
}

fn validate_timing(config: &TorConfig) -> Result<()> {
    if config.max_control_attempts == 0 {
        return Err(Error::Config("tor.max_control_attempts must be at least 1".into()));
    }
    if config.bootstrap_timeout_secs == 0 {
        return Err(Error::Config("tor.bootstrap_timeout_secs cannot be 0".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&TorConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_bad_ports() {
        for port in [0, u16::MAX] {
            let config = TorConfig {
                socks_port: Some(port),
                ..TorConfig::default()
            };
            assert!(validate(&config).is_err(), "port {} accepted", port);
        }
    }

    #[test]
    fn test_rejects_zero_timing() {
        let config = TorConfig {
            max_control_attempts: 0,
            ..TorConfig::default()
        };
        assert!(validate(&config).is_err());

        let config = TorConfig {
            bootstrap_timeout_secs: 0,
            ..TorConfig::default()
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_empty_binary() {
        let config = TorConfig {
            tor_binary: PathBuf::new(),
            ..TorConfig::default()
        };
        assert!(validate(&config).is_err());
    }
}
