//! Configuration loading and validation
//!
//! Holds everything needed to launch Tor and reach it afterwards: ports,
//! data directory, torrc and geoip paths, stream isolation flags and the
//! bootstrap timing knobs. Loaded from TOML or built in code.

pub mod file;
mod validation;

pub use file::load_from_path;
pub use validation::validate;

use crate::error::{Error, Result};
use crate::util::rand::random_socks_port;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// SOCKS port used when `use_default_socks_port` is set
pub const DEFAULT_SOCKS_PORT: u16 = 9050;

/// Host the SOCKS and control ports listen on
pub const SOCKS_HOST: &str = "127.0.0.1";

/// Name of the cookie file Tor writes into its data directory
pub const COOKIE_FILE_NAME: &str = "control_auth_cookie";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tor: TorConfig,
}

/// Settings for the launched Tor client
#[derive(Debug, Clone, Deserialize)]
pub struct TorConfig {
    /// Fixed SOCKS port. When unset see `use_default_socks_port`.
    pub socks_port: Option<u16>,
    /// Without an explicit port: use 9050 instead of a random port
    #[serde(default)]
    pub use_default_socks_port: bool,
    /// Tor DataDirectory. Empty means `<cache dir>/tor`.
    #[serde(default)]
    pub data_directory: PathBuf,
    pub torrc_path: Option<PathBuf>,
    pub geoip_path: Option<PathBuf>,
    /// Don't share circuits between streams to different addresses
    #[serde(default)]
    pub isolate_destination_address: bool,
    /// Don't share circuits between streams to different ports
    #[serde(default)]
    pub isolate_destination_port: bool,
    /// Executable started as the Tor client
    #[serde(default = "default_tor_binary")]
    pub tor_binary: PathBuf,
    /// Start Tor ourselves; when false attach to one already running
    #[serde(default = "default_launch")]
    pub launch: bool,
    /// Authenticate with this password instead of the auth cookie
    pub control_password: Option<String>,
    /// Value of Tor's `Log` option
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_connect_delay")]
    pub connect_delay_ms: u64,
    /// Bootstrap fails after this long without progress
    #[serde(default = "default_bootstrap_timeout")]
    pub bootstrap_timeout_secs: u64,
    #[serde(default = "default_max_control_attempts")]
    pub max_control_attempts: u32,

    #[serde(skip)]
    random_socks_port: OnceLock<u16>,
}

fn default_tor_binary() -> PathBuf {
    PathBuf::from("tor")
}
fn default_launch() -> bool {
    true
}
fn default_log_level() -> String {
    if cfg!(debug_assertions) {
        "warn stderr".to_string()
    } else {
        "notice stderr".to_string()
    }
}
fn default_connect_delay() -> u64 {
    200
}
fn default_bootstrap_timeout() -> u64 {
    180
}
fn default_max_control_attempts() -> u32 {
    10
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            socks_port: None,
            use_default_socks_port: false,
            data_directory: PathBuf::new(),
            torrc_path: None,
            geoip_path: None,
            isolate_destination_address: false,
            isolate_destination_port: false,
            tor_binary: default_tor_binary(),
            launch: default_launch(),
            control_password: None,
            log_level: default_log_level(),
            connect_delay_ms: default_connect_delay(),
            bootstrap_timeout_secs: default_bootstrap_timeout(),
            max_control_attempts: default_max_control_attempts(),
            random_socks_port: OnceLock::new(),
        }
    }
}

impl TorConfig {
    /// Configuration with the given torrc and geoip files, using the user's
    /// cache directory for Tor's data
    pub fn new(torrc_path: impl Into<PathBuf>, geoip_path: impl Into<PathBuf>) -> Result<Self> {
        let mut config = Self {
            torrc_path: Some(torrc_path.into()),
            geoip_path: Some(geoip_path.into()),
            ..Self::default()
        };
        config.prepare()?;
        Ok(config)
    }

    /// Resolve the data directory and make sure it exists
    pub fn prepare(&mut self) -> Result<()> {
        if self.data_directory.as_os_str().is_empty() {
            let cache = dirs::cache_dir()
                .ok_or_else(|| Error::Config("no user cache directory available".into()))?;
            self.data_directory = cache.join("tor");
        }
        std::fs::create_dir_all(&self.data_directory).map_err(|e| {
            Error::Config(format!(
                "cannot create data directory {:?}: {}",
                self.data_directory, e
            ))
        })?;
        debug!("Tor data directory: {:?}", self.data_directory);
        Ok(())
    }

    /// SOCKS port. Without an explicit port this is 9050 or a random port
    /// picked on first use and kept for the lifetime of the configuration.
    pub fn socks_port(&self) -> u16 {
        match self.socks_port {
            Some(port) => port,
            None if self.use_default_socks_port => DEFAULT_SOCKS_PORT,
            None => *self.random_socks_port.get_or_init(random_socks_port),
        }
    }

    pub fn socks_host(&self) -> &'static str {
        SOCKS_HOST
    }

    /// Control port, always right above the SOCKS port
    pub fn control_port(&self) -> u16 {
        self.socks_port().saturating_add(1)
    }

    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    pub fn cookie_path(&self) -> PathBuf {
        self.data_directory.join(COOKIE_FILE_NAME)
    }

    /// Control auth cookie written by Tor on startup; `None` before that
    pub fn cookie(&self) -> Option<Vec<u8>> {
        std::fs::read(self.cookie_path()).ok()
    }

    /// The auth cookie as lowercase hex
    pub fn cookie_hex(&self) -> Option<String> {
        self.cookie()
            .map(|cookie| data_encoding::HEXLOWER.encode(&cookie))
    }

    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::rand::RANDOM_SOCKS_PORTS;

    #[test]
    fn test_explicit_port_wins() {
        let config = TorConfig {
            socks_port: Some(9150),
            use_default_socks_port: true,
            ..TorConfig::default()
        };
        assert_eq!(config.socks_port(), 9150);
        assert_eq!(config.control_port(), 9151);
    }

    #[test]
    fn test_default_port() {
        let config = TorConfig {
            use_default_socks_port: true,
            ..TorConfig::default()
        };
        assert_eq!(config.socks_port(), DEFAULT_SOCKS_PORT);
        assert_eq!(config.control_port(), 9051);
    }

    #[test]
    fn test_random_port_is_stable() {
        let config = TorConfig::default();
        let first = config.socks_port();
        assert!(RANDOM_SOCKS_PORTS.contains(&first));
        assert_eq!(config.socks_port(), first);
        assert_eq!(config.control_port(), first + 1);

        // Clones share the port already picked
        let cloned = config.clone();
        assert_eq!(cloned.socks_port(), first);
    }

    #[test]
    fn test_socks_host() {
        assert_eq!(TorConfig::default().socks_host(), "127.0.0.1");
    }

    #[test]
    fn test_cookie_absent_then_present() {
        let dir = tempfile::tempdir().unwrap();
        let config = TorConfig {
            data_directory: dir.path().to_path_buf(),
            ..TorConfig::default()
        };
        assert!(config.cookie().is_none());
        assert!(config.cookie_hex().is_none());

        std::fs::write(dir.path().join(COOKIE_FILE_NAME), [0x00, 0xab, 0x10, 0xff]).unwrap();
        assert_eq!(config.cookie_hex().as_deref(), Some("00ab10ff"));
    }

    #[test]
    fn test_prepare_creates_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("tor");
        let mut config = TorConfig {
            data_directory: nested.clone(),
            ..TorConfig::default()
        };
        config.prepare().unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_defaults() {
        let config = TorConfig::default();
        assert!(config.launch);
        assert_eq!(config.tor_binary, PathBuf::from("tor"));
        assert_eq!(config.connect_delay(), Duration::from_millis(200));
        assert_eq!(config.bootstrap_timeout(), Duration::from_secs(180));
        assert_eq!(config.max_control_attempts, 10);
        assert!(config.log_level.ends_with("stderr"));
    }
}
