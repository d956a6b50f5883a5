//! Configuration file loading

use super::Config;
use anyhow::{Context, Result};
use std::path::Path;

/// Default config file locations
const CONFIG_PATHS: &[&str] = &["./torembed.toml", "/etc/torembed/config.toml"];

/// Load from `path`, or from the first default location that exists, or
/// fall back to built-in defaults
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return load_from_path(path);
    }
    match find_config_file() {
        Some(found) => load_from_path(Path::new(found)),
        None => {
            let mut config = Config::default();
            config.tor.prepare()?;
            Ok(config)
        },
    }
}

/// Find first existing config file
fn find_config_file() -> Option<&'static str> {
    CONFIG_PATHS
        .iter()
        .copied()
        .find(|path| Path::new(path).exists())
}

/// Load and parse config from path
pub fn load_from_path(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config = parse(&contents)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config.tor.prepare()?;
    super::validate(&config.tor)?;

    Ok(config)
}

/// Parse TOML text without touching the filesystem
pub fn parse(contents: &str) -> Result<Config> {
    Ok(toml::from_str(contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_full() {
        let config = parse(
            r#"
[tor]
socks_port = 19050
data_directory = "/tmp/torembed-test"
torrc_path = "/etc/tor/torrc"
geoip_path = "/usr/share/tor/geoip"
isolate_destination_address = true
tor_binary = "/usr/bin/tor"
bootstrap_timeout_secs = 60
"#,
        )
        .unwrap();

        assert_eq!(config.tor.socks_port(), 19050);
        assert_eq!(config.tor.control_port(), 19051);
        assert_eq!(config.tor.torrc_path, Some(PathBuf::from("/etc/tor/torrc")));
        assert!(config.tor.isolate_destination_address);
        assert!(!config.tor.isolate_destination_port);
        assert_eq!(config.tor.tor_binary, PathBuf::from("/usr/bin/tor"));
        assert_eq!(config.tor.bootstrap_timeout_secs, 60);
        assert_eq!(config.tor.max_control_attempts, 10);
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = parse("").unwrap();
        assert!(config.tor.launch);
        assert!(config.tor.torrc_path.is_none());
        assert_eq!(config.tor.connect_delay_ms, 200);
    }

    #[test]
    fn test_load_from_path_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            format!(
                "[tor]\nsocks_port = 0\ndata_directory = {:?}\n",
                dir.path().join("data")
            ),
        )
        .unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("socks_port"));
    }

    #[test]
    fn test_load_from_path_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            format!("[tor]\nuse_default_socks_port = true\ndata_directory = {:?}\n", data),
        )
        .unwrap();

        let config = load_from_path(&path).unwrap();
        assert!(data.is_dir());
        assert_eq!(config.tor.socks_port(), 9050);
    }

    #[test]
    fn test_missing_file() {
        let err = load_from_path(Path::new("/nonexistent/torembed.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
