//! Version accessors against a stand-in `tor` executable

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use torembed::tor::{
    libevent_version_with, openssl_version_with, tor_version_with, LibraryVersions,
};
use torembed::{Error, ProxyManager, TorConfig};

const LIBRARY_VERSIONS: &str = "Tor version 0.4.8.10.
Library versions
        Compiler               gcc 12.2.0
        Libevent               2.1.12-stable    2.1.12-stable
        OpenSSL                3.0.11           3.0.13
        Zlib                   1.2.13           1.2.13
";

const SUMMARY_ONLY: &str = "Tor version 0.4.9.1-alpha.
Tor is running on Linux with Libevent 2.1.12-stable, OpenSSL 3.2.1, Zlib 1.3, Liblzma 5.4.5, Libzstd 1.5.5 and Glibc 2.39 as libc.
";

/// Shell script answering `--library-versions` and `--version`. Each run
/// is logged to `calls` next to it.
fn fake_tor(dir: &Path, library_versions: &str, version: &str) -> PathBuf {
    let path = dir.join("tor");
    let script = format!(
        "#!/bin/sh\necho \"$1\" >> \"$(dirname \"$0\")/calls\"\ncase \"$1\" in\n  --library-versions) cat <<'EOT'\n{}EOT\n  ;;\n  --version) cat <<'EOT'\n{}EOT\n  ;;\n  *) exit 1 ;;\nesac\n",
        library_versions, version
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn invocations(dir: &Path) -> usize {
    std::fs::read_to_string(dir.join("calls"))
        .map(|calls| calls.lines().count())
        .unwrap_or(0)
}

// One test so no other thread forks while a script is being written
#[test]
fn test_versions_from_fake_tor() {
    let dir = tempfile::tempdir().unwrap();

    // Full library table
    let tor = fake_tor(dir.path(), LIBRARY_VERSIONS, "Tor version 0.4.8.10.\n");
    let versions = LibraryVersions::query(&tor).unwrap();
    assert_eq!(versions.tor, "0.4.8.10");
    assert_eq!(versions.openssl().unwrap(), "3.0.13");
    assert_eq!(versions.libevent().unwrap(), "2.1.12-stable");

    let tor_path = tor.clone();
    let mut config = TorConfig::default();
    config.tor_binary = tor;
    let manager = ProxyManager::new(config);
    for version in [
        manager.tor_version().unwrap(),
        manager.openssl_version().unwrap(),
        manager.libevent_version().unwrap(),
    ] {
        assert!(!version.is_empty());
    }

    // One query for the direct call, one shared by all manager accessors
    assert_eq!(invocations(dir.path()), 2);

    assert_eq!(tor_version_with(&tor_path).unwrap(), "0.4.8.10");
    assert_eq!(openssl_version_with(&tor_path).unwrap(), "3.0.13");
    assert_eq!(libevent_version_with(&tor_path).unwrap(), "2.1.12-stable");

    // Table without library rows falls back to the one-line summary
    let other = tempfile::tempdir().unwrap();
    let tor = fake_tor(other.path(), "Tor version 0.4.9.1-alpha.\n", SUMMARY_ONLY);
    let versions = LibraryVersions::query(&tor).unwrap();
    assert_eq!(versions.tor, "0.4.9.1-alpha");
    assert_eq!(versions.openssl().unwrap(), "3.2.1");
    assert_eq!(versions.libevent().unwrap(), "2.1.12-stable");

    // A binary that rejects the flag
    let err = LibraryVersions::query(Path::new("/bin/false")).unwrap_err();
    assert!(matches!(err, Error::Version(_)));
}
