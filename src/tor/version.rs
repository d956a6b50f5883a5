//! Version strings of Tor and the libraries it links
//!
//! Tor reports its own version and those of OpenSSL and libevent via
//! `tor --library-versions`:
//!
//! ```text
//! Tor version 0.4.8.10.
//! Library versions
//!         Compiler               gcc 12.2.0
//!         Libevent               2.1.12-stable    2.1.12-stable
//!         OpenSSL                3.0.11           3.0.13
//! ```
//!
//! The second column is the compile-time version, the third the one
//! loaded at runtime. Recent releases also print a one-line summary with
//! `tor --version` ("Tor is running on Linux with Libevent ..., OpenSSL
//! ..."), used when the table lacks a row.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use tracing::debug;

use super::launch::DEFAULT_PROGRAM;

const LABEL_OPENSSL: &str = "OpenSSL";
const LABEL_LIBEVENT: &str = "Libevent";

/// Versions reported by one Tor binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryVersions {
    pub tor: String,
    pub openssl: Option<String>,
    pub libevent: Option<String>,
}

impl LibraryVersions {
    /// Ask `binary` for its versions
    pub fn query(binary: &Path) -> Result<Self> {
        let table = run(binary, "--library-versions")?;
        let mut versions = parse_library_versions(&table);

        if versions.tor.is_none() || versions.openssl.is_none() || versions.libevent.is_none() {
            debug!("Library table incomplete, falling back to --version");
            let summary = run(binary, "--version")?;
            let fallback = parse_running_on(&summary);
            versions.tor = versions.tor.or(fallback.tor);
            versions.openssl = versions.openssl.or(fallback.openssl);
            versions.libevent = versions.libevent.or(fallback.libevent);
        }

        let tor = versions.tor.ok_or_else(|| {
            Error::Version(format!("{} did not report a Tor version", binary.display()))
        })?;
        Ok(Self {
            tor,
            openssl: versions.openssl,
            libevent: versions.libevent,
        })
    }

    pub fn openssl(&self) -> Result<&str> {
        self.openssl
            .as_deref()
            .ok_or_else(|| Error::Version("OpenSSL version not reported".into()))
    }

    pub fn libevent(&self) -> Result<&str> {
        self.libevent
            .as_deref()
            .ok_or_else(|| Error::Version("libevent version not reported".into()))
    }
}

static DEFAULT_VERSIONS: OnceLock<LibraryVersions> = OnceLock::new();

/// Versions of the default `tor` binary, queried once per process
pub(crate) fn default_versions() -> Result<&'static LibraryVersions> {
    if let Some(versions) = DEFAULT_VERSIONS.get() {
        return Ok(versions);
    }
    let versions = LibraryVersions::query(Path::new(DEFAULT_PROGRAM))?;
    Ok(DEFAULT_VERSIONS.get_or_init(|| versions))
}

/// Version of the Tor client
pub fn tor_version() -> Result<String> {
    Ok(default_versions()?.tor.clone())
}

/// Version of the OpenSSL library Tor runs with
pub fn openssl_version() -> Result<String> {
    default_versions()?.openssl().map(str::to_string)
}

/// Version of the libevent library Tor runs with
pub fn libevent_version() -> Result<String> {
    default_versions()?.libevent().map(str::to_string)
}

/// Version of the Tor client at `binary`
pub fn tor_version_with(binary: impl AsRef<Path>) -> Result<String> {
    Ok(LibraryVersions::query(binary.as_ref())?.tor)
}

/// OpenSSL version of the Tor client at `binary`
pub fn openssl_version_with(binary: impl AsRef<Path>) -> Result<String> {
    LibraryVersions::query(binary.as_ref())?
        .openssl()
        .map(str::to_string)
}

/// libevent version of the Tor client at `binary`
pub fn libevent_version_with(binary: impl AsRef<Path>) -> Result<String> {
    LibraryVersions::query(binary.as_ref())?
        .libevent()
        .map(str::to_string)
}

fn run(binary: &Path, flag: &str) -> Result<String> {
    let output = Command::new(binary)
        .arg(flag)
        .output()
        .map_err(|e| Error::Launch(format!("{}: {}", binary.display(), e)))?;

    if !output.status.success() {
        return Err(Error::Version(format!(
            "{} {} exited with {}",
            binary.display(),
            flag,
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Partially parsed version output
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedVersions {
    pub tor: Option<String>,
    pub openssl: Option<String>,
    pub libevent: Option<String>,
}

/// Parse `tor --library-versions` output
pub fn parse_library_versions(text: &str) -> ParsedVersions {
    ParsedVersions {
        tor: parse_tor_version(text),
        openssl: library_row(text, LABEL_OPENSSL),
        libevent: library_row(text, LABEL_LIBEVENT),
    }
}

/// Parse the "Tor is running on ... with Libevent X, OpenSSL Y, ..." summary
pub fn parse_running_on(text: &str) -> ParsedVersions {
    let mut parsed = ParsedVersions {
        tor: parse_tor_version(text),
        ..ParsedVersions::default()
    };

    let Some(libraries) = text
        .lines()
        .find(|line| line.starts_with("Tor is running on"))
        .and_then(|line| line.split_once(" with "))
        .map(|(_, libraries)| libraries)
    else {
        return parsed;
    };

    for item in libraries
        .trim_end_matches('.')
        .split(", ")
        .flat_map(|part| part.split(" and "))
    {
        let item = item.trim();
        if let Some(version) = strip_label(item, LABEL_OPENSSL) {
            parsed.openssl = Some(version.to_string());
        } else if let Some(version) = strip_label(item, LABEL_LIBEVENT) {
            parsed.libevent = Some(version.to_string());
        }
    }
    parsed
}

/// "Tor version 0.4.8.10." -> "0.4.8.10"
fn parse_tor_version(text: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix("Tor version "))
        .map(|rest| rest.trim().trim_end_matches('.').trim().to_string())
        .filter(|version| !version.is_empty())
}

/// Runtime version from a library table row
fn library_row(text: &str, label: &str) -> Option<String> {
    let rest = text
        .lines()
        .find_map(|line| strip_label(line.trim(), label))?
        .trim();
    if rest.is_empty() {
        return None;
    }

    // Columns are padded with at least two blanks when they fit
    let cells: Vec<&str> = rest
        .split("  ")
        .flat_map(|cell| cell.split('\t'))
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .collect();
    if cells.len() >= 2 {
        return cells.last().map(|cell| cell.to_string());
    }

    // Long cells ("OpenSSL 3.0.11 19 Sep 2023 OpenSSL 3.0.13 30 Jan 2024")
    // are only separated by one blank; the label repeats at the runtime cell
    match rest.rfind(label).filter(|&idx| idx > 0) {
        Some(idx) => Some(rest[idx..].to_string()),
        None => Some(rest.to_string()),
    }
}

/// Text following `label` and whitespace, matched case-insensitively
fn strip_label<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    let head = text.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    let rest = &text[label.len()..];
    if rest.starts_with([' ', '\t']) {
        Some(rest.trim_start())
    } else {
        None
    }
}
