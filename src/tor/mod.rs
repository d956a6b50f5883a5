//! Tor process interaction
//!
//! Starting the Tor client, querying its library versions and talking to
//! its ControlPort. Tor itself is treated as a black box.

pub mod command;
pub mod control;
pub mod event;
pub mod launch;
pub mod reply;
pub mod version;

pub use command::{Command, Reply};
pub use control::ControlConnection;
pub use event::{EventKind, Severity, StatusData, StatusEvent, StatusType};
pub use launch::{build_args, launch, tor_main, TorProcess};
pub use version::{
    libevent_version, libevent_version_with, openssl_version, openssl_version_with, tor_version,
    tor_version_with, LibraryVersions,
};
