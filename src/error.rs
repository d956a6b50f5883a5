//! Error types for torembed.

use thiserror::Error;

/// Errors raised while launching, querying or supervising Tor.
#[derive(Error, Debug)]
pub enum Error {
    /// The Tor process could not be started.
    #[error("failed to launch tor: {0}")]
    Launch(String),

    /// A version string was missing from the binary's output.
    #[error("version unavailable: {0}")]
    Version(String),

    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The torrc or geoip path was not set before launch.
    #[error("torrc or geoip path not set")]
    MissingPaths,

    /// `setup` was called while a setup is already in progress or done.
    #[error("proxy setup already started")]
    AlreadyStarted,

    /// The control port never accepted a connection.
    #[error("failed to connect to control port after {attempts} attempts")]
    ControlPortUnreachable { attempts: u32 },

    /// Tor rejected our credentials.
    #[error("failed to authenticate to tor: {0}")]
    AuthenticationFailed(String),

    /// Tor answered a command with a 4xx/5xx reply.
    #[error("tor replied {code}: {message}")]
    Command { code: u16, message: String },

    /// Malformed data on the control connection.
    #[error("control protocol error: {0}")]
    Protocol(String),

    /// The control connection closed.
    #[error("control connection closed")]
    Disconnected,

    /// A control command got no reply in time.
    #[error("operation timed out")]
    Timeout,

    /// Bootstrap made no progress within the configured timeout.
    #[error("tor setup timed out")]
    SetupTimedOut,

    /// The Tor process exited before bootstrap finished.
    #[error("tor exited before bootstrap completed ({0})")]
    TorExited(String),
}

/// Result type alias using torembed's Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error is a negative reply from Tor with the given code.
    pub fn is_reply_code(&self, expected: u16) -> bool {
        matches!(self, Error::Command { code, .. } if *code == expected)
    }
}
