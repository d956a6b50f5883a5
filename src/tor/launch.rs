//! Starting the Tor client
//!
//! Tor is started as a child process whose argument vector is the launch
//! parameter list, exactly as if it had been run from a shell. The call
//! returns as soon as the process exists; Tor keeps running in the
//! background until shut down or the handle is dropped.

use crate::config::TorConfig;
use crate::error::{Error, Result};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Program run when the parameter list is empty
pub const DEFAULT_PROGRAM: &str = "tor";

const ARG_DATA_DIRECTORY: &str = "DataDirectory";
const ARG_CONTROL_PORT: &str = "ControlPort";
const ARG_COOKIE_AUTHENTICATION: &str = "CookieAuthentication";
const ARG_SOCKS_PORT: &str = "SocksPort";
const ARG_GEOIP_FILE: &str = "GeoIPFile";
const ARG_TORRC_FILE: &str = "-f";
const ARG_LOG: &str = "Log";
const ISOLATE_DEST_ADDR: &str = "IsolateDestAddr";
const ISOLATE_DEST_PORT: &str = "IsolateDestPort";

/// How long `shutdown` waits for a clean exit before killing
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Build the launch parameter list for `config`, program name first
pub fn build_args(config: &TorConfig) -> Vec<String> {
    let mut socks_port = format!("localhost:{}", config.socks_port());
    if config.isolate_destination_address {
        socks_port.push(' ');
        socks_port.push_str(ISOLATE_DEST_ADDR);
    }
    if config.isolate_destination_port {
        socks_port.push(' ');
        socks_port.push_str(ISOLATE_DEST_PORT);
    }

    let mut args = vec![
        config.tor_binary.to_string_lossy().into_owned(),
        ARG_DATA_DIRECTORY.to_string(),
        config.data_directory().to_string_lossy().into_owned(),
        ARG_CONTROL_PORT.to_string(),
        config.control_port().to_string(),
    ];
    if config.control_password.is_none() {
        args.push(ARG_COOKIE_AUTHENTICATION.to_string());
        args.push("1".to_string());
    }
    args.push(ARG_SOCKS_PORT.to_string());
    args.push(socks_port);
    if let Some(geoip) = &config.geoip_path {
        args.push(ARG_GEOIP_FILE.to_string());
        args.push(geoip.to_string_lossy().into_owned());
    }
    if let Some(torrc) = &config.torrc_path {
        args.push(ARG_TORRC_FILE.to_string());
        args.push(torrc.to_string_lossy().into_owned());
    }
    args.push(ARG_LOG.to_string());
    args.push(config.log_level.clone());
    args
}

/// Start Tor with an argv-style parameter list.
///
/// `params[0]` names the program, the rest are its arguments. An empty list
/// starts [`DEFAULT_PROGRAM`] without arguments. Never blocks on Tor itself.
pub fn tor_main<S: AsRef<str>>(params: &[S]) -> Result<TorProcess> {
    let (program, args) = match params.split_first() {
        Some((program, args)) => (AsRef::<str>::as_ref(program), args),
        None => (DEFAULT_PROGRAM, &[][..]),
    };

    let mut command = Command::new(program);
    command
        .args(args.iter().map(|arg| AsRef::<str>::as_ref(arg)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| Error::Launch(format!("{}: {}", program, e)))?;

    let pid = child.id();
    info!("Started {} (pid {:?}) with {} arguments", program, pid, args.len());

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_output(BufReader::new(stdout), false));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_output(BufReader::new(stderr), true));
    }

    Ok(TorProcess {
        child,
        program: program.to_string(),
    })
}

/// Launch Tor for `config`
pub fn launch(config: &TorConfig) -> Result<TorProcess> {
    tor_main(&build_args(config))
}

/// Relay Tor's console output into our log
async fn forward_output<R: AsyncBufRead + Unpin>(reader: R, is_stderr: bool) {
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.contains("[warn]") || line.contains("[err]") {
                    warn!(target: "torembed::tor::launch", "tor: {}", line);
                } else if is_stderr {
                    info!(target: "torembed::tor::launch", "tor: {}", line);
                } else {
                    debug!(target: "torembed::tor::launch", "tor: {}", line);
                }
            },
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading tor output: {}", e);
                break;
            },
        }
    }
}

/// Handle to a running Tor process. Dropping it kills the process.
#[derive(Debug)]
pub struct TorProcess {
    child: Child,
    program: String,
}

impl TorProcess {
    /// OS process id, `None` once reaped
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Non-blocking check whether the process has exited
    pub fn try_exited(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Wait for the process to exit on its own
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        Ok(self.child.wait().await?)
    }

    /// Give Tor a moment to exit (e.g. after SIGNAL SHUTDOWN), then kill it
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.try_exited()?.is_some() {
            return Ok(());
        }
        match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(status) => {
                info!("{} exited with {}", self.program, status?);
            },
            Err(_) => {
                warn!("{} did not exit in time, killing it", self.program);
                self.child.kill().await?;
            },
        }
        Ok(())
    }

    /// Kill immediately
    pub async fn kill(&mut self) -> Result<()> {
        if self.try_exited()?.is_none() {
            self.child.kill().await?;
        }
        Ok(())
    }
}
