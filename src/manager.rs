//! Tor proxy manager
//!
//! Drives a Tor client from launch to a usable SOCKS proxy:
//!
//! 1. launch Tor with the configured parameter list
//! 2. connect to its control port, retrying while Tor starts up
//! 3. authenticate (auth cookie or password)
//! 4. read the current bootstrap phase and subscribe to STATUS_CLIENT
//! 5. report BOOTSTRAP progress until CIRCUIT_ESTABLISHED
//!
//! The whole sequence fails if bootstrap makes no progress for the
//! configured timeout.

use crate::config::TorConfig;
use crate::error::{Error, Result};
use crate::tor::command::STATUS_BOOTSTRAP_PHASE;
use crate::tor::event::{parse_status, EventKind, StatusData, StatusEvent};
use crate::tor::launch::{self, TorProcess, DEFAULT_PROGRAM};
use crate::tor::version::{default_versions, LibraryVersions};
use crate::tor::ControlConnection;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, sleep_until, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How often a launched Tor is checked for an early exit while waiting
const PROCESS_CHECK_INTERVAL: Duration = Duration::from_secs(1);

const ACTION_BOOTSTRAP: &str = "BOOTSTRAP";
const ACTION_CIRCUIT_ESTABLISHED: &str = "CIRCUIT_ESTABLISHED";

/// Connection state of the proxy as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Closed,
    Connecting,
    Open,
}

/// State of the control port connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPortStatus {
    Closed,
    Connecting,
    Authenticated,
}

/// One bootstrap progress report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapProgress {
    /// Percentage, 0..=100
    pub progress: u8,
    pub summary: Option<String>,
    pub tag: Option<String>,
}

impl BootstrapProgress {
    /// Extract progress from a BOOTSTRAP status report. A missing or
    /// malformed PROGRESS counts as 0.
    pub fn from_status(data: &StatusData) -> Option<Self> {
        if !data.action.eq_ignore_ascii_case(ACTION_BOOTSTRAP) {
            return None;
        }
        let progress = data
            .argument("PROGRESS")
            .and_then(|p| p.parse::<u8>().ok())
            .unwrap_or(0)
            .min(100);
        Some(Self {
            progress,
            summary: data.argument("SUMMARY").map(str::to_string),
            tag: data.argument("TAG").map(str::to_string),
        })
    }
}

/// Where the bootstrapped proxy can be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocksProxy {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for SocksProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Launches Tor and supervises its bootstrap
pub struct ProxyManager {
    config: TorConfig,
    process: Option<TorProcess>,
    control: Option<ControlConnection>,
    status: Status,
    control_status: ControlPortStatus,
    bootstrap_progress: u8,
    versions: OnceLock<LibraryVersions>,
}

impl ProxyManager {
    pub fn new(config: TorConfig) -> Self {
        Self {
            config,
            process: None,
            control: None,
            status: Status::Closed,
            control_status: ControlPortStatus::Closed,
            bootstrap_progress: 0,
            versions: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &TorConfig {
        &self.config
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn control_port_status(&self) -> ControlPortStatus {
        self.control_status
    }

    /// Whether Tor is believed to be fully connected
    pub fn is_connected(&self) -> bool {
        self.status == Status::Open
    }

    pub fn socks_host(&self) -> &str {
        self.config.socks_host()
    }

    pub fn socks_port(&self) -> u16 {
        self.config.socks_port()
    }

    /// Last reported bootstrap percentage
    pub fn bootstrap_progress(&self) -> u8 {
        self.bootstrap_progress
    }

    /// The control connection once authenticated
    pub fn control(&self) -> Option<&ControlConnection> {
        self.control.as_ref()
    }

    /// Versions of the configured binary, queried on first use
    pub fn versions(&self) -> Result<&LibraryVersions> {
        if let Some(versions) = self.versions.get() {
            return Ok(versions);
        }
        let versions = if self.config.tor_binary == Path::new(DEFAULT_PROGRAM) {
            default_versions()?.clone()
        } else {
            LibraryVersions::query(&self.config.tor_binary)?
        };
        Ok(self.versions.get_or_init(|| versions))
    }

    pub fn tor_version(&self) -> Result<String> {
        Ok(self.versions()?.tor.clone())
    }

    pub fn openssl_version(&self) -> Result<String> {
        self.versions()?.openssl().map(str::to_string)
    }

    pub fn libevent_version(&self) -> Result<String> {
        self.versions()?.libevent().map(str::to_string)
    }

    /// Version reported over the control port by the running Tor
    pub async fn running_tor_version(&self) -> Result<String> {
        match &self.control {
            Some(control) => control.tor_version().await,
            None => Err(Error::Disconnected),
        }
    }

    /// Start Tor (unless attaching) and wait for it to bootstrap.
    ///
    /// `on_progress` is called for every bootstrap report. Returns the SOCKS
    /// endpoint once Tor has established a circuit.
    pub async fn setup<F>(&mut self, mut on_progress: F) -> Result<SocksProxy>
    where
        F: FnMut(&BootstrapProgress),
    {
        if self.control_status != ControlPortStatus::Closed {
            return Err(Error::AlreadyStarted);
        }
        self.control_status = ControlPortStatus::Connecting;
        self.status = Status::Connecting;

        let result = self.run_setup(&mut on_progress).await;
        if let Err(e) = &result {
            warn!("Tor setup failed: {}", e);
            self.control = None;
            self.control_status = ControlPortStatus::Closed;
            self.status = Status::Closed;
        }
        result
    }

    async fn run_setup(
        &mut self,
        on_progress: &mut dyn FnMut(&BootstrapProgress),
    ) -> Result<SocksProxy> {
        if self.config.launch
            && (self.config.torrc_path.is_none() || self.config.geoip_path.is_none())
        {
            return Err(Error::MissingPaths);
        }

        let mut deadline = Instant::now() + self.config.bootstrap_timeout();

        if self.config.launch {
            self.ensure_launched()?;
        }

        let control = timeout_at(deadline, self.connect_control())
            .await
            .map_err(|_| Error::SetupTimedOut)??;
        self.control_status = ControlPortStatus::Authenticated;

        // Subscribe before SETEVENTS so no event slips through
        let mut events = control.subscribe();

        let phase = control.get_info(STATUS_BOOTSTRAP_PHASE).await?;
        debug!("Current bootstrap phase: {}", phase);
        if let Some(progress) =
            parse_status(&phase).and_then(|d| BootstrapProgress::from_status(&d))
        {
            self.record_progress(progress, &mut deadline, on_progress);
        }

        control.set_events(&[EventKind::StatusClient], false).await?;
        self.control = Some(control);

        if self.bootstrap_progress >= 100 {
            // Attached to an already bootstrapped Tor; no event will follow
            return Ok(self.open());
        }

        let mut process_check = interval(PROCESS_CHECK_INTERVAL);
        process_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(line) => {
                        let Some(event) = StatusEvent::parse(&line) else {
                            continue;
                        };
                        if event.action().eq_ignore_ascii_case(ACTION_CIRCUIT_ESTABLISHED) {
                            return Ok(self.open());
                        }
                        if let Some(progress) = BootstrapProgress::from_status(&event.data) {
                            self.record_progress(progress, &mut deadline, on_progress);
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} Tor events", skipped);
                    },
                    Err(RecvError::Closed) => {
                        self.check_process()?;
                        return Err(Error::Disconnected);
                    },
                },
                _ = process_check.tick() => self.check_process()?,
                _ = sleep_until(deadline) => return Err(Error::SetupTimedOut),
            }
        }
    }

    /// Start Tor unless our child is still running
    fn ensure_launched(&mut self) -> Result<()> {
        if let Some(process) = self.process.as_mut() {
            if process.try_exited()?.is_none() {
                debug!("Tor already running, not launching again");
                return Ok(());
            }
        }
        self.process = Some(launch::launch(&self.config)?);
        Ok(())
    }

    /// Fail if our Tor child has exited
    fn check_process(&mut self) -> Result<()> {
        if let Some(process) = self.process.as_mut() {
            if let Some(status) = process.try_exited()? {
                self.process = None;
                return Err(Error::TorExited(status.to_string()));
            }
        }
        Ok(())
    }

    /// Connect and authenticate, retrying while Tor is still starting
    async fn connect_control(&mut self) -> Result<ControlConnection> {
        let host = self.config.socks_host().to_string();
        let port = self.config.control_port();
        let mut attempts = 0;

        loop {
            tokio::time::sleep(self.config.connect_delay()).await;
            self.check_process()?;

            match self.try_connect(&host, port).await {
                Ok(control) => return Ok(control),
                Err(e @ Error::AuthenticationFailed(_)) => return Err(e),
                Err(e) => {
                    attempts += 1;
                    debug!(
                        "Control port attempt {}/{} failed: {}",
                        attempts, self.config.max_control_attempts, e
                    );
                    if attempts >= self.config.max_control_attempts {
                        return Err(Error::ControlPortUnreachable { attempts });
                    }
                },
            }
        }
    }

    async fn try_connect(&self, host: &str, port: u16) -> Result<ControlConnection> {
        let control = ControlConnection::connect(host, port).await?;
        authenticate(&control, &self.config).await?;
        Ok(control)
    }

    fn record_progress(
        &mut self,
        progress: BootstrapProgress,
        deadline: &mut Instant,
        on_progress: &mut dyn FnMut(&BootstrapProgress),
    ) {
        if progress.progress != self.bootstrap_progress {
            *deadline = Instant::now() + self.config.bootstrap_timeout();
        }
        self.bootstrap_progress = progress.progress;
        info!(
            "Bootstrapped {}%: {}",
            progress.progress,
            progress.summary.as_deref().unwrap_or("")
        );
        on_progress(&progress);
    }

    fn open(&mut self) -> SocksProxy {
        self.status = Status::Open;
        let proxy = SocksProxy {
            host: self.config.socks_host().to_string(),
            port: self.config.socks_port(),
        };
        info!("Tor circuit established, SOCKS proxy at {}", proxy);
        proxy
    }

    /// Ask Tor to exit, then reap (or kill) the child
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(control) = self.control.take() {
            if let Err(e) = control.signal("SHUTDOWN").await {
                debug!("SIGNAL SHUTDOWN failed: {}", e);
            }
        }
        if let Some(mut process) = self.process.take() {
            process.shutdown().await?;
        }
        self.status = Status::Closed;
        self.control_status = ControlPortStatus::Closed;
        self.bootstrap_progress = 0;
        info!("Tor proxy shut down");
        Ok(())
    }
}

/// Authenticate `control` the way `config` asks for: password if set, else
/// the auth cookie. Without a cookie, a launched Tor has not written it yet
/// (retryable `Protocol` error) while an attached one may allow null auth.
pub async fn authenticate(control: &ControlConnection, config: &TorConfig) -> Result<()> {
    let auth = if let Some(password) = &config.control_password {
        control.authenticate_password(password).await
    } else if let Some(cookie) = config.cookie() {
        control.authenticate_cookie(&cookie).await
    } else if !config.launch {
        control.authenticate_null().await
    } else {
        return Err(Error::Protocol(format!(
            "{:?} not written yet",
            config.cookie_path()
        )));
    };

    match auth {
        Err(Error::AuthenticationFailed(reason)) => Err(Error::AuthenticationFailed(format!(
            "{}. The control_auth_cookie in Tor's data directory may contain a wrong value",
            reason
        ))),
        other => other,
    }
}
