//! Tor Control Port client
//!
//! Communicates with the Tor process via the control protocol. A background
//! task reads every line from the socket and routes it either to the command
//! currently awaiting its reply or, for `650` lines, to event subscribers.
//! Commands are serialised: only one is in flight at any time.

use super::command::{Command, Feed, PendingReply, Reply, STATUS_VERSION};
use super::event::EventKind;
use super::reply::{ReplyLine, ResponseType, Separator};
use crate::error::{Error, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long a command may wait for its reply
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffered events per subscriber before old ones are dropped
const EVENT_CAPACITY: usize = 256;

struct InFlight {
    pending: PendingReply,
    reply_tx: oneshot::Sender<Result<Reply>>,
}

/// State shared between callers and the reader task
struct Shared {
    in_flight: Option<InFlight>,
    /// `None` once the connection is closed
    events: Option<broadcast::Sender<String>>,
    /// Multi-line (`650+`) event being collected
    event_block: Option<String>,
}

/// Abandons the connection when dropped while armed, e.g. when a `send`
/// future is cancelled or times out mid round trip
struct AbandonGuard<'a> {
    connection: &'a ControlConnection,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.connection.abandon();
        }
    }
}

/// Connection to a Tor control port
pub struct ControlConnection {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    shared: Arc<Mutex<Shared>>,
    reader_task: JoinHandle<()>,
    command_timeout: Duration,
}

impl ControlConnection {
    /// Connect to `host:port`
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        debug!("Connecting to Tor control port: {}", addr);

        let stream = TcpStream::connect(&addr).await?;
        let (read_half, write_half) = stream.into_split();

        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(Mutex::new(Shared {
            in_flight: None,
            events: Some(events_tx),
            event_block: None,
        }));

        let reader_task = tokio::spawn(read_loop(BufReader::new(read_half), shared.clone()));

        info!("Connected to Tor control port {}", addr);
        Ok(Self {
            writer: tokio::sync::Mutex::new(write_half),
            shared,
            reader_task,
            command_timeout: COMMAND_TIMEOUT,
        })
    }

    /// Override the per-command reply timeout
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Whether the reader task has seen the connection close
    pub fn is_closed(&self) -> bool {
        lock(&self.shared).events.is_none()
    }

    /// Receive raw `650` event lines from now on
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        match &lock(&self.shared).events {
            Some(tx) => tx.subscribe(),
            None => {
                // Hand out a receiver that reports Closed immediately
                let (_, rx) = broadcast::channel(1);
                rx
            },
        }
    }

    /// Send a command and wait for its complete reply
    pub async fn send(&self, command: &Command) -> Result<Reply> {
        // Holding the writer for the whole round trip keeps commands in order
        let mut writer = self.writer.lock().await;

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut shared = lock(&self.shared);
            if shared.events.is_none() {
                return Err(Error::Disconnected);
            }
            shared.in_flight = Some(InFlight {
                pending: PendingReply::new(),
                reply_tx,
            });
        }

        // From here on, giving up before the reply arrives desyncs the stream
        let mut guard = AbandonGuard {
            connection: self,
            armed: true,
        };

        debug!("Tor <- {}", command.redacted());
        let written = async {
            writer.write_all(command.wire().as_bytes()).await?;
            writer.flush().await
        }
        .await;
        written?;

        match tokio::time::timeout(self.command_timeout, reply_rx).await {
            Ok(Ok(result)) => {
                guard.armed = false;
                result
            },
            Ok(Err(_)) => Err(Error::Disconnected),
            Err(_) => {
                warn!(
                    "Timeout waiting for reply to {}, closing connection",
                    command.redacted()
                );
                Err(Error::Timeout)
            },
        }
    }

    /// Stop reading and fail every later command with `Disconnected`. A late
    /// reply would otherwise be taken for the answer to the next command.
    fn abandon(&self) {
        self.reader_task.abort();
        let mut shared = lock(&self.shared);
        shared.in_flight = None;
        shared.events = None;
        shared.event_block = None;
    }

    /// Authenticate with the control auth cookie contents
    pub async fn authenticate_cookie(&self, cookie: &[u8]) -> Result<()> {
        let cookie_hex = data_encoding::HEXLOWER.encode(cookie);
        self.authenticate(Command::Authenticate(cookie_hex)).await
    }

    /// Authenticate with a password (hex-encoded for HashedControlPassword)
    pub async fn authenticate_password(&self, password: &str) -> Result<()> {
        let password_hex = data_encoding::HEXLOWER.encode(password.as_bytes());
        self.authenticate(Command::Authenticate(password_hex)).await
    }

    /// Authenticate without credentials (Tor configured with no auth)
    pub async fn authenticate_null(&self) -> Result<()> {
        self.authenticate(Command::Authenticate(String::new())).await
    }

    async fn authenticate(&self, command: Command) -> Result<()> {
        match self.send(&command).await {
            Ok(_) => {
                info!("Authenticated with Tor control port");
                Ok(())
            },
            Err(Error::Command { code, message }) => {
                Err(Error::AuthenticationFailed(format!("{} {}", code, message)))
            },
            Err(e) => Err(e),
        }
    }

    /// `GETINFO keyword`, returning the value
    pub async fn get_info(&self, keyword: &str) -> Result<String> {
        let reply = self.send(&Command::GetInfo(keyword.to_string())).await?;
        reply
            .value(keyword)
            .map(str::to_string)
            .ok_or_else(|| Error::Protocol(format!("GETINFO reply missing {}", keyword)))
    }

    /// `GETCONF keyword`. `None` when the option is at its default.
    pub async fn get_conf(&self, keyword: &str) -> Result<Option<String>> {
        let reply = self.send(&Command::GetConf(keyword.to_string())).await?;
        Ok(reply.value(keyword).map(str::to_string))
    }

    /// Replace the event subscription set
    pub async fn set_events(&self, events: &[EventKind], extended: bool) -> Result<()> {
        self.send(&Command::SetEvents {
            events: events.to_vec(),
            extended,
        })
        .await?;
        Ok(())
    }

    /// `SIGNAL name`
    pub async fn signal(&self, name: &str) -> Result<()> {
        self.send(&Command::Signal(name.to_string())).await?;
        Ok(())
    }

    /// Version reported by the running Tor
    pub async fn tor_version(&self) -> Result<String> {
        self.get_info(STATUS_VERSION).await
    }
}

impl Drop for ControlConnection {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

fn lock(shared: &Mutex<Shared>) -> std::sync::MutexGuard<'_, Shared> {
    // A poisoned lock only means a panic elsewhere; the state is still usable
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn read_loop(mut reader: BufReader<OwnedReadHalf>, shared: Arc<Mutex<Shared>>) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("Tor control connection reached EOF");
                break;
            },
            Ok(_) => {},
            Err(e) => {
                warn!("Tor control connection read failed: {}", e);
                break;
            },
        }

        let text = line.trim_end_matches(['\r', '\n']);
        debug!("Tor -> [{}]", text);
        route_line(&shared, text);
    }

    let mut shared = lock(&shared);
    if let Some(in_flight) = shared.in_flight.take() {
        let _ = in_flight.reply_tx.send(Err(Error::Disconnected));
    }
    shared.events = None;
}

fn route_line(shared: &Mutex<Shared>, text: &str) {
    let mut shared = lock(shared);

    if let Some(block) = shared.event_block.as_mut() {
        if text == "." {
            if let Some(block) = shared.event_block.take() {
                broadcast_event(&shared, block);
            }
        } else {
            block.push('\n');
            block.push_str(text.strip_prefix('.').filter(|d| d.starts_with('.')).unwrap_or(text));
        }
        return;
    }

    if let Some(in_flight) = shared.in_flight.as_mut() {
        match in_flight.pending.feed(text) {
            Feed::Finished => {
                if let Some(done) = shared.in_flight.take() {
                    let _ = done.reply_tx.send(done.pending.finish());
                }
                return;
            },
            Feed::Processed => return,
            Feed::NotProcessed => {},
        }
    }

    match ReplyLine::parse(text) {
        Some(line) if line.response_type() == ResponseType::Asynchronous => {
            if line.separator == Separator::Data {
                // Delivered whole once the closing "." arrives
                shared.event_block = Some(text.to_string());
            } else {
                broadcast_event(&shared, text.to_string());
            }
        },
        _ => debug!("Dropping unsolicited control line: {}", text),
    }
}

fn broadcast_event(shared: &Shared, event: String) {
    if let Some(events) = &shared.events {
        // No subscribers is fine
        let _ = events.send(event);
    }
}
