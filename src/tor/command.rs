//! Control port commands and reply accumulation

use super::event::EventKind;
use super::reply::{ReplyLine, ResponseType, Separator};
use crate::error::{Error, Result};

/// Line terminator on the control port
pub const CRLF: &str = "\r\n";

/// GETINFO keyword for the current bootstrap phase
pub const STATUS_BOOTSTRAP_PHASE: &str = "status/bootstrap-phase";

/// GETINFO keyword for the Tor version
pub const STATUS_VERSION: &str = "version";

/// A command sent to the control port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `AUTHENTICATE [secret]`, the secret being hex or a quoted password
    Authenticate(String),
    GetConf(String),
    GetInfo(String),
    /// `SIGNAL <name>`, e.g. NEWNYM or SHUTDOWN
    Signal(String),
    SetEvents {
        events: Vec<EventKind>,
        extended: bool,
    },
}

impl Command {
    /// The command text without line terminator
    pub fn line(&self) -> String {
        match self {
            Command::Authenticate(secret) if secret.is_empty() => "AUTHENTICATE".to_string(),
            Command::Authenticate(secret) => format!("AUTHENTICATE {}", secret),
            Command::GetConf(keyword) => format!("GETCONF {}", keyword),
            Command::GetInfo(keyword) => format!("GETINFO {}", keyword),
            Command::Signal(name) => format!("SIGNAL {}", name),
            Command::SetEvents { events, extended } => {
                let mut line = String::from("SETEVENTS");
                if !events.is_empty() {
                    if *extended {
                        line.push_str(" EXTENDED");
                    }
                    for event in events {
                        line.push(' ');
                        line.push_str(event.as_str());
                    }
                }
                line
            },
        }
    }

    /// The command as written to the socket
    pub fn wire(&self) -> String {
        format!("{}{}", self.line(), CRLF)
    }

    /// Text safe to put in logs
    pub fn redacted(&self) -> String {
        match self {
            Command::Authenticate(secret) if !secret.is_empty() => {
                "AUTHENTICATE [REDACTED]".to_string()
            },
            other => other.line(),
        }
    }
}

/// What happened to a line fed to a [`PendingReply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// Not part of this reply
    NotProcessed,
    /// Consumed, reply still incomplete
    Processed,
    /// Consumed, reply complete
    Finished,
}

/// Accumulates the lines of one reply
#[derive(Debug, Default)]
pub struct PendingReply {
    code: Option<u16>,
    in_data_block: bool,
    /// At least one data line has been appended to the current block
    data_started: bool,
    lines: Vec<String>,
}

impl PendingReply {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a line to this reply
    pub fn feed(&mut self, raw: &str) -> Feed {
        let raw = raw.trim_end_matches(['\r', '\n']);

        if self.in_data_block {
            if raw == "." {
                self.in_data_block = false;
            } else {
                // Leading dots are doubled inside data blocks
                let data = raw.strip_prefix('.').filter(|d| d.starts_with('.')).unwrap_or(raw);
                if let Some(last) = self.lines.last_mut() {
                    if self.data_started {
                        last.push('\n');
                    }
                    last.push_str(data);
                }
                self.data_started = true;
            }
            return Feed::Processed;
        }

        let Some(line) = ReplyLine::parse(raw) else {
            return Feed::NotProcessed;
        };
        match line.response_type() {
            ResponseType::Success
            | ResponseType::TemporaryNegative
            | ResponseType::PermanentNegative => {},
            ResponseType::Asynchronous | ResponseType::Unknown => return Feed::NotProcessed,
        }

        self.code = Some(line.code);
        self.lines.push(line.text.to_string());

        match line.separator {
            Separator::End => Feed::Finished,
            Separator::Mid => Feed::Processed,
            Separator::Data => {
                self.in_data_block = true;
                self.data_started = false;
                Feed::Processed
            },
        }
    }

    /// Turn the accumulated lines into a reply, failing on negative codes
    pub fn finish(self) -> Result<Reply> {
        let code = self
            .code
            .ok_or_else(|| Error::Protocol("reply finished without a status line".into()))?;
        let reply = Reply {
            code,
            lines: self.lines,
        };
        match ResponseType::from_code(code) {
            ResponseType::Success => Ok(reply),
            _ => Err(Error::Command {
                code,
                message: reply.lines.join(" "),
            }),
        }
    }
}

/// A complete, successful reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    /// Value for `keyword` in a `keyword=value` reply (GETINFO, GETCONF).
    /// Data blocks are joined with newlines.
    pub fn value(&self, keyword: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| {
            let (key, value) = line.split_once('=')?;
            key.eq_ignore_ascii_case(keyword).then_some(value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(lines: &[&str]) -> (PendingReply, Vec<Feed>) {
        let mut pending = PendingReply::new();
        let feeds = lines.iter().map(|l| pending.feed(l)).collect();
        (pending, feeds)
    }

    #[test]
    fn test_command_lines() {
        assert_eq!(Command::Authenticate(String::new()).line(), "AUTHENTICATE");
        assert_eq!(
            Command::Authenticate("abcd".into()).wire(),
            "AUTHENTICATE abcd\r\n"
        );
        assert_eq!(
            Command::GetInfo(STATUS_BOOTSTRAP_PHASE.into()).line(),
            "GETINFO status/bootstrap-phase"
        );
        assert_eq!(Command::GetConf("SocksPort".into()).line(), "GETCONF SocksPort");
        assert_eq!(Command::Signal("NEWNYM".into()).line(), "SIGNAL NEWNYM");
    }

    #[test]
    fn test_set_events_line() {
        let cmd = Command::SetEvents {
            events: vec![EventKind::StatusClient],
            extended: false,
        };
        assert_eq!(cmd.line(), "SETEVENTS STATUS_CLIENT");

        let cmd = Command::SetEvents {
            events: vec![EventKind::Circuit, EventKind::Bandwidth],
            extended: true,
        };
        assert_eq!(cmd.line(), "SETEVENTS EXTENDED CIRC BW");

        // EXTENDED is meaningless without events
        let cmd = Command::SetEvents {
            events: vec![],
            extended: true,
        };
        assert_eq!(cmd.line(), "SETEVENTS");
    }

    #[test]
    fn test_redacted_hides_secret() {
        let cmd = Command::Authenticate("00112233".into());
        assert!(!cmd.redacted().contains("00112233"));
    }

    #[test]
    fn test_single_line_reply() {
        let (pending, feeds) = feed_all(&["250 OK"]);
        assert_eq!(feeds, vec![Feed::Finished]);
        let reply = pending.finish().unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(reply.lines, vec!["OK"]);
    }

    #[test]
    fn test_getinfo_single_value() {
        let (pending, feeds) = feed_all(&["250-version=0.4.8.10", "250 OK"]);
        assert_eq!(feeds, vec![Feed::Processed, Feed::Finished]);
        let reply = pending.finish().unwrap();
        assert_eq!(reply.value("version"), Some("0.4.8.10"));
        assert_eq!(reply.value("VERSION"), Some("0.4.8.10"));
        assert_eq!(reply.value("missing"), None);
    }

    #[test]
    fn test_getinfo_data_block() {
        let (pending, feeds) = feed_all(&[
            "250+config-text=",
            "SocksPort 9050",
            "..hidden",
            "ControlPort 9051",
            ".",
            "250 OK",
        ]);
        assert_eq!(
            feeds,
            vec![
                Feed::Processed,
                Feed::Processed,
                Feed::Processed,
                Feed::Processed,
                Feed::Processed,
                Feed::Finished
            ]
        );
        let reply = pending.finish().unwrap();
        assert_eq!(
            reply.value("config-text"),
            Some("SocksPort 9050\n.hidden\nControlPort 9051")
        );
    }

    #[test]
    fn test_data_block_keeps_lines_ending_in_equals() {
        let (pending, _) = feed_all(&[
            "250+md/id/x=",
            "onion-key",
            "MIGJAoGBAK==",
            "-----END RSA PUBLIC KEY-----",
            ".",
            "250 OK",
        ]);
        let reply = pending.finish().unwrap();
        assert_eq!(
            reply.value("md/id/x"),
            Some("onion-key\nMIGJAoGBAK==\n-----END RSA PUBLIC KEY-----")
        );
    }

    #[test]
    fn test_data_block_keeps_empty_lines() {
        let (pending, _) = feed_all(&["250+config-text=", "", "SocksPort 9050", "", ".", "250 OK"]);
        let reply = pending.finish().unwrap();
        assert_eq!(reply.value("config-text"), Some("\nSocksPort 9050\n"));
    }

    #[test]
    fn test_events_are_not_part_of_reply() {
        let mut pending = PendingReply::new();
        assert_eq!(
            pending.feed("650 STATUS_CLIENT NOTICE CIRCUIT_ESTABLISHED"),
            Feed::NotProcessed
        );
        assert_eq!(pending.feed("garbage"), Feed::NotProcessed);
        assert_eq!(pending.feed("250 OK"), Feed::Finished);
    }

    #[test]
    fn test_negative_reply_is_error() {
        let (pending, _) = feed_all(&["515 Authentication failed: Wrong length on authentication cookie."]);
        let err = pending.finish().unwrap_err();
        assert!(err.is_reply_code(515));
        assert!(err.to_string().contains("Authentication failed"));

        let (pending, _) = feed_all(&["451 Resource exhausted"]);
        assert!(pending.finish().unwrap_err().is_reply_code(451));
    }
}
