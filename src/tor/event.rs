//! Asynchronous control port events
//!
//! Tor reports events as `650` lines once subscribed with SETEVENTS.
//! Only STATUS_* events are parsed here; everything else is passed through
//! as raw text.

use std::collections::HashMap;
use std::fmt;

/// Event names accepted by SETEVENTS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Circuit,
    Stream,
    OrConnection,
    Bandwidth,
    LogDebug,
    LogInfo,
    LogNotice,
    LogWarn,
    LogError,
    NewDescriptor,
    AddressMap,
    DescriptorsUploaded,
    DescriptorChanged,
    StatusGeneral,
    StatusServer,
    StatusClient,
    Guard,
    NetworkStatus,
    StreamBandwidth,
    ClientsSeen,
    NewConsensus,
    BuildTimeoutSet,
    ConfChanged,
    CircuitMinor,
    TransportLaunched,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Circuit => "CIRC",
            EventKind::Stream => "STREAM",
            EventKind::OrConnection => "ORCONN",
            EventKind::Bandwidth => "BW",
            EventKind::LogDebug => "DEBUG",
            EventKind::LogInfo => "INFO",
            EventKind::LogNotice => "NOTICE",
            EventKind::LogWarn => "WARN",
            EventKind::LogError => "ERR",
            EventKind::NewDescriptor => "NEWDESC",
            EventKind::AddressMap => "ADDRMAP",
            EventKind::DescriptorsUploaded => "AUTHDIR_NEWDESCS",
            EventKind::DescriptorChanged => "DESCCHANGED",
            EventKind::StatusGeneral => "STATUS_GENERAL",
            EventKind::StatusServer => "STATUS_SERVER",
            EventKind::StatusClient => "STATUS_CLIENT",
            EventKind::Guard => "GUARD",
            EventKind::NetworkStatus => "NS",
            EventKind::StreamBandwidth => "STREAM_BW",
            EventKind::ClientsSeen => "CLIENTS_SEEN",
            EventKind::NewConsensus => "NEWCONSENSUS",
            EventKind::BuildTimeoutSet => "BUILDTIMEOUT_SET",
            EventKind::ConfChanged => "CONF_CHANGED",
            EventKind::CircuitMinor => "CIRC_MINOR",
            EventKind::TransportLaunched => "TRANSPORT_LAUNCHED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which STATUS_* event a line carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusType {
    General,
    Client,
    Server,
    Unknown,
}

/// Severity keyword of a status report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Notice,
    Warn,
    Err,
}

/// Parsed body of a status report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusData {
    pub severity: Severity,
    /// e.g. BOOTSTRAP, CIRCUIT_ESTABLISHED
    pub action: String,
    pub arguments: HashMap<String, String>,
}

impl StatusData {
    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).map(String::as_str)
    }
}

/// A `650 STATUS_*` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub status_type: StatusType,
    pub data: StatusData,
}

const STATUS_PREFIX: &str = "650 STATUS_";

impl StatusEvent {
    /// Parse a raw event line. Returns `None` for other events or when the
    /// body is not a well-formed status report.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let head = line.get(..STATUS_PREFIX.len())?;
        if !head.eq_ignore_ascii_case(STATUS_PREFIX) {
            return None;
        }
        let rest = &line[STATUS_PREFIX.len()..];

        let (kind, body) = rest.split_once(' ').unwrap_or((rest, ""));
        let status_type = match kind.to_ascii_uppercase().as_str() {
            "GENERAL" => StatusType::General,
            "CLIENT" => StatusType::Client,
            "SERVER" => StatusType::Server,
            _ => StatusType::Unknown,
        };

        let data = parse_status(body)?;
        Some(Self { status_type, data })
    }

    pub fn action(&self) -> &str {
        &self.data.action
    }
}

/// Parse `SEVERITY ACTION [KEY=VALUE ...]`, the body shared by STATUS_*
/// events and the `status/bootstrap-phase` GETINFO value.
pub fn parse_status(text: &str) -> Option<StatusData> {
    let text = text.trim();
    let (severity_word, rest) = text.split_once(' ').unwrap_or((text, ""));
    let severity = match severity_word.to_ascii_uppercase().as_str() {
        "NOTICE" => Severity::Notice,
        "WARN" => Severity::Warn,
        "ERR" => Severity::Err,
        _ => return None,
    };

    let rest = rest.trim_start();
    let (action, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));

    let mut arguments = HashMap::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let (key, after_key) = rest.split_once('=')?;
        if key.is_empty() || key.contains(' ') {
            return None;
        }
        let (value, remaining) = if let Some(quoted) = after_key.strip_prefix('"') {
            take_quoted(quoted)?
        } else {
            let end = after_key.find(' ').unwrap_or(after_key.len());
            (after_key[..end].to_string(), &after_key[end..])
        };
        arguments.insert(key.to_string(), value);
        rest = remaining;
    }

    Some(StatusData {
        severity,
        action: action.to_string(),
        arguments,
    })
}

/// Read a quoted string body (opening quote already consumed), honouring
/// backslash escapes. Returns the value and what follows the closing quote.
fn take_quoted(text: &str) -> Option<(String, &str)> {
    let mut value = String::new();
    let mut chars = text.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next()?;
                value.push(escaped);
            },
            '"' => return Some((value, &text[idx + 1..])),
            other => value.push(other),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bootstrap_event() {
        let event = StatusEvent::parse(
            "650 STATUS_CLIENT NOTICE BOOTSTRAP PROGRESS=45 TAG=requesting_descriptors SUMMARY=\"Asking for relay descriptors\"",
        )
        .unwrap();
        assert_eq!(event.status_type, StatusType::Client);
        assert_eq!(event.data.severity, Severity::Notice);
        assert_eq!(event.action(), "BOOTSTRAP");
        assert_eq!(event.data.argument("PROGRESS"), Some("45"));
        assert_eq!(event.data.argument("TAG"), Some("requesting_descriptors"));
        assert_eq!(
            event.data.argument("SUMMARY"),
            Some("Asking for relay descriptors")
        );
    }

    #[test]
    fn test_parse_circuit_established() {
        let event =
            StatusEvent::parse("650 STATUS_CLIENT NOTICE CIRCUIT_ESTABLISHED\r\n").unwrap();
        assert_eq!(event.action(), "CIRCUIT_ESTABLISHED");
        assert!(event.data.arguments.is_empty());
    }

    #[test]
    fn test_case_insensitive_type_and_severity() {
        let event = StatusEvent::parse("650 status_general warn CLOCK_SKEW SKEW=-3600").unwrap();
        assert_eq!(event.status_type, StatusType::General);
        assert_eq!(event.data.severity, Severity::Warn);
        assert_eq!(event.data.argument("SKEW"), Some("-3600"));
    }

    #[test]
    fn test_non_status_events_ignored() {
        assert!(StatusEvent::parse("650 CIRC 1 BUILT").is_none());
        assert!(StatusEvent::parse("250 OK").is_none());
    }

    #[test]
    fn test_missing_severity_rejected() {
        assert!(parse_status("BOOTSTRAP PROGRESS=10").is_none());
        assert!(StatusEvent::parse("650 STATUS_CLIENT BOOTSTRAP PROGRESS=10").is_none());
    }

    #[test]
    fn test_quoted_value_with_escapes() {
        let data = parse_status(r#"ERR BAD_THING REASON="say \"hi\" now" CODE=7"#).unwrap();
        assert_eq!(data.severity, Severity::Err);
        assert_eq!(data.argument("REASON"), Some(r#"say "hi" now"#));
        assert_eq!(data.argument("CODE"), Some("7"));
    }

    #[test]
    fn test_unterminated_quote_rejected() {
        assert!(parse_status(r#"NOTICE BOOTSTRAP SUMMARY="never closed"#).is_none());
    }

    #[test]
    fn test_bootstrap_phase_value() {
        let data = parse_status(
            "NOTICE BOOTSTRAP PROGRESS=100 TAG=done SUMMARY=\"Done\"",
        )
        .unwrap();
        assert_eq!(data.argument("PROGRESS"), Some("100"));
        assert_eq!(data.argument("SUMMARY"), Some("Done"));
    }

    #[test]
    fn test_event_names() {
        assert_eq!(EventKind::StatusClient.as_str(), "STATUS_CLIENT");
        assert_eq!(EventKind::CircuitMinor.to_string(), "CIRC_MINOR");
        assert_eq!(EventKind::DescriptorsUploaded.as_str(), "AUTHDIR_NEWDESCS");
    }
}
