//! Control protocol reply lines
//!
//! Every line Tor sends on the control port starts with a three digit
//! status code followed by a separator: `' '` ends a reply, `'-'` continues
//! it and `'+'` announces a data block terminated by a lone `.`.

/// Broad category of a reply code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Unknown,
    /// 2xx
    Success,
    /// 4xx
    TemporaryNegative,
    /// 5xx
    PermanentNegative,
    /// 6xx, i.e. an event
    Asynchronous,
}

impl ResponseType {
    /// Classify a status code
    pub fn from_code(code: u16) -> Self {
        match code {
            200..=299 => ResponseType::Success,
            400..=499 => ResponseType::TemporaryNegative,
            500..=599 => ResponseType::PermanentNegative,
            600..=699 => ResponseType::Asynchronous,
            _ => ResponseType::Unknown,
        }
    }

    /// Classify a raw line by its leading code
    pub fn of(line: &str) -> Self {
        ReplyLine::parse(line)
            .map(|reply| Self::from_code(reply.code))
            .unwrap_or(ResponseType::Unknown)
    }
}

/// Separator following the status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `' '` - last line of the reply
    End,
    /// `'-'` - more lines follow
    Mid,
    /// `'+'` - data block follows
    Data,
}

/// A single parsed reply line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine<'a> {
    pub code: u16,
    pub separator: Separator,
    pub text: &'a str,
}

impl<'a> ReplyLine<'a> {
    /// Parse `<code><sep><text>`. Returns `None` for lines without a
    /// three digit code.
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let digits = line.get(..3)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let code: u16 = digits.parse().ok()?;

        // A bare code with nothing after it is treated as a final line
        let (separator, text) = match line.as_bytes().get(3) {
            None => (Separator::End, ""),
            Some(b' ') => (Separator::End, &line[4..]),
            Some(b'-') => (Separator::Mid, &line[4..]),
            Some(b'+') => (Separator::Data, &line[4..]),
            Some(_) => return None,
        };

        Some(Self {
            code,
            separator,
            text,
        })
    }

    pub fn response_type(&self) -> ResponseType {
        ResponseType::from_code(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_codes() {
        assert_eq!(ResponseType::of("250 OK"), ResponseType::Success);
        assert_eq!(
            ResponseType::of("451 Resource exhausted"),
            ResponseType::TemporaryNegative
        );
        assert_eq!(
            ResponseType::of("515 Authentication failed"),
            ResponseType::PermanentNegative
        );
        assert_eq!(
            ResponseType::of("650 STATUS_CLIENT NOTICE CIRCUIT_ESTABLISHED"),
            ResponseType::Asynchronous
        );
        assert_eq!(ResponseType::of("."), ResponseType::Unknown);
        assert_eq!(ResponseType::of("hello"), ResponseType::Unknown);
        assert_eq!(ResponseType::of("150 weird"), ResponseType::Unknown);
    }

    #[test]
    fn test_parse_separators() {
        let line = ReplyLine::parse("250-version=0.4.8.10\r\n").unwrap();
        assert_eq!(line.code, 250);
        assert_eq!(line.separator, Separator::Mid);
        assert_eq!(line.text, "version=0.4.8.10");

        let line = ReplyLine::parse("250+info/names=").unwrap();
        assert_eq!(line.separator, Separator::Data);
        assert_eq!(line.text, "info/names=");

        let line = ReplyLine::parse("250 OK").unwrap();
        assert_eq!(line.separator, Separator::End);
        assert_eq!(line.text, "OK");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ReplyLine::parse("25").is_none());
        assert!(ReplyLine::parse("2x0 OK").is_none());
        assert!(ReplyLine::parse("250?OK").is_none());
    }
}
