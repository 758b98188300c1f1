//! Subset of the [STOMP 1.2] wire format used by the signaling transport.
//!
//! [STOMP 1.2]: https://stomp.github.io/stomp-specification-1.2.html

use derive_more::Display;

/// Command of a STOMP [`Frame`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Command {
    /// Client requests a session.
    #[display(fmt = "CONNECT")]
    Connect,

    /// Server accepted the session.
    #[display(fmt = "CONNECTED")]
    Connected,

    /// Client publishes to a destination.
    #[display(fmt = "SEND")]
    Send,

    /// Client subscribes to a destination.
    #[display(fmt = "SUBSCRIBE")]
    Subscribe,

    /// Client cancels a subscription.
    #[display(fmt = "UNSUBSCRIBE")]
    Unsubscribe,

    /// Server delivers a message of a subscription.
    #[display(fmt = "MESSAGE")]
    Message,

    /// Server acknowledges a client frame.
    #[display(fmt = "RECEIPT")]
    Receipt,

    /// Server reports an error, closing the session after it.
    #[display(fmt = "ERROR")]
    Error,

    /// Client ends the session.
    #[display(fmt = "DISCONNECT")]
    Disconnect,
}

impl Command {
    /// Parses a [`Command`] from its wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "CONNECT" | "STOMP" => Self::Connect,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            "DISCONNECT" => Self::Disconnect,
            _ => return None,
        })
    }

    /// Indicates whether header values of this [`Command`] are escaped.
    ///
    /// `CONNECT` and `CONNECTED` frames are sent verbatim for compatibility
    /// with STOMP 1.0.
    fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

/// Errors of decoding a STOMP [`Frame`].
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum ParseError {
    /// Frame starts with an unknown command.
    #[display(fmt = "Unknown STOMP command `{}`", _0)]
    UnknownCommand(String),

    /// Frame has no blank line separating headers from body.
    #[display(fmt = "STOMP frame has no header block terminator")]
    UnterminatedHeaders,

    /// Header line has no `:` separator.
    #[display(fmt = "Malformed STOMP header `{}`", _0)]
    MalformedHeader(String),

    /// Header contains an undefined escape sequence.
    #[display(fmt = "Invalid escape sequence in STOMP header `{}`", _0)]
    InvalidEscape(String),

    /// `content-length` header is not a number or exceeds the body.
    #[display(fmt = "Invalid STOMP content-length `{}`", _0)]
    InvalidContentLength(String),

    /// Frame body is not terminated with a NUL octet.
    #[display(fmt = "STOMP frame is not NUL-terminated")]
    MissingTerminator,
}

/// Single STOMP frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    /// [`Command`] of this frame.
    pub command: Command,

    /// Headers in their wire order. Repeated headers are kept, the first
    /// occurrence wins on lookup.
    pub headers: Vec<(String, String)>,

    /// Body of this frame.
    pub body: String,
}

impl Frame {
    /// Creates a new [`Frame`] without headers and body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Appends the provided header.
    pub fn with_header<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the provided body.
    pub fn with_body<B: Into<String>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    /// Looks up the value of the header with the provided name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// `CONNECT` frame authenticating with the provided bearer token.
    pub fn connect(host: &str, token: &str) -> Self {
        Self::new(Command::Connect)
            .with_header("accept-version", "1.2")
            .with_header("host", host)
            .with_header("heart-beat", "0,0")
            .with_header("Authorization", format!("Bearer {}", token))
    }

    /// `SUBSCRIBE` frame to the provided destination.
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    /// `SEND` frame publishing the provided JSON body.
    pub fn send(destination: &str, body: String) -> Self {
        Self::new(Command::Send)
            .with_header("destination", destination)
            .with_header("content-type", "application/json")
            .with_header("content-length", body.len().to_string())
            .with_body(body)
    }

    /// `DISCONNECT` frame.
    #[inline]
    pub fn disconnect() -> Self {
        Self::new(Command::Disconnect)
    }

    /// Serializes this [`Frame`] into its wire form.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = format!("{}\n", self.command);
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parses a [`Frame`] from its wire form.
    ///
    /// Returns [`None`] for a heart-beat, which consists of bare EOLs only.
    ///
    /// # Errors
    ///
    /// With a [`ParseError`] if the input is not a valid frame.
    pub fn decode(raw: &str) -> Result<Option<Self>, ParseError> {
        let raw = raw.trim_start_matches(|c| c == '\n' || c == '\r');
        if raw.is_empty() {
            return Ok(None);
        }

        let (head, rest) =
            split_head(raw).ok_or(ParseError::UnterminatedHeaders)?;
        let mut lines = head.split('\n').map(|l| l.trim_end_matches('\r'));

        let name = lines.next().unwrap_or_default();
        let command = Command::parse(name)
            .ok_or_else(|| ParseError::UnknownCommand(name.to_owned()))?;
        let escape = command.escapes_headers();

        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::MalformedHeader(line.to_owned()))?;
            if escape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_owned(), value.to_owned()));
            }
        }

        let mut frame = Self {
            command,
            headers,
            body: String::new(),
        };

        let body = match frame.header("content-length") {
            Some(len) => {
                let invalid =
                    || ParseError::InvalidContentLength(len.to_owned());
                let len: usize = len.trim().parse().map_err(|_| invalid())?;
                let body = rest.get(..len).ok_or_else(invalid)?;
                if !rest[len..].starts_with('\0') {
                    return Err(ParseError::MissingTerminator);
                }
                body
            }
            None => {
                let end = rest.find('\0').ok_or(ParseError::MissingTerminator)?;
                &rest[..end]
            }
        };
        frame.body = body.to_owned();

        Ok(Some(frame))
    }
}

/// Splits the provided raw frame at the blank line ending its header
/// block.
fn split_head(raw: &str) -> Option<(&str, &str)> {
    let lf = raw.find("\n\n").map(|i| (i, 2));
    let crlf = raw.find("\n\r\n").map(|i| (i, 3));
    let (at, len) = match (lf, crlf) {
        (Some(a), Some(b)) => {
            if a.0 < b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => return None,
    };
    Some((&raw[..at], &raw[at + len..]))
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            _ => return Err(ParseError::InvalidEscape(value.to_owned())),
        }
    }
    Ok(out)
}
