use std::io::{self, BufRead};
use std::time::Duration;

/// Event type delivered when a block carries no `event:` field.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event_type: String,
    pub data: String,
    /// Last event id seen on the stream when this event was dispatched.
    pub id: Option<String>,
}

impl SseEvent {
    /// Whether an `onmessage`-style consumer would see this event.
    pub fn is_message(&self) -> bool {
        self.event_type == DEFAULT_EVENT_TYPE
    }
}

/// Field-level parser for the `text/event-stream` format.
///
/// Fed one line at a time (terminator already stripped). A blank line
/// dispatches the buffered event.
#[derive(Debug, Default)]
pub struct SseParser {
    event_type: String,
    data: String,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the id remembered from a previous connection.
    pub fn with_last_event_id(last_event_id: Option<String>) -> Self {
        Self {
            last_event_id,
            ..Self::default()
        }
    }

    pub fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = value.to_string(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.retry = Some(Duration::from_millis(ms));
                    }
                }
            }
            _ => {}
        }
        None
    }

    /// Reconnection delay requested by the server since the last call.
    pub fn take_retry(&mut self) -> Option<Duration> {
        self.retry.take()
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_type = std::mem::take(&mut self.event_type);
        if self.data.is_empty() {
            return None;
        }

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }

        Some(SseEvent {
            event_type: if event_type.is_empty() {
                DEFAULT_EVENT_TYPE.to_string()
            } else {
                event_type
            },
            data,
            id: self.last_event_id.clone(),
        })
    }
}

/// Splits a byte stream into event-stream lines and feeds them to an [`SseParser`].
///
/// Lines may end in `\n`, `\r\n` or a lone `\r`. An unterminated trailing line
/// and any undispatched event are dropped at end of stream.
pub struct SseReader<R> {
    reader: R,
    parser: SseParser,
    line: Vec<u8>,
    pending_cr: bool,
    at_start: bool,
}

impl<R: BufRead> SseReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_parser(reader, SseParser::new())
    }

    pub fn with_parser(reader: R, parser: SseParser) -> Self {
        Self {
            reader,
            parser,
            line: Vec::new(),
            pending_cr: false,
            at_start: true,
        }
    }

    /// Read until the next dispatched event. `Ok(None)` means end of stream.
    pub fn next_event(&mut self) -> io::Result<Option<SseEvent>> {
        while self.read_line()? {
            let mut text = String::from_utf8_lossy(&self.line).into_owned();
            if self.at_start {
                self.at_start = false;
                if let Some(stripped) = text.strip_prefix('\u{feff}') {
                    text = stripped.to_string();
                }
            }
            if let Some(event) = self.parser.feed_line(&text) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    pub fn take_retry(&mut self) -> Option<Duration> {
        self.parser.take_retry()
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.parser.last_event_id()
    }

    fn read_line(&mut self) -> io::Result<bool> {
        self.line.clear();
        loop {
            let available = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                return Ok(false);
            }

            // \r\n split across two reads
            if self.pending_cr {
                self.pending_cr = false;
                if available[0] == b'\n' {
                    self.reader.consume(1);
                    continue;
                }
            }

            match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(pos) => {
                    self.line.extend_from_slice(&available[..pos]);
                    let terminator = available[pos];
                    self.reader.consume(pos + 1);
                    self.pending_cr = terminator == b'\r';
                    return Ok(true);
                }
                None => {
                    let len = available.len();
                    self.line.extend_from_slice(available);
                    self.reader.consume(len);
                }
            }
        }
    }
}
