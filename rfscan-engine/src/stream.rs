use std::io::{BufRead, BufReader};
use std::time::Duration;

use flume::Sender;
use log::{debug, info, trace, warn};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use rfscan_messages::{ConnectionState, Event, ReconnectPolicy, STREAM_PATH};

use crate::decode::decode_frame;
use crate::reconnect::{Backoff, CancelToken, Halt, Outlet};
use crate::sse::{SseParser, SseReader};

const EVENT_STREAM: &str = "text/event-stream";

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("{url} is not an event stream (content type `{content_type}`)")]
    ContentType { url: String, content_type: String },

    #[error("stream read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens a byte stream carrying server-sent events.
pub trait Connector: Send {
    /// Open a new connection, resending the last seen event id if any.
    fn connect(
        &mut self,
        last_event_id: Option<&str>,
    ) -> Result<Box<dyn BufRead + Send>, StreamError>;
}

/// Full URL of the scan stream on `server`.
pub fn stream_url(server: &str) -> String {
    format!("{}{}", server.trim_end_matches('/'), STREAM_PATH)
}

/// Connects to the scan stream over HTTP.
pub struct HttpConnector {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpConnector {
    pub fn new(server: &str) -> Result<Self, StreamError> {
        // The body never ends on its own, so only connecting is bounded.
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(None::<Duration>)
            .build()
            .map_err(StreamError::Client)?;

        Ok(Self {
            client,
            url: stream_url(server),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for HttpConnector {
    fn connect(
        &mut self,
        last_event_id: Option<&str>,
    ) -> Result<Box<dyn BufRead + Send>, StreamError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(ACCEPT, EVENT_STREAM)
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id.filter(|id| !id.is_empty()) {
            request = request.header("Last-Event-ID", id);
        }

        let response = request.send().map_err(|source| StreamError::Request {
            url: self.url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status {
                url: self.url.clone(),
                status,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !content_type.starts_with(EVENT_STREAM) {
            return Err(StreamError::ContentType {
                url: self.url.clone(),
                content_type,
            });
        }

        Ok(Box::new(BufReader::new(response)))
    }
}

/// How a single connection ended.
enum Pump {
    /// The server closed the stream.
    Ended,
    Dropped(StreamError),
    Halted(Halt),
}

/// Keeps a scan stream subscription alive and forwards decoded frames.
///
/// Once cancelled the worker sends nothing more, not even a final state; the
/// engine reports the subscription as closed.
pub(crate) struct StreamWorker<C> {
    connector: C,
    backoff: Backoff,
    last_event_id: Option<String>,
    outlet: Outlet,
}

impl<C: Connector> StreamWorker<C> {
    pub fn new(
        connector: C,
        policy: ReconnectPolicy,
        event_tx: Sender<Event>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            connector,
            backoff: Backoff::new(policy),
            last_event_id: None,
            outlet: Outlet::new(event_tx, cancel),
        }
    }

    /// Run until cancelled, the receiver goes away or reconnect attempts run out.
    pub fn run(mut self) {
        match self.subscribe() {
            Ok(()) => {}
            Err(Halt::Cancelled) => debug!("Scan stream cancelled"),
            Err(Halt::ReceiverGone) => debug!("Scan stream has no listener, stopping"),
        }
    }

    fn subscribe(&mut self) -> Result<(), Halt> {
        self.outlet.connection(ConnectionState::Connecting)?;

        loop {
            self.outlet.ensure_open()?;

            match self.connector.connect(self.last_event_id.as_deref()) {
                Ok(reader) => {
                    info!("Scan stream connected");
                    self.backoff.reset();
                    self.outlet.connection(ConnectionState::Connected)?;
                    match self.pump(reader) {
                        Pump::Ended => info!("Scan stream ended by server"),
                        Pump::Dropped(e) => warn!("Scan stream dropped: {}", e),
                        Pump::Halted(halt) => return Err(halt),
                    }
                }
                Err(e) => warn!("Scan stream connection failed: {}", e),
            }

            let Some(delay) = self.backoff.next_delay() else {
                let reason = format!(
                    "gave up after {} failed attempts",
                    self.backoff.attempt()
                );
                warn!("Scan stream {}", reason);
                return self.outlet.connection(ConnectionState::Failed(reason));
            };

            let attempt = self.backoff.attempt();
            debug!("Reconnecting in {:?} (attempt {})", delay, attempt);
            self.outlet
                .connection(ConnectionState::Reconnecting { attempt, delay })?;
            self.outlet.sleep(delay)?;
        }
    }

    fn pump(&mut self, reader: Box<dyn BufRead + Send>) -> Pump {
        let parser = SseParser::with_last_event_id(self.last_event_id.clone());
        let mut reader = SseReader::with_parser(reader, parser);

        loop {
            if let Err(halt) = self.outlet.ensure_open() {
                return Pump::Halted(halt);
            }

            // Blocks until the server sends something, possibly long after a cancel.
            let next = reader.next_event();
            if let Err(halt) = self.outlet.ensure_open() {
                return Pump::Halted(halt);
            }

            if let Some(retry) = reader.take_retry() {
                debug!("Server requested retry delay {:?}", retry);
                self.backoff.set_base(retry);
            }
            self.last_event_id = reader.last_event_id().map(str::to_owned);

            let event = match next {
                Ok(Some(event)) => event,
                Ok(None) => return Pump::Ended,
                Err(e) => return Pump::Dropped(e.into()),
            };
            if !event.is_message() {
                trace!("Skipping `{}` event", event.event_type);
                continue;
            }

            let sent = match decode_frame(&event.data) {
                Ok(Some(frame)) => self.outlet.send(Event::Frame(frame)),
                Ok(None) => {
                    trace!("Ignoring payload without frequencies/values");
                    Ok(())
                }
                Err(e) => {
                    warn!("{}", e);
                    self.outlet.send(Event::DecodeFailed(e.to_string()))
                }
            };
            if let Err(halt) = sent {
                return Pump::Halted(halt);
            }
        }
    }
}
