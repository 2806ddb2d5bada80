use std::thread;
use std::time::Duration;

use flume::Sender;
use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use rfscan_messages::{ConfigUpdate, Event, LocationUpdate, ScanFrame, ScanLog, ScanStatus};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with an `{"error": ...}` body.
    #[error("{0}")]
    Server(String),

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("unexpected response from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// `{"status": ...}` or `{"error": ...}`, the shape of every scanner reply.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerReply {
    status: Option<String>,
    error: Option<String>,
}

/// Blocking client for the scanner server's control API.
pub struct ScanControl {
    client: Client,
    server: String,
}

impl ScanControl {
    pub fn new(server: &str) -> Result<Self, ControlError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(ControlError::Client)?;

        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
        })
    }

    /// `GET /status`
    pub fn status(&self) -> Result<ScanStatus, ControlError> {
        let url = self.url("/status");
        let (status, body) = self.send(&url, self.client.get(&url))?;
        if !status.is_success() {
            return Err(server_error(&url, status, &body));
        }
        parse_body(&url, &body)
    }

    /// `POST /scan/start`, returning the server's status message.
    pub fn start_scan(&self) -> Result<String, ControlError> {
        let url = self.url("/scan/start");
        self.post_command(url.clone(), self.client.post(&url))
    }

    /// `POST /scan/stop`, returning the server's status message.
    pub fn stop_scan(&self) -> Result<String, ControlError> {
        let url = self.url("/scan/stop");
        self.post_command(url.clone(), self.client.post(&url))
    }

    /// `POST /update-config`
    pub fn update_config(&self, update: &ConfigUpdate) -> Result<String, ControlError> {
        let url = self.url("/update-config");
        self.post_command(url.clone(), self.client.post(&url).json(update))
    }

    /// `POST /update-location`
    pub fn update_location(&self, update: &LocationUpdate) -> Result<String, ControlError> {
        let url = self.url("/update-location");
        self.post_command(url.clone(), self.client.post(&url).json(update))
    }

    /// `GET /scan/latest`: the newest scan log, as a chart frame.
    pub fn latest(&self) -> Result<ScanFrame, ControlError> {
        let url = self.url("/scan/latest");
        let (status, body) = self.send(&url, self.client.get(&url))?;
        if !status.is_success() {
            return Err(server_error(&url, status, &body));
        }
        let log: ScanLog = parse_body(&url, &body)?;
        Ok(log.into_frame())
    }

    /// `GET /scan/logs`: the server's last few scan logs, oldest first.
    pub fn recent_logs(&self) -> Result<Vec<ScanFrame>, ControlError> {
        let url = self.url("/scan/logs");
        let (status, body) = self.send(&url, self.client.get(&url))?;
        if !status.is_success() {
            return Err(server_error(&url, status, &body));
        }
        let logs: Vec<ScanLog> = parse_body(&url, &body)?;
        // Served newest first
        Ok(logs.into_iter().rev().map(ScanLog::into_frame).collect())
    }

    fn post_command(&self, url: String, request: RequestBuilder) -> Result<String, ControlError> {
        let (status, body) = self.send(&url, request)?;

        // The server reports refusals like "already running" as 200 with an error body.
        match serde_json::from_str::<ServerReply>(&body) {
            Ok(ServerReply {
                error: Some(error), ..
            }) => Err(ControlError::Server(error)),
            _ if !status.is_success() => Err(ControlError::Status { url, status }),
            Ok(ServerReply {
                status: Some(message),
                ..
            }) => Ok(message),
            _ => Ok(body),
        }
    }

    fn send(&self, url: &str, request: RequestBuilder) -> Result<(StatusCode, String), ControlError> {
        debug!("Scanner request {}", url);
        let request_error = |source| ControlError::Request {
            url: url.to_string(),
            source,
        };
        let response = request.send().map_err(request_error)?;
        let status = response.status();
        let body = response.text().map_err(request_error)?;
        Ok((status, body))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }
}

fn server_error(url: &str, status: StatusCode, body: &str) -> ControlError {
    match serde_json::from_str::<ServerReply>(body) {
        Ok(ServerReply {
            error: Some(error), ..
        }) => ControlError::Server(error),
        _ => ControlError::Status {
            url: url.to_string(),
            status,
        },
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(url: &str, body: &str) -> Result<T, ControlError> {
    serde_json::from_str(body).map_err(|source| ControlError::Body {
        url: url.to_string(),
        source,
    })
}

/// A scanner API call queued by the engine.
#[derive(Debug)]
pub(crate) enum ControlCall {
    Status,
    StartScan,
    StopScan,
    Latest,
    RecentLogs,
    UpdateConfig(ConfigUpdate),
    UpdateLocation(LocationUpdate),
}

#[derive(Debug)]
pub(crate) struct ControlRequest {
    pub server: String,
    pub call: ControlCall,
}

/// Run scanner requests in order on their own thread, so a slow server never
/// holds up the engine's command loop. The thread exits once the returned
/// sender is dropped.
pub(crate) fn spawn_control_worker(event_tx: Sender<Event>) -> Sender<ControlRequest> {
    let (request_tx, request_rx) = flume::unbounded::<ControlRequest>();
    thread::spawn(move || {
        for request in request_rx.iter() {
            for event in run_call(&request.server, request.call) {
                if event_tx.send(event).is_err() {
                    debug!("UI is gone, stopping scanner requests");
                    return;
                }
            }
        }
    });
    request_tx
}

fn run_call(server: &str, call: ControlCall) -> Vec<Event> {
    let result = ScanControl::new(server).and_then(|control| match call {
        ControlCall::Status => control.status().map(|status| vec![Event::ServerStatus(status)]),
        ControlCall::StartScan => control
            .start_scan()
            .map(|message| vec![Event::ControlResult(Ok(message))]),
        ControlCall::StopScan => control
            .stop_scan()
            .map(|message| vec![Event::ControlResult(Ok(message))]),
        ControlCall::Latest => control.latest().map(|frame| vec![Event::Frame(frame)]),
        ControlCall::RecentLogs => control
            .recent_logs()
            .map(|frames| vec![Event::RecentLogs(frames)]),
        ControlCall::UpdateConfig(update) => control
            .update_config(&update)
            .map(|message| with_status(&control, message)),
        ControlCall::UpdateLocation(update) => control
            .update_location(&update)
            .map(|message| with_status(&control, message)),
    });

    result.unwrap_or_else(|e| {
        warn!("Scanner request failed: {}", e);
        vec![Event::ControlResult(Err(e.to_string()))]
    })
}

/// The server's reply followed by its refreshed status document.
fn with_status(control: &ScanControl, message: String) -> Vec<Event> {
    let mut events = vec![Event::ControlResult(Ok(message))];
    match control.status() {
        Ok(status) => events.push(Event::ServerStatus(status)),
        Err(e) => warn!("Could not refresh scanner status: {}", e),
    }
    events
}
