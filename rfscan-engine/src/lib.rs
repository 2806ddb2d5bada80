mod control;
mod decode;
mod reconnect;
mod replay;
mod sse;
mod stream;

use anyhow::Result;
use flume::{Receiver, Sender};
use log::{debug, info, warn};
use rfscan_messages::{Command, ConnectionState, EngineState, Event, SourceConfig};
use std::thread;
use std::time::{Duration, Instant};

pub use control::{ControlError, ScanControl};
pub use decode::{DecodeError, decode_frame};
pub use reconnect::{Backoff, CancelToken};
pub use replay::{ReplayError, list_scan_logs, load_scan_log};
pub use sse::{SseEvent, SseParser, SseReader};
pub use stream::{Connector, HttpConnector, StreamError, stream_url};

use control::{ControlCall, ControlRequest, spawn_control_worker};
use replay::ReplayWorker;
use stream::StreamWorker;

/// How long shutdown waits for a worker blocked on a quiet stream.
const WORKER_GRACE: Duration = Duration::from_secs(1);

/// The scan engine backend.
/// Owns the frame subscription and processes commands from the UI.
pub struct Engine {
    cmd_rx: Receiver<Command>,
    event_tx: Sender<Event>,
    current_config: SourceConfig,
    should_exit: bool,
}

impl Engine {
    /// Create a new Engine instance.
    pub fn new(
        cmd_rx: Receiver<Command>,
        event_tx: Sender<Event>,
        source_config: SourceConfig,
    ) -> Self {
        debug!("Constructing a new engine");
        Self {
            cmd_rx,
            event_tx,
            current_config: source_config,
            should_exit: false,
        }
    }

    /// Run the engine (blocking).
    /// Runs in a loop that reopens the subscription when the source changes.
    pub fn run(mut self) -> Result<()> {
        let control_tx = spawn_control_worker(self.event_tx.clone());
        while !self.should_exit {
            self.run_source_iteration(&control_tx)?;
        }
        Ok(())
    }

    fn run_source_iteration(&mut self, control_tx: &Sender<ControlRequest>) -> Result<()> {
        let state = EngineState {
            endpoint: describe(&self.current_config),
            source_config: self.current_config.clone(),
        };
        info!("Opening source {}", state.endpoint);
        self.event_tx.send(Event::StateSnapshot(state))?;

        let cancel_token = CancelToken::new();
        let worker_handle = match self.spawn_worker(cancel_token.clone()) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to open source: {:#}", e);
                self.event_tx
                    .send(Event::Connection(ConnectionState::Failed(e.to_string())))?;
                None
            }
        };

        self.process_commands(control_tx);

        // The worker sends nothing once this returns.
        cancel_token.cancel();
        if let Some(handle) = worker_handle {
            self.forward(Event::Connection(ConnectionState::Closed));
            join_worker(handle);
        }
        Ok(())
    }

    fn spawn_worker(&self, cancel_token: CancelToken) -> Result<thread::JoinHandle<()>> {
        let event_tx = self.event_tx.clone();
        let handle = match self.current_config.clone() {
            SourceConfig::Stream { server, reconnect } => {
                let connector = HttpConnector::new(&server)?;
                thread::spawn(move || {
                    StreamWorker::new(connector, reconnect, event_tx, cancel_token).run()
                })
            }
            SourceConfig::Replay { dir, interval } => thread::spawn(move || {
                ReplayWorker::new(dir, interval, event_tx, cancel_token).run()
            }),
        };
        Ok(handle)
    }

    /// Handle commands until the source changes or the engine stops.
    fn process_commands(&mut self, control_tx: &Sender<ControlRequest>) {
        loop {
            let msg = self.cmd_rx.recv_timeout(Duration::from_millis(100));
            if let Ok(command) = &msg {
                debug!("Engine received command: {:?}", command);
            }

            let call = match msg {
                Ok(Command::Stop) | Err(flume::RecvTimeoutError::Disconnected) => {
                    self.should_exit = true;
                    return;
                }
                Ok(Command::ChangeSource(new_config)) => {
                    self.current_config = new_config;
                    return;
                }
                Err(flume::RecvTimeoutError::Timeout) => continue,
                Ok(Command::StartScan) => ControlCall::StartScan,
                Ok(Command::StopScan) => ControlCall::StopScan,
                Ok(Command::RefreshStatus) => ControlCall::Status,
                Ok(Command::FetchLatest) => ControlCall::Latest,
                Ok(Command::FetchRecentLogs) => ControlCall::RecentLogs,
                Ok(Command::UpdateConfig(update)) => ControlCall::UpdateConfig(update),
                Ok(Command::UpdateLocation(update)) => ControlCall::UpdateLocation(update),
            };
            self.queue_control(control_tx, call);
        }
    }

    /// Hand a scanner API call for the current source's server to the control thread.
    fn queue_control(&self, control_tx: &Sender<ControlRequest>, call: ControlCall) {
        let Some(server) = self.current_config.server() else {
            self.forward(Event::ControlResult(Err(
                "no scanner server configured for this source".to_string(),
            )));
            return;
        };
        let request = ControlRequest {
            server: server.to_string(),
            call,
        };
        if control_tx.send(request).is_err() {
            warn!("Scanner request thread is gone");
            self.forward(Event::ControlResult(Err(
                "scanner requests are unavailable".to_string(),
            )));
        }
    }

    fn forward(&self, event: Event) {
        if self.event_tx.send(event).is_err() {
            debug!("UI is gone, dropping event");
        }
    }
}

fn describe(config: &SourceConfig) -> String {
    match config {
        SourceConfig::Stream { server, .. } => stream_url(server),
        SourceConfig::Replay { dir, .. } => format!("replay of {}", dir.display()),
    }
}

/// Wait for a cancelled worker. A worker blocked reading a quiet stream only
/// notices cancellation at its next event, so it is left to finish on its own;
/// its cancel token already keeps it from sending anything.
fn join_worker(handle: thread::JoinHandle<()>) {
    let deadline = Instant::now() + WORKER_GRACE;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            debug!("Source worker still blocked, detaching it");
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    if handle.join().is_err() {
        warn!("Source worker panicked");
    }
}
