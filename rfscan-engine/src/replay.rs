use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flume::Sender;
use log::{debug, info, warn};
use rfscan_messages::{ConnectionState, Event, ScanFrame, ScanLog};

use crate::reconnect::{CancelToken, Halt, Outlet};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("failed to read scan log directory {}: {source}", dir.display())]
    ReadDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no scan logs (*.json) in {}", .0.display())]
    Empty(PathBuf),

    #[error("failed to read scan log {}: {source}", path.display())]
    ReadLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed scan log {}: {source}", path.display())]
    ParseLog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// All `*.json` scan logs in `dir`, in filename order.
///
/// Log names carry their timestamp, so filename order is chronological.
pub fn list_scan_logs(dir: &Path) -> Result<Vec<PathBuf>, ReplayError> {
    let entries = fs::read_dir(dir).map_err(|source| ReplayError::ReadDir {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut logs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    logs.sort();

    if logs.is_empty() {
        return Err(ReplayError::Empty(dir.to_path_buf()));
    }
    Ok(logs)
}

/// Load one scan log as a chart frame.
pub fn load_scan_log(path: &Path) -> Result<ScanFrame, ReplayError> {
    let text = fs::read_to_string(path).map_err(|source| ReplayError::ReadLog {
        path: path.to_path_buf(),
        source,
    })?;
    let log: ScanLog = serde_json::from_str(&text).map_err(|source| ReplayError::ParseLog {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(log.into_frame())
}

/// Plays scan logs back as if they arrived on the stream, looping forever.
pub(crate) struct ReplayWorker {
    dir: PathBuf,
    interval: Duration,
    outlet: Outlet,
}

impl ReplayWorker {
    pub fn new(dir: PathBuf, interval: Duration, event_tx: Sender<Event>, cancel: CancelToken) -> Self {
        Self {
            dir,
            interval,
            outlet: Outlet::new(event_tx, cancel),
        }
    }

    pub fn run(self) {
        match self.replay() {
            Ok(()) => {}
            Err(Halt::Cancelled) => debug!("Replay of {} cancelled", self.dir.display()),
            Err(Halt::ReceiverGone) => debug!("Replay has no listener, stopping"),
        }
    }

    fn replay(&self) -> Result<(), Halt> {
        self.outlet.connection(ConnectionState::Connecting)?;

        let logs = match list_scan_logs(&self.dir) {
            Ok(logs) => logs,
            Err(e) => {
                warn!("{}", e);
                return self.outlet.connection(ConnectionState::Failed(e.to_string()));
            }
        };
        info!("Replaying {} scan logs from {}", logs.len(), self.dir.display());
        self.outlet.connection(ConnectionState::Connected)?;

        loop {
            let mut replayed = 0;
            for path in &logs {
                match load_scan_log(path) {
                    Ok(frame) => {
                        debug!("Replaying {}", path.display());
                        self.outlet.send(Event::Frame(frame))?;
                        replayed += 1;
                        self.outlet.sleep(self.interval)?;
                    }
                    Err(e) => warn!("Skipping {}", e),
                }
            }

            if replayed == 0 {
                let reason = format!("no readable scan logs in {}", self.dir.display());
                warn!("Replay {}", reason);
                return self.outlet.connection(ConnectionState::Failed(reason));
            }
        }
    }
}
