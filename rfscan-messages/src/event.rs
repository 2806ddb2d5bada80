use std::time::Duration;

use crate::{EngineState, ScanFrame, ScanStatus};

/// Events sent from the engine to the UI.
#[derive(Debug)]
pub enum Event {
    /// Sent every time the engine (re)opens a source.
    StateSnapshot(EngineState),
    /// Subscription state changed.
    Connection(ConnectionState),
    /// A decoded scan frame, in arrival order.
    Frame(ScanFrame),
    /// A payload arrived that could not be decoded. The subscription stays open.
    DecodeFailed(String),
    /// Reply to `Command::RefreshStatus`, also sent after a config or location change.
    ServerStatus(ScanStatus),
    /// Reply to `Command::FetchRecentLogs`, oldest first.
    RecentLogs(Vec<ScanFrame>),
    /// Outcome of a scanner request: the server's message or the failure.
    ControlResult(Result<String, String>),
}

/// Lifecycle of a frame subscription as seen by the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
    Closed,
    Failed(String),
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting { attempt, delay } => {
                write!(f, "Reconnecting (attempt {attempt}, in {:.1} s)", delay.as_secs_f32())
            }
            Self::Closed => write!(f, "Closed"),
            Self::Failed(reason) => write!(f, "Failed: {reason}"),
        }
    }
}
