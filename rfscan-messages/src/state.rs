use std::path::PathBuf;
use std::time::Duration;

/// Base URL of the scanner server when none is given.
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5001";

/// Path of the scan event stream, relative to the server base URL.
pub const STREAM_PATH: &str = "/scan/stream";

/// Current state of the engine, sent whenever a source is (re)opened.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Human readable description of where frames come from
    pub endpoint: String,
    /// Current source configuration
    pub source_config: SourceConfig,
}

/// Where scan frames come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    /// Subscribe to the server's scan event stream.
    Stream {
        server: String,
        reconnect: ReconnectPolicy,
    },
    /// Replay scan logs from a directory, looping.
    Replay { dir: PathBuf, interval: Duration },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Stream {
            server: DEFAULT_SERVER.to_string(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SourceConfig {
    /// The server base URL, if this source talks to one.
    pub fn server(&self) -> Option<&str> {
        match self {
            SourceConfig::Stream { server, .. } => Some(server),
            SourceConfig::Replay { .. } => None,
        }
    }
}

/// When and how often to reopen a dropped stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry. A server `retry:` field replaces it.
    pub initial_delay: Duration,
    /// Upper bound for the delay between retries.
    pub max_delay: Duration,
    /// Growth factor applied to the delay after each failed attempt.
    pub multiplier: u32,
    /// Give up after this many consecutive failed attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
            max_attempts: None,
        }
    }
}
