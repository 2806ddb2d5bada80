use crate::{ConfigUpdate, LocationUpdate, SourceConfig};

/// Commands sent from the UI to the engine.
#[derive(Debug)]
pub enum Command {
    /// Close the active subscription and stop the engine.
    Stop,
    /// Change the frame source. Engine will close the current subscription and reopen.
    ChangeSource(SourceConfig),
    /// Ask the scanner server to begin a scan.
    StartScan,
    /// Ask the scanner server to stop the running scan.
    StopScan,
    /// Fetch the scanner server's status document.
    RefreshStatus,
    /// Fetch the most recent logged scan and push it to the chart.
    FetchLatest,
    /// Fetch the last few logged scans.
    FetchRecentLogs,
    /// Change the scanner's band or test mode.
    UpdateConfig(ConfigUpdate),
    /// Change the venue details the scanner stamps on its logs.
    UpdateLocation(LocationUpdate),
}
