use flume::Sender;
use log::{debug, trace};

use crate::average::ScanAverage;
use crate::chart::ChartState;
use crate::control_panel::ControlPanel;
use rfscan_messages::{Command, EngineState, Event};

/// Local UI state derived from engine events.
pub(super) struct UiState {
    /// Current engine state (from StateSnapshot)
    pub engine_state: Option<EngineState>,

    /// Chart contents
    pub chart: ChartState,

    /// Recent scans for the average export
    pub average: ScanAverage,

    /// Control panel widget state
    pub control_panel: ControlPanel,

    /// Frames applied to the chart since startup
    pub frames_received: u64,

    /// Most recent undecodable payload
    pub last_decode_error: Option<String>,
}

impl UiState {
    pub fn new(cmd_tx: Sender<Command>) -> Self {
        Self {
            engine_state: None,
            chart: ChartState::new(),
            average: ScanAverage::default(),
            control_panel: ControlPanel::new(cmd_tx),
            frames_received: 0,
            last_decode_error: None,
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::StateSnapshot(state) => {
                debug!("Engine opened {}", state.endpoint);
                self.control_panel
                    .update_from_engine_state(&state.source_config);
                self.engine_state = Some(state);
            }
            Event::Connection(connection) => {
                debug!("Connection: {}", connection);
                self.control_panel.connection = Some(connection);
            }
            Event::Frame(frame) => {
                trace!(
                    "Frame with {} labels / {} values",
                    frame.frequencies.len(),
                    frame.values.len()
                );
                self.average.push(frame.clone());
                self.chart.apply_frame(frame);
                self.frames_received += 1;
            }
            Event::RecentLogs(frames) => {
                debug!("Loaded {} recent scans", frames.len());
                let Some(newest) = frames.last().cloned() else {
                    self.control_panel.control_message =
                        Some(Err("The scanner has no scan logs yet".to_string()));
                    return;
                };
                self.control_panel.control_message =
                    Some(Ok(format!("Loaded {} recent scans", frames.len())));
                for frame in frames {
                    self.average.push(frame);
                }
                self.chart.apply_frame(newest);
                self.frames_received += 1;
            }
            Event::DecodeFailed(error) => {
                self.last_decode_error = Some(error);
            }
            Event::ServerStatus(status) => {
                self.control_panel.set_server_status(status);
            }
            Event::ControlResult(result) => {
                self.control_panel.control_message = Some(result);
            }
        }
    }
}
