mod average;
mod chart;
mod control_panel;
mod export;
mod state;

use std::time::Duration;

use control_panel::ExportRequest;
use rfscan_messages::{Command, Event};
use state::UiState;

pub use average::{DEFAULT_AVERAGE_PASSES, ScanAverage};
pub use chart::{CHART_ID, ChartState, Dataset};
pub use export::{export_csv, write_wwb_csv};

/// How often the UI wakes up to drain engine events when nothing else repaints.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Main application struct implementing the egui App trait.
pub struct RfScanApp {
    /// Receiver for events from engine
    event_rx: flume::Receiver<Event>,

    /// Local application state
    state: UiState,
}

impl RfScanApp {
    fn new(event_rx: flume::Receiver<Event>, cmd_tx: flume::Sender<Command>) -> Self {
        Self {
            event_rx,
            state: UiState::new(cmd_tx),
        }
    }

    fn export_if_requested(&mut self) {
        let Some(request) = self.state.control_panel.take_export_request() else {
            return;
        };
        let (frame, path) = match request {
            ExportRequest::Current(path) => (Some(self.state.chart.current_frame()), path),
            ExportRequest::Average(path) => (self.state.average.average(), path),
        };
        let result = match frame {
            Some(frame) => export_csv(&frame, &path)
                .map(|rows| format!("Wrote {} rows to {}", rows, path.display()))
                .map_err(|e| {
                    log::warn!("{:#}", e);
                    format!("{:#}", e)
                }),
            None => Err("No scans to average yet".to_string()),
        };
        self.state.control_panel.set_export_result(result);
    }
}

impl eframe::App for RfScanApp {
    fn update(&mut self, ctx: &eframe::egui::Context, _frame: &mut eframe::Frame) {
        // Pull events from engine, one at a time in arrival order
        while let Ok(event) = self.event_rx.try_recv() {
            self.state.handle_event(event);
        }

        if self.state.chart.take_redraw() {
            ctx.request_repaint();
        }
        ctx.request_repaint_after(EVENT_POLL_INTERVAL);

        // Right side panel for controls
        eframe::egui::SidePanel::right("control_panel")
            .default_width(250.0)
            .show(ctx, |ui| {
                ui.add(&mut self.state.control_panel);
            });
        self.state
            .average
            .set_passes(self.state.control_panel.average_passes());
        self.export_if_requested();

        // Central panel for the chart
        eframe::egui::CentralPanel::default().show(ctx, |ui| {
            let Some(engine_state) = &self.state.engine_state else {
                ui.centered_and_justified(|ui| {
                    ui.label("Waiting for engine connection...");
                });
                return;
            };

            ui.horizontal(|ui| {
                ui.label(&engine_state.endpoint);
                ui.separator();
                ui.label(format!("Frames: {}", self.state.frames_received));
                if let Some((frequency, level)) = self.state.chart.peak() {
                    ui.separator();
                    ui.label(format!("Peak: {} @ {}", level, frequency));
                }
            });
            if let Some(error) = &self.state.last_decode_error {
                ui.colored_label(ui.visuals().warn_fg_color, error);
            }
            ui.separator();

            ui.add(&mut self.state.chart);
        });
    }
}

/// Entry point for the UI module.
///
/// Runs the eframe application on the main thread (blocking).
pub fn run(event_rx: flume::Receiver<Event>, cmd_tx: flume::Sender<Command>) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 768.0])
            .with_title("RF Scan"),
        ..Default::default()
    };

    eframe::run_native(
        "RF Scan",
        options,
        Box::new(|_cc| Ok(Box::new(RfScanApp::new(event_rx, cmd_tx)))),
    )
    .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
