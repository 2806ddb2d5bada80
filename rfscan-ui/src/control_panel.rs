use eframe::egui::{ComboBox, DragValue, Response, TextEdit, Ui, Widget};
use flume::Sender;
use std::path::PathBuf;
use std::time::Duration;

use crate::average::DEFAULT_AVERAGE_PASSES;
use rfscan_messages::{
    Command, ConfigUpdate, ConnectionState, DEFAULT_SERVER, LocationUpdate, ReconnectPolicy,
    ScanStatus, SourceConfig,
};

/// A CSV export the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportRequest {
    /// The scan on the chart
    Current(PathBuf),
    /// The average of the recent scans
    Average(PathBuf),
}

/// Which source type is selected in the UI dropdown.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SourceType {
    Stream,
    Replay,
}

impl SourceType {
    fn label(&self) -> &'static str {
        match self {
            Self::Stream => "Scan Stream",
            Self::Replay => "Log Replay",
        }
    }

    fn from_config(config: &SourceConfig) -> Self {
        match config {
            SourceConfig::Stream { .. } => Self::Stream,
            SourceConfig::Replay { .. } => Self::Replay,
        }
    }
}

/// Control panel widget for the frame source, the scanner and CSV export.
pub struct ControlPanel {
    cmd_tx: Sender<Command>,
    pending_config: SourceConfig,
    has_pending_changes: bool,
    waiting_for_apply: bool,

    /// Latest subscription state reported by the engine
    pub connection: Option<ConnectionState>,
    /// Latest `/status` document
    server_status: Option<ScanStatus>,
    /// Outcome of the last scanner request
    pub control_message: Option<Result<String, String>>,

    city: String,
    venue: String,
    zip_code: String,

    export_path: String,
    average_path: String,
    average_passes: usize,
    export_request: Option<ExportRequest>,
    export_message: Option<Result<String, String>>,
}

impl ControlPanel {
    pub fn new(cmd_tx: Sender<Command>) -> Self {
        Self {
            cmd_tx,
            pending_config: SourceConfig::default(),
            has_pending_changes: false,
            waiting_for_apply: false,
            connection: None,
            server_status: None,
            control_message: None,
            city: String::new(),
            venue: String::new(),
            zip_code: String::new(),
            export_path: "recent_scan.csv".to_string(),
            average_path: "average_scan.csv".to_string(),
            average_passes: DEFAULT_AVERAGE_PASSES,
            export_request: None,
            export_message: None,
        }
    }

    /// Show a new `/status` document and load its location into the editor.
    pub fn set_server_status(&mut self, status: ScanStatus) {
        self.city = status.city.clone().unwrap_or_default();
        self.venue = status.venue.clone().unwrap_or_default();
        self.zip_code = status.zip_code.clone().unwrap_or_default();
        self.server_status = Some(status);
    }

    pub fn server_status(&self) -> Option<&ScanStatus> {
        self.server_status.as_ref()
    }

    /// How many recent scans the average export covers.
    pub fn average_passes(&self) -> usize {
        self.average_passes
    }

    /// Update from engine state snapshot.
    pub fn update_from_engine_state(&mut self, config: &SourceConfig) {
        self.pending_config = config.clone();
        self.has_pending_changes = false;
        self.waiting_for_apply = false;
    }

    /// The export the user asked for, if an export button was pressed.
    pub fn take_export_request(&mut self) -> Option<ExportRequest> {
        self.export_request.take()
    }

    pub fn set_export_result(&mut self, result: Result<String, String>) {
        self.export_message = Some(result);
    }

    fn current_source_type(&self) -> SourceType {
        SourceType::from_config(&self.pending_config)
    }

    fn switch_source_type(&mut self, new_type: SourceType) {
        let current_type = self.current_source_type();
        if new_type == current_type {
            return;
        }

        self.pending_config = match new_type {
            SourceType::Stream => SourceConfig::Stream {
                server: DEFAULT_SERVER.to_string(),
                reconnect: ReconnectPolicy::default(),
            },
            SourceType::Replay => SourceConfig::Replay {
                dir: PathBuf::from("logs"),
                interval: Duration::from_secs(1),
            },
        };
        self.has_pending_changes = true;
    }

    fn send(&self, command: Command) {
        let _ = self.cmd_tx.send(command);
    }

    fn source_ui(&mut self, ui: &mut Ui) {
        match &mut self.pending_config {
            SourceConfig::Stream { server, reconnect } => {
                ui.horizontal(|ui| {
                    ui.label("Server:");
                    if ui
                        .add(TextEdit::singleline(server).hint_text(DEFAULT_SERVER))
                        .changed()
                    {
                        self.has_pending_changes = true;
                    }
                });
                ui.horizontal(|ui| {
                    ui.label("Retry after:");
                    let mut ms = reconnect.initial_delay.as_millis() as u64;
                    if ui
                        .add(DragValue::new(&mut ms).speed(100).range(0..=60_000).suffix(" ms"))
                        .changed()
                    {
                        reconnect.initial_delay = Duration::from_millis(ms);
                        self.has_pending_changes = true;
                    }
                });
                ui.horizontal(|ui| {
                    ui.label("Max retries:");
                    // 0 stands for "retry forever"
                    let mut attempts = reconnect.max_attempts.unwrap_or(0);
                    if ui
                        .add(DragValue::new(&mut attempts).speed(1).range(0..=1_000))
                        .on_hover_text("0 retries forever")
                        .changed()
                    {
                        reconnect.max_attempts = (attempts > 0).then_some(attempts);
                        self.has_pending_changes = true;
                    }
                });
            }
            SourceConfig::Replay { dir, interval } => {
                ui.horizontal(|ui| {
                    ui.label("Log dir:");
                    let mut dir_str = dir.display().to_string();
                    if ui
                        .add(TextEdit::singleline(&mut dir_str).hint_text("/path/to/logs"))
                        .changed()
                    {
                        *dir = PathBuf::from(dir_str);
                        self.has_pending_changes = true;
                    }
                });
                ui.horizontal(|ui| {
                    ui.label("Interval:");
                    let mut ms = interval.as_millis() as u64;
                    if ui
                        .add(DragValue::new(&mut ms).speed(50).range(10..=60_000).suffix(" ms"))
                        .changed()
                    {
                        *interval = Duration::from_millis(ms);
                        self.has_pending_changes = true;
                    }
                });
            }
        }
    }

    fn scanner_ui(&mut self, ui: &mut Ui) {
        ui.heading("Scanner");
        ui.separator();

        let has_server = self.pending_config.server().is_some() && !self.has_pending_changes;
        ui.add_enabled_ui(has_server, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Start Scan").clicked() {
                    self.send(Command::StartScan);
                }
                if ui.button("Stop Scan").clicked() {
                    self.send(Command::StopScan);
                }
            });
            ui.horizontal(|ui| {
                if ui.button("Refresh Status").clicked() {
                    self.send(Command::RefreshStatus);
                }
                if ui.button("Load Latest").clicked() {
                    self.send(Command::FetchLatest);
                }
                if ui.button("Load Recent").clicked() {
                    self.send(Command::FetchRecentLogs);
                }
            });
        });

        if let Some(message) = &self.control_message {
            show_result(ui, message);
        }

        if self.server_status.is_some() {
            ui.add_space(5.0);
            ui.add_enabled_ui(has_server, |ui| {
                self.scanner_config_ui(ui);
                ui.add_space(5.0);
                self.location_ui(ui);
            });
        }
    }

    fn scanner_config_ui(&mut self, ui: &mut Ui) {
        let Some(status) = &self.server_status else {
            return;
        };
        let selected = status.selected_band.clone();
        let mut test_mode = status.test_mode.unwrap_or(false);

        let mut picked = None;
        ComboBox::from_label("Band")
            .selected_text(selected.as_deref().unwrap_or("none"))
            .show_ui(ui, |ui| {
                for band in &status.available_bands {
                    if ui
                        .selectable_label(selected.as_deref() == Some(band.as_str()), band)
                        .clicked()
                    {
                        picked = Some(band.clone());
                    }
                }
            });
        if let Some(band) = picked.filter(|band| selected.as_ref() != Some(band)) {
            self.send(Command::UpdateConfig(ConfigUpdate {
                selected_band: Some(band),
                test_mode: None,
            }));
        }

        if ui.checkbox(&mut test_mode, "Test mode").changed() {
            self.send(Command::UpdateConfig(ConfigUpdate {
                selected_band: None,
                test_mode: Some(test_mode),
            }));
        }
    }

    fn location_ui(&mut self, ui: &mut Ui) {
        for (label, value) in [
            ("City:", &mut self.city),
            ("Venue:", &mut self.venue),
            ("ZIP:", &mut self.zip_code),
        ] {
            ui.horizontal(|ui| {
                ui.label(label);
                ui.text_edit_singleline(value);
            });
        }
        if ui.button("Save Location").clicked() {
            self.send(Command::UpdateLocation(self.location_update()));
        }
    }

    fn location_update(&self) -> LocationUpdate {
        LocationUpdate {
            city: Some(self.city.trim().to_string()),
            venue: Some(self.venue.trim().to_string()),
            zip_code: Some(self.zip_code.trim().to_string()),
        }
    }

    fn export_ui(&mut self, ui: &mut Ui) {
        ui.heading("Export");
        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Current:");
            ui.add(TextEdit::singleline(&mut self.export_path).hint_text("recent_scan.csv"));
        });
        if ui.button("Export Current Scan").clicked() {
            self.export_request = Some(ExportRequest::Current(PathBuf::from(&self.export_path)));
        }

        ui.add_space(5.0);
        ui.horizontal(|ui| {
            ui.label("Average:");
            ui.add(TextEdit::singleline(&mut self.average_path).hint_text("average_scan.csv"));
        });
        ui.horizontal(|ui| {
            ui.label("Over last");
            ui.add(DragValue::new(&mut self.average_passes).range(1..=100));
            ui.label("scans");
        });
        if ui.button("Export Average").clicked() {
            self.export_request = Some(ExportRequest::Average(PathBuf::from(&self.average_path)));
        }

        if let Some(message) = &self.export_message {
            show_result(ui, message);
        }
    }
}

fn show_result(ui: &mut Ui, result: &Result<String, String>) {
    match result {
        Ok(message) => ui.label(message),
        Err(error) => ui.colored_label(ui.visuals().error_fg_color, error),
    };
}

impl Widget for &mut ControlPanel {
    fn ui(self, ui: &mut Ui) -> Response {
        ui.heading("Frame Source");
        ui.separator();

        if let Some(connection) = &self.connection {
            ui.label(format!("Status: {}", connection));
            ui.add_space(5.0);
        }

        let fields_enabled = !self.waiting_for_apply;

        // Source type selector
        let current_type = self.current_source_type();
        ui.add_enabled_ui(fields_enabled, |ui| {
            ComboBox::from_label("Source")
                .selected_text(current_type.label())
                .show_ui(ui, |ui| {
                    if ui
                        .selectable_label(
                            current_type == SourceType::Stream,
                            SourceType::Stream.label(),
                        )
                        .clicked()
                    {
                        self.switch_source_type(SourceType::Stream);
                    }
                    if ui
                        .selectable_label(
                            current_type == SourceType::Replay,
                            SourceType::Replay.label(),
                        )
                        .clicked()
                    {
                        self.switch_source_type(SourceType::Replay);
                    }
                });
        });

        ui.add_space(10.0);

        // Source-specific controls
        ui.add_enabled_ui(fields_enabled, |ui| self.source_ui(ui));

        ui.add_space(10.0);

        // Apply re-opens the source even without edits, which doubles as "reconnect"
        ui.add_enabled_ui(!self.waiting_for_apply, |ui| {
            let label = if self.has_pending_changes { "Apply" } else { "Reconnect" };
            if ui.button(label).clicked() {
                self.waiting_for_apply = true;
                self.send(Command::ChangeSource(self.pending_config.clone()));
            }
        });

        ui.add_space(15.0);
        self.scanner_ui(ui);

        ui.add_space(15.0);
        self.export_ui(ui);

        ui.response()
    }
}
