use eframe::egui::{Color32, Response, Ui, Widget};
use egui_plot::{Legend, Line, Plot};
use rfscan_messages::{Decibels, Megahertz, ScanFrame};

/// Identifier of the chart's drawing surface.
pub const CHART_ID: &str = "rfChart";

pub const SERIES_LABEL: &str = "RF Scan";
pub const X_AXIS_TITLE: &str = "Frequency (MHz)";
pub const Y_AXIS_TITLE: &str = "Signal Strength (dB)";

/// Look of the single data series.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
    pub border_color: Color32,
    pub border_width: f32,
    pub fill: bool,
}

/// Labels and data currently on the chart.
///
/// Every frame replaces both sequences wholesale; nothing from earlier frames
/// is kept. Redraw requests are counted so callers can tell whether a frame
/// actually reached the chart.
#[derive(Debug)]
pub struct ChartState {
    pub labels: Vec<f64>,
    pub dataset: Dataset,
    pub x_title: &'static str,
    pub y_title: &'static str,
    /// Fill whatever space the surrounding panel offers.
    pub responsive: bool,
    redraw_pending: bool,
    redraw_count: u64,
}

impl ChartState {
    pub fn new() -> Self {
        Self {
            labels: Vec::new(),
            dataset: Dataset {
                label: SERIES_LABEL.to_string(),
                data: Vec::new(),
                border_color: Color32::from_rgba_unmultiplied(255, 99, 132, 255),
                border_width: 1.0,
                fill: false,
            },
            x_title: X_AXIS_TITLE,
            y_title: Y_AXIS_TITLE,
            responsive: true,
            redraw_pending: false,
            redraw_count: 0,
        }
    }

    /// Replace labels and data with the frame's, then request one redraw.
    pub fn apply_frame(&mut self, frame: ScanFrame) {
        self.labels = frame.frequencies;
        self.dataset.data = frame.values;
        self.request_redraw();
    }

    /// The chart contents as a frame, e.g. for export.
    pub fn current_frame(&self) -> ScanFrame {
        ScanFrame::new(self.labels.clone(), self.dataset.data.clone())
    }

    /// The strongest plotted reading and its frequency.
    pub fn peak(&self) -> Option<(Megahertz, Decibels)> {
        self.labels
            .iter()
            .zip(self.dataset.data.iter())
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(&x, &y)| (Megahertz(x), Decibels(y)))
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.dataset.data.is_empty()
    }

    pub fn redraw_count(&self) -> u64 {
        self.redraw_count
    }

    /// Consume a pending redraw request.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw_pending)
    }

    fn request_redraw(&mut self) {
        self.redraw_pending = true;
        self.redraw_count += 1;
    }

    /// Runs of plottable points. A label or value that is not a number
    /// breaks the line, and points past the shorter sequence are not drawn.
    pub fn segments(&self) -> Vec<Vec<[f64; 2]>> {
        let mut segments = Vec::new();
        let mut current = Vec::new();
        for (&x, &y) in self.labels.iter().zip(self.dataset.data.iter()) {
            if x.is_finite() && y.is_finite() {
                current.push([x, y]);
            } else if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        segments
    }
}

impl Default for ChartState {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for &mut ChartState {
    fn ui(self, ui: &mut Ui) -> Response {
        let mut plot = Plot::new(CHART_ID)
            .x_axis_label(self.x_title)
            .y_axis_label(self.y_title)
            .legend(Legend::default());
        if self.responsive {
            plot = plot
                .width(ui.available_width())
                .height(ui.available_height());
        }

        let dataset = &self.dataset;
        let segments = self.segments();
        plot.show(ui, |plot_ui| {
            // Segments share a name so the legend shows one entry.
            for points in segments {
                let mut line = Line::new(dataset.label.clone(), points)
                    .color(dataset.border_color)
                    .width(dataset.border_width);
                if dataset.fill {
                    line = line.fill(0.0);
                }
                plot_ui.line(line);
            }
        })
        .response
    }
}
