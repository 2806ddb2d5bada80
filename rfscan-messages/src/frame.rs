use serde::{Deserialize, Serialize};

use crate::{Decibels, Megahertz};

/// One scan frame: frequency labels paired positionally with readings.
///
/// The two sequences are expected to be the same length, but nothing enforces
/// it. Consumers pair up to the shorter one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanFrame {
    /// Frequency labels, in MHz.
    pub frequencies: Vec<f64>,
    /// Signal strength readings, in dB.
    pub values: Vec<f64>,
}

impl ScanFrame {
    pub fn new(frequencies: Vec<f64>, values: Vec<f64>) -> Self {
        Self {
            frequencies,
            values,
        }
    }

    /// Iterate over (frequency, reading) pairs, stopping at the shorter sequence.
    pub fn pairs(&self) -> impl Iterator<Item = (Megahertz, Decibels)> + '_ {
        self.frequencies
            .iter()
            .zip(self.values.iter())
            .map(|(&f, &v)| (Megahertz(f), Decibels(v)))
    }
}

/// A scan log as written by the scanner, one file per sweep.
/// Frequencies are in Hz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanLog {
    #[serde(default)]
    pub timestamp: Option<String>,
    pub frequencies: Vec<f64>,
    pub power_levels: Vec<f64>,
}

impl ScanLog {
    /// Convert to a chart frame, rescaling frequencies to MHz.
    pub fn into_frame(self) -> ScanFrame {
        ScanFrame {
            frequencies: self
                .frequencies
                .into_iter()
                .map(|hz| Megahertz::from_hz(hz).as_mhz())
                .collect(),
            values: self.power_levels,
        }
    }
}

/// The scanner server's status document. Every field is optional since the
/// server echoes whatever its configuration holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanStatus {
    pub flask_mode: Option<bool>,
    pub test_mode: Option<bool>,
    pub selected_band: Option<String>,
    pub available_bands: Vec<String>,
    pub log_directory: Option<String>,
    pub test_log_directory: Option<String>,
    pub city: Option<String>,
    pub venue: Option<String>,
    pub zip_code: Option<String>,
}

/// Body of `POST /update-config`. Unset fields keep the server's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_band: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_mode: Option<bool>,
}

/// Body of `POST /update-location`. Unset fields keep the server's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}
