/// Frequency in Megahertz, the unit of the chart's X axis.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Megahertz(pub f64);

impl std::fmt::Display for Megahertz {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3} MHz", self.0)
    }
}

impl Megahertz {
    /// Convert a frequency given in Hz, as the scanner writes its logs.
    pub fn from_hz(hz: f64) -> Self {
        Self(hz / 1_000_000.0)
    }

    pub const fn as_mhz(self) -> f64 {
        self.0
    }
}

impl From<f64> for Megahertz {
    fn from(mhz: f64) -> Self {
        Self(mhz)
    }
}

impl From<Megahertz> for f64 {
    fn from(mhz: Megahertz) -> Self {
        mhz.0
    }
}

/// Signal strength in Decibels (dB).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Decibels(pub f64);

impl std::fmt::Display for Decibels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} dB", self.0)
    }
}

impl Decibels {
    pub const fn as_db(self) -> f64 {
        self.0
    }
}

impl From<f64> for Decibels {
    fn from(db: f64) -> Self {
        Self(db)
    }
}

impl From<Decibels> for f64 {
    fn from(db: Decibels) -> Self {
        db.0
    }
}
