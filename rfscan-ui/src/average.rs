use std::collections::VecDeque;

use rfscan_messages::ScanFrame;

/// Scans averaged when nothing else is configured.
pub const DEFAULT_AVERAGE_PASSES: usize = 10;

/// Running average over the most recent scans.
#[derive(Debug)]
pub struct ScanAverage {
    passes: usize,
    frames: VecDeque<ScanFrame>,
}

impl ScanAverage {
    pub fn new(passes: usize) -> Self {
        Self {
            passes: passes.max(1),
            frames: VecDeque::new(),
        }
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn set_passes(&mut self, passes: usize) {
        self.passes = passes.max(1);
        self.trim();
    }

    pub fn push(&mut self, frame: ScanFrame) {
        self.frames.push_back(frame);
        self.trim();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Per-bin mean of the kept scans, on the newest scan's frequencies.
    ///
    /// Scans taken on a different frequency grid are left out. Values that are
    /// not numbers are skipped bin by bin; a bin with no numbers stays a gap.
    pub fn average(&self) -> Option<ScanFrame> {
        let newest = self.frames.back()?;
        let bins = newest.values.len();
        let mut sums = vec![0.0; bins];
        let mut counts = vec![0u32; bins];

        for frame in self
            .frames
            .iter()
            .filter(|f| f.values.len() == bins && same_grid(&f.frequencies, &newest.frequencies))
        {
            for (bin, &value) in frame.values.iter().enumerate() {
                if value.is_finite() {
                    sums[bin] += value;
                    counts[bin] += 1;
                }
            }
        }

        let values = sums
            .into_iter()
            .zip(counts)
            .map(|(sum, count)| if count > 0 { sum / f64::from(count) } else { f64::NAN })
            .collect();
        Some(ScanFrame::new(newest.frequencies.clone(), values))
    }

    fn trim(&mut self) {
        while self.frames.len() > self.passes {
            self.frames.pop_front();
        }
    }
}

impl Default for ScanAverage {
    fn default() -> Self {
        Self::new(DEFAULT_AVERAGE_PASSES)
    }
}

fn same_grid(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
}
