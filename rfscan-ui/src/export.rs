use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use rfscan_messages::ScanFrame;

/// Write `frame` in the Wireless Workbench scan format: one
/// `frequency,level` row per pair, no header.
///
/// Pairs past the shorter sequence are dropped.
pub fn write_wwb_csv<W: Write>(frame: &ScanFrame, mut out: W) -> std::io::Result<usize> {
    let mut rows = 0;
    for (frequency, level) in frame.pairs() {
        writeln!(out, "{:.3},{:.2}", frequency.as_mhz(), level.as_db())?;
        rows += 1;
    }
    out.flush()?;
    Ok(rows)
}

/// Export `frame` to `path`, returning the number of rows written.
pub fn export_csv(frame: &ScanFrame, path: &Path) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let rows = write_wwb_csv(frame, BufWriter::new(file))
        .with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("Exported {} rows to {}", rows, path.display());
    Ok(rows)
}
