//! Presentation of a [`CohortResult`].
//!
//! Plotting lives outside the crate; these renderers produce the data a
//! bar/line chart is drawn from.
use std::io::Write;

use crate::asymmetry::CohortResult;
use crate::error::{Error, Result};

pub trait CohortRenderer {
    fn render(&self, result: &CohortResult, out: &mut dyn Write) -> Result<()>;
}

/// Fixed-width text table, one row per subject, followed by skip notices.
#[derive(Debug, Clone, Copy)]
pub struct TableRenderer {
    pub precision: usize,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self { precision: 4 }
    }
}

impl CohortRenderer for TableRenderer {
    fn render(&self, result: &CohortResult, out: &mut dyn Write) -> Result<()> {
        let p = self.precision;
        writeln!(out, "{:<12} {:>14} {:>14} {:>10}", "subject", "left_power", "right_power", "asymmetry")?;
        for r in &result.records {
            writeln!(
                out,
                "{:<12} {:>14.p$e} {:>14.p$e} {:>10.p$}",
                r.subject, r.left_power, r.right_power, r.asymmetry
            )?;
        }
        if let Some(mean) = result.mean_asymmetry() {
            writeln!(out, "{:<12} {:>14} {:>14} {:>10.p$}", "mean", "", "", mean)?;
        }
        if !result.skipped.is_empty() {
            writeln!(out)?;
            writeln!(out, "skipped:")?;
            for s in &result.skipped {
                writeln!(out, "  {}: {}", s.subject, s.reason)?;
            }
        }
        if result.cancelled {
            writeln!(out, "(run cancelled before every subject was processed)")?;
        }
        Ok(())
    }
}

/// Pretty-printed JSON of the whole result.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl CohortRenderer for JsonRenderer {
    fn render(&self, result: &CohortResult, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, result)
            .map_err(|e| Error::Format(format!("JSON encoding failed: {e}")))?;
        writeln!(out)?;
        Ok(())
    }
}
