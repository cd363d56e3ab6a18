//! In-memory row accumulator and its CSV snapshot.

use std::path::Path;

use anyhow::{Context, Result};

use crate::model::FlatRow;

/// Ordered, append-only table of flattened rows. Created empty at startup,
/// owned by the harvest loop for the process lifetime, serialized once at
/// the end. Row order is cycle order, then intra-cycle listing order; the
/// same listing id shows up once per cycle by design (the table is a time
/// series, not a current-state snapshot).
#[derive(Debug, Default)]
pub struct RowTable {
    rows: Vec<FlatRow>,
}

impl RowTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, rows: Vec<FlatRow>) {
        self.rows.extend(rows);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FlatRow] {
        &self.rows
    }

    /// Writes the cumulative snapshot: header row from the fixed column
    /// schema, no index column, truncating any existing file at `path`.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        for row in &self.rows {
            writer
                .serialize(row)
                .with_context(|| format!("writing row to {}", path.display()))?;
        }
        writer
            .flush()
            .with_context(|| format!("flushing {}", path.display()))?;
        Ok(())
    }
}
