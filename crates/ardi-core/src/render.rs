//! Plain text rendering for list and search output
//!
//! Output is written to any [`Write`] so the binary can target stdout and
//! tests can capture a buffer.

use std::io::Write;

use comfy_table::presets::NOTHING;

use crate::error::{ArdiError, Result};

/// Gap between columns
const COLUMN_GAP: u16 = 4;

/// Borderless, left aligned text table
#[derive(Debug, Clone)]
pub struct Table {
    inner: comfy_table::Table,
    rows: usize,
}

impl Table {
    /// Start a table with the given column titles
    pub fn new<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = comfy_table::Table::new();
        inner
            .load_preset(NOTHING)
            .set_header(header.into_iter().map(Into::into).collect::<Vec<String>>());
        for column in inner.column_iter_mut() {
            column.set_padding((0, COLUMN_GAP));
        }
        Self { inner, rows: 0 }
    }

    /// Append one row of cells
    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .add_row(row.into_iter().map(Into::into).collect::<Vec<String>>());
        self.rows += 1;
    }

    /// True when only the header would be written
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Write the header and every row, without trailing blanks
    pub fn write_to(&self, out: &mut dyn Write) -> Result<()> {
        for line in self.inner.lines() {
            writeln!(out, "{}", line.trim_end()).map_err(ArdiError::Output)?;
        }
        Ok(())
    }
}

/// Write a single line of output
pub fn line(out: &mut dyn Write, text: impl AsRef<str>) -> Result<()> {
    writeln!(out, "{}", text.as_ref()).map_err(ArdiError::Output)
}
