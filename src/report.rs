use std::fmt::Write as _;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    frame::NormalizationSummary,
    loader::{LoadSummary, RowFailure},
    upload::UploadMode,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Final outcome of one upload, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub table: String,
    pub mode: UploadMode,
    pub created: bool,
    pub replaced: bool,
    pub rows_attempted: usize,
    pub rows_succeeded: usize,
    pub rows_failed: usize,
    pub errors: Vec<RowFailure>,
    pub cells_emptied: usize,
    pub cells_coerced: usize,
    pub table_row_count: Option<usize>,
}

impl UploadReport {
    pub fn new(
        table: &str,
        mode: UploadMode,
        normalization: NormalizationSummary,
        load: LoadSummary,
    ) -> Self {
        Self {
            table: table.to_string(),
            mode,
            created: false,
            replaced: false,
            rows_attempted: load.attempted,
            rows_succeeded: load.succeeded,
            rows_failed: load.failed,
            errors: load.errors,
            cells_emptied: normalization.emptied,
            cells_coerced: normalization.coerced,
            table_row_count: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.rows_failed == 0
    }

    pub fn first_error(&self) -> Option<&RowFailure> {
        self.errors.first()
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Text => Ok(self.render_text()),
            ReportFormat::Json => {
                serde_json::to_string_pretty(self).context("Serializing upload report")
            }
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let action = if self.replaced {
            " (table recreated)"
        } else if self.created {
            " (table created)"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "Uploaded {} of {} row(s) into '{}'{action}",
            self.rows_succeeded, self.rows_attempted, self.table
        );
        if self.cells_emptied > 0 || self.cells_coerced > 0 {
            let _ = writeln!(
                out,
                "Stored {} empty and {} unconvertible cell(s) as NULL",
                self.cells_emptied, self.cells_coerced
            );
        }
        if self.rows_failed > 0 {
            let _ = writeln!(out, "{} row(s) failed:", self.rows_failed);
            for failure in &self.errors {
                let _ = writeln!(out, "  row {}: {}", failure.row, failure.message);
            }
            if self.rows_failed > self.errors.len() {
                let _ = writeln!(
                    out,
                    "  ... {} more failure(s) not shown",
                    self.rows_failed - self.errors.len()
                );
            }
        }
        if let Some(count) = self.table_row_count {
            let _ = writeln!(out, "Table '{}' now holds {count} row(s)", self.table);
        }
        out
    }
}
