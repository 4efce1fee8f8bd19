//! In-memory tabular frame built from an uploaded sheet.
//!
//! A [`TabularFrame`] is an ordered list of named [`Column`]s. Each column
//! carries an inferred [`ColumnType`] and one optional cell per row. Types are
//! inferred from a leading sample of rows (2 000 by default, `0` scans every
//! row), so a numeric column can still hold stray text further down; those
//! cells are turned into nulls by [`TabularFrame::normalize`].

use anyhow::{Result, anyhow, ensure};
use log::debug;
use serde::Serialize;

use crate::data::{
    ColumnType, Value, coerce_value, parse_boolean, parse_timestamp, whole_float_to_i64,
};

pub const DEFAULT_SAMPLE_ROWS: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub values: Vec<Option<Value>>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType, values: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            column_type,
            values,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceOptions {
    pub sample_rows: usize,
    pub overrides: Vec<(String, ColumnType)>,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            sample_rows: DEFAULT_SAMPLE_ROWS,
            overrides: Vec::new(),
        }
    }
}

/// Counts produced by [`TabularFrame::normalize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationSummary {
    pub emptied: usize,
    pub coerced: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularFrame {
    columns: Vec<Column>,
    row_count: usize,
}

impl TabularFrame {
    /// Builds a frame from a header row and row-major cells, inferring each
    /// column's type. Short rows are padded with nulls.
    pub fn from_rows(
        headers: Vec<String>,
        rows: Vec<Vec<Option<Value>>>,
        options: &InferenceOptions,
    ) -> Result<Self> {
        let width = headers.len();
        let row_count = rows.len();
        let mut cells: Vec<Vec<Option<Value>>> = vec![Vec::with_capacity(row_count); width];
        for row in rows {
            let mut row = row.into_iter();
            for column in cells.iter_mut() {
                column.push(row.next().flatten());
            }
        }

        let mut columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, values)| {
                let column_type = infer_column_type(&values, options.sample_rows);
                Column::new(name, column_type, values)
            })
            .collect::<Vec<_>>();

        for (name, ty) in &options.overrides {
            let column = columns
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| anyhow!("Column type override refers to unknown column '{name}'"))?;
            debug!(
                "Overriding inferred type of '{}' ({} -> {})",
                column.name, column.column_type, ty
            );
            column.column_type = *ty;
        }

        Ok(Self { columns, row_count })
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map(|c| c.values.len()).unwrap_or(0);
        for column in &columns {
            ensure!(
                column.values.len() == row_count,
                "Column '{}' has {} value(s) but the frame has {} row(s)",
                column.name,
                column.values.len(),
                row_count
            );
        }
        Ok(Self { columns, row_count })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn row(&self, idx: usize) -> Vec<Option<Value>> {
        self.columns
            .iter()
            .map(|c| c.values.get(idx).cloned().flatten())
            .collect()
    }

    /// Rows in frame order, values positioned by column order.
    pub fn rows(&self) -> impl Iterator<Item = Vec<Option<Value>>> + '_ {
        (0..self.row_count).map(|idx| self.row(idx))
    }

    /// Empty strings become null in every column, then each cell is coerced to
    /// its column type; cells that cannot be represented become null.
    pub fn normalize(&mut self) -> NormalizationSummary {
        let mut summary = NormalizationSummary::default();
        for column in &mut self.columns {
            let ty = column.column_type;
            for cell in column.values.iter_mut() {
                let Some(value) = cell.as_ref() else {
                    continue;
                };
                if value.is_empty_text() {
                    *cell = None;
                    summary.emptied += 1;
                    continue;
                }
                let coerced = coerce_value(value, ty);
                if coerced.is_none() {
                    debug!(
                        "Column '{}': '{}' is not a valid {} value, storing null",
                        column.name, value, ty
                    );
                    summary.coerced += 1;
                }
                *cell = coerced;
            }
        }
        summary
    }

    /// Rendered cells for display, `NULL` marking missing values.
    pub fn display_rows(&self, limit: usize) -> Vec<Vec<String>> {
        (0..self.row_count.min(limit))
            .map(|idx| {
                self.columns
                    .iter()
                    .map(|c| match c.values.get(idx) {
                        Some(Some(value)) => value.as_display(),
                        _ => "NULL".to_string(),
                    })
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    seen: bool,
    possible_integer: bool,
    possible_float: bool,
    possible_boolean: bool,
    possible_timestamp: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            seen: false,
            possible_integer: true,
            possible_float: true,
            possible_boolean: true,
            possible_timestamp: true,
        }
    }

    fn observe(&mut self, value: &Value) {
        self.seen = true;
        match value {
            Value::Integer(_) => {
                self.possible_boolean = false;
                self.possible_timestamp = false;
            }
            Value::Float(f) => {
                self.possible_boolean = false;
                self.possible_timestamp = false;
                if whole_float_to_i64(*f).is_none() {
                    self.possible_integer = false;
                }
            }
            Value::Boolean(_) => {
                self.possible_integer = false;
                self.possible_float = false;
                self.possible_timestamp = false;
            }
            Value::Timestamp(_) => {
                self.possible_integer = false;
                self.possible_float = false;
                self.possible_boolean = false;
            }
            Value::Text(s) => {
                let trimmed = s.trim();
                if self.possible_boolean && parse_boolean(trimmed).is_err() {
                    self.possible_boolean = false;
                }
                if self.possible_integer && trimmed.parse::<i64>().is_err() {
                    self.possible_integer = false;
                }
                if self.possible_float && trimmed.parse::<f64>().is_err() {
                    self.possible_float = false;
                }
                if self.possible_timestamp && parse_timestamp(trimmed).is_err() {
                    self.possible_timestamp = false;
                }
            }
        }
    }

    fn decide(&self) -> ColumnType {
        if !self.seen {
            ColumnType::Text
        } else if self.possible_boolean {
            ColumnType::Boolean
        } else if self.possible_integer {
            ColumnType::Integer
        } else if self.possible_float {
            ColumnType::Float
        } else if self.possible_timestamp {
            ColumnType::Timestamp
        } else {
            ColumnType::Text
        }
    }
}

pub fn infer_column_type(values: &[Option<Value>], sample_rows: usize) -> ColumnType {
    let mut candidate = TypeCandidate::new();
    let limit = if sample_rows == 0 {
        values.len()
    } else {
        sample_rows.min(values.len())
    };
    for value in values[..limit].iter().flatten() {
        if value.is_empty_text() {
            continue;
        }
        candidate.observe(value);
    }
    candidate.decide()
}
