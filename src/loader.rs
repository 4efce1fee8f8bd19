//! Row loading.
//!
//! Rows are written through one prepared statement whose column list is taken
//! from the target table, so positional values always line up with the named
//! columns. Commit discipline:
//!
//! - [`FailurePolicy::Abort`] opens a transaction, stops at the first failing
//!   row, rolls back and surfaces the error.
//! - [`FailurePolicy::Continue`] writes each row in autocommit, records the
//!   failure and keeps going. DuckDB cannot resume a transaction after a
//!   failed statement, so there is nothing to roll back here; a batch that
//!   fails partway leaves the rows that did succeed.

use std::fmt;

use clap::ValueEnum;
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    database::{Database, TableDescriptor},
    error::{ColumnMismatch, UploadError},
    frame::{NormalizationSummary, TabularFrame},
    sql,
    type_map::TypeMapper,
};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_MAX_REPORTED_ERRORS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the failed row and keep inserting
    #[default]
    Continue,
    /// Stop at the first failed row and roll back
    Abort,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Continue => f.write_str("continue"),
            FailurePolicy::Abort => f.write_str("abort"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub failure_policy: FailurePolicy,
    pub chunk_size: usize,
    pub max_reported_errors: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_reported_errors: DEFAULT_MAX_REPORTED_ERRORS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<RowFailure>,
}

/// Insert statement bound to the target table's column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPlan {
    pub table: String,
    pub columns: Vec<String>,
    pub sql: String,
}

impl InsertPlan {
    /// Maps each frame column onto the target table, refusing frames whose
    /// columns the table does not have.
    pub fn for_frame(
        frame: &TabularFrame,
        target: &TableDescriptor,
        mapper: &TypeMapper,
    ) -> Result<Self, UploadError> {
        let mut columns = Vec::with_capacity(frame.column_count());
        let mut missing = Vec::new();
        for column in frame.columns() {
            match target.column(&column.name) {
                Some(spec) => columns.push(spec.name.clone()),
                None => missing.push(ColumnMismatch {
                    column: column.name.clone(),
                    expected: mapper.map(column.column_type).token(),
                    found: None,
                }),
            }
        }
        if !missing.is_empty() {
            return Err(UploadError::SchemaMismatch {
                table: target.name.clone(),
                mismatches: missing,
            });
        }
        let sql = sql::insert(&target.name, &columns)?;
        Ok(Self {
            table: target.name.clone(),
            columns,
            sql,
        })
    }
}

/// Inserts `rows` in order under the chosen failure policy, then commits once.
pub fn load_rows<I>(
    db: &mut dyn Database,
    plan: &InsertPlan,
    rows: I,
    options: &LoadOptions,
) -> Result<LoadSummary, UploadError>
where
    I: IntoIterator<Item = Vec<Option<Value>>>,
{
    let transaction_error = |source| UploadError::Transaction {
        table: plan.table.clone(),
        source,
    };
    let abort_on_error = options.failure_policy == FailurePolicy::Abort;
    if abort_on_error {
        db.begin().map_err(transaction_error)?;
    }

    let mut summary = LoadSummary::default();
    match insert_all(db, plan, rows, options, &mut summary) {
        Ok(()) => {
            db.commit().map_err(transaction_error)?;
            Ok(summary)
        }
        Err(err) => {
            if abort_on_error {
                if let Err(rollback) = db.rollback() {
                    warn!("Rollback on '{}' failed: {rollback:#}", plan.table);
                }
            }
            Err(err)
        }
    }
}

fn insert_all<I>(
    db: &mut dyn Database,
    plan: &InsertPlan,
    rows: I,
    options: &LoadOptions,
    summary: &mut LoadSummary,
) -> Result<(), UploadError>
where
    I: IntoIterator<Item = Vec<Option<Value>>>,
{
    let mut writer = db
        .prepare_insert(&plan.sql)
        .map_err(|source| UploadError::Statement {
            table: plan.table.clone(),
            source,
        })?;

    let chunks = rows.into_iter().enumerate().chunks(options.chunk_size.max(1));
    for chunk in &chunks {
        for (idx, row) in chunk {
            let row_number = idx + 1;
            summary.attempted += 1;
            match writer.write(&row) {
                Ok(()) => summary.succeeded += 1,
                Err(source) => {
                    summary.failed += 1;
                    if options.failure_policy == FailurePolicy::Abort {
                        return Err(UploadError::RowInsert {
                            table: plan.table.clone(),
                            row: row_number,
                            source,
                        });
                    }
                    warn!("Error inserting row {row_number}: {source:#}");
                    if summary.errors.len() < options.max_reported_errors {
                        summary.errors.push(RowFailure {
                            row: row_number,
                            message: format!("{source:#}"),
                        });
                    }
                }
            }
        }
        debug!(
            "'{}': {} row(s) attempted, {} failed so far",
            plan.table, summary.attempted, summary.failed
        );
    }
    Ok(())
}

/// Normalizes the frame, then loads every row into `target`.
pub fn load_frame(
    db: &mut dyn Database,
    frame: &mut TabularFrame,
    target: &TableDescriptor,
    mapper: &TypeMapper,
    options: &LoadOptions,
) -> Result<(NormalizationSummary, LoadSummary), UploadError> {
    let normalization = frame.normalize();
    if normalization.emptied > 0 || normalization.coerced > 0 {
        info!(
            "Normalized {} empty cell(s) and {} unconvertible cell(s) to null",
            normalization.emptied, normalization.coerced
        );
    }
    if frame.column_count() == 0 {
        debug!("Frame has no columns, nothing to insert into '{}'", target.name);
        return Ok((normalization, LoadSummary::default()));
    }
    let plan = InsertPlan::for_frame(frame, target, mapper)?;
    let summary = load_rows(db, &plan, frame.rows(), options)?;
    info!(
        "Inserted {} of {} row(s) into '{}'",
        summary.succeeded, summary.attempted, plan.table
    );
    Ok((normalization, summary))
}
