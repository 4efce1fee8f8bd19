use std::{fmt, path::PathBuf};

use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

/// One column whose declared type does not accept the inferred type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMismatch {
    pub column: String,
    pub expected: String,
    pub found: Option<String>,
}

impl fmt::Display for ColumnMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.found {
            Some(found) => write!(
                f,
                "column '{}' expects {} but the table declares {}",
                self.column, self.expected, found
            ),
            None => write!(
                f,
                "column '{}' ({}) does not exist in the table",
                self.column, self.expected
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Could not connect to {target}: {source:#}")]
    Connection {
        target: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Could not read {path:?} as a spreadsheet: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: &'static str },
    #[error("Could not inspect table '{table}': {source:#}")]
    Inspect {
        table: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Could not create table '{table}': {source:#}")]
    TableCreate {
        table: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Could not drop table '{table}': {source:#}")]
    TableDrop {
        table: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Schema mismatch for table '{table}': {}", .mismatches.iter().join("; "))]
    SchemaMismatch {
        table: String,
        mismatches: Vec<ColumnMismatch>,
    },
    #[error("Error inserting row {row} into '{table}': {source:#}")]
    RowInsert {
        table: String,
        row: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error("Could not prepare insert into '{table}': {source:#}")]
    Statement {
        table: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Transaction on '{table}' failed: {source:#}")]
    Transaction {
        table: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Reading confirmation from the terminal failed")]
    Prompt(#[from] std::io::Error),
}

impl UploadError {
    pub fn parse(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        UploadError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
