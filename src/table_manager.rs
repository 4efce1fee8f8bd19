use std::fmt;

use clap::ValueEnum;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    database::{ColumnSpec, Database, TableDescriptor},
    error::UploadError,
    sql,
};

pub const PLACEHOLDER_COLUMN: &str = "id";
pub const PLACEHOLDER_TYPE: &str = "INTEGER";

/// How a missing table is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum CreateStrategy {
    /// One column per frame column with mapped types
    #[default]
    Inferred,
    /// A single identifier column; real schema is left to manual work
    Placeholder,
}

impl fmt::Display for CreateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateStrategy::Inferred => f.write_str("inferred"),
            CreateStrategy::Placeholder => f.write_str("placeholder"),
        }
    }
}

pub fn list_tables(db: &dyn Database) -> Result<Vec<String>, UploadError> {
    db.list_tables().map_err(|source| UploadError::Inspect {
        table: "*".to_string(),
        source,
    })
}

pub fn table_exists(db: &dyn Database, table: &str) -> Result<bool, UploadError> {
    db.table_exists(table)
        .map_err(|source| UploadError::Inspect {
            table: table.to_string(),
            source,
        })
}

pub fn describe_table(db: &dyn Database, table: &str) -> Result<Option<TableDescriptor>, UploadError> {
    db.describe_table(table)
        .map_err(|source| UploadError::Inspect {
            table: table.to_string(),
            source,
        })
}

/// Creates `descriptor.name` with its columns in order. An empty column list
/// falls back to the placeholder table.
pub fn create_table(
    db: &mut dyn Database,
    descriptor: &TableDescriptor,
) -> Result<TableDescriptor, UploadError> {
    if descriptor.columns.is_empty() {
        warn!(
            "No column metadata available for '{}', creating placeholder table",
            descriptor.name
        );
        return create_placeholder_table(db, &descriptor.name);
    }
    let columns = descriptor
        .columns
        .iter()
        .map(|c| (c.name.clone(), c.declared_type.clone()))
        .collect::<Vec<_>>();
    let statement = sql::create_table(&descriptor.name, &columns)?;
    db.execute(&statement)
        .map_err(|source| UploadError::TableCreate {
            table: descriptor.name.clone(),
            source,
        })?;
    info!(
        "Created table '{}' with {} column(s)",
        descriptor.name,
        descriptor.columns.len()
    );
    Ok(descriptor.clone())
}

pub fn create_placeholder_table(
    db: &mut dyn Database,
    table: &str,
) -> Result<TableDescriptor, UploadError> {
    let columns = vec![(PLACEHOLDER_COLUMN.to_string(), PLACEHOLDER_TYPE.to_string())];
    let statement = sql::create_table(table, &columns)?;
    db.execute(&statement)
        .map_err(|source| UploadError::TableCreate {
            table: table.to_string(),
            source,
        })?;
    warn!("Created placeholder table '{table}' ({PLACEHOLDER_COLUMN} {PLACEHOLDER_TYPE})");
    Ok(TableDescriptor {
        name: table.to_string(),
        columns: vec![ColumnSpec::new(PLACEHOLDER_COLUMN, PLACEHOLDER_TYPE)],
    })
}

/// Drops the table when present; absent tables are left alone.
pub fn drop_table(db: &mut dyn Database, table: &str) -> Result<(), UploadError> {
    let statement = sql::drop_table_if_exists(table)?;
    db.execute(&statement)
        .map_err(|source| UploadError::TableDrop {
            table: table.to_string(),
            source,
        })?;
    info!("Dropped table '{table}' if it existed");
    Ok(())
}
