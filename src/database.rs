//! Database seam and the embedded DuckDB backend.
//!
//! The pipeline only talks to [`Database`]: inspection (`list_tables`,
//! `describe_table`), DDL through `execute`, explicit transaction control and
//! a prepared [`RowWriter`] for inserts. [`DuckDbDatabase`] implements it on
//! top of a single `duckdb::Connection`.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::DateTime;
use duckdb::types::{TimeUnit, Value as DuckValue};
use duckdb::{Connection, params};
use log::debug;
use serde::Serialize;

use crate::{
    data::{Value, format_timestamp},
    frame::TabularFrame,
    sql,
    type_map::TypeMapper,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub declared_type: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }
}

/// Table name plus its ordered columns and declared types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableDescriptor {
    pub fn from_frame(name: &str, frame: &TabularFrame, mapper: &TypeMapper) -> Self {
        let columns = frame
            .columns()
            .iter()
            .map(|c| ColumnSpec::new(&c.name, mapper.map(c.column_type).token()))
            .collect();
        Self {
            name: name.to_string(),
            columns,
        }
    }

    /// Case-insensitive lookup, matching how the engine resolves names.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Result set fetched for display or verification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<Value>>>,
}

pub trait RowWriter {
    /// Binds one row positionally and executes the prepared insert.
    fn write(&mut self, row: &[Option<Value>]) -> Result<()>;
}

pub trait Database {
    /// Human-readable connection target, never containing secrets.
    fn target(&self) -> String;
    fn list_tables(&self) -> Result<Vec<String>>;
    fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .list_tables()?
            .iter()
            .any(|t| t.eq_ignore_ascii_case(name)))
    }
    fn describe_table(&self, name: &str) -> Result<Option<TableDescriptor>>;
    fn execute(&mut self, sql: &str) -> Result<()>;
    fn begin(&mut self) -> Result<()>;
    /// Commits an open transaction; a no-op in autocommit mode.
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
    fn prepare_insert<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowWriter + 'a>>;
    fn fetch(&self, sql: &str) -> Result<FetchedRows>;
    fn count_rows(&self, table: &str) -> Result<usize>;
}

pub struct DuckDbDatabase {
    conn: Connection,
    target: String,
    in_transaction: bool,
}

impl DuckDbDatabase {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Opening DuckDB database {path:?}"))?;
        Ok(Self {
            conn,
            target: path.display().to_string(),
            in_transaction: false,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Opening in-memory DuckDB database")?;
        Ok(Self {
            conn,
            target: ":memory:".to_string(),
            in_transaction: false,
        })
    }
}

impl Database for DuckDbDatabase {
    fn target(&self) -> String {
        format!("duckdb:{}", self.target)
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_type = 'BASE TABLE' AND table_schema = current_schema() \
             ORDER BY table_name",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut tables = Vec::new();
        for row in rows {
            tables.push(row.context("Reading table name")?);
        }
        Ok(tables)
    }

    fn describe_table(&self, name: &str) -> Result<Option<TableDescriptor>> {
        let mut stmt = self.conn.prepare(
            "SELECT table_name, column_name, data_type FROM information_schema.columns \
             WHERE table_schema = current_schema() AND lower(table_name) = lower(?) \
             ORDER BY ordinal_position",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut descriptor: Option<TableDescriptor> = None;
        for row in rows {
            let (table, column, data_type) = row.context("Reading column metadata")?;
            descriptor
                .get_or_insert_with(|| TableDescriptor {
                    name: table,
                    columns: Vec::new(),
                })
                .columns
                .push(ColumnSpec::new(column, data_type));
        }
        Ok(descriptor)
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        debug!("Executing: {sql}");
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        self.conn
            .execute_batch("BEGIN TRANSACTION")
            .context("Starting transaction")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT").context("Committing transaction")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.in_transaction = false;
            self.conn
                .execute_batch("ROLLBACK")
                .context("Rolling back transaction")?;
        }
        Ok(())
    }

    fn prepare_insert<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowWriter + 'a>> {
        debug!("Preparing: {sql}");
        let statement = self.conn.prepare(sql)?;
        Ok(Box::new(DuckDbRowWriter { statement }))
    }

    fn fetch(&self, sql: &str) -> Result<FetchedRows> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let column_count = rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns = (0..column_count)
            .map(|i| {
                rows.as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("column_{}", i + 1))
            })
            .collect::<Vec<_>>();

        let mut fetched = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                let value: DuckValue = row.get(idx)?;
                values.push(from_duckdb_value(value));
            }
            fetched.push(values);
        }
        Ok(FetchedRows {
            columns,
            rows: fetched,
        })
    }

    fn count_rows(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&sql::count_rows(table)?, [], |row| row.get(0))
            .with_context(|| format!("Counting rows in '{table}'"))?;
        Ok(count.max(0) as usize)
    }
}

struct DuckDbRowWriter<'conn> {
    statement: duckdb::Statement<'conn>,
}

impl RowWriter for DuckDbRowWriter<'_> {
    fn write(&mut self, row: &[Option<Value>]) -> Result<()> {
        let params = row.iter().map(to_duckdb_value).collect::<Vec<_>>();
        self.statement
            .execute(duckdb::params_from_iter(params.iter()))?;
        Ok(())
    }
}

// Timestamps travel as text; the engine casts them to the column type on insert.
fn to_duckdb_value(value: &Option<Value>) -> DuckValue {
    match value {
        None => DuckValue::Null,
        Some(Value::Text(s)) => DuckValue::Text(s.clone()),
        Some(Value::Integer(i)) => DuckValue::BigInt(*i),
        Some(Value::Float(f)) => DuckValue::Double(*f),
        Some(Value::Boolean(b)) => DuckValue::Boolean(*b),
        Some(Value::Timestamp(ts)) => DuckValue::Text(format_timestamp(ts)),
    }
}

fn from_duckdb_value(value: DuckValue) -> Option<Value> {
    match value {
        DuckValue::Null => None,
        DuckValue::Boolean(b) => Some(Value::Boolean(b)),
        DuckValue::TinyInt(i) => Some(Value::Integer(i.into())),
        DuckValue::SmallInt(i) => Some(Value::Integer(i.into())),
        DuckValue::Int(i) => Some(Value::Integer(i.into())),
        DuckValue::BigInt(i) => Some(Value::Integer(i)),
        DuckValue::UTinyInt(i) => Some(Value::Integer(i.into())),
        DuckValue::USmallInt(i) => Some(Value::Integer(i.into())),
        DuckValue::UInt(i) => Some(Value::Integer(i.into())),
        DuckValue::Float(f) => Some(Value::Float(f.into())),
        DuckValue::Double(f) => Some(Value::Float(f)),
        DuckValue::Text(s) => Some(Value::Text(s)),
        DuckValue::Timestamp(unit, raw) => {
            let micros = match unit {
                TimeUnit::Second => raw.saturating_mul(1_000_000),
                TimeUnit::Millisecond => raw.saturating_mul(1_000),
                TimeUnit::Microsecond => raw,
                TimeUnit::Nanosecond => raw / 1_000,
            };
            let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
            DateTime::from_timestamp(micros.div_euclid(1_000_000), nanos)
                .map(|dt| Value::Timestamp(dt.naive_utc()))
        }
        other => Some(Value::Text(format!("{other:?}"))),
    }
}
