#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use sheet_to_sql::data::Value;
use sheet_to_sql::database::{Database, DuckDbDatabase};
use tempfile::{TempDir, tempdir};

/// One cell written into an xlsx fixture.
#[derive(Debug, Clone)]
pub enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
    Blank,
}

pub fn text(value: &str) -> Cell {
    Cell::Text(value.to_string())
}

pub fn num(value: f64) -> Cell {
    Cell::Number(value)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    /// Writes a single-sheet workbook; the first row holds `headers`.
    pub fn write_xlsx(&self, name: &str, headers: &[&str], rows: &[Vec<Cell>]) -> PathBuf {
        self.write_xlsx_sheets(name, &[("Sheet1", headers, rows)])
    }

    pub fn write_xlsx_sheets(
        &self,
        name: &str,
        sheets: &[(&str, &[&str], &[Vec<Cell>])],
    ) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut workbook = Workbook::new();
        for (sheet_name, headers, rows) in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(*sheet_name).expect("sheet name");
            for (col, header) in headers.iter().enumerate() {
                worksheet
                    .write_string(0, col as u16, *header)
                    .expect("write header");
            }
            for (row_idx, row) in rows.iter().enumerate() {
                let row_num = row_idx as u32 + 1;
                for (col, cell) in row.iter().enumerate() {
                    let col = col as u16;
                    match cell {
                        Cell::Text(value) => {
                            worksheet
                                .write_string(row_num, col, value.as_str())
                                .expect("write string");
                        }
                        Cell::Number(value) => {
                            worksheet
                                .write_number(row_num, col, *value)
                                .expect("write number");
                        }
                        Cell::Bool(value) => {
                            worksheet
                                .write_boolean(row_num, col, *value)
                                .expect("write boolean");
                        }
                        Cell::Blank => {}
                    }
                }
            }
        }
        workbook.save(&path).expect("save workbook");
        path
    }

    /// Database file path inside the workspace.
    pub fn database_path(&self) -> PathBuf {
        self.temp_dir.path().join("test.duckdb")
    }
}

pub fn memory_db() -> DuckDbDatabase {
    DuckDbDatabase::open_in_memory().expect("open in-memory database")
}

pub fn execute(db: &mut dyn Database, sql: &str) {
    db.execute(sql).expect("execute statement");
}

/// All rows of `table`, ordered as stored.
pub fn fetch_all(db: &dyn Database, table: &str) -> Vec<Vec<Option<Value>>> {
    db.fetch(&format!("SELECT * FROM \"{table}\""))
        .expect("fetch rows")
        .rows
}
