use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    connection::AuthKind,
    data::ColumnType,
    loader::FailurePolicy,
    report::ReportFormat,
    table_manager::CreateStrategy,
    upload::{ExistingTablePolicy, UploadMode},
    validator::TypeMatch,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Load Excel and CSV sheets into SQL tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse a sheet, confirm the target table and insert its rows
    Upload(UploadArgs),
    /// Print the first rows of a sheet with inferred column types
    Preview(PreviewArgs),
    /// List the worksheets of a workbook
    Sheets(SheetsArgs),
    /// List tables in the target database
    Tables(TablesArgs),
    /// Show the declared columns and sample rows of a table
    Describe(DescribeArgs),
    /// Validate a sheet against an existing table without inserting
    Check(CheckArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Directory holding the database files
    #[arg(long)]
    pub server: Option<PathBuf>,
    /// Database name, file path or `:memory:`
    #[arg(long)]
    pub database: Option<String>,
    /// Authentication mode
    #[arg(long, value_enum)]
    pub auth: Option<AuthKind>,
    /// User name for credentials authentication
    #[arg(long)]
    pub username: Option<String>,
    /// Password for credentials authentication
    #[arg(long, env = "SHEET_TO_SQL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// YAML profile with `connection` and `upload` defaults
    #[arg(long)]
    pub profile: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct SheetArgs {
    /// Spreadsheet or delimited file to read
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Worksheet name (defaults to the first sheet)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Delimiter for text input (supports ',', 'tab', ';', '|'); forces delimited parsing
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of delimited input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Convert headers to snake_case identifiers
    #[arg(long = "normalize-headers")]
    pub normalize_headers: bool,
    /// Number of rows to sample when inferring types (0 means full scan)
    #[arg(long = "sample-rows")]
    pub sample_rows: Option<usize>,
    /// Override an inferred column type, e.g. `zip=text` (repeatable)
    #[arg(long = "column-type", value_parser = parse_column_type, action = clap::ArgAction::Append)]
    pub column_types: Vec<(String, ColumnType)>,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Target table (defaults to the file name without extension)
    #[arg(short = 't', long)]
    pub table: Option<String>,
    /// Upload mode
    #[arg(long, value_enum)]
    pub mode: Option<UploadMode>,
    /// What to do when the table already exists (defaults by mode)
    #[arg(long = "if-exists", value_enum)]
    pub if_exists: Option<ExistingTablePolicy>,
    /// What to do when a row fails to insert
    #[arg(long = "on-row-error", value_enum)]
    pub on_row_error: Option<FailurePolicy>,
    /// How strictly declared types must match inferred types
    #[arg(long = "type-match", value_enum)]
    pub type_match: Option<TypeMatch>,
    /// Treat sheet columns missing from the existing table as mismatches
    #[arg(long = "require-all-columns")]
    pub require_all_columns: bool,
    /// How a missing table is created
    #[arg(long = "create-strategy", value_enum)]
    pub create_strategy: Option<CreateStrategy>,
    /// Rows shown before confirming
    #[arg(long = "preview-rows")]
    pub preview_rows: Option<usize>,
    /// Length of VARCHAR columns created for text
    #[arg(long = "text-length")]
    pub text_length: Option<u32>,
    /// Rows per progress batch
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,
    /// Row errors kept in the report
    #[arg(long = "max-errors")]
    pub max_errors: Option<usize>,
    /// Answer yes to every confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
    /// Report format
    #[arg(long, value_enum)]
    pub report: Option<ReportFormat>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct SheetsArgs {
    /// Workbook to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct TablesArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Args)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Table to describe
    #[arg(short = 't', long)]
    pub table: String,
    /// Sample rows to display
    #[arg(long, default_value_t = 5)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Existing table to validate against
    #[arg(short = 't', long)]
    pub table: String,
    /// How strictly declared types must match inferred types
    #[arg(long = "type-match", value_enum)]
    pub type_match: Option<TypeMatch>,
    /// Treat sheet columns missing from the table as mismatches
    #[arg(long = "require-all-columns")]
    pub require_all_columns: bool,
    /// Length of VARCHAR columns expected for text
    #[arg(long = "text-length")]
    pub text_length: Option<u32>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_column_type(value: &str) -> Result<(String, ColumnType), String> {
    let (column, ty) = value
        .split_once('=')
        .ok_or_else(|| format!("Expected `column=type`, got '{value}'"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err("Column name cannot be empty".to_string());
    }
    let ty = ty.parse::<ColumnType>().map_err(|err| err.to_string())?;
    Ok((column.to_string(), ty))
}
