//! Reads uploaded files into a [`TabularFrame`].
//!
//! Spreadsheets (`xlsx`, `xlsm`, `xlsb`, `xls`, `ods`) are read with calamine;
//! the first row holds the headers. Delimited text (`csv`, `tsv`) goes through
//! the csv reader and is decoded with the requested encoding.

use std::{
    collections::HashSet,
    fs::File,
    io::BufReader,
    path::Path,
};

use calamine::{DataType, Reader, open_workbook_auto};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};

use crate::{
    data::{Value, excel_serial_to_datetime, normalize_column_name},
    error::UploadError,
    frame::{InferenceOptions, TabularFrame},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Spreadsheet,
    Delimited(u8),
}

impl InputFormat {
    /// Picks the reader from the file extension. An explicit delimiter always
    /// selects delimited text.
    pub fn detect(path: &Path, delimiter: Option<u8>) -> Result<Self, UploadError> {
        if let Some(delimiter) = delimiter {
            return Ok(InputFormat::Delimited(delimiter));
        }
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            e if SPREADSHEET_EXTENSIONS.contains(&e) => Ok(InputFormat::Spreadsheet),
            "csv" | "txt" => Ok(InputFormat::Delimited(DEFAULT_CSV_DELIMITER)),
            "tsv" | "tab" => Ok(InputFormat::Delimited(DEFAULT_TSV_DELIMITER)),
            "" => Err(UploadError::parse(path, "file has no extension")),
            other => Err(UploadError::parse(
                path,
                format!("unsupported file type '.{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Worksheet to read; the first sheet when unset.
    pub sheet: Option<String>,
    pub delimiter: Option<u8>,
    /// Encoding label for delimited input (UTF-8 when unset).
    pub encoding: Option<String>,
    pub normalize_headers: bool,
    pub inference: InferenceOptions,
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding, String> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| format!("unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

pub fn list_sheets(path: &Path) -> Result<Vec<String>, UploadError> {
    match InputFormat::detect(path, None)? {
        InputFormat::Spreadsheet => {
            let workbook = open_workbook_auto(path).map_err(|err| UploadError::parse(path, err))?;
            Ok(workbook.sheet_names().to_owned())
        }
        InputFormat::Delimited(_) => Ok(vec![default_sheet_label(path)]),
    }
}

fn default_sheet_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn read_frame(path: &Path, options: &ReadOptions) -> Result<TabularFrame, UploadError> {
    if !path.is_file() {
        return Err(UploadError::parse(path, "file not found"));
    }
    let (headers, rows) = match InputFormat::detect(path, options.delimiter)? {
        InputFormat::Spreadsheet => read_spreadsheet(path, options.sheet.as_deref())?,
        InputFormat::Delimited(delimiter) => {
            let encoding =
                resolve_encoding(options.encoding.as_deref()).map_err(|msg| UploadError::parse(path, msg))?;
            read_delimited(path, delimiter, encoding)?
        }
    };
    let headers = unique_headers(headers, options.normalize_headers);
    let frame = TabularFrame::from_rows(headers, rows, &options.inference)
        .map_err(|err| UploadError::parse(path, format!("{err:#}")))?;
    info!(
        "Loaded {} row(s) x {} column(s) from {path:?}",
        frame.row_count(),
        frame.column_count()
    );
    Ok(frame)
}

type RawTable = (Vec<String>, Vec<Vec<Option<Value>>>);

fn read_spreadsheet(path: &Path, sheet: Option<&str>) -> Result<RawTable, UploadError> {
    let mut workbook = open_workbook_auto(path).map_err(|err| UploadError::parse(path, err))?;
    let sheet_names = workbook.sheet_names().to_owned();
    let sheet_name = match sheet {
        Some(name) => sheet_names
            .iter()
            .find(|candidate| candidate.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| UploadError::parse(path, format!("sheet '{name}' not found")))?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| UploadError::parse(path, "workbook has no sheets"))?,
    };
    debug!("Reading sheet '{sheet_name}' of {} sheet(s)", sheet_names.len());

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| UploadError::parse(path, format!("sheet '{sheet_name}': {err}")))?;
    if range.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|cell| cell.to_string().trim().to_string()).collect())
        .unwrap_or_default();
    let data: Vec<Vec<Option<Value>>> = rows
        .map(|row| row.iter().map(cell_value).collect::<Vec<_>>())
        .filter(|row| row.iter().any(Option::is_some))
        .collect();
    Ok((headers, data))
}

fn cell_value(cell: &DataType) -> Option<Value> {
    match cell {
        DataType::Empty | DataType::Error(_) => None,
        DataType::String(s) => Some(Value::Text(s.clone())),
        DataType::Int(i) => Some(Value::Integer(*i)),
        DataType::Float(f) => Some(Value::Float(*f)),
        DataType::Bool(b) => Some(Value::Boolean(*b)),
        DataType::DateTime(serial) => excel_serial_to_datetime(*serial).map(Value::Timestamp),
        DataType::Duration(days) => Some(Value::Float(*days)),
        DataType::DateTimeIso(text) | DataType::DurationIso(text) => Some(Value::Text(text.clone())),
    }
}

fn read_delimited(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<RawTable, UploadError> {
    let file = File::open(path).map_err(|err| UploadError::parse(path, err))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let header_record = reader
        .byte_headers()
        .map_err(|err| UploadError::parse(path, err))?
        .clone();
    let headers = decode_record(&header_record, encoding)
        .map_err(|msg| UploadError::parse(path, msg))?
        .into_iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| UploadError::parse(path, format!("row {}: {err}", idx + 1)))?;
        let fields = decode_record(&record, encoding)
            .map_err(|msg| UploadError::parse(path, format!("row {}: {msg}", idx + 1)))?;
        if fields.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        rows.push(fields.into_iter().map(|field| Some(Value::Text(field))).collect());
    }
    Ok((headers, rows))
}

fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>, String> {
    record
        .iter()
        .map(|field| {
            let (text, _, had_errors) = encoding.decode(field);
            if had_errors {
                Err(format!("failed to decode text as {}", encoding.name()))
            } else {
                Ok(text.into_owned())
            }
        })
        .collect()
}

/// Fills blank headers with `column_N` and suffixes repeats with `_1`, `_2`...
fn unique_headers(headers: Vec<String>, normalize: bool) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(idx, header)| {
            let base = if header.trim().is_empty() {
                format!("column_{}", idx + 1)
            } else if normalize {
                normalize_column_name(&header)
            } else {
                header
            };
            let mut candidate = base.clone();
            let mut counter = 1;
            while !seen.insert(candidate.to_ascii_lowercase()) {
                candidate = format!("{base}_{counter}");
                counter += 1;
            }
            candidate
        })
        .collect()
}
