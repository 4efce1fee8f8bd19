mod common;

use common::{Cell, TestWorkspace, num, text};
use sheet_to_sql::data::{ColumnType, Value};
use sheet_to_sql::error::UploadError;
use sheet_to_sql::frame::InferenceOptions;
use sheet_to_sql::workbook::{self, ReadOptions};

#[test]
fn reads_first_sheet_with_inferred_types() {
    let ws = TestWorkspace::new();
    let path = ws.write_xlsx(
        "orders.xlsx",
        &["Order Id", "Customer", "Amount", "Paid"],
        &[
            vec![num(1.0), text("Ada"), num(10.5), Cell::Bool(true)],
            vec![num(2.0), text("Grace"), num(3.0), Cell::Bool(false)],
            vec![num(3.0), Cell::Blank, num(7.75), Cell::Bool(true)],
        ],
    );

    let frame = workbook::read_frame(&path, &ReadOptions::default()).expect("read");

    assert_eq!(frame.row_count(), 3);
    assert_eq!(
        frame.column_names(),
        vec!["Order Id", "Customer", "Amount", "Paid"]
    );
    let types = frame
        .columns()
        .iter()
        .map(|c| c.column_type)
        .collect::<Vec<_>>();
    assert_eq!(
        types,
        vec![
            ColumnType::Integer,
            ColumnType::Text,
            ColumnType::Float,
            ColumnType::Boolean
        ]
    );
    assert_eq!(frame.column("Customer").unwrap().values[2], None);
}

#[test]
fn selects_sheet_by_name_and_lists_sheets() {
    let ws = TestWorkspace::new();
    let headers: &[&str] = &["code"];
    let first = vec![vec![text("a")]];
    let second = vec![vec![text("b")], vec![text("c")]];
    let path = ws.write_xlsx_sheets(
        "multi.xlsx",
        &[("First", headers, first.as_slice()), ("Second", headers, second.as_slice())],
    );

    assert_eq!(workbook::list_sheets(&path).unwrap(), vec!["First", "Second"]);

    let options = ReadOptions {
        sheet: Some("second".to_string()),
        ..ReadOptions::default()
    };
    let frame = workbook::read_frame(&path, &options).expect("read");
    assert_eq!(frame.row_count(), 2);

    let missing = ReadOptions {
        sheet: Some("Third".to_string()),
        ..ReadOptions::default()
    };
    assert!(matches!(
        workbook::read_frame(&path, &missing),
        Err(UploadError::Parse { .. })
    ));
}

#[test]
fn csv_input_is_inferred_from_text() {
    let ws = TestWorkspace::new();
    let path = ws.write(
        "people.csv",
        "id,name,joined,active\n1,Ada,2024-01-02,yes\n\n2,,2024-02-03 10:00:00,no\n",
    );

    let frame = workbook::read_frame(&path, &ReadOptions::default()).expect("read");

    assert_eq!(frame.row_count(), 2);
    assert_eq!(frame.column("id").unwrap().column_type, ColumnType::Integer);
    assert_eq!(frame.column("joined").unwrap().column_type, ColumnType::Timestamp);
    assert_eq!(frame.column("active").unwrap().column_type, ColumnType::Boolean);
    assert_eq!(
        frame.column("name").unwrap().values[1],
        Some(Value::Text(String::new()))
    );
}

#[test]
fn delimited_input_honours_encoding_and_delimiter() {
    let ws = TestWorkspace::new();
    // "café" in windows-1252
    let path = ws.write_bytes("legacy.txt", b"city;count\ncaf\xe9;3\n");
    let options = ReadOptions {
        delimiter: Some(b';'),
        encoding: Some("windows-1252".to_string()),
        ..ReadOptions::default()
    };

    let frame = workbook::read_frame(&path, &options).expect("read");
    assert_eq!(
        frame.column("city").unwrap().values[0],
        Some(Value::Text("café".to_string()))
    );

    let utf8 = ReadOptions {
        delimiter: Some(b';'),
        ..ReadOptions::default()
    };
    assert!(workbook::read_frame(&path, &utf8).is_err());
}

#[test]
fn headers_are_normalized_and_overrides_applied() {
    let ws = TestWorkspace::new();
    let path = ws.write("zips.csv", "Zip Code,Zip Code\n01234,5\n");
    let options = ReadOptions {
        normalize_headers: true,
        inference: InferenceOptions {
            overrides: vec![("zip_code".to_string(), ColumnType::Text)],
            ..InferenceOptions::default()
        },
        ..ReadOptions::default()
    };

    let frame = workbook::read_frame(&path, &options).expect("read");
    assert_eq!(frame.column_names(), vec!["zip_code", "zip_code_1"]);
    assert_eq!(frame.column("zip_code").unwrap().column_type, ColumnType::Text);
    assert_eq!(frame.column("zip_code_1").unwrap().column_type, ColumnType::Integer);
}

#[test]
fn missing_and_unsupported_files_are_parse_errors() {
    let ws = TestWorkspace::new();
    let missing = ws.path().join("nope.xlsx");
    assert!(matches!(
        workbook::read_frame(&missing, &ReadOptions::default()),
        Err(UploadError::Parse { .. })
    ));

    let pdf = ws.write("report.pdf", "%PDF");
    assert!(matches!(
        workbook::read_frame(&pdf, &ReadOptions::default()),
        Err(UploadError::Parse { .. })
    ));

    let corrupt = ws.write("broken.xlsx", "not a zip archive");
    assert!(matches!(
        workbook::read_frame(&corrupt, &ReadOptions::default()),
        Err(UploadError::Parse { .. })
    ));
}
