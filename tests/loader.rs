mod common;

use common::{execute, fetch_all, memory_db};
use sheet_to_sql::data::{ColumnType, Value};
use sheet_to_sql::database::{ColumnSpec, Database, TableDescriptor};
use sheet_to_sql::error::UploadError;
use sheet_to_sql::frame::{Column, TabularFrame};
use sheet_to_sql::loader::{self, FailurePolicy, InsertPlan, LoadOptions};
use sheet_to_sql::table_manager;
use sheet_to_sql::type_map::TypeMapper;

fn txt(v: &str) -> Option<Value> {
    Some(Value::Text(v.to_string()))
}

fn descriptor_for(db: &dyn Database, table: &str) -> TableDescriptor {
    table_manager::describe_table(db, table)
        .expect("describe")
        .expect("table exists")
}

fn create_from_frame(db: &mut dyn Database, table: &str, frame: &TabularFrame) -> TableDescriptor {
    let descriptor = TableDescriptor::from_frame(table, frame, &TypeMapper::default());
    table_manager::create_table(db, &descriptor).expect("create table");
    descriptor_for(db, table)
}

#[test]
fn empty_strings_become_null_for_every_column_type() {
    let mut db = memory_db();
    let mut frame = TabularFrame::from_columns(vec![
        Column::new("i", ColumnType::Integer, vec![Some(Value::Integer(1)), txt("")]),
        Column::new("f", ColumnType::Float, vec![Some(Value::Float(2.5)), txt("")]),
        Column::new("b", ColumnType::Boolean, vec![Some(Value::Boolean(true)), txt("")]),
        Column::new("t", ColumnType::Timestamp, vec![txt("2024-05-06 07:08:09"), txt("")]),
        Column::new("s", ColumnType::Text, vec![txt("x"), txt("")]),
    ])
    .unwrap();
    let target = create_from_frame(&mut db, "blanks", &frame);

    let (normalization, summary) = loader::load_frame(
        &mut db,
        &mut frame,
        &target,
        &TypeMapper::default(),
        &LoadOptions::default(),
    )
    .expect("load");

    assert_eq!(normalization.emptied, 5);
    assert_eq!(normalization.coerced, 0);
    assert_eq!(summary.succeeded, 2);
    let rows = fetch_all(&db, "blanks");
    assert_eq!(rows[1], vec![None, None, None, None, None]);
    assert_eq!(rows[0][4], txt("x"));
}

#[test]
fn non_numeric_values_in_numeric_columns_are_stored_as_null() {
    let mut db = memory_db();
    let mut frame = TabularFrame::from_columns(vec![
        Column::new(
            "qty",
            ColumnType::Integer,
            vec![Some(Value::Integer(4)), txt("n/a"), txt(" 12 ")],
        ),
        Column::new(
            "price",
            ColumnType::Float,
            vec![txt("abc"), Some(Value::Float(1.5)), Some(Value::Integer(3))],
        ),
    ])
    .unwrap();
    let target = create_from_frame(&mut db, "amounts", &frame);

    let (normalization, summary) = loader::load_frame(
        &mut db,
        &mut frame,
        &target,
        &TypeMapper::default(),
        &LoadOptions::default(),
    )
    .expect("load");

    assert_eq!(normalization.coerced, 2);
    assert_eq!(summary.failed, 0);
    let rows = fetch_all(&db, "amounts");
    assert_eq!(
        rows,
        vec![
            vec![Some(Value::Integer(4)), None],
            vec![None, Some(Value::Float(1.5))],
            vec![Some(Value::Integer(12)), Some(Value::Float(3.0))],
        ]
    );
}

fn strict_table(db: &mut dyn Database) -> InsertPlan {
    execute(db, "CREATE TABLE strict (id BIGINT NOT NULL, name VARCHAR)");
    let target = TableDescriptor {
        name: "strict".to_string(),
        columns: vec![
            ColumnSpec::new("id", "BIGINT"),
            ColumnSpec::new("name", "VARCHAR"),
        ],
    };
    let frame = TabularFrame::from_columns(vec![
        Column::new("id", ColumnType::Integer, Vec::new()),
        Column::new("name", ColumnType::Text, Vec::new()),
    ])
    .unwrap();
    InsertPlan::for_frame(&frame, &target, &TypeMapper::default()).expect("plan")
}

fn strict_rows() -> Vec<Vec<Option<Value>>> {
    vec![
        vec![Some(Value::Integer(1)), txt("one")],
        vec![None, txt("missing id")],
        vec![Some(Value::Integer(3)), txt("three")],
        vec![None, txt("missing again")],
    ]
}

#[test]
fn continue_policy_records_failures_and_keeps_going() {
    let mut db = memory_db();
    let plan = strict_table(&mut db);
    let options = LoadOptions {
        max_reported_errors: 1,
        ..LoadOptions::default()
    };

    let summary = loader::load_rows(&mut db, &plan, strict_rows(), &options).expect("load");

    assert_eq!(summary.attempted, 4);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].row, 2);
    assert_eq!(db.count_rows("strict").unwrap(), 2);
}

#[test]
fn abort_policy_rolls_back_on_first_failure() {
    let mut db = memory_db();
    let plan = strict_table(&mut db);
    let options = LoadOptions {
        failure_policy: FailurePolicy::Abort,
        ..LoadOptions::default()
    };

    let err = loader::load_rows(&mut db, &plan, strict_rows(), &options).expect_err("abort");

    assert!(matches!(err, UploadError::RowInsert { row: 2, .. }));
    assert_eq!(db.count_rows("strict").unwrap(), 0);
}

#[test]
fn abort_policy_commits_clean_loads() {
    let mut db = memory_db();
    let plan = strict_table(&mut db);
    let options = LoadOptions {
        failure_policy: FailurePolicy::Abort,
        chunk_size: 1,
        ..LoadOptions::default()
    };
    let rows = vec![
        vec![Some(Value::Integer(1)), txt("one")],
        vec![Some(Value::Integer(2)), None],
    ];

    let summary = loader::load_rows(&mut db, &plan, rows, &options).expect("load");
    assert_eq!(summary.succeeded, 2);
    assert_eq!(db.count_rows("strict").unwrap(), 2);
}

#[test]
fn insert_plan_uses_table_column_names() {
    let target = TableDescriptor {
        name: "Mixed".to_string(),
        columns: vec![ColumnSpec::new("Amount", "DOUBLE"), ColumnSpec::new("ID", "BIGINT")],
    };
    let frame = TabularFrame::from_columns(vec![
        Column::new("id", ColumnType::Integer, Vec::new()),
        Column::new("amount", ColumnType::Float, Vec::new()),
    ])
    .unwrap();
    let plan = InsertPlan::for_frame(&frame, &target, &TypeMapper::default()).unwrap();
    assert_eq!(plan.columns, vec!["ID", "Amount"]);
    assert_eq!(
        plan.sql,
        "INSERT INTO \"Mixed\" (\"ID\", \"Amount\") VALUES (?, ?)"
    );
}
