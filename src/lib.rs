pub mod cli;
pub mod connection;
pub mod data;
pub mod database;
pub mod error;
pub mod frame;
pub mod loader;
pub mod profile;
pub mod report;
pub mod sql;
pub mod table;
pub mod table_manager;
pub mod type_map;
pub mod upload;
pub mod validator;
pub mod workbook;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands, ConnectionArgs, SheetArgs},
    connection::{AuthMode, ConnectionConfig, Session},
    frame::{DEFAULT_SAMPLE_ROWS, InferenceOptions},
    loader::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_REPORTED_ERRORS, LoadOptions},
    profile::{ConnectionProfile, Profile, UploadProfile},
    report::ReportFormat,
    type_map::{DEFAULT_TEXT_LENGTH, TypeMapper},
    upload::{AssumeYes, Prompter, TerminalPrompter, UploadMode, UploadOptions, UploadOutcome, Uploader},
    validator::ValidationOptions,
    workbook::ReadOptions,
};

const DEFAULT_PREVIEW_ROWS: usize = 10;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_to_sql", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Upload(args) => handle_upload(&args),
        Commands::Preview(args) => handle_preview(&args),
        Commands::Sheets(args) => handle_sheets(&args),
        Commands::Tables(args) => handle_tables(&args),
        Commands::Describe(args) => handle_describe(&args),
        Commands::Check(args) => handle_check(&args),
    }
}

fn connection_config(args: &ConnectionArgs, profile: &ConnectionProfile) -> Result<ConnectionConfig> {
    let database = args
        .database
        .clone()
        .or_else(|| profile.database.clone())
        .ok_or_else(|| {
            anyhow!("No database given; pass --database or set connection.database in the profile")
        })?;
    let auth = AuthMode::from_kind(
        args.auth.or(profile.auth).unwrap_or_default(),
        args.username.clone().or_else(|| profile.username.clone()),
        args.password.clone().or_else(|| profile.password.clone()),
    );
    let server = args.server.clone().or_else(|| profile.server.clone());
    Ok(ConnectionConfig::new(server, database, auth))
}

fn read_options(args: &SheetArgs, profile: &UploadProfile) -> ReadOptions {
    let mut overrides = profile
        .column_types
        .iter()
        .map(|(column, ty)| (column.clone(), *ty))
        .collect::<Vec<_>>();
    overrides.extend(args.column_types.iter().cloned());
    ReadOptions {
        sheet: args.sheet.clone(),
        delimiter: args.delimiter,
        encoding: args.input_encoding.clone(),
        normalize_headers: args.normalize_headers || profile.normalize_headers.unwrap_or(false),
        inference: InferenceOptions {
            sample_rows: args
                .sample_rows
                .or(profile.sample_rows)
                .unwrap_or(DEFAULT_SAMPLE_ROWS),
            overrides,
        },
    }
}

fn open_session(args: &ConnectionArgs, profile: &Profile) -> Result<Session> {
    let config = connection_config(args, &profile.connection)?;
    debug!("Connection settings: {config:?}");
    Ok(Session::open(&config)?)
}

fn handle_upload(args: &cli::UploadArgs) -> Result<()> {
    let profile = Profile::load_optional(args.connection.profile.as_deref())?;
    let defaults = &profile.upload;
    let read = read_options(&args.sheet, defaults);
    let mode = args.mode.or(defaults.mode).unwrap_or_default();
    let format = args.report.or(defaults.report).unwrap_or_default();
    let preview_rows = args
        .preview_rows
        .or(defaults.preview_rows)
        .unwrap_or(DEFAULT_PREVIEW_ROWS);
    let options = UploadOptions {
        mode,
        if_exists: args.if_exists.or(defaults.if_exists),
        create_strategy: args
            .create_strategy
            .or(defaults.create_strategy)
            .unwrap_or_default(),
        validation: ValidationOptions {
            type_match: args.type_match.or(defaults.type_match).unwrap_or_default(),
            require_all_columns: args.require_all_columns
                || defaults.require_all_columns.unwrap_or(false),
        },
        load: LoadOptions {
            failure_policy: args.on_row_error.or(defaults.on_row_error).unwrap_or_default(),
            chunk_size: args
                .chunk_size
                .or(defaults.chunk_size)
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            max_reported_errors: args
                .max_errors
                .or(defaults.max_errors)
                .unwrap_or(DEFAULT_MAX_REPORTED_ERRORS),
        },
        mapper: TypeMapper::new(
            args.text_length
                .or(defaults.text_length)
                .unwrap_or(DEFAULT_TEXT_LENGTH),
        ),
    };
    info!(
        "Uploading {:?} in {mode} mode (existing tables: {:?})",
        args.sheet.input,
        options.existing_policy()
    );

    let mut session = open_session(&args.connection, &profile)?;
    let mut uploader = Uploader::new(session.database_mut(), options);
    let frame = uploader.load_file(&args.sheet.input, &read)?;

    let preview = table::render_frame(&frame, preview_rows);
    if format == ReportFormat::Json {
        eprint!("{preview}");
    } else {
        print!("{preview}");
    }

    let suggested = args
        .table
        .clone()
        .unwrap_or_else(|| upload::suggested_table_name(&args.sheet.input));
    let mut prompter: Box<dyn Prompter> = if args.yes {
        Box::new(AssumeYes)
    } else if mode == UploadMode::Fast {
        Box::new(TerminalPrompter::stdio().accepting_table())
    } else {
        Box::new(TerminalPrompter::stdio())
    };

    match uploader.upload(frame, &suggested, prompter.as_mut())? {
        UploadOutcome::Reported(report) => {
            let rendered = report
                .render(format)
                .with_context(|| format!("Rendering report for '{}'", report.table))?;
            println!("{}", rendered.trim_end());
            if !report.is_success() {
                warn!(
                    "{} of {} row(s) could not be inserted into '{}'",
                    report.rows_failed, report.rows_attempted, report.table
                );
            }
        }
        UploadOutcome::Skipped { table } => {
            info!("Table '{table}' already exists; nothing was uploaded");
        }
        UploadOutcome::Cancelled { table, stage } => {
            info!("Upload into '{table}' cancelled at {stage:?}");
        }
    }
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let read = read_options(&args.sheet, &UploadProfile::default());
    let frame = workbook::read_frame(&args.sheet.input, &read)?;
    print!("{}", table::render_frame(&frame, args.rows));
    println!(
        "{} row(s) x {} column(s)",
        frame.row_count(),
        frame.column_count()
    );
    Ok(())
}

fn handle_sheets(args: &cli::SheetsArgs) -> Result<()> {
    for name in workbook::list_sheets(&args.input)? {
        println!("{name}");
    }
    Ok(())
}

fn handle_tables(args: &cli::TablesArgs) -> Result<()> {
    let profile = Profile::load_optional(args.connection.profile.as_deref())?;
    let session = open_session(&args.connection, &profile)?;
    let tables = table_manager::list_tables(session.database())?;
    if tables.is_empty() {
        info!("No tables in {}", session.database().target());
    }
    for name in tables {
        println!("{name}");
    }
    Ok(())
}

fn handle_describe(args: &cli::DescribeArgs) -> Result<()> {
    sql::validate_ident(&args.table)?;
    let profile = Profile::load_optional(args.connection.profile.as_deref())?;
    let session = open_session(&args.connection, &profile)?;
    let db = session.database();
    let Some(descriptor) = table_manager::describe_table(db, &args.table)? else {
        bail!("Table '{}' does not exist", args.table);
    };
    print!("{}", table::render_descriptor(&descriptor));
    if args.rows > 0 {
        let sample = db
            .fetch(&sql::select_all(&descriptor.name, Some(args.rows))?)
            .with_context(|| format!("Reading sample rows from '{}'", descriptor.name))?;
        println!();
        print!("{}", table::render_fetched(&sample));
    }
    let count = db.count_rows(&descriptor.name)?;
    println!("{count} row(s)");
    Ok(())
}

fn handle_check(args: &cli::CheckArgs) -> Result<()> {
    sql::validate_ident(&args.table)?;
    let profile = Profile::load_optional(args.connection.profile.as_deref())?;
    let read = read_options(&args.sheet, &profile.upload);
    let frame = workbook::read_frame(&args.sheet.input, &read)?;
    let session = open_session(&args.connection, &profile)?;
    let Some(existing) = table_manager::describe_table(session.database(), &args.table)? else {
        bail!("Table '{}' does not exist", args.table);
    };
    let mapper = TypeMapper::new(
        args.text_length
            .or(profile.upload.text_length)
            .unwrap_or(DEFAULT_TEXT_LENGTH),
    );
    let options = ValidationOptions {
        type_match: args
            .type_match
            .or(profile.upload.type_match)
            .unwrap_or_default(),
        require_all_columns: args.require_all_columns
            || profile.upload.require_all_columns.unwrap_or(false),
    };
    validator::validate(&frame, &existing, &mapper, &options)?;
    println!(
        "{} column(s) of {:?} match table '{}'",
        frame.column_count(),
        args.sheet.input,
        existing.name
    );
    Ok(())
}
