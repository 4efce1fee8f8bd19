//! Upload orchestration.
//!
//! [`Uploader`] walks one file through the stages
//! `Idle → FileLoaded → Confirmed → TableResolved → Validated → Inserted →
//! Reported`. What happens when the target table already exists is decided by
//! [`ExistingTablePolicy`], whose default depends on the [`UploadMode`]: Fast
//! stops silently, Standard asks before dropping and recreating the table and
//! validates column types afterwards.

use std::{
    fmt,
    io::{self, BufRead, Write},
    path::Path,
};

use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    database::{Database, TableDescriptor},
    error::UploadError,
    frame::TabularFrame,
    loader::{self, LoadOptions},
    report::UploadReport,
    sql,
    table_manager::{self, CreateStrategy},
    type_map::TypeMapper,
    validator::{self, ValidationOptions},
    workbook::{self, ReadOptions},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum UploadMode {
    /// No prompts and no type validation; existing tables are left untouched
    Fast,
    /// Confirm before replacing an existing table and validate column types
    #[default]
    Standard,
}

impl UploadMode {
    pub fn default_existing_policy(&self) -> ExistingTablePolicy {
        match self {
            UploadMode::Fast => ExistingTablePolicy::Skip,
            UploadMode::Standard => ExistingTablePolicy::Prompt,
        }
    }
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadMode::Fast => f.write_str("fast"),
            UploadMode::Standard => f.write_str("standard"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ExistingTablePolicy {
    /// Stop without touching the table
    Skip,
    /// Ask whether to drop and recreate the table
    Prompt,
    /// Drop and recreate the table without asking
    Replace,
    /// Insert into the existing table
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UploadStage {
    Idle,
    FileLoaded,
    Confirmed,
    TableResolved,
    Validated,
    Inserted,
    Reported,
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub mode: UploadMode,
    /// Overrides the mode's default existing-table behavior.
    pub if_exists: Option<ExistingTablePolicy>,
    pub create_strategy: CreateStrategy,
    pub validation: ValidationOptions,
    pub load: LoadOptions,
    pub mapper: TypeMapper,
}

impl UploadOptions {
    pub fn existing_policy(&self) -> ExistingTablePolicy {
        self.if_exists
            .unwrap_or_else(|| self.mode.default_existing_policy())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Reported(UploadReport),
    /// Fast mode found an existing table; nothing was changed.
    Skipped { table: String },
    Cancelled { table: String, stage: UploadStage },
}

/// User decisions the pipeline waits on.
pub trait Prompter {
    /// Returns the table name to upload into, or `None` to cancel.
    fn confirm_table(&mut self, suggested: &str, rows: usize) -> Result<Option<String>, UploadError>;
    fn confirm_replace(&mut self, table: &str) -> Result<bool, UploadError>;
}

/// Accepts every suggestion; used for `--yes` and scripted runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm_table(&mut self, suggested: &str, _rows: usize) -> Result<Option<String>, UploadError> {
        Ok(Some(suggested.to_string()))
    }

    fn confirm_replace(&mut self, _table: &str) -> Result<bool, UploadError> {
        Ok(true)
    }
}

/// Line-based prompts, answers read from `input`.
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
    accept_table: bool,
}

impl TerminalPrompter<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            accept_table: false,
        }
    }

    /// Takes the suggested table name without asking; replacing an existing
    /// table is still confirmed.
    pub fn accepting_table(mut self) -> Self {
        self.accept_table = true;
        self
    }

    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask_yes_no(&mut self, question: &str) -> io::Result<bool> {
        let answer = self.ask(&format!("{question} [y/N]: "))?;
        Ok(matches!(
            answer.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("y") | Some("yes")
        ))
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn confirm_table(&mut self, suggested: &str, rows: usize) -> Result<Option<String>, UploadError> {
        if self.accept_table {
            return Ok(Some(suggested.to_string()));
        }
        let Some(answer) = self.ask(&format!("Target table [{suggested}]: "))? else {
            return Ok(None);
        };
        let table = if answer.is_empty() {
            suggested.to_string()
        } else {
            answer
        };
        if self.ask_yes_no(&format!("Upload {rows} row(s) into '{table}'?"))? {
            Ok(Some(table))
        } else {
            Ok(None)
        }
    }

    fn confirm_replace(&mut self, table: &str) -> Result<bool, UploadError> {
        Ok(self.ask_yes_no(&format!(
            "Table '{table}' already exists. Drop and recreate it?"
        ))?)
    }
}

/// Default table name: the file name without its extension.
pub fn suggested_table_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or_else(|| "upload".to_string())
}

pub struct Uploader<'a> {
    db: &'a mut dyn Database,
    options: UploadOptions,
    stage: UploadStage,
}

impl<'a> Uploader<'a> {
    pub fn new(db: &'a mut dyn Database, options: UploadOptions) -> Self {
        Self {
            db,
            options,
            stage: UploadStage::Idle,
        }
    }

    pub fn stage(&self) -> UploadStage {
        self.stage
    }

    fn advance(&mut self, next: UploadStage) {
        debug!("Upload stage {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }

    /// Idle → FileLoaded.
    pub fn load_file(&mut self, path: &Path, read: &ReadOptions) -> Result<TabularFrame, UploadError> {
        let frame = workbook::read_frame(path, read)?;
        self.advance(UploadStage::FileLoaded);
        Ok(frame)
    }

    /// Runs the remaining stages for an already parsed frame.
    pub fn upload(
        &mut self,
        mut frame: TabularFrame,
        suggested_table: &str,
        prompter: &mut dyn Prompter,
    ) -> Result<UploadOutcome, UploadError> {
        if self.stage == UploadStage::Idle {
            self.advance(UploadStage::FileLoaded);
        }

        let Some(table) = prompter.confirm_table(suggested_table, frame.row_count())? else {
            info!("Upload cancelled");
            return Ok(UploadOutcome::Cancelled {
                table: suggested_table.to_string(),
                stage: self.stage,
            });
        };
        sql::validate_ident(&table)?;
        self.advance(UploadStage::Confirmed);

        let existed = table_manager::table_exists(&*self.db, &table)?;
        let mut created = false;
        let mut replaced = false;
        // Declared types as issued by the create statement; the engine may
        // report them back without parameters.
        let mut fresh: Option<TableDescriptor> = None;
        if existed {
            match self.options.existing_policy() {
                ExistingTablePolicy::Skip => {
                    debug!("Table '{table}' exists, leaving it untouched");
                    return Ok(UploadOutcome::Skipped { table });
                }
                ExistingTablePolicy::Prompt => {
                    if !prompter.confirm_replace(&table)? {
                        info!("Upload cancelled, table '{table}' kept");
                        return Ok(UploadOutcome::Cancelled {
                            table,
                            stage: self.stage,
                        });
                    }
                    fresh = Some(self.recreate(&table, &frame)?);
                    replaced = true;
                }
                ExistingTablePolicy::Replace => {
                    fresh = Some(self.recreate(&table, &frame)?);
                    replaced = true;
                }
                ExistingTablePolicy::Append => {
                    info!("Appending to existing table '{table}'");
                }
            }
        } else {
            self.create(&table, &frame)?;
            created = true;
        }
        self.advance(UploadStage::TableResolved);

        let target = self.resolved_table(&table)?;
        if self.options.mode == UploadMode::Standard && existed {
            validator::validate(
                &frame,
                fresh.as_ref().unwrap_or(&target),
                &self.options.mapper,
                &self.options.validation,
            )?;
            self.advance(UploadStage::Validated);
        }

        let (normalization, summary) = loader::load_frame(
            &mut *self.db,
            &mut frame,
            &target,
            &self.options.mapper,
            &self.options.load,
        )?;
        self.advance(UploadStage::Inserted);

        let mut report = UploadReport::new(&target.name, self.options.mode, normalization, summary);
        report.created = created;
        report.replaced = replaced;
        report.table_row_count = match self.db.count_rows(&target.name) {
            Ok(count) => Some(count),
            Err(err) => {
                warn!("Could not count rows in '{}': {err:#}", target.name);
                None
            }
        };
        self.advance(UploadStage::Reported);
        Ok(UploadOutcome::Reported(report))
    }

    fn create(&mut self, table: &str, frame: &TabularFrame) -> Result<TableDescriptor, UploadError> {
        match self.options.create_strategy {
            CreateStrategy::Inferred => {
                let descriptor = TableDescriptor::from_frame(table, frame, &self.options.mapper);
                table_manager::create_table(&mut *self.db, &descriptor)
            }
            CreateStrategy::Placeholder => {
                table_manager::create_placeholder_table(&mut *self.db, table)
            }
        }
    }

    fn recreate(&mut self, table: &str, frame: &TabularFrame) -> Result<TableDescriptor, UploadError> {
        table_manager::drop_table(&mut *self.db, table)?;
        self.create(table, frame)
    }

    fn resolved_table(&self, table: &str) -> Result<TableDescriptor, UploadError> {
        table_manager::describe_table(&*self.db, table)?.ok_or_else(|| UploadError::Inspect {
            table: table.to_string(),
            source: anyhow::anyhow!("table not found after it was resolved"),
        })
    }
}
