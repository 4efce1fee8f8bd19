//! Optional YAML profile holding connection and upload defaults.
//!
//! ```yaml
//! connection:
//!   server: ./data
//!   database: warehouse
//!   auth: integrated
//! upload:
//!   mode: standard
//!   if_exists: replace
//!   text_length: 512
//!   column_types:
//!     zip: text
//! ```
//!
//! Command-line flags take precedence over every value read here.

use std::{collections::BTreeMap, fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    connection::AuthKind,
    data::ColumnType,
    loader::FailurePolicy,
    report::ReportFormat,
    table_manager::CreateStrategy,
    upload::{ExistingTablePolicy, UploadMode},
    validator::TypeMatch,
};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub connection: ConnectionProfile,
    pub upload: UploadProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionProfile {
    pub server: Option<PathBuf>,
    pub database: Option<String>,
    pub auth: Option<AuthKind>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadProfile {
    pub mode: Option<UploadMode>,
    pub if_exists: Option<ExistingTablePolicy>,
    pub on_row_error: Option<FailurePolicy>,
    pub type_match: Option<TypeMatch>,
    pub require_all_columns: Option<bool>,
    pub create_strategy: Option<CreateStrategy>,
    pub sample_rows: Option<usize>,
    pub preview_rows: Option<usize>,
    pub text_length: Option<u32>,
    pub chunk_size: Option<usize>,
    pub max_errors: Option<usize>,
    pub report: Option<ReportFormat>,
    pub normalize_headers: Option<bool>,
    pub column_types: BTreeMap<String, ColumnType>,
}

impl Profile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Opening profile {path:?}"))?;
        Self::from_yaml(&raw).with_context(|| format!("Parsing profile {path:?}"))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Loads the profile when a path is given, otherwise returns defaults.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
