//! Compares an uploaded frame against an existing table's declared types.

use std::{fmt, sync::OnceLock};

use clap::ValueEnum;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    database::TableDescriptor,
    error::{ColumnMismatch, UploadError},
    frame::TabularFrame,
    type_map::TypeMapper,
};

/// How strictly a declared column type must match the inferred one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TypeMatch {
    /// Inferred type must appear within the declared type
    Contains,
    /// Declared and inferred types must be identical
    Exact,
    /// Like `contains`, ignoring parameters such as text lengths
    #[default]
    Base,
}

impl fmt::Display for TypeMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TypeMatch::Contains => "contains",
            TypeMatch::Exact => "exact",
            TypeMatch::Base => "base",
        };
        f.write_str(label)
    }
}

impl TypeMatch {
    pub fn accepts(&self, declared: &str, inferred: &str) -> bool {
        let declared = declared.trim().to_ascii_uppercase();
        let inferred = inferred.trim().to_ascii_uppercase();
        match self {
            TypeMatch::Contains => declared.contains(&inferred),
            TypeMatch::Exact => declared == inferred,
            TypeMatch::Base => {
                let inferred = strip_parameters(&inferred);
                !inferred.is_empty() && strip_parameters(&declared).contains(&inferred)
            }
        }
    }
}

fn strip_parameters(type_name: &str) -> String {
    static PARAMS: OnceLock<Regex> = OnceLock::new();
    let re = PARAMS.get_or_init(|| Regex::new(r"\s*\([^)]*\)").expect("valid regex"));
    re.replace_all(type_name, "").trim().to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    pub type_match: TypeMatch,
    /// Report frame columns missing from the table instead of skipping them.
    pub require_all_columns: bool,
}

/// Returns the column-level mismatches; empty means the frame fits.
pub fn find_mismatches(
    frame: &TabularFrame,
    existing: &TableDescriptor,
    mapper: &TypeMapper,
    options: &ValidationOptions,
) -> Vec<ColumnMismatch> {
    let mut mismatches = Vec::new();
    for column in frame.columns() {
        let expected = mapper.map(column.column_type).token();
        match existing.column(&column.name) {
            Some(spec) => {
                if !options.type_match.accepts(&spec.declared_type, &expected) {
                    mismatches.push(ColumnMismatch {
                        column: column.name.clone(),
                        expected,
                        found: Some(spec.declared_type.clone()),
                    });
                }
            }
            None if options.require_all_columns => mismatches.push(ColumnMismatch {
                column: column.name.clone(),
                expected,
                found: None,
            }),
            None => debug!(
                "Column '{}' is not in table '{}', skipping type check",
                column.name, existing.name
            ),
        }
    }
    mismatches
}

pub fn validate(
    frame: &TabularFrame,
    existing: &TableDescriptor,
    mapper: &TypeMapper,
    options: &ValidationOptions,
) -> Result<(), UploadError> {
    let mismatches = find_mismatches(frame, existing, mapper, options);
    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(UploadError::SchemaMismatch {
            table: existing.name.clone(),
            mismatches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_substring_based() {
        assert!(TypeMatch::Contains.accepts("VARCHAR(255)", "VARCHAR(255)"));
        assert!(TypeMatch::Contains.accepts("NVARCHAR(255)", "VARCHAR(255)"));
        assert!(!TypeMatch::Contains.accepts("VARCHAR", "VARCHAR(255)"));
    }

    #[test]
    fn base_ignores_parameters() {
        assert!(TypeMatch::Base.accepts("VARCHAR", "VARCHAR(255)"));
        assert!(TypeMatch::Base.accepts("varchar(50)", "VARCHAR(255)"));
        assert!(!TypeMatch::Base.accepts("BIGINT", "DOUBLE"));
    }

    #[test]
    fn exact_requires_identical_tokens() {
        assert!(TypeMatch::Exact.accepts(" bigint ", "BIGINT"));
        assert!(!TypeMatch::Exact.accepts("NVARCHAR(255)", "VARCHAR(255)"));
    }
}
