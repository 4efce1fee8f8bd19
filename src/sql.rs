//! SQL text generation.
//!
//! Every table and column name reaching a statement goes through
//! [`quote_ident`]; values are always bound as parameters.

use itertools::Itertools;

use crate::error::UploadError;

pub const MAX_IDENTIFIER_LEN: usize = 128;

pub fn validate_ident(name: &str) -> Result<(), UploadError> {
    let reason = if name.trim().is_empty() {
        Some("identifier cannot be empty")
    } else if name.chars().count() > MAX_IDENTIFIER_LEN {
        Some("identifier is longer than 128 characters")
    } else if name.chars().any(char::is_control) {
        Some("identifier contains control characters")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(UploadError::InvalidIdentifier {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> Result<String, UploadError> {
    validate_ident(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

pub fn create_table(table: &str, columns: &[(String, String)]) -> Result<String, UploadError> {
    let definitions = columns
        .iter()
        .map(|(name, ty)| quote_ident(name).map(|quoted| format!("{quoted} {ty}")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(
        "CREATE TABLE {} ({})",
        quote_ident(table)?,
        definitions.join(", ")
    ))
}

pub fn drop_table_if_exists(table: &str) -> Result<String, UploadError> {
    Ok(format!("DROP TABLE IF EXISTS {}", quote_ident(table)?))
}

pub fn insert(table: &str, columns: &[String]) -> Result<String, UploadError> {
    let names = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Result<Vec<_>, _>>()?;
    let placeholders = std::iter::repeat_n("?", columns.len()).join(", ");
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        quote_ident(table)?,
        names.join(", ")
    ))
}

pub fn select_all(table: &str, limit: Option<usize>) -> Result<String, UploadError> {
    let mut sql = format!("SELECT * FROM {}", quote_ident(table)?);
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok(sql)
}

pub fn count_rows(table: &str) -> Result<String, UploadError> {
    Ok(format!("SELECT COUNT(*) FROM {}", quote_ident(table)?))
}
