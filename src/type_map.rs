use std::fmt;

use serde::Serialize;

use crate::data::ColumnType;

pub const DEFAULT_TEXT_LENGTH: u32 = 255;

/// Database column type chosen for a frame column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SqlType {
    BigInt,
    Double,
    Boolean,
    Timestamp,
    Varchar(u32),
}

impl SqlType {
    pub fn token(&self) -> String {
        match self {
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Double => "DOUBLE".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({len})"),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMapper {
    pub text_length: u32,
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self {
            text_length: DEFAULT_TEXT_LENGTH,
        }
    }
}

impl TypeMapper {
    pub fn new(text_length: u32) -> Self {
        Self {
            text_length: text_length.max(1),
        }
    }

    /// Anything that is not numeric, boolean or temporal lands in bounded text.
    pub fn map(&self, column_type: ColumnType) -> SqlType {
        match column_type {
            ColumnType::Integer => SqlType::BigInt,
            ColumnType::Float => SqlType::Double,
            ColumnType::Boolean => SqlType::Boolean,
            ColumnType::Timestamp => SqlType::Timestamp,
            ColumnType::Text => SqlType::Varchar(self.text_length),
        }
    }
}

pub fn map_column_type(column_type: ColumnType) -> SqlType {
    TypeMapper::default().map(column_type)
}
