//! Connection settings and the per-command database session.
//!
//! A [`Session`] is opened once per command from an immutable
//! [`ConnectionConfig`] and passed by reference to every component that needs
//! the database. Dropping it closes the connection.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::anyhow;
use clap::ValueEnum;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    database::{Database, DuckDbDatabase},
    error::UploadError,
};

pub const IN_MEMORY: &str = ":memory:";
const DATABASE_EXTENSION: &str = "duckdb";

#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    Integrated,
    Credentials { username: String, password: String },
}

/// Authentication choice as selected on the command line or in a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    #[default]
    Integrated,
    Credentials,
}

impl AuthMode {
    pub fn from_kind(kind: AuthKind, username: Option<String>, password: Option<String>) -> Self {
        match kind {
            AuthKind::Integrated => AuthMode::Integrated,
            AuthKind::Credentials => AuthMode::Credentials {
                username: username.unwrap_or_default(),
                password: password.unwrap_or_default(),
            },
        }
    }
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Integrated => f.write_str("Integrated"),
            AuthMode::Credentials { username, .. } => f
                .debug_struct("Credentials")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Directory holding database files; `None` treats `database` as a path.
    pub server: Option<PathBuf>,
    pub database: String,
    pub auth: AuthMode,
}

impl ConnectionConfig {
    pub fn new(server: Option<PathBuf>, database: impl Into<String>, auth: AuthMode) -> Self {
        Self {
            server,
            database: database.into(),
            auth,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None, IN_MEMORY, AuthMode::Integrated)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == IN_MEMORY
    }

    /// Resolves the database file: `<server>/<database>.duckdb` when a server
    /// directory is set and the name carries no extension, otherwise the name
    /// itself (joined onto the server directory when relative).
    pub fn database_path(&self) -> PathBuf {
        let name = Path::new(&self.database);
        let file = if name.extension().is_some() {
            name.to_path_buf()
        } else if self.server.is_some() {
            name.with_extension(DATABASE_EXTENSION)
        } else {
            name.to_path_buf()
        };
        match &self.server {
            Some(server) if file.is_relative() => server.join(file),
            _ => file,
        }
    }

    pub fn display_target(&self) -> String {
        if self.is_in_memory() {
            IN_MEMORY.to_string()
        } else {
            self.database_path().display().to_string()
        }
    }
}

/// Explicitly scoped database handle for one command.
pub struct Session {
    database: Box<dyn Database>,
}

impl Session {
    pub fn open(config: &ConnectionConfig) -> Result<Self, UploadError> {
        let target = config.display_target();
        let connection_error = |source: anyhow::Error| UploadError::Connection {
            target: target.clone(),
            source,
        };

        if config.database.trim().is_empty() {
            return Err(connection_error(anyhow!("no database name was given")));
        }
        match &config.auth {
            AuthMode::Integrated => {}
            AuthMode::Credentials { username, .. } if username.trim().is_empty() => {
                return Err(connection_error(anyhow!(
                    "credentials authentication requires a username"
                )));
            }
            AuthMode::Credentials { username, .. } => {
                return Err(connection_error(anyhow!(
                    "the embedded DuckDB engine has no user accounts; \
                     connect as '{username}' is not possible, use integrated authentication"
                )));
            }
        }

        let database = if config.is_in_memory() {
            DuckDbDatabase::open_in_memory()
        } else {
            let path = config.database_path();
            if let Some(server) = &config.server {
                if !server.is_dir() {
                    return Err(connection_error(anyhow!(
                        "server directory {server:?} does not exist"
                    )));
                }
            }
            debug!("Opening database file {path:?}");
            DuckDbDatabase::open(&path)
        }
        .map_err(connection_error)?;

        info!("Connected to {}", database.target());
        Ok(Self {
            database: Box::new(database),
        })
    }

    /// Wraps an already open backend.
    pub fn from_database(database: Box<dyn Database>) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &dyn Database {
        self.database.as_ref()
    }

    pub fn database_mut(&mut self) -> &mut dyn Database {
        self.database.as_mut()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!("Closing session for {}", self.database.target());
    }
}
