use std::fmt;

use thiserror::Error;

/// Kind of schema object an operation referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Procedure,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Table => write!(f, "table"),
            ObjectKind::Procedure => write!(f, "procedure"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SqlMiddlewareDbError {
    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error("Pool error: {0}")]
    PoolError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{kind} '{name}' not found in database '{database}'")]
    NotFound {
        kind: ObjectKind,
        name: String,
        database: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlMiddlewareDbError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        SqlMiddlewareDbError::ValidationError(message.into())
    }

    pub(crate) fn not_found(kind: ObjectKind, name: &str, database: &str) -> Self {
        SqlMiddlewareDbError::NotFound {
            kind,
            name: name.to_string(),
            database: database.to_string(),
        }
    }

    /// True for caller-input problems (taxonomy: validation / not found).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SqlMiddlewareDbError::ValidationError(_) | SqlMiddlewareDbError::NotFound { .. }
        )
    }
}
