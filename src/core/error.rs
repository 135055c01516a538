use std::fmt;
use thiserror::Error;

/// SQLSTATE reported by the backend for a serialization failure.
pub const SERIALIZATION_FAILURE: &str = "40001";

/// Optional driver interfaces a decorator may need from the wrapped object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ExecerContext,
    QueryerContext,
    DriverContext,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExecerContext => "ExecerContext",
            Self::QueryerContext => "QueryerContext",
            Self::DriverContext => "DriverContext",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("retrysql: the driver to be wrapped must implement {0}")]
    Unsupported(Capability),

    #[error("Database error{}: {message}", code_suffix(.code))]
    Database {
        code: Option<String>,
        message: String,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("sql: unknown driver \"{0}\" (forgotten import?)")]
    UnknownDriver(String),

    #[error("sql: register called twice for driver {0}")]
    DuplicateDriver(String),

    #[error("sql: database is closed")]
    Closed,

    #[error("Lock error: {0}")]
    LockError(String),
}

impl DbError {
    /// Backend error carrying a SQLSTATE code.
    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Serialization conflict as reported by optimistic-concurrency backends.
    pub fn serialization_failure(message: impl Into<String>) -> Self {
        Self::database(SERIALIZATION_FAILURE, message)
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` when re-running the same statement may succeed.
    pub fn is_retryable(&self) -> bool {
        self.code() == Some(SERIALIZATION_FAILURE)
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, DbError>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
