//! Error taxonomy shared by the store, the services and the HTTP adapter.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    /// A name or hostname matched more than one record. Callers must ask for
    /// a more specific identifier instead of silently picking the first row.
    #[error("`{0}` matches more than one record")]
    Ambiguous(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// The security filter rejected a command. Rendered as a security alert,
    /// never as a generic failure.
    #[error("security alert: `{0}` may not be run")]
    Blocked(String),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("external process failed: {0}")]
    ExternalProcess(String),

    #[error("could not parse {0}")]
    ParseFailure(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{kind} {id}"))
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
