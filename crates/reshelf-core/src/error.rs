//! Error types for reshelf

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid data: {0}")]
    Validation(String),
}

impl Error {
    /// Storage-layer failures the caller may retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Pool(_) | Self::Io(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// Map an insert failure: unique-key violations become `AlreadyExists`,
    /// a missing parent import `NotFound`, a failed CHECK `Validation`
    pub(crate) fn on_insert(err: rusqlite::Error, what: impl Into<String>) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && matches!(
                        e.extended_code,
                        rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                            | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    ) =>
            {
                Self::AlreadyExists(what.into())
            }
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                Self::NotFound(format!("import for {}", what.into()))
            }
            rusqlite::Error::SqliteFailure(ref e, ref msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_CHECK =>
            {
                Self::Validation(format!(
                    "{}: {}",
                    what.into(),
                    msg.as_deref().unwrap_or("check constraint failed")
                ))
            }
            other => other.into(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        // Structured columns that fail to decode are a payload problem, not storage
        if let rusqlite::Error::FromSqlConversionFailure(idx, _, ref inner) = err {
            if inner.is::<serde_json::Error>() {
                return Self::Validation(format!("column {} could not be decoded: {}", idx, inner));
            }
        }
        Self::Database(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert!(Error::Database(rusqlite::Error::InvalidQuery).is_transient());
        assert!(!Error::NotFound("x".into()).is_transient());
        assert!(Error::NotFound("x".into()).is_not_found());
        assert!(Error::AlreadyExists("x".into()).is_already_exists());
        assert!(!Error::Validation("x".into()).is_transient());
    }

    #[test]
    fn test_json_conversion_failure_is_validation() {
        let json_err = serde_json::from_str::<Vec<String>>("{not json").unwrap_err();
        let err: Error = rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            Box::new(json_err),
        )
        .into();
        assert!(matches!(err, Error::Validation(_)));
    }
}
