use crate::database::DatabaseError;
use crate::model::mapping::MappingKind;
use std::io;
use thiserror::Error;

/// Unified error type for schema synthesis and migration
#[derive(Debug, Error)]
pub enum Error {
    #[error("model resource {name} not found in {location}")]
    ResourceNotFound { name: String, location: String },

    #[error("unable to load data model at {location}: {reason}")]
    ModelLoad { location: String, reason: String },

    #[error("{}", invalid_version_message(*.found, *.expected))]
    InvalidVersion {
        found: Option<u32>,
        expected: Option<u32>,
    },

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("no schema version recorded")]
    NoVersionRecorded,

    #[error("unknown schema version {0:?}")]
    UnknownSchemaVersion(String),

    #[error("model entity \"{0}\" must contain attributes")]
    EmptyEntity(String),

    #[error("unsupported migration type {kind} for entity \"{entity}\"")]
    UnsupportedMigration { kind: MappingKind, entity: String },

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error category for configuration issues
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Error {
    /// Whether the underlying driver reported a busy or locked database.
    ///
    /// The engine never retries on its own; a host may use this to decide
    /// whether to re-run the whole create/migrate attempt.
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Database(err) if err.is_busy())
    }

    /// Whether the underlying driver reported a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Error::Database(err) if err.is_constraint_violation())
    }

    pub(crate) fn model_load(location: impl Into<String>, reason: impl ToString) -> Self {
        Error::ModelLoad {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

fn invalid_version_message(found: Option<u32>, expected: Option<u32>) -> String {
    let mut message = match found {
        Some(version) => format!("model version {} loaded", version),
        None => "unknown model version loaded".to_string(),
    };
    if let Some(expected) = expected {
        message.push_str(&format!(" while version {} expected", expected));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_version_messages() {
        let err = Error::InvalidVersion {
            found: Some(3),
            expected: Some(2),
        };
        assert_eq!(err.to_string(), "model version 3 loaded while version 2 expected");

        let err = Error::InvalidVersion {
            found: None,
            expected: None,
        };
        assert_eq!(err.to_string(), "unknown model version loaded");
    }

    #[test]
    fn test_empty_entity_message() {
        let err = Error::EmptyEntity("Person".to_string());
        assert_eq!(err.to_string(), "model entity \"Person\" must contain attributes");
    }

    #[test]
    fn test_busy_classification_passes_through() {
        let busy = Error::from(DatabaseError::Driver {
            code: 5,
            message: None,
        });
        assert!(busy.is_busy());
        assert!(!busy.is_constraint_violation());

        let fk = Error::from(DatabaseError::Driver {
            code: 787,
            message: Some("FOREIGN KEY constraint failed".to_string()),
        });
        assert!(fk.is_constraint_violation());
        assert!(!fk.is_busy());

        assert!(!Error::NoVersionRecorded.is_busy());
    }
}
