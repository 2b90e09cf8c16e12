//! Error types for glasspanel.
//!
//! This module defines all error types used throughout the glasspanel crate.
//! Registration errors are raised synchronously and are meant to abort panel
//! setup; failures inside instrument callbacks and renderers are logged
//! instead of being surfaced through this type.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for glasspanel operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Registration Errors ===
    /// The instrument name is empty or blank.
    #[error("instrument name must be a non-empty string, got {name:?}")]
    InvalidInstrumentName {
        /// The rejected name.
        name: String,
    },

    /// An instrument with this name is already registered.
    #[error("instrument already registered: {name}")]
    DuplicateInstrument {
        /// Name of the instrument.
        name: String,
    },

    /// The property map of an instrument has no entries.
    #[error("property map for instrument '{instrument}' must not be empty")]
    EmptyPropertyMap {
        /// Name of the instrument.
        instrument: String,
    },

    /// Two entries of a property map share an alias.
    #[error("property map for instrument '{instrument}' repeats alias '{alias}'")]
    DuplicateAlias {
        /// Name of the instrument.
        instrument: String,
        /// The repeated alias.
        alias: String,
    },

    /// A property path could not be used.
    #[error("invalid property path {path:?}: {reason}")]
    InvalidPropertyPath {
        /// The rejected path.
        path: String,
        /// Why the path was rejected.
        reason: String,
    },

    /// No instrument with this name exists.
    #[error("unknown instrument: {name}")]
    UnknownInstrument {
        /// Name of the instrument.
        name: String,
    },

    // === Transport Errors ===
    /// The property transport refused a subscription.
    #[error("failed to subscribe to {path}: {message}")]
    Subscribe {
        /// The property path.
        path: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Replay Errors ===
    /// A replay log line could not be parsed.
    #[error("replay log line {line}: {message}")]
    Replay {
        /// One-based line number in the log.
        line: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Failed to read a replay log.
    #[error("failed to read {path}: {source}")]
    FileRead {
        /// Path of the file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Rendering Errors ===
    /// A renderer failed to produce output.
    #[error("render error: {0}")]
    Render(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for glasspanel operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an invalid property path error.
    #[must_use]
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPropertyPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a replay parse error.
    #[must_use]
    pub fn replay(line: usize, message: impl Into<String>) -> Self {
        Self::Replay {
            line,
            message: message.into(),
        }
    }

    /// Create a render error.
    #[must_use]
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    /// Check if this error was raised while registering an instrument.
    #[must_use]
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInstrumentName { .. }
                | Self::DuplicateInstrument { .. }
                | Self::EmptyPropertyMap { .. }
                | Self::DuplicateAlias { .. }
                | Self::InvalidPropertyPath { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DuplicateInstrument {
            name: "Engine".to_string(),
        };
        assert_eq!(err.to_string(), "instrument already registered: Engine");

        let err = Error::render("surface lost");
        assert_eq!(err.to_string(), "render error: surface lost");
    }

    #[test]
    fn test_is_registration_error() {
        assert!(Error::InvalidInstrumentName {
            name: String::new()
        }
        .is_registration_error());
        assert!(Error::EmptyPropertyMap {
            instrument: "Engine".to_string()
        }
        .is_registration_error());
        assert!(Error::invalid_path("", "empty").is_registration_error());
        assert!(!Error::Subscribe {
            path: "/a".to_string(),
            message: "closed".to_string()
        }
        .is_registration_error());
    }

    #[test]
    fn test_invalid_name_display_quotes_name() {
        let err = Error::InvalidInstrumentName {
            name: "  ".to_string(),
        };
        assert!(err.to_string().contains("\"  \""));
    }

    #[test]
    fn test_subscribe_error_display() {
        let err = Error::Subscribe {
            path: "/engines/engine/rpm".to_string(),
            message: "connection closed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/engines/engine/rpm"));
        assert!(msg.contains("connection closed"));
    }

    #[test]
    fn test_replay_error_display() {
        let err = Error::replay(7, "expected value");
        assert_eq!(err.to_string(), "replay log line 7: expected value");
    }

    #[test]
    fn test_file_read_error_display() {
        let err = Error::FileRead {
            path: PathBuf::from("/tmp/missing.jsonl"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/tmp/missing.jsonl"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "smooth_factor out of range".to_string(),
        };
        assert!(err.to_string().contains("smooth_factor"));
    }
}
