//! Error handling for batch scans.
//!
//! Per-check severities (warnings, failures, errors found on a mail server)
//! are recorded in the result tree and never show up here. `ScanError` only
//! covers things that stop a batch or a tool from running at all: unreadable
//! input, bad configuration, and plumbing failures.

use std::fmt;

/// Main error type for scan operations.
#[derive(Debug, Clone)]
pub enum ScanError {
    /// Invalid domain name format
    InvalidDomain {
        domain: String,
        reason: String,
    },

    /// The identifier source could not be read (malformed CSV, I/O failure).
    /// Fatal to the whole batch.
    SourceRead {
        line: Option<u64>,
        message: String,
    },

    /// Configuration errors (invalid settings, unparsable files, etc.)
    ConfigError {
        message: String,
    },

    /// File I/O errors when opening inputs or configuration
    FileError {
        path: String,
        message: String,
    },

    /// Network-related errors (connection, TLS, HTTP)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// Timeout errors when operations take too long
    Timeout {
        operation: String,
        duration: std::time::Duration,
    },

    /// Generic internal errors that don't fit other categories
    Internal {
        message: String,
    },
}

impl ScanError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new source read error.
    pub fn source_read<M: Into<String>>(line: Option<u64>, message: M) -> Self {
        Self::SourceRead {
            line,
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error aborts a batch run rather than a single check.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SourceRead { .. }
                | Self::ConfigError { .. }
                | Self::FileError { .. }
                | Self::Internal { .. }
        )
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::SourceRead { line, message } => {
                if let Some(line) = line {
                    write!(f, "Error reading input at line {}: {}", line, message)
                } else {
                    write!(f, "Error reading input: {}", message)
                }
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for ScanError {}

impl From<csv::Error> for ScanError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|pos| pos.line());
        Self::SourceRead {
            line,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("JSON serialization failed: {}", err),
        }
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network_with_source("HTTP request timed out", err.to_string())
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for ScanError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal {
            message: format!("Pipeline task failed: {}", err),
        }
    }
}
