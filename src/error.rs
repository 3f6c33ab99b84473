// src/error.rs - Error taxonomy for catalog orchestration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Which kind of record a reference id points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    Category,
    Brand,
}

impl ReferenceKind {
    /// Path segment used by the backend for single-record lookups
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Brand => "brand",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Transport failure: connection refused, reset, timed out request
    Network {
        endpoint: Option<String>,
    },
    /// Response body was not well-formed for the expected shape
    Decode {
        endpoint: Option<String>,
    },
    /// Well-formed response with an unexpected status code
    NonSuccessStatus {
        status_code: u16,
        endpoint: Option<String>,
    },
    /// Backend base address is absent
    Unconfigured,
    /// Retrieval deadline elapsed without a success
    Timeout,
    ReferenceResolution {
        kind: ReferenceKind,
        id: String,
    },
    Configuration {
        key: Option<String>,
        validation_errors: Vec<String>,
    },
    Validation {
        field: Option<String>,
    },
    Application,
    Io,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    pub id: crate::types::Id,
    pub kind: ErrorKind,
    pub message: String,
    pub severity: ErrorSeverity,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: crate::types::Metadata,
    pub causes: Vec<String>,
}

impl Error {
    /// Creates a new error with the specified kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            severity: ErrorSeverity::Medium,
            source: "unknown".to_string(),
            timestamp: Utc::now(),
            metadata: std::collections::HashMap::new(),
            causes: Vec::new(),
        }
    }

    /// Sets the error severity
    pub fn severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the error source
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Adds metadata to the error
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Adds a cause to the error chain
    pub fn caused_by(mut self, cause: impl fmt::Display) -> Self {
        self.causes.push(cause.to_string());
        self
    }

    /// True for transport and body-shape failures, the ones a retry might fix
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Network { .. } | ErrorKind::Decode { .. } | ErrorKind::NonSuccessStatus { .. }
        )
    }

    /// Status code carried by a `NonSuccessStatus` error
    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            ErrorKind::NonSuccessStatus { status_code, .. } => Some(status_code),
            _ => None,
        }
    }

    /// Creates a transport error
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Network {
                endpoint: Some(endpoint.into()),
            },
            message,
        )
        .severity(ErrorSeverity::High)
    }

    /// Creates a decode error
    pub fn decode(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Decode {
                endpoint: Some(endpoint.into()),
            },
            message,
        )
    }

    /// Creates an unexpected-status error
    pub fn status(status_code: u16, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let message = format!("Unexpected status {} from {}", status_code, endpoint);
        Self::new(
            ErrorKind::NonSuccessStatus {
                status_code,
                endpoint: Some(endpoint),
            },
            message,
        )
    }

    /// Creates the error reported when no backend address is configured
    pub fn unconfigured(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unconfigured, message).severity(ErrorSeverity::High)
    }

    /// Creates a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Wraps a resolver failure, keeping the underlying message verbatim
    pub fn reference(kind: ReferenceKind, id: impl Into<String>, cause: Error) -> Self {
        let message = cause.message.clone();
        let mut error = Self::new(
            ErrorKind::ReferenceResolution {
                kind,
                id: id.into(),
            },
            message,
        );
        error.causes.push(format!("{:?}", cause.kind));
        error.causes.extend(cause.causes);
        error
    }

    /// Creates a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Configuration {
                key: None,
                validation_errors: Vec::new(),
            },
            message,
        )
        .severity(ErrorSeverity::High)
    }

    /// Creates a validation error for a single input field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Validation {
                field: Some(field.into()),
            },
            message,
        )
        .severity(ErrorSeverity::Low)
    }
}

// Only the message: callers surface it to users verbatim.
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let msg = err.to_string();

        let mut error = Error::new(ErrorKind::Io, msg);
        error.source = "std::io::Error".to_string();
        error.severity = ErrorSeverity::High;

        error
    }
}

/// Extension trait for Results to add context
pub trait ResultExt<T> {
    /// Adds context to an error
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Sets the error source
    fn with_source(self, source: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Error::new(ErrorKind::Application, f()).caused_by(e))
    }

    fn with_source(self, source: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            Error::new(ErrorKind::Application, e.to_string())
                .source(source)
                .caused_by(e)
        })
    }
}
