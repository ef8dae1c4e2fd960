//! Error types for reconciliation.
//!
//! Only structural problems are errors. Ambiguous correlation and unusable
//! identity keys degrade to pass-through and never surface here.

use crate::consistency::Violation;
use crate::path::FieldPath;
use std::fmt;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of errors, used by callers to pick exit codes and advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A snapshot does not have the shape its schema declares.
    Structural,
    /// The schema definition itself is unusable.
    Schema,
    /// A snapshot document could not be decoded.
    Input,
    /// Declared configuration violates a cross-field rule.
    Validation,
}

impl ErrorCategory {
    /// Whether the caller may decide to continue despite the error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Structural => "Snapshot does not match schema",
            Self::Schema => "Invalid schema definition",
            Self::Input => "Unreadable snapshot",
            Self::Validation => "Configuration is inconsistent",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Structural => "Check that all three snapshots were produced for the same schema",
            Self::Schema => "Fix the schema definition file and try again",
            Self::Input => "Check the snapshot file for typos or fields the schema does not declare",
            Self::Validation => "Adjust the listed fields so their prerequisites hold",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while compiling schemas, decoding snapshots or reconciling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A node's shape differs from the schema at this path. Aborts the whole pass.
    #[error("schema mismatch at {path}: expected {expected}, found {found}")]
    SchemaMismatch {
        /// Location of the offending node.
        path: FieldPath,
        /// Shape the schema declares.
        expected: String,
        /// Shape actually present.
        found: String,
    },

    /// The schema definition cannot be compiled.
    #[error("invalid schema for '{object}': {message}")]
    InvalidSchema {
        /// Object type the problem was found in.
        object: String,
        /// What is wrong.
        message: String,
    },

    /// A snapshot document cannot be decoded against the schema.
    #[error("cannot decode snapshot at {path}: {message}")]
    Snapshot {
        /// Location inside the document.
        path: FieldPath,
        /// What is wrong.
        message: String,
    },

    /// Cross-field consistency checks failed.
    #[error("{} consistency violation(s), first at {}", .violations.len(), first_path(.violations))]
    Inconsistent {
        /// Every violation found.
        violations: Vec<Violation>,
    },
}

fn first_path(violations: &[Violation]) -> String {
    violations
        .first()
        .map(|v| v.path.to_string())
        .unwrap_or_default()
}

impl Error {
    /// Create a schema mismatch error.
    pub fn mismatch(
        path: &FieldPath,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::SchemaMismatch {
            path: path.clone(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a schema compilation error.
    pub fn schema(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Create a snapshot decoding error.
    pub fn snapshot(path: &FieldPath, message: impl Into<String>) -> Self {
        Self::Snapshot {
            path: path.clone(),
            message: message.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::SchemaMismatch { .. } => ErrorCategory::Structural,
            Error::InvalidSchema { .. } => ErrorCategory::Schema,
            Error::Snapshot { .. } => ErrorCategory::Input,
            Error::Inconsistent { .. } => ErrorCategory::Validation,
        }
    }
}
