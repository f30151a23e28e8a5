use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single schema violation found while validating a project input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub reason: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum FeasibilityError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Project validation failed with {} issue(s): {}", .0.len(), format_issues(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    Io(String),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for FeasibilityError {
    fn from(e: serde_json::Error) -> Self {
        FeasibilityError::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for FeasibilityError {
    fn from(e: std::io::Error) -> Self {
        FeasibilityError::Io(e.to_string())
    }
}
