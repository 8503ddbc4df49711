//! Error types for template expansion

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which half of a request template an error or spec belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TemplatePart {
    Head,
    Body,
}

impl fmt::Display for TemplatePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplatePart::Head => write!(f, "head"),
            TemplatePart::Body => write!(f, "body"),
        }
    }
}

/// Main error type for template expansion
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum FuzzyError {
    #[error("Malformed template ({part} at byte {position}): {reason}")]
    Template {
        part: TemplatePart,
        position: usize,
        reason: String,
    },

    #[error("Generator `{spec}` failed: {reason}")]
    Eval { spec: String, reason: String },

    #[error("Generator `{spec}` produced {found}, which is not a sequence of values")]
    Type { spec: String, found: String },

    #[error("Configuration error: {field} - {reason}")]
    Configuration { field: String, reason: String },
}

/// Coarse error kind, for callers that present errors to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuzzyErrorKind {
    Template,
    Eval,
    Type,
    Configuration,
}

impl FuzzyError {
    /// Create an unterminated-region error
    pub fn unterminated(part: TemplatePart, position: usize) -> Self {
        Self::Template {
            part,
            position,
            reason: "generator opened with `$` is never closed (use `$$` for a literal dollar sign)"
                .to_string(),
        }
    }

    /// Create an evaluation error for a generator spec
    pub fn eval(spec: &str, reason: impl Into<String>) -> Self {
        Self::Eval {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a type error for a generator spec
    pub fn type_error(spec: &str, found: &str) -> Self {
        Self::Type {
            spec: spec.to_string(),
            found: found.to_string(),
        }
    }

    /// Create a configuration error
    pub fn configuration(field: &str, reason: &str) -> Self {
        Self::Configuration {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> FuzzyErrorKind {
        match self {
            FuzzyError::Template { .. } => FuzzyErrorKind::Template,
            FuzzyError::Eval { .. } => FuzzyErrorKind::Eval,
            FuzzyError::Type { .. } => FuzzyErrorKind::Type,
            FuzzyError::Configuration { .. } => FuzzyErrorKind::Configuration,
        }
    }

    /// Template, evaluation and type errors are user-input errors: the user
    /// can fix the template and try again.
    pub fn is_recoverable(&self) -> bool {
        match self {
            FuzzyError::Template { .. } => true,
            FuzzyError::Eval { .. } => true,
            FuzzyError::Type { .. } => true,
            FuzzyError::Configuration { .. } => false,
        }
    }

    /// Get suggested remediation for the error
    pub fn remediation(&self) -> String {
        match self {
            FuzzyError::Template { part, .. } => {
                format!("Close every generator in the request {} with a matching `$`, or write `$$` for a literal dollar sign.", part)
            }
            FuzzyError::Eval { spec, .. } => {
                format!("Fix the generator expression `{}`. Available helpers: range, len, str, upper, lower, reversed, chars, split, lines, read and the `string` constants.", spec)
            }
            FuzzyError::Type { spec, .. } => {
                format!("Make `{}` produce a list or a string, e.g. `[{}]` or `range({})`.", spec, spec, spec)
            }
            FuzzyError::Configuration { field, .. } => {
                format!("Check the `{}` setting in the configuration file.", field)
            }
        }
    }
}

/// Result type for template expansion
pub type FuzzyResult<T> = Result<T, FuzzyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FuzzyError::unterminated(TemplatePart::Body, 12);
        assert!(err.to_string().contains("body at byte 12"));

        let err = FuzzyError::eval("range(", "unexpected end of expression");
        assert_eq!(
            err.to_string(),
            "Generator `range(` failed: unexpected end of expression"
        );

        let err = FuzzyError::type_error("5", "an integer");
        assert!(err.to_string().contains("produced an integer"));
    }

    #[test]
    fn test_error_kind_and_recoverability() {
        assert_eq!(
            FuzzyError::unterminated(TemplatePart::Head, 0).kind(),
            FuzzyErrorKind::Template
        );
        assert_eq!(FuzzyError::eval("x", "y").kind(), FuzzyErrorKind::Eval);
        assert_eq!(FuzzyError::type_error("x", "y").kind(), FuzzyErrorKind::Type);

        assert!(FuzzyError::eval("x", "y").is_recoverable());
        assert!(!FuzzyError::configuration("max_sequence_len", "must be positive").is_recoverable());
    }

    #[test]
    fn test_remediation_mentions_spec() {
        let err = FuzzyError::type_error("42", "an integer");
        assert!(err.remediation().contains("range(42)"));
    }
}
