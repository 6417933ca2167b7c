//! Error taxonomy of the BoQ core.
//!
//! Fatal conditions (malformed syntax, broken nesting, duplicate paths,
//! ambiguous merge keys) are `GaebError` variants and abort the operation.
//! Validation collects every violation across the whole tree before failing,
//! so a caller gets the complete picture in one pass. Non-fatal merge
//! findings live in the `MergeReport`, never here.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum GaebError {
    /// The raw document could not be parsed as GAEB XML at all.
    #[error("malformed document: {message}")]
    Malformed { message: String },

    /// The file's data-phase marker contradicts the declared phase.
    #[error("unsupported phase: document declares data phase {found}, expected {expected}")]
    UnsupportedPhase { expected: String, found: String },

    /// Broken nesting: a close without an open, or an unclosed section at
    /// end of stream. `path` names the innermost section involved, if known.
    #[error("structural error at '{}': {message}", .path.as_deref().unwrap_or("<root>"))]
    Structural {
        message: String,
        path: Option<String>,
    },

    /// Two positions resolved to the same ordinal path within one tree.
    #[error("duplicate ordinal path '{path}'")]
    DuplicatePath { path: String },

    /// One or more phase/field violations, aggregated over the whole tree.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Two priced positions resolved to the same match key; picking one
    /// silently would corrupt prices, so the merge is aborted.
    #[error("ambiguous match key '{key}' in priced document ({first_path} and {second_path})")]
    AmbiguousMatch {
        key: String,
        first_path: String,
        second_path: String,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl GaebError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub fn structural(message: impl Into<String>, path: Option<String>) -> Self {
        Self::Structural {
            message: message.into(),
            path,
        }
    }

    pub fn duplicate_path(path: impl Into<String>) -> Self {
        Self::DuplicatePath { path: path.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "MALFORMED_DOCUMENT",
            Self::UnsupportedPhase { .. } => "UNSUPPORTED_PHASE",
            Self::Structural { .. } => "STRUCTURAL_ERROR",
            Self::DuplicatePath { .. } => "DUPLICATE_PATH",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::AmbiguousMatch { .. } => "AMBIGUOUS_MATCH",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
        }
    }
}

pub type GaebResult<T> = Result<T, GaebError>;

/// What kind of rule a position violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A required field is absent.
    MissingField,
    /// A numeric field is not a well-formed non-negative decimal.
    FieldFormat,
    /// A field is present/valued in a way the declared phase forbids.
    PhaseRule,
}

/// A single field violation, located by ordinal path and field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub path: String,
    pub field: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.path, self.field, self.message)
    }
}

/// Aggregated validation failure listing every offending path.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation violation(s)", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }
        Ok(())
    }
}
