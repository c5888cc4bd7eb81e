//! Error types for the validation stage.
//!
//! Every failure raised by the imputer, the outlier corrector, the artifact
//! store or the dataset writer is a [`ValidationError`]. The validator wraps
//! stage failures once in [`ValidationError::Stage`] so callers can see which
//! stage and mode failed without losing the original error code.
//!
//! Errors serialize as `{ code, message }` so run reports and the CLI's JSON
//! output can carry them.

use crate::types::{RunMode, ValidationStage};
use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the validation stage.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Apply mode was requested before a fit produced the artifact.
    #[error("Parameter artifact '{artifact}' not found; run a fit first")]
    MissingParameters { artifact: String },

    /// A column has no usable values to compute a fit statistic from.
    #[error("Column '{column}' has no non-missing values to fit")]
    DegenerateColumn { column: String },

    /// Log dampening hit a value outside its domain (value <= -1).
    #[error("Column '{column}' holds {value}, which cannot be log-dampened")]
    InvalidValue { column: String, value: f64 },

    /// Reading or writing a file failed.
    #[error("IO failure at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Apply data contains columns the fit never saw.
    #[error("Columns without fitted parameters: {}", columns.join(", "))]
    UnmappedColumns { columns: Vec<String> },

    /// A stored parameter does not match the dataset column's kind.
    #[error("Column '{column}' expected {expected} values, found {found}")]
    SchemaMismatch {
        column: String,
        expected: String,
        found: String,
    },

    /// A persisted parameter artifact could not be decoded.
    #[error("Malformed parameter artifact '{artifact}': {reason}")]
    MalformedArtifact { artifact: String, reason: String },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stage failure, annotated with the stage and mode it happened in.
    #[error("{} ({mode}) failed: {source}", stage.display_name())]
    Stage {
        stage: ValidationStage,
        mode: RunMode,
        #[source]
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    /// Build an [`ValidationError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ValidationError::Io {
            path: path.into(),
            source,
        }
    }

    /// Annotate the error with the stage and mode it was raised in.
    ///
    /// Already annotated errors are returned unchanged so the innermost
    /// stage is the one reported.
    pub fn in_stage(self, stage: ValidationStage, mode: RunMode) -> Self {
        match self {
            err @ ValidationError::Stage { .. } => err,
            err => ValidationError::Stage {
                stage,
                mode,
                source: Box::new(err),
            },
        }
    }

    /// Stable error code for callers and reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingParameters { .. } => "MISSING_PARAMETERS",
            Self::DegenerateColumn { .. } => "DEGENERATE_COLUMN",
            Self::InvalidValue { .. } => "INVALID_VALUE",
            Self::Io { .. } => "IO_FAILURE",
            Self::UnmappedColumns { .. } => "UNMAPPED_COLUMNS",
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::MalformedArtifact { .. } => "MALFORMED_ARTIFACT",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Stage { source, .. } => source.error_code(),
        }
    }

    /// The error without its stage annotation.
    pub fn root(&self) -> &ValidationError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the failure can be fixed by running a fit first.
    pub fn is_missing_parameters(&self) -> bool {
        matches!(self.root(), Self::MissingParameters { .. })
    }
}

impl Serialize for ValidationError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ValidationError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for validation operations.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Extension trait for annotating results with stage context.
pub trait ResultExt<T> {
    /// Wrap an error with the stage and mode it happened in.
    fn in_stage(self, stage: ValidationStage, mode: RunMode) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn in_stage(self, stage: ValidationStage, mode: RunMode) -> Result<T> {
        self.map_err(|e| e.in_stage(stage, mode))
    }
}
