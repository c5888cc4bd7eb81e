//! Churn Data Validation Library
//!
//! The data-validation stage of a churn-prediction pipeline, built on Polars.
//!
//! # Overview
//!
//! The stage cleans a training and a test dataset so that whatever is learned
//! from the data is learned from the training set only:
//!
//! - **Imputation**: missing numeric cells take the training median, missing
//!   categorical cells the training mode
//! - **Outlier Correction**: values outside `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]`
//!   (training quartiles) are replaced by `ln(1 + x)`
//! - **Parameter Persistence**: fitted values are written as small CSV
//!   artifacts and read back for every apply, so later inference batches get
//!   exactly the transforms the training data got
//! - **Export**: cleaned datasets are written as header CSVs, atomically
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use churn_validation::{ValidationConfig, Validator};
//!
//! let config = ValidationConfig::builder()
//!     .artifact_dir("artifacts/data_validation")
//!     .text_column("SeniorCitizen")
//!     .build()?;
//!
//! // Fit on train, apply to test, export both
//! let validator = Validator::from_config(config);
//! let output = validator.validate("data/train.csv".as_ref(), "data/test.csv".as_ref())?;
//! println!("Cleaned train: {}", output.train_path.display());
//!
//! // Later, at prediction time: reuse the persisted parameters
//! let (path, _report) = validator.apply_file("data/batch.csv".as_ref(), "batch.csv")?;
//! ```
//!
//! # Fit and Apply
//!
//! Each stage runs in one of two modes, see [`StageMode`]. `Fit` computes
//! parameters from the dataset; `Apply` carries parameters loaded from the
//! [`ArtifactStore`] and never looks at the dataset's own statistics. Applying
//! before any fit fails with [`ValidationError::MissingParameters`].
//!
//! ```rust,ignore
//! use churn_validation::{MemoryArtifactStore, ValidationConfig, Validator};
//!
//! let validator = Validator::new(ValidationConfig::default(), MemoryArtifactStore::new());
//! validator.fit(&mut train_df)?;
//! validator.apply(&mut batch_df)?;
//! ```

pub mod artifacts;
pub mod config;
pub mod error;
pub mod imputers;
pub mod pipeline;
pub mod reporting;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use artifacts::{ArtifactStore, FileArtifactStore, MemoryArtifactStore};
pub use config::{ValidationConfig, ValidationConfigBuilder};
pub use error::{Result as ValidationResult, ResultExt, ValidationError};
pub use imputers::StatisticalImputer;
pub use pipeline::{
    CommittedExport, DatasetLoader, DatasetWriter, OutlierCorrector, StagedExport,
    ValidatedFrames, ValidationOutput, Validator,
};
pub use reporting::{DatasetSummary, ValidationReport};
pub use types::{
    ColumnCorrection, ColumnFill, ColumnKind, FillValue, FittedParameters, ImputationParameters,
    ImputationReport, OutlierParameters, OutlierReport, QuartileBounds, RunMode, StageMode,
    ValidationStage,
};
