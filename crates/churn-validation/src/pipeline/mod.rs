//! Pipeline module.
//!
//! Loading, outlier correction, export, and the [`Validator`] that runs them
//! together with the imputer in a fixed order.

mod loader;
pub mod outliers;
mod validator;
mod writer;

pub use loader::DatasetLoader;
pub use outliers::{DEFAULT_IQR_MULTIPLIER, OutlierCorrector};
pub use validator::{ValidatedFrames, ValidationOutput, Validator};
pub use writer::{CommittedExport, DatasetWriter, StagedExport};
