//! Run reports.
//!
//! [`ValidationReport`] collects the per-dataset imputation and outlier
//! reports of a run. The CLI prints it with `--json` and writes it as
//! `validation_report.json` with `--emit-report`.
//!
//! # Example
//!
//! ```rust,ignore
//! use churn_validation::{ValidationConfig, Validator};
//!
//! let validator = Validator::from_config(ValidationConfig::default());
//! let output = validator.validate("data/train.csv".as_ref(), "data/test.csv".as_ref())?;
//!
//! println!("{}", output.report.to_json_pretty()?);
//! output.report.write_to_file("artifacts/data_validation".as_ref())?;
//! ```

mod generator;

pub use generator::{DatasetSummary, REPORT_FILE_NAME, ValidationReport};
