use crate::config::ValidationConfig;
use crate::error::{Result, ValidationError};
use crate::types::{ImputationReport, OutlierReport, RunMode};
use chrono::Local;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name used by [`ValidationReport::write_to_file`].
pub const REPORT_FILE_NAME: &str = "validation_report.json";

// ============================================================================
// Report Types
// ============================================================================

/// What the validation stage did to one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// "train", "test" or the name of an inference batch
    pub name: String,
    pub mode: RunMode,
    /// Source file, when the dataset was loaded from disk
    pub input_file: Option<String>,
    /// Exported file, once committed
    pub output_file: Option<String>,
    pub rows: usize,
    pub columns: usize,
    pub imputation: ImputationReport,
    pub outliers: OutlierReport,
}

impl DatasetSummary {
    pub fn new(
        name: impl Into<String>,
        df: &DataFrame,
        imputation: ImputationReport,
        outliers: OutlierReport,
    ) -> Self {
        Self {
            name: name.into(),
            mode: imputation.mode,
            input_file: None,
            output_file: None,
            rows: df.height(),
            columns: df.width(),
            imputation,
            outliers,
        }
    }

    pub fn with_input_file(mut self, path: &Path) -> Self {
        self.input_file = Some(path.display().to_string());
        self
    }
}

/// Report of one validation run, used for `--json` output and
/// `--emit-report` files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    pub iqr_multiplier: f64,
    pub imputation_artifact: String,
    pub outlier_artifact: String,
    pub datasets: Vec<DatasetSummary>,
}

impl ValidationReport {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            iqr_multiplier: config.iqr_multiplier,
            imputation_artifact: config
                .artifact_dir
                .join(&config.imputation_file)
                .display()
                .to_string(),
            outlier_artifact: config
                .artifact_dir
                .join(&config.outlier_file)
                .display()
                .to_string(),
            datasets: Vec::new(),
        }
    }

    pub fn push(&mut self, summary: DatasetSummary) {
        self.datasets.push(summary);
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetSummary> {
        self.datasets.iter().find(|d| d.name == name)
    }

    /// Record where a dataset was exported.
    pub fn set_output_file(&mut self, name: &str, path: &Path) {
        if let Some(summary) = self.datasets.iter_mut().find(|d| d.name == name) {
            summary.output_file = Some(path.display().to_string());
        }
    }

    pub fn total_filled(&self) -> usize {
        self.datasets.iter().map(|d| d.imputation.total_filled()).sum()
    }

    pub fn total_dampened(&self) -> usize {
        self.datasets.iter().map(|d| d.outliers.total_dampened()).sum()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as `validation_report.json` under `dir`.
    pub fn write_to_file(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|e| ValidationError::io(dir, e))?;

        let report_path = dir.join(REPORT_FILE_NAME);
        let mut file = File::create(&report_path).map_err(|e| ValidationError::io(&report_path, e))?;
        file.write_all(self.to_json_pretty()?.as_bytes())
            .map_err(|e| ValidationError::io(&report_path, e))?;

        info!("Report saved: {}", report_path.display());
        Ok(report_path)
    }
}
