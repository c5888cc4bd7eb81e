//! Configuration for the validation stage.
//!
//! All file locations come from here: the validator never constructs paths
//! beyond joining a configured directory with a configured file name.
//! Use [`ValidationConfig::builder()`] for a validated configuration, or
//! [`ValidationConfig::from_json_file`] to load one from disk.

use crate::error::{Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a validation run.
///
/// # Example
///
/// ```rust,ignore
/// use churn_validation::ValidationConfig;
///
/// let config = ValidationConfig::builder()
///     .artifact_dir("artifacts/params")
///     .output_dir("artifacts/validated")
///     .text_column("SeniorCitizen")
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Directory holding the persisted parameter artifacts.
    /// Default: "artifacts/data_validation"
    pub artifact_dir: PathBuf,

    /// File name of the imputation-values artifact.
    /// Default: "imputation_values.csv"
    pub imputation_file: String,

    /// File name of the outlier-parameters artifact.
    /// Default: "outlier_params.csv"
    pub outlier_file: String,

    /// Directory the cleaned training dataset is written to.
    /// Default: "artifacts/data_validation/train"
    pub train_output_dir: PathBuf,

    /// Directory the cleaned test/inference dataset is written to.
    /// Default: "artifacts/data_validation/test"
    pub test_output_dir: PathBuf,

    /// File name of the cleaned training dataset.
    /// Default: "train.csv"
    pub train_file_name: String,

    /// File name of the cleaned test dataset.
    /// Default: "test.csv"
    pub test_file_name: String,

    /// Columns always read as text, even if their values look numeric.
    /// Default: ["SeniorCitizen"]
    pub text_columns: Vec<String>,

    /// Multiplier applied to the IQR when fitting outlier bounds. It is
    /// stored with the fitted parameters; apply uses the stored value.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Fail when apply data contains columns without fitted parameters.
    /// When false, such columns are left untouched and a warning is logged.
    /// Default: true
    pub strict_columns: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let artifact_dir = PathBuf::from("artifacts/data_validation");
        Self {
            train_output_dir: artifact_dir.join("train"),
            test_output_dir: artifact_dir.join("test"),
            artifact_dir,
            imputation_file: "imputation_values.csv".to_string(),
            outlier_file: "outlier_params.csv".to_string(),
            train_file_name: "train.csv".to_string(),
            test_file_name: "test.csv".to_string(),
            text_columns: vec!["SeniorCitizen".to_string()],
            iqr_multiplier: 1.5,
            strict_columns: true,
        }
    }
}

impl ValidationConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ValidationConfigBuilder {
        ValidationConfigBuilder::default()
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ValidationError::io(path, e))?;
        let config: ValidationConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier <= 0.0 {
            return Err(ValidationError::InvalidConfig(format!(
                "iqr_multiplier must be a positive finite number, got {}",
                self.iqr_multiplier
            )));
        }

        let file_names = [
            ("imputation_file", &self.imputation_file),
            ("outlier_file", &self.outlier_file),
            ("train_file_name", &self.train_file_name),
            ("test_file_name", &self.test_file_name),
        ];
        for (field, name) in file_names {
            if name.trim().is_empty() {
                return Err(ValidationError::InvalidConfig(format!(
                    "{field} must not be empty"
                )));
            }
            if name.contains(['/', '\\']) {
                return Err(ValidationError::InvalidConfig(format!(
                    "{field} must be a file name, not a path: '{name}'"
                )));
            }
        }

        if self.imputation_file == self.outlier_file {
            return Err(ValidationError::InvalidConfig(
                "imputation_file and outlier_file must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Full path of the cleaned training dataset.
    pub fn train_output_path(&self) -> PathBuf {
        self.train_output_dir.join(&self.train_file_name)
    }

    /// Full path of the cleaned test dataset.
    pub fn test_output_path(&self) -> PathBuf {
        self.test_output_dir.join(&self.test_file_name)
    }
}

/// Builder for [`ValidationConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct ValidationConfigBuilder {
    artifact_dir: Option<PathBuf>,
    imputation_file: Option<String>,
    outlier_file: Option<String>,
    train_output_dir: Option<PathBuf>,
    test_output_dir: Option<PathBuf>,
    train_file_name: Option<String>,
    test_file_name: Option<String>,
    text_columns: Option<Vec<String>>,
    iqr_multiplier: Option<f64>,
    strict_columns: Option<bool>,
}

impl ValidationConfigBuilder {
    /// Start from an existing configuration, e.g. one loaded from JSON.
    pub fn from_config(config: ValidationConfig) -> Self {
        Self {
            artifact_dir: Some(config.artifact_dir),
            imputation_file: Some(config.imputation_file),
            outlier_file: Some(config.outlier_file),
            train_output_dir: Some(config.train_output_dir),
            test_output_dir: Some(config.test_output_dir),
            train_file_name: Some(config.train_file_name),
            test_file_name: Some(config.test_file_name),
            text_columns: Some(config.text_columns),
            iqr_multiplier: Some(config.iqr_multiplier),
            strict_columns: Some(config.strict_columns),
        }
    }

    /// Set the directory holding the parameter artifacts.
    pub fn artifact_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(path.into());
        self
    }

    pub fn imputation_file(mut self, name: impl Into<String>) -> Self {
        self.imputation_file = Some(name.into());
        self
    }

    pub fn outlier_file(mut self, name: impl Into<String>) -> Self {
        self.outlier_file = Some(name.into());
        self
    }

    /// Write both cleaned datasets under `path/train` and `path/test`.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.train_output_dir = Some(path.join("train"));
        self.test_output_dir = Some(path.join("test"));
        self
    }

    pub fn train_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.train_output_dir = Some(path.into());
        self
    }

    pub fn test_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.test_output_dir = Some(path.into());
        self
    }

    pub fn train_file_name(mut self, name: impl Into<String>) -> Self {
        self.train_file_name = Some(name.into());
        self
    }

    pub fn test_file_name(mut self, name: impl Into<String>) -> Self {
        self.test_file_name = Some(name.into());
        self
    }

    /// Add a column that must always be read as text.
    pub fn text_column(mut self, column: impl Into<String>) -> Self {
        self.text_columns
            .get_or_insert_with(Vec::new)
            .push(column.into());
        self
    }

    /// Replace the whole list of text columns.
    pub fn text_columns(mut self, columns: Vec<String>) -> Self {
        self.text_columns = Some(columns);
        self
    }

    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    pub fn strict_columns(mut self, strict: bool) -> Self {
        self.strict_columns = Some(strict);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<ValidationConfig> {
        let defaults = ValidationConfig::default();
        let artifact_dir = self.artifact_dir.unwrap_or(defaults.artifact_dir);
        let config = ValidationConfig {
            train_output_dir: self
                .train_output_dir
                .unwrap_or_else(|| artifact_dir.join("train")),
            test_output_dir: self
                .test_output_dir
                .unwrap_or_else(|| artifact_dir.join("test")),
            artifact_dir,
            imputation_file: self.imputation_file.unwrap_or(defaults.imputation_file),
            outlier_file: self.outlier_file.unwrap_or(defaults.outlier_file),
            train_file_name: self.train_file_name.unwrap_or(defaults.train_file_name),
            test_file_name: self.test_file_name.unwrap_or(defaults.test_file_name),
            text_columns: self.text_columns.unwrap_or(defaults.text_columns),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            strict_columns: self.strict_columns.unwrap_or(defaults.strict_columns),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ValidationConfig::default();
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.text_columns, vec!["SeniorCitizen".to_string()]);
        assert!(config.strict_columns);
        assert_eq!(
            config.train_output_path(),
            PathBuf::from("artifacts/data_validation/train/train.csv")
        );
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let config = ValidationConfig::builder().build().unwrap();
        assert_eq!(config, ValidationConfig::default());
    }

    #[test]
    fn test_builder_output_dirs_follow_artifact_dir() {
        let config = ValidationConfig::builder()
            .artifact_dir("/tmp/run")
            .build()
            .unwrap();
        assert_eq!(config.train_output_dir, PathBuf::from("/tmp/run/train"));
        assert_eq!(config.test_output_dir, PathBuf::from("/tmp/run/test"));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = ValidationConfig::builder()
            .output_dir("/tmp/out")
            .text_columns(vec![])
            .text_column("Partner")
            .iqr_multiplier(3.0)
            .strict_columns(false)
            .build()
            .unwrap();

        assert_eq!(config.test_output_dir, PathBuf::from("/tmp/out/test"));
        assert_eq!(config.text_columns, vec!["Partner".to_string()]);
        assert_eq!(config.iqr_multiplier, 3.0);
        assert!(!config.strict_columns);
    }

    #[test]
    fn test_validation_invalid_multiplier() {
        for bad in [0.0, -1.5, f64::NAN, f64::INFINITY] {
            let result = ValidationConfig::builder().iqr_multiplier(bad).build();
            assert!(matches!(result, Err(ValidationError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_validation_rejects_paths_as_file_names() {
        let result = ValidationConfig::builder()
            .imputation_file("nested/imputation.csv")
            .build();
        assert!(matches!(result, Err(ValidationError::InvalidConfig(_))));
    }

    #[test]
    fn test_validation_rejects_shared_artifact_name() {
        let result = ValidationConfig::builder()
            .imputation_file("params.csv")
            .outlier_file("params.csv")
            .build();
        assert!(matches!(result, Err(ValidationError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_from_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "artifact_dir": "params", "iqr_multiplier": 2.0, "strict_columns": false }}"#
        )
        .unwrap();

        let config = ValidationConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.artifact_dir, PathBuf::from("params"));
        assert_eq!(config.iqr_multiplier, 2.0);
        assert!(!config.strict_columns);
        assert_eq!(config.imputation_file, "imputation_values.csv");
    }

    #[test]
    fn test_config_from_missing_json_file() {
        let result = ValidationConfig::from_json_file("/nonexistent/config.json");
        assert!(matches!(result, Err(ValidationError::Io { .. })));
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = ValidationConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: ValidationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
