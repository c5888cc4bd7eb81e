//! Validation stage orchestration.
//!
//! The validator fits the imputer and the outlier corrector on the training
//! dataset, persists their parameters, and applies the persisted parameters
//! to the test dataset (or to a later inference batch). Test data never
//! contributes to a fitted parameter.

use crate::artifacts::{
    ArtifactStore, FileArtifactStore, load_imputation, load_outliers, save_parameters,
};
use crate::config::ValidationConfig;
use crate::error::{Result, ResultExt, ValidationError};
use crate::imputers::StatisticalImputer;
use crate::pipeline::{DatasetLoader, DatasetWriter, OutlierCorrector};
use crate::reporting::{DatasetSummary, ValidationReport};
use crate::types::{
    FittedParameters, ImputationParameters, ImputationReport, OutlierParameters, OutlierReport,
    RunMode, ValidationStage,
};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const TRAIN: &str = "train";
const TEST: &str = "test";

/// Paths of the exported datasets plus the run report.
#[derive(Debug, Clone)]
pub struct ValidationOutput {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub report: ValidationReport,
}

/// Cleaned in-memory datasets plus the run report.
#[derive(Debug, Clone)]
pub struct ValidatedFrames {
    pub train: DataFrame,
    pub test: DataFrame,
    pub report: ValidationReport,
}

/// Runs the validation stage against a parameter store.
///
/// # Example
///
/// ```rust,ignore
/// use churn_validation::{ValidationConfig, Validator};
///
/// let validator = Validator::from_config(ValidationConfig::default());
/// let output = validator.validate("data/train.csv".as_ref(), "data/test.csv".as_ref())?;
/// println!("train written to {}", output.train_path.display());
/// ```
pub struct Validator<S: ArtifactStore = FileArtifactStore> {
    config: ValidationConfig,
    store: S,
    loader: DatasetLoader,
    corrector: OutlierCorrector,
}

impl Validator<FileArtifactStore> {
    /// Validator persisting parameters as files under `config.artifact_dir`.
    pub fn from_config(config: ValidationConfig) -> Self {
        let store = FileArtifactStore::new(&config.artifact_dir);
        Self::new(config, store)
    }
}

impl<S: ArtifactStore> Validator<S> {
    pub fn new(config: ValidationConfig, store: S) -> Self {
        let loader = DatasetLoader::new(config.text_columns.clone());
        let corrector = OutlierCorrector::new(config.iqr_multiplier);
        Self {
            config,
            store,
            loader,
            corrector,
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Full run: load both files, clean them, export both.
    ///
    /// Both outputs are staged before either is committed, and a failed test
    /// commit rolls the train commit back, so an export failure leaves
    /// previously exported datasets in place.
    pub fn validate(&self, train_path: &Path, test_path: &Path) -> Result<ValidationOutput> {
        info!(
            "Starting data validation: train={}, test={}",
            train_path.display(),
            test_path.display()
        );

        let train = self
            .loader
            .load(train_path)
            .in_stage(ValidationStage::Loading, RunMode::Fit)?;
        let test = self
            .loader
            .load(test_path)
            .in_stage(ValidationStage::Loading, RunMode::Apply)?;

        let ValidatedFrames {
            mut train,
            mut test,
            mut report,
        } = self.validate_frames(train, test)?;

        let staged_train = DatasetWriter::stage(
            &mut train,
            &self.config.train_file_name,
            &self.config.train_output_dir,
        )
        .in_stage(ValidationStage::Export, RunMode::Fit)?;
        let staged_test = DatasetWriter::stage(
            &mut test,
            &self.config.test_file_name,
            &self.config.test_output_dir,
        )
        .in_stage(ValidationStage::Export, RunMode::Apply)?;

        let committed_train = staged_train
            .commit_keeping_previous()
            .in_stage(ValidationStage::Export, RunMode::Fit)?;
        let test_out = match staged_test
            .commit()
            .in_stage(ValidationStage::Export, RunMode::Apply)
        {
            Ok(path) => path,
            Err(err) => {
                committed_train.roll_back();
                return Err(err);
            }
        };
        let train_out = committed_train.into_path();

        for (name, input, output) in [(TRAIN, train_path, &train_out), (TEST, test_path, &test_out)] {
            report.set_output_file(name, output);
            if let Some(summary) = report.datasets.iter_mut().find(|d| d.name == name) {
                summary.input_file = Some(input.display().to_string());
            }
        }

        info!("Data validation completed");
        Ok(ValidationOutput {
            train_path: train_out,
            test_path: test_out,
            report,
        })
    }

    /// Clean in-memory frames without exporting them.
    ///
    /// `train` is fitted and both parameter sets are persisted together;
    /// `test` is then cleaned with the parameters read back from the store.
    pub fn validate_frames(&self, mut train: DataFrame, mut test: DataFrame) -> Result<ValidatedFrames> {
        info!("Step 1: Fitting imputation and outlier bounds on train...");
        let train_summary = self.fit(&mut train)?;

        info!("Step 2: Applying persisted parameters to test...");
        let params = self.load_parameters()?;
        let test_summary = self.apply_with(&mut test, &params)?;

        let mut report = ValidationReport::new(&self.config);
        report.iqr_multiplier = params.outliers.multiplier();
        report.push(train_summary);
        report.push(test_summary);

        Ok(ValidatedFrames { train, test, report })
    }

    /// Fit both stages on `train`, persist their parameters and clean `train`
    /// in place.
    ///
    /// Parameters are persisted only after both stages have fitted, and on
    /// failure `train` and the stored artifacts are left as they were.
    pub fn fit(&self, train: &mut DataFrame) -> Result<DatasetSummary> {
        let mut fitted = train.clone();

        let (imputation, imputation_report) = StatisticalImputer::fit(&mut fitted)
            .in_stage(ValidationStage::Imputation, RunMode::Fit)?;
        let (outliers, outlier_report) = self
            .corrector
            .fit(&mut fitted)
            .in_stage(ValidationStage::OutlierCorrection, RunMode::Fit)?;

        let params = FittedParameters {
            imputation,
            outliers,
        };
        save_parameters(
            &self.store,
            &self.config.imputation_file,
            &self.config.outlier_file,
            &params,
        )
        .in_stage(ValidationStage::Persistence, RunMode::Fit)?;

        *train = fitted;
        Ok(DatasetSummary::new(
            TRAIN,
            train,
            imputation_report,
            outlier_report,
        ))
    }

    /// Clean `batch` in place with previously persisted parameters.
    ///
    /// Both artifacts are loaded before the batch is touched, so a missing
    /// artifact leaves `batch` unchanged.
    pub fn apply(&self, batch: &mut DataFrame) -> Result<DatasetSummary> {
        let params = self.load_parameters()?;
        self.apply_with(batch, &params)
    }

    fn apply_with(&self, batch: &mut DataFrame, params: &FittedParameters) -> Result<DatasetSummary> {
        let imputation = self.apply_imputation(batch, &params.imputation)?;
        let outliers = self.apply_outliers(batch, &params.outliers)?;
        Ok(DatasetSummary::new(TEST, batch, imputation, outliers))
    }

    /// Load an inference batch, clean it with the persisted parameters and
    /// export it to the test output directory as `file_name`.
    pub fn apply_file(&self, input: &Path, file_name: &str) -> Result<(PathBuf, ValidationReport)> {
        let mut batch = self
            .loader
            .load(input)
            .in_stage(ValidationStage::Loading, RunMode::Apply)?;

        let params = self.load_parameters()?;
        let mut summary = self.apply_with(&mut batch, &params)?.with_input_file(input);
        summary.name = file_name.to_string();

        let output = DatasetWriter::export(&mut batch, file_name, &self.config.test_output_dir)
            .in_stage(ValidationStage::Export, RunMode::Apply)?;
        summary.output_file = Some(output.display().to_string());

        let mut report = ValidationReport::new(&self.config);
        report.iqr_multiplier = params.outliers.multiplier();
        report.push(summary);
        Ok((output, report))
    }

    /// Load both persisted parameter sets.
    pub fn load_parameters(&self) -> Result<FittedParameters> {
        Ok(FittedParameters {
            imputation: self.load_imputation_parameters()?,
            outliers: self.load_outlier_parameters()?,
        })
    }

    fn load_imputation_parameters(&self) -> Result<ImputationParameters> {
        load_imputation(&self.store, &self.config.imputation_file)
            .in_stage(ValidationStage::Imputation, RunMode::Apply)
    }

    fn load_outlier_parameters(&self) -> Result<OutlierParameters> {
        load_outliers(&self.store, &self.config.outlier_file)
            .in_stage(ValidationStage::OutlierCorrection, RunMode::Apply)
    }

    fn apply_imputation(
        &self,
        df: &mut DataFrame,
        params: &ImputationParameters,
    ) -> Result<ImputationReport> {
        let stage = ValidationStage::Imputation;
        let report = StatisticalImputer::apply(df, params).in_stage(stage, RunMode::Apply)?;
        self.check_unmapped(&report.unmapped_columns)
            .in_stage(stage, RunMode::Apply)?;
        Ok(report)
    }

    fn apply_outliers(&self, df: &mut DataFrame, params: &OutlierParameters) -> Result<OutlierReport> {
        let stage = ValidationStage::OutlierCorrection;
        let report = self.corrector.apply(df, params).in_stage(stage, RunMode::Apply)?;
        self.check_unmapped(&report.unmapped_columns)
            .in_stage(stage, RunMode::Apply)?;
        Ok(report)
    }

    fn check_unmapped(&self, columns: &[String]) -> Result<()> {
        if columns.is_empty() {
            return Ok(());
        }
        if self.config.strict_columns {
            return Err(ValidationError::UnmappedColumns {
                columns: columns.to_vec(),
            });
        }
        warn!(
            "Columns without fitted parameters left unchanged: {}",
            columns.join(", ")
        );
        Ok(())
    }
}
