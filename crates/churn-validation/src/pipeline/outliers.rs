//! Outlier correction module.
//!
//! Detects out-of-range values in numeric columns with the IQR rule and
//! dampens them with `ln(1 + x)` instead of removing rows, so row count and
//! alignment with the other columns are preserved.

use crate::error::{Result, ValidationError};
use crate::types::{
    ColumnCorrection, OutlierParameters, OutlierReport, QuartileBounds, RunMode, StageMode,
};
use crate::utils::{column_names, is_numeric_dtype, quantile, sorted_numeric_values};
use polars::prelude::*;
use tracing::{debug, info};

/// Default multiplier applied to the IQR when deriving bounds.
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

/// Fits quartile bounds and dampens values outside them.
#[derive(Debug, Clone, Copy)]
pub struct OutlierCorrector {
    multiplier: f64,
}

impl Default for OutlierCorrector {
    fn default() -> Self {
        Self::new(DEFAULT_IQR_MULTIPLIER)
    }
}

impl OutlierCorrector {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Correct outliers according to `mode`.
    ///
    /// Returns the parameters that were used (freshly fitted for `Fit`, a
    /// copy of the given set for `Apply`) together with a per-column report.
    pub fn correct_outliers(
        &self,
        df: &mut DataFrame,
        mode: StageMode<&OutlierParameters>,
    ) -> Result<(OutlierParameters, OutlierReport)> {
        match mode {
            StageMode::Fit => self.fit(df),
            StageMode::Apply(params) => {
                let report = self.apply(df, params)?;
                Ok((params.clone(), report))
            }
        }
    }

    /// Compute Q1/Q3/IQR for every numeric column and dampen its outliers.
    ///
    /// The returned parameters record this corrector's multiplier.
    pub fn fit(&self, df: &mut DataFrame) -> Result<(OutlierParameters, OutlierReport)> {
        let mut fitted = Vec::new();
        let mut corrections = Vec::new();

        for name in column_names(df) {
            let series = df.column(&name)?.as_materialized_series().clone();
            if !is_numeric_dtype(series.dtype()) {
                continue;
            }

            let sorted = sorted_numeric_values(&series)?;
            let (Some(q1), Some(q3)) = (quantile(&sorted, 0.25), quantile(&sorted, 0.75)) else {
                return Err(ValidationError::DegenerateColumn { column: name });
            };
            let bounds = QuartileBounds::from_quartiles(q1, q3);

            corrections.push(dampen_column(df, &name, &series, &bounds, self.multiplier)?);
            fitted.push((name, bounds));
        }

        let report = OutlierReport {
            mode: RunMode::Fit,
            corrections,
            unmapped_columns: Vec::new(),
        };
        info!(
            "Outlier bounds fitted on {} columns, {} values dampened",
            fitted.len(),
            report.total_dampened()
        );

        let params = fitted
            .into_iter()
            .collect::<OutlierParameters>()
            .with_multiplier(self.multiplier);
        Ok((params, report))
    }

    /// Dampen outliers using previously fitted bounds.
    ///
    /// Bounds come only from `params`, including the multiplier they were
    /// fitted with; nothing is recomputed from `df` and this corrector's own
    /// multiplier plays no part.
    /// Numeric columns without fitted bounds are left untouched and listed in
    /// [`OutlierReport::unmapped_columns`].
    pub fn apply(&self, df: &mut DataFrame, params: &OutlierParameters) -> Result<OutlierReport> {
        let mut corrections = Vec::new();
        let mut unmapped_columns = Vec::new();

        for name in column_names(df) {
            let series = df.column(&name)?.as_materialized_series().clone();
            if !is_numeric_dtype(series.dtype()) {
                if params.contains(&name) {
                    debug!("Column '{}' has fitted bounds but is not numeric here", name);
                }
                continue;
            }

            match params.get(&name) {
                Some(bounds) => {
                    corrections.push(dampen_column(
                        df,
                        &name,
                        &series,
                        bounds,
                        params.multiplier(),
                    )?);
                }
                None => unmapped_columns.push(name),
            }
        }

        let report = OutlierReport {
            mode: RunMode::Apply,
            corrections,
            unmapped_columns,
        };
        info!(
            "Outlier bounds applied to {} columns, {} values dampened",
            report.corrections.len(),
            report.total_dampened()
        );

        Ok(report)
    }
}

/// Replace every cell outside the bounds with `ln(1 + x)`.
///
/// Only masked cells change; nulls and in-range values are copied as-is. A
/// column with at least one dampened cell becomes Float64; a column without
/// any keeps its dtype.
fn dampen_column(
    df: &mut DataFrame,
    col_name: &str,
    series: &Series,
    bounds: &QuartileBounds,
    multiplier: f64,
) -> Result<ColumnCorrection> {
    let float_series = series.cast(&DataType::Float64)?;
    let f64_chunked = float_series.f64()?;

    let mut dampened = 0;
    let mut values = Vec::with_capacity(f64_chunked.len());
    for opt_val in f64_chunked.into_iter() {
        match opt_val {
            Some(val) if bounds.is_outlier(val, multiplier) => {
                if val <= -1.0 {
                    return Err(ValidationError::InvalidValue {
                        column: col_name.to_string(),
                        value: val,
                    });
                }
                dampened += 1;
                values.push(Some(val.ln_1p()));
            }
            other => values.push(other),
        }
    }

    if dampened > 0 {
        df.replace(col_name, Series::new(col_name.into(), values))?;
    }

    let correction = ColumnCorrection {
        column: col_name.to_string(),
        lower: bounds.lower(multiplier),
        upper: bounds.upper(multiplier),
        dampened,
    };
    debug!(
        "Dampened {} values in '{}' outside [{}, {}]",
        correction.dampened, col_name, correction.lower, correction.upper
    );
    Ok(correction)
}
