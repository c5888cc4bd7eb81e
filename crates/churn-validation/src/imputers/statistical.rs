//! Statistical imputation: median for numeric columns, mode for categorical
//! columns.
//!
//! Fitting computes one fill value per column and returns them as an
//! immutable [`ImputationParameters`]. Applying fills gaps from a previously
//! fitted parameter set and never looks at the statistics of the data it is
//! applied to.

use crate::error::{Result, ValidationError};
use crate::types::{
    ColumnFill, ColumnKind, FillValue, ImputationParameters, ImputationReport, RunMode, StageMode,
};
use crate::utils::{
    column_names, fill_numeric_nulls, fill_string_nulls, median, sorted_numeric_values,
    string_mode,
};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Median/mode imputation for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill missing cells according to `mode`.
    ///
    /// Returns the parameters that were used (freshly fitted for `Fit`, a
    /// copy of the given set for `Apply`) together with a per-column report.
    pub fn fill_missing(
        df: &mut DataFrame,
        mode: StageMode<&ImputationParameters>,
    ) -> Result<(ImputationParameters, ImputationReport)> {
        match mode {
            StageMode::Fit => Self::fit(df),
            StageMode::Apply(params) => {
                let report = Self::apply(df, params)?;
                Ok((params.clone(), report))
            }
        }
    }

    /// Compute a fill value for every column and fill its gaps.
    ///
    /// Numeric columns use the median of non-missing values; categorical
    /// columns use the most frequent value. A column without any non-missing
    /// value fails with [`ValidationError::DegenerateColumn`].
    pub fn fit(df: &mut DataFrame) -> Result<(ImputationParameters, ImputationReport)> {
        let mut fitted = Vec::with_capacity(df.width());
        let mut fills = Vec::with_capacity(df.width());

        for name in column_names(df) {
            let series = df.column(&name)?.as_materialized_series().clone();
            let Some(kind) = ColumnKind::from_dtype(series.dtype()) else {
                warn!(
                    "Skipping column '{}' with unsupported dtype {}",
                    name,
                    series.dtype()
                );
                continue;
            };

            let value = match kind {
                ColumnKind::Numeric => {
                    let sorted = sorted_numeric_values(&series)?;
                    median(&sorted).map(FillValue::Numeric)
                }
                ColumnKind::Categorical => string_mode(&series)?.map(FillValue::Text),
            }
            .ok_or_else(|| ValidationError::DegenerateColumn {
                column: name.clone(),
            })?;

            let filled = Self::fill_column(df, &name, &series, &value)?;
            debug!("Fitted '{}' ({}): {} -> {} cells filled", name, kind, value, filled);

            fills.push(ColumnFill {
                column: name.clone(),
                kind,
                value: value.clone(),
                filled,
            });
            fitted.push((name, value));
        }

        let report = ImputationReport {
            mode: RunMode::Fit,
            fills,
            unmapped_columns: Vec::new(),
        };
        info!(
            "Imputation fitted on {} columns, {} cells filled",
            fitted.len(),
            report.total_filled()
        );

        Ok((fitted.into_iter().collect(), report))
    }

    /// Fill gaps using previously fitted parameters.
    ///
    /// Columns missing from `params` are left untouched and listed in
    /// [`ImputationReport::unmapped_columns`]; the caller decides whether
    /// that is an error.
    pub fn apply(df: &mut DataFrame, params: &ImputationParameters) -> Result<ImputationReport> {
        let mut fills = Vec::new();
        let mut unmapped_columns = Vec::new();

        for name in column_names(df) {
            let Some(value) = params.get(&name) else {
                unmapped_columns.push(name);
                continue;
            };

            let series = df.column(&name)?.as_materialized_series().clone();
            let filled = Self::fill_column(df, &name, &series, value)?;
            fills.push(ColumnFill {
                column: name,
                kind: value.kind(),
                value: value.clone(),
                filled,
            });
        }

        for (column, _) in params.iter() {
            if df.column(column).is_err() {
                debug!("Fitted column '{}' is absent from the apply data", column);
            }
        }

        let report = ImputationReport {
            mode: RunMode::Apply,
            fills,
            unmapped_columns,
        };
        info!(
            "Imputation applied to {} columns, {} cells filled",
            report.fills.len(),
            report.total_filled()
        );

        Ok(report)
    }

    /// Replace the column's missing cells with `value`, returning how many
    /// were filled.
    ///
    /// Integer columns stay integer when `value` is a whole number and become
    /// Float64 otherwise. An entirely missing column takes the kind of its
    /// fill value, since its dtype carries no information.
    fn fill_column(
        df: &mut DataFrame,
        col_name: &str,
        series: &Series,
        value: &FillValue,
    ) -> Result<usize> {
        let all_missing = series.null_count() == series.len();
        let column_kind = if all_missing {
            Some(value.kind())
        } else {
            ColumnKind::from_dtype(series.dtype())
        };

        let (filled, count) = match (column_kind, value) {
            (Some(ColumnKind::Numeric), FillValue::Numeric(v)) => fill_numeric_nulls(series, *v)?,
            (Some(ColumnKind::Categorical), FillValue::Text(s)) => fill_string_nulls(series, s)?,
            (Some(ColumnKind::Categorical), FillValue::Numeric(v)) => {
                fill_string_nulls(series, &v.to_string())?
            }
            (found, value) => {
                return Err(ValidationError::SchemaMismatch {
                    column: col_name.to_string(),
                    expected: value.kind().to_string(),
                    found: found
                        .map(|k| k.to_string())
                        .unwrap_or_else(|| series.dtype().to_string()),
                });
            }
        };

        df.replace(col_name, filled)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn f64_values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    fn str_values(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    // ========================================================================
    // fit() tests
    // ========================================================================

    #[test]
    fn test_fit_numeric_median() {
        let mut df = df![
            "values" => [Some(1.0), None, Some(3.0), None, Some(5.0)],
        ]
        .unwrap();

        let (params, report) = StatisticalImputer::fit(&mut df).unwrap();

        // Median of [1, 3, 5] = 3
        assert_eq!(params.get("values"), Some(&FillValue::Numeric(3.0)));
        assert_eq!(
            f64_values(&df, "values"),
            vec![Some(1.0), Some(3.0), Some(3.0), Some(3.0), Some(5.0)]
        );
        assert_eq!(report.total_filled(), 2);
        assert_eq!(report.mode, RunMode::Fit);
    }

    #[test]
    fn test_fit_integer_column_keeps_dtype_for_whole_median() {
        let mut df = df![
            "tenure" => [Some(1i64), Some(2), None, Some(4)],
        ]
        .unwrap();

        let (params, _) = StatisticalImputer::fit(&mut df).unwrap();

        assert_eq!(params.get("tenure"), Some(&FillValue::Numeric(2.0)));
        assert_eq!(df.column("tenure").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_fit_integer_column_with_fractional_median_becomes_float() {
        let mut df = df![
            "tenure" => [Some(1i64), Some(2), None, Some(3), Some(4)],
        ]
        .unwrap();

        let (params, _) = StatisticalImputer::fit(&mut df).unwrap();

        assert_eq!(params.get("tenure"), Some(&FillValue::Numeric(2.5)));
        assert_eq!(f64_values(&df, "tenure")[2], Some(2.5));
    }

    #[test]
    fn test_fit_treats_nan_as_missing() {
        let mut df = df![
            "x" => [1.5, f64::NAN, 3.5, 2.0],
        ]
        .unwrap();

        let (params, report) = StatisticalImputer::fit(&mut df).unwrap();

        // Median of [1.5, 2.0, 3.5]
        assert_eq!(params.get("x"), Some(&FillValue::Numeric(2.0)));
        assert_eq!(report.total_filled(), 1);
        assert_eq!(
            f64_values(&df, "x"),
            vec![Some(1.5), Some(2.0), Some(3.5), Some(2.0)]
        );
    }

    #[test]
    fn test_apply_fills_nan_cells() {
        let params: ImputationParameters = vec![("x".to_string(), FillValue::Numeric(2.0))]
            .into_iter()
            .collect();
        let mut df = df![
            "x" => [f64::NAN, 4.0],
        ]
        .unwrap();

        let report = StatisticalImputer::apply(&mut df, &params).unwrap();

        assert_eq!(report.total_filled(), 1);
        assert_eq!(f64_values(&df, "x"), vec![Some(2.0), Some(4.0)]);
    }

    #[test]
    fn test_fit_categorical_mode() {
        let mut df = df![
            "PaymentMethod" => [
                Some("Electronic check"),
                Some("Mailed check"),
                None,
                Some("Electronic check"),
            ],
        ]
        .unwrap();

        let (params, report) = StatisticalImputer::fit(&mut df).unwrap();

        assert_eq!(
            params.get("PaymentMethod"),
            Some(&FillValue::Text("Electronic check".to_string()))
        );
        assert_eq!(
            str_values(&df, "PaymentMethod")[2],
            Some("Electronic check".to_string())
        );
        assert_eq!(report.fills[0].kind, ColumnKind::Categorical);
    }

    #[test]
    fn test_fit_keeps_column_order_across_kinds() {
        let mut df = df![
            "gender" => ["Male", "Female", "Male"],
            "tenure" => [1.0, 2.0, 3.0],
            "Contract" => ["One year", "One year", "Two year"],
        ]
        .unwrap();

        let (params, _) = StatisticalImputer::fit(&mut df).unwrap();

        let columns: Vec<&str> = params.iter().map(|(c, _)| c).collect();
        assert_eq!(columns, vec!["gender", "tenure", "Contract"]);
    }

    #[test]
    fn test_fit_all_missing_numeric_is_degenerate() {
        let mut df = df![
            "ok" => [1.0, 2.0, 3.0],
            "empty" => [Option::<f64>::None, None, None],
        ]
        .unwrap();

        let err = StatisticalImputer::fit(&mut df).unwrap_err();
        assert!(matches!(err, ValidationError::DegenerateColumn { ref column } if column == "empty"));
    }

    #[test]
    fn test_fit_all_missing_categorical_is_degenerate() {
        let mut df = df![
            "Partner" => [Option::<&str>::None, None],
        ]
        .unwrap();

        let err = StatisticalImputer::fit(&mut df).unwrap_err();
        assert_eq!(err.error_code(), "DEGENERATE_COLUMN");
    }

    #[test]
    fn test_fit_skips_unsupported_dtype() {
        let mut df = df![
            "flag" => [Some(true), None, Some(false)],
            "tenure" => [1.0, 2.0, 3.0],
        ]
        .unwrap();

        let (params, _) = StatisticalImputer::fit(&mut df).unwrap();
        assert!(!params.contains("flag"));
        assert_eq!(df.column("flag").unwrap().null_count(), 1);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let make = || {
            df![
                "tenure" => [Some(10.0), None, Some(30.0), Some(20.0)],
                "Contract" => [Some("One year"), Some("Two year"), None, Some("Two year")],
            ]
            .unwrap()
        };
        let (mut first, mut second) = (make(), make());

        let (params_a, _) = StatisticalImputer::fit(&mut first).unwrap();
        let (params_b, _) = StatisticalImputer::fit(&mut second).unwrap();

        assert_eq!(params_a, params_b);
        assert!(first.equals_missing(&second));
    }

    // ========================================================================
    // apply() tests
    // ========================================================================

    #[test]
    fn test_apply_uses_fitted_value_not_batch_statistics() {
        let params: ImputationParameters = vec![
            ("tenure".to_string(), FillValue::Numeric(29.0)),
            (
                "PaymentMethod".to_string(),
                FillValue::Text("Electronic check".to_string()),
            ),
        ]
        .into_iter()
        .collect();

        // The batch's own mode is "Mailed check" and its median is 100.
        let mut df = df![
            "tenure" => [Some(100.0), None, Some(100.0)],
            "PaymentMethod" => [Some("Mailed check"), Some("Mailed check"), None],
        ]
        .unwrap();

        let report = StatisticalImputer::apply(&mut df, &params).unwrap();

        assert_eq!(f64_values(&df, "tenure")[1], Some(29.0));
        assert_eq!(
            str_values(&df, "PaymentMethod")[2],
            Some("Electronic check".to_string())
        );
        assert_eq!(report.total_filled(), 2);
        assert!(report.unmapped_columns.is_empty());
    }

    #[test]
    fn test_apply_reports_unmapped_columns_and_leaves_them() {
        let params: ImputationParameters = vec![("tenure".to_string(), FillValue::Numeric(5.0))]
            .into_iter()
            .collect();
        let mut df = df![
            "tenure" => [Some(1.0), None],
            "Contract" => [Option::<&str>::None, Some("One year")],
        ]
        .unwrap();

        let report = StatisticalImputer::apply(&mut df, &params).unwrap();

        assert_eq!(report.unmapped_columns, vec!["Contract".to_string()]);
        assert_eq!(df.column("Contract").unwrap().null_count(), 1);
    }

    #[test]
    fn test_apply_to_entirely_missing_numeric_column() {
        let params: ImputationParameters = vec![("tenure".to_string(), FillValue::Numeric(12.0))]
            .into_iter()
            .collect();
        // CSV readers type an all-empty column as text.
        let mut df = df![
            "tenure" => [Option::<&str>::None, None],
        ]
        .unwrap();

        StatisticalImputer::apply(&mut df, &params).unwrap();

        assert_eq!(f64_values(&df, "tenure"), vec![Some(12.0), Some(12.0)]);
    }

    #[test]
    fn test_apply_text_value_to_numeric_column_is_mismatch() {
        let params: ImputationParameters =
            vec![("tenure".to_string(), FillValue::Text("Yes".to_string()))]
                .into_iter()
                .collect();
        let mut df = df![
            "tenure" => [Some(1.0), None],
        ]
        .unwrap();

        let err = StatisticalImputer::apply(&mut df, &params).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_MISMATCH");
    }

    #[test]
    fn test_apply_twice_is_idempotent() {
        let params: ImputationParameters = vec![("tenure".to_string(), FillValue::Numeric(7.0))]
            .into_iter()
            .collect();
        let mut df = df![
            "tenure" => [Some(1.0), None, Some(3.0)],
        ]
        .unwrap();

        StatisticalImputer::apply(&mut df, &params).unwrap();
        let once = df.clone();
        let report = StatisticalImputer::apply(&mut df, &params).unwrap();

        assert!(df.equals_missing(&once));
        assert_eq!(report.total_filled(), 0);
    }

    #[test]
    fn test_fill_missing_dispatches_on_mode() {
        let mut train = df![
            "tenure" => [Some(2.0), None, Some(4.0)],
        ]
        .unwrap();
        let (params, report) = StatisticalImputer::fill_missing(&mut train, StageMode::Fit).unwrap();
        assert_eq!(report.mode, RunMode::Fit);

        let mut test = df![
            "tenure" => [Option::<f64>::None, Some(50.0)],
        ]
        .unwrap();
        let (applied, report) =
            StatisticalImputer::fill_missing(&mut test, StageMode::Apply(&params)).unwrap();
        assert_eq!(report.mode, RunMode::Apply);
        assert_eq!(applied, params);
        assert_eq!(f64_values(&test, "tenure")[0], Some(3.0));
    }
}
