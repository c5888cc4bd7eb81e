//! Shared utilities for the validation stage.
//!
//! Series statistics (quantiles, median, mode) and null-filling helpers used
//! by both the imputer and the outlier corrector.

use polars::prelude::*;
use std::collections::HashMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Column names of a DataFrame as owned strings, in column order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Non-missing values of a numeric Series as `f64`, sorted ascending.
///
/// Nulls and NaNs are both treated as missing.
pub fn sorted_numeric_values(series: &Series) -> PolarsResult<Vec<f64>> {
    let float_series = series.cast(&DataType::Float64)?;
    let mut values: Vec<f64> = float_series
        .f64()?
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));
    Ok(values)
}

/// Quantile of sorted values with linear interpolation between closest ranks.
///
/// Returns `None` for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let fraction = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Median of sorted values.
pub fn median(sorted: &[f64]) -> Option<f64> {
    quantile(sorted, 0.5)
}

/// Most frequent non-null value of a string Series.
///
/// Ties resolve to the lexicographically smallest value, so the result does
/// not depend on row order.
pub fn string_mode(series: &Series) -> PolarsResult<Option<String>> {
    let str_series = series.cast(&DataType::String)?;
    let mut value_counts: HashMap<&str, usize> = HashMap::new();
    for val in str_series.str()?.into_iter().flatten() {
        *value_counts.entry(val).or_insert(0) += 1;
    }

    Ok(value_counts
        .into_iter()
        .max_by(|(a_val, a_count), (b_val, b_count)| {
            a_count.cmp(b_count).then_with(|| b_val.cmp(a_val))
        })
        .map(|(val, _)| val.to_string()))
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill missing values (nulls and NaNs) in a numeric Series, returning the
/// filled Series and the number of cells filled.
///
/// Integer columns keep their dtype when the fill value is a whole number;
/// everything else comes back as Float64.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<(Series, usize)> {
    let float_series = series.cast(&DataType::Float64)?;
    let mut filled_count = 0;
    let filled: Float64Chunked = float_series
        .f64()?
        .into_iter()
        .map(|v| match v {
            Some(v) if !v.is_nan() => Some(v),
            _ => {
                filled_count += 1;
                Some(fill_value)
            }
        })
        .collect();
    let filled = filled.with_name(series.name().clone()).into_series();

    if series.dtype().is_integer() && fill_value.fract() == 0.0 {
        return Ok((filled.cast(series.dtype())?, filled_count));
    }
    Ok((filled, filled_count))
}

/// Fill null values in a string Series, returning the filled Series and the
/// number of cells filled.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<(Series, usize)> {
    let str_series = series.cast(&DataType::String)?;
    let null_count = str_series.null_count();
    let filled: StringChunked = str_series
        .str()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value)))
        .collect();
    Ok((
        filled.with_name(series.name().clone()).into_series(),
        null_count,
    ))
}

// =============================================================================
// Tests
// =============================================================================
