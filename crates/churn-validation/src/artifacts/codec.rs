//! CSV encodings of the parameter artifacts.
//!
//! Imputation values:
//!
//! ```text
//! column,kind,imputation_value
//! tenure,numeric,29
//! PaymentMethod,categorical,Electronic check
//! ```
//!
//! Outlier parameters, with the IQR multiplier the fit used repeated on every
//! row:
//!
//! ```text
//! column,Q1,Q3,IQR,multiplier
//! tenure,9,55,46,1.5
//! ```
//!
//! An outlier artifact without the `multiplier` field is read with the
//! default multiplier.
//!
//! Numbers are written with the shortest decimal representation that parses
//! back to the identical `f64`, and every field is read back as text before
//! parsing, so a save/load cycle reproduces the fitted parameters exactly.

use crate::error::{Result, ValidationError};
use crate::pipeline::DEFAULT_IQR_MULTIPLIER;
use crate::types::{
    ColumnKind, FillValue, ImputationParameters, OutlierParameters, QuartileBounds,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::io::Cursor;

const COLUMN: &str = "column";
const KIND: &str = "kind";
const IMPUTATION_VALUE: &str = "imputation_value";
const Q1: &str = "Q1";
const Q3: &str = "Q3";
const IQR: &str = "IQR";
const MULTIPLIER: &str = "multiplier";

/// Encode imputation parameters as CSV bytes.
pub fn encode_imputation(params: &ImputationParameters) -> Result<Vec<u8>> {
    let mut columns = Vec::with_capacity(params.len());
    let mut kinds = Vec::with_capacity(params.len());
    let mut values = Vec::with_capacity(params.len());
    for (column, value) in params.iter() {
        columns.push(column.to_string());
        kinds.push(value.kind().as_str().to_string());
        values.push(value.to_string());
    }

    let mut df = df![
        COLUMN => columns,
        KIND => kinds,
        IMPUTATION_VALUE => values,
    ]?;
    write_csv(&mut df)
}

/// Decode imputation parameters written by [`encode_imputation`].
pub fn decode_imputation(artifact: &str, bytes: &[u8]) -> Result<ImputationParameters> {
    let df = read_csv(artifact, bytes)?;
    let columns = text_column(&df, artifact, COLUMN)?;
    let kinds = text_column(&df, artifact, KIND)?;
    let values = text_column(&df, artifact, IMPUTATION_VALUE)?;

    let mut params = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let column = required_cell(columns, artifact, COLUMN, row)?;
        let kind: ColumnKind = required_cell(kinds, artifact, KIND, row)?
            .parse()
            .map_err(|reason| malformed(artifact, reason))?;
        let raw = required_cell(values, artifact, IMPUTATION_VALUE, row)?;

        let value = match kind {
            ColumnKind::Numeric => FillValue::Numeric(parse_number(artifact, column, raw)?),
            ColumnKind::Categorical => FillValue::Text(raw.to_string()),
        };
        params.push((column.to_string(), value));
    }

    Ok(params.into_iter().collect())
}

/// Encode outlier parameters as CSV bytes.
pub fn encode_outliers(params: &OutlierParameters) -> Result<Vec<u8>> {
    let mut columns = Vec::with_capacity(params.len());
    let mut q1 = Vec::with_capacity(params.len());
    let mut q3 = Vec::with_capacity(params.len());
    let mut iqr = Vec::with_capacity(params.len());
    for (column, bounds) in params.iter() {
        columns.push(column.to_string());
        q1.push(bounds.q1.to_string());
        q3.push(bounds.q3.to_string());
        iqr.push(bounds.iqr.to_string());
    }
    let multiplier = vec![params.multiplier().to_string(); params.len()];

    let mut df = df![
        COLUMN => columns,
        Q1 => q1,
        Q3 => q3,
        IQR => iqr,
        MULTIPLIER => multiplier,
    ]?;
    write_csv(&mut df)
}

/// Decode outlier parameters written by [`encode_outliers`].
///
/// The stored IQR is used as-is rather than recomputed from Q1 and Q3. Every
/// row must carry the same multiplier.
pub fn decode_outliers(artifact: &str, bytes: &[u8]) -> Result<OutlierParameters> {
    let df = read_csv(artifact, bytes)?;
    let columns = text_column(&df, artifact, COLUMN)?;
    let q1 = text_column(&df, artifact, Q1)?;
    let q3 = text_column(&df, artifact, Q3)?;
    let iqr = text_column(&df, artifact, IQR)?;
    let multipliers = match df.column(MULTIPLIER) {
        Ok(_) => Some(text_column(&df, artifact, MULTIPLIER)?),
        Err(_) => None,
    };

    let mut multiplier = None;
    let mut params = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let column = required_cell(columns, artifact, COLUMN, row)?;
        let bounds = QuartileBounds {
            q1: parse_number(artifact, column, required_cell(q1, artifact, Q1, row)?)?,
            q3: parse_number(artifact, column, required_cell(q3, artifact, Q3, row)?)?,
            iqr: parse_number(artifact, column, required_cell(iqr, artifact, IQR, row)?)?,
        };
        if let Some(multipliers) = multipliers {
            let raw = required_cell(multipliers, artifact, MULTIPLIER, row)?;
            let value = parse_number(artifact, column, raw)?;
            match multiplier {
                Some(seen) if seen != value => {
                    return Err(malformed(
                        artifact,
                        format!("multiplier {value} on row {} differs from {seen}", row + 1),
                    ));
                }
                _ => multiplier = Some(value),
            }
        }
        params.push((column.to_string(), bounds));
    }

    Ok(params
        .into_iter()
        .collect::<OutlierParameters>()
        .with_multiplier(multiplier.unwrap_or(DEFAULT_IQR_MULTIPLIER)))
}

fn write_csv(df: &mut DataFrame) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    Ok(buf)
}

/// Read every field as text; numbers are parsed explicitly afterwards.
fn read_csv(artifact: &str, bytes: &[u8]) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()
        .map_err(|e| malformed(artifact, e.to_string()))
}

fn text_column<'a>(df: &'a DataFrame, artifact: &str, name: &str) -> Result<&'a StringChunked> {
    df.column(name)
        .map_err(|_| malformed(artifact, format!("missing '{name}' field")))?
        .as_materialized_series()
        .str()
        .map_err(|e| malformed(artifact, e.to_string()))
}

fn required_cell<'a>(
    values: &'a StringChunked,
    artifact: &str,
    field: &str,
    row: usize,
) -> Result<&'a str> {
    values
        .get(row)
        .ok_or_else(|| malformed(artifact, format!("empty '{field}' on row {}", row + 1)))
}

fn parse_number(artifact: &str, column: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| malformed(artifact, format!("'{raw}' is not a number (column '{column}')")))
}

fn malformed(artifact: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::MalformedArtifact {
        artifact: artifact.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_imputation() -> ImputationParameters {
        vec![
            ("tenure".to_string(), FillValue::Numeric(29.0)),
            ("MonthlyCharges".to_string(), FillValue::Numeric(70.35)),
            ("SeniorCitizen".to_string(), FillValue::Text("0".to_string())),
            (
                "PaymentMethod".to_string(),
                FillValue::Text("Electronic check".to_string()),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_imputation_layout() {
        let bytes = encode_imputation(&sample_imputation()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "column,kind,imputation_value");
        assert_eq!(lines[1], "tenure,numeric,29");
        assert_eq!(lines[2], "MonthlyCharges,numeric,70.35");
        assert_eq!(lines[3], "SeniorCitizen,categorical,0");
        assert_eq!(lines[4], "PaymentMethod,categorical,Electronic check");
    }

    #[test]
    fn test_imputation_text_that_looks_numeric_stays_text() {
        let params = sample_imputation();
        let bytes = encode_imputation(&params).unwrap();
        let decoded = decode_imputation("imp", &bytes).unwrap();

        assert_eq!(
            decoded.get("SeniorCitizen"),
            Some(&FillValue::Text("0".to_string()))
        );
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_outlier_layout() {
        let params: OutlierParameters = vec![(
            "tenure".to_string(),
            QuartileBounds::from_quartiles(2.0, 4.0),
        )]
        .into_iter()
        .collect();

        let text = String::from_utf8(encode_outliers(&params).unwrap()).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec!["column,Q1,Q3,IQR,multiplier", "tenure,2,4,2,1.5"]
        );
    }

    #[test]
    fn test_outlier_multiplier_survives() {
        let params = vec![(
            "tenure".to_string(),
            QuartileBounds::from_quartiles(2.0, 4.0),
        )]
        .into_iter()
        .collect::<OutlierParameters>()
        .with_multiplier(3.0);

        let decoded = decode_outliers("out", &encode_outliers(&params).unwrap()).unwrap();
        assert_eq!(decoded.multiplier(), 3.0);
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_outlier_artifact_without_multiplier_uses_default() {
        let decoded = decode_outliers("out", b"column,Q1,Q3,IQR\ntenure,2,4,2\n").unwrap();
        assert_eq!(decoded.multiplier(), DEFAULT_IQR_MULTIPLIER);
        assert_eq!(decoded.get("tenure"), Some(&QuartileBounds::from_quartiles(2.0, 4.0)));
    }

    #[test]
    fn test_decode_conflicting_multipliers_is_malformed() {
        let err = decode_outliers(
            "out",
            b"column,Q1,Q3,IQR,multiplier\ntenure,2,4,2,1.5\nMonthlyCharges,20,50,30,3\n",
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_ARTIFACT");
    }

    #[test]
    fn test_outlier_values_survive_exactly() {
        let params: OutlierParameters = vec![(
            "TotalCharges".to_string(),
            QuartileBounds::from_quartiles(401.45, 3794.7375),
        )]
        .into_iter()
        .collect();

        let decoded = decode_outliers("out", &encode_outliers(&params).unwrap()).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_decode_missing_field_is_malformed() {
        let err = decode_outliers("out", b"column,Q1,Q3\ntenure,2,4\n").unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_ARTIFACT");
        assert!(err.to_string().contains("IQR"));
    }

    #[test]
    fn test_decode_non_numeric_value_is_malformed() {
        let err =
            decode_imputation("imp", b"column,kind,imputation_value\ntenure,numeric,abc\n")
                .unwrap_err();
        assert!(matches!(err, ValidationError::MalformedArtifact { .. }));
    }

    #[test]
    fn test_decode_unknown_kind_is_malformed() {
        let err =
            decode_imputation("imp", b"column,kind,imputation_value\ntenure,ordinal,1\n")
                .unwrap_err();
        assert!(err.to_string().contains("ordinal"));
    }

    #[test]
    fn test_empty_parameters_round_trip() {
        let params = OutlierParameters::default();
        let decoded = decode_outliers("out", &encode_outliers(&params).unwrap()).unwrap();
        assert!(decoded.is_empty());
    }
}
