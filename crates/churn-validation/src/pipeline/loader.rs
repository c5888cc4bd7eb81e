//! Dataset loading.

use crate::error::{Result, ValidationError};
use crate::utils::{column_names, is_numeric_dtype};
use polars::io::csv::read::{CsvParseOptions, CsvReadOptions};
use polars::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Rows sampled for schema inference.
const INFER_SCHEMA_ROWS: usize = 1000;

/// Reads header CSVs into data frames with a stable column typing.
///
/// Columns named in `text_columns` are always held as text, even when every
/// value looks numeric. Other non-numeric, non-text columns (booleans) are
/// converted to text so the imputer can treat them as categorical.
#[derive(Debug, Clone, Default)]
pub struct DatasetLoader {
    text_columns: Vec<String>,
}

impl DatasetLoader {
    pub fn new(text_columns: Vec<String>) -> Self {
        Self { text_columns }
    }

    pub fn text_columns(&self) -> &[String] {
        &self.text_columns
    }

    /// Load the CSV at `path`. Empty cells become missing values.
    ///
    /// Text columns present in the file are parsed as strings, so their raw
    /// cell text (`01`, `1.0`) is kept as written.
    pub fn load(&self, path: &Path) -> Result<DataFrame> {
        fs::metadata(path).map_err(|e| ValidationError::io(path, e))?;

        info!("Loading dataset from: {}", path.display());
        let header = Self::read_header(path)?;
        let text_schema: Schema = self
            .text_columns
            .iter()
            .filter(|name| header.contains(*name))
            .map(|name| (PlSmallStr::from(name.as_str()), DataType::String))
            .collect();

        let mut options = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .with_parse_options(Self::parse_options());
        if !text_schema.is_empty() {
            options = options.with_schema_overwrite(Some(Arc::new(text_schema)));
        }
        let df = options
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        let df = self.normalize(df)?;
        info!("Dataset loaded successfully: {:?}", df.shape());
        Ok(df)
    }

    /// Column names of the CSV at `path`, read from its first rows as text.
    fn read_header(path: &Path) -> Result<Vec<String>> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_n_rows(Some(1))
            .with_infer_schema_length(Some(0))
            .with_parse_options(Self::parse_options())
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(column_names(&df))
    }

    fn parse_options() -> CsvParseOptions {
        CsvParseOptions::default().with_quote_char(Some(b'"'))
    }

    /// Apply the text-column rules to an already loaded frame.
    ///
    /// Frames that did not come through [`load`](Self::load) may still hold a
    /// text column as numbers; those are cast, which renders the numbers
    /// rather than any original text.
    pub fn normalize(&self, mut df: DataFrame) -> Result<DataFrame> {
        for name in column_names(&df) {
            let column = df.column(&name)?;
            let dtype = column.dtype().clone();
            if dtype == DataType::String {
                continue;
            }

            let forced = self.text_columns.iter().any(|c| c == &name);
            if forced || !is_numeric_dtype(&dtype) {
                let text = column.cast(&DataType::String)?.take_materialized_series();
                df.replace(&name, text)?;
                debug!("Column '{}' converted from {} to text", name, dtype);
            }
        }
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_keeps_text_column_as_text() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "train.csv",
            "gender,SeniorCitizen,tenure\nFemale,0,1\nMale,1,34\nMale,0,2\n",
        );

        let df = DatasetLoader::new(vec!["SeniorCitizen".to_string()])
            .load(&path)
            .unwrap();

        assert_eq!(df.column("SeniorCitizen").unwrap().dtype(), &DataType::String);
        assert!(is_numeric_dtype(df.column("tenure").unwrap().dtype()));
        let senior: Vec<Option<&str>> = df
            .column("SeniorCitizen")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(senior, vec![Some("0"), Some("1"), Some("0")]);
    }

    #[test]
    fn test_load_text_column_keeps_raw_cell_text() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "train.csv", "SeniorCitizen,tenure\n01,1\n00,2\n1.0,3\n");

        let df = DatasetLoader::new(vec!["SeniorCitizen".to_string()])
            .load(&path)
            .unwrap();

        let senior: Vec<Option<&str>> = df
            .column("SeniorCitizen")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(senior, vec![Some("01"), Some("00"), Some("1.0")]);
        assert!(is_numeric_dtype(df.column("tenure").unwrap().dtype()));
    }

    #[test]
    fn test_load_empty_cells_are_missing() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "test.csv",
            "PaymentMethod,tenure\nElectronic check,5\n,\nMailed check,7\n",
        );

        let df = DatasetLoader::default().load(&path).unwrap();

        assert_eq!(df.column("tenure").unwrap().null_count(), 1);
        assert_eq!(df.column("PaymentMethod").unwrap().null_count(), 1);
    }

    #[test]
    fn test_load_converts_booleans_to_text() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "flags.csv", "Partner,tenure\ntrue,1\nfalse,2\n");

        let df = DatasetLoader::default().load(&path).unwrap();

        assert_eq!(df.column("Partner").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_unlisted_text_column_absent_is_fine() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "batch.csv", "tenure\n1\n2\n");

        let df = DatasetLoader::new(vec!["SeniorCitizen".to_string()])
            .load(&path)
            .unwrap();

        assert_eq!(df.width(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.csv");

        let err = DatasetLoader::default().load(&path).unwrap_err();

        assert_eq!(err.error_code(), "IO_FAILURE");
        assert!(err.to_string().contains("nope.csv"));
    }
}
