use indexmap::IndexMap;
use polars::prelude::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::pipeline::DEFAULT_IQR_MULTIPLIER;
use crate::utils::is_numeric_dtype;

// ============================================================================
// Modes and stages
// ============================================================================

/// Payload-free label for the two operating modes, used in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Fit,
    Apply,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fit => "fit",
            Self::Apply => "apply",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage treats the dataset it is given.
///
/// `Fit` computes fresh parameters from the dataset. `Apply` carries the
/// parameters loaded from a previous fit and never recomputes them.
#[derive(Debug, Clone, PartialEq)]
pub enum StageMode<P> {
    Fit,
    Apply(P),
}

impl<P> StageMode<P> {
    pub fn run_mode(&self) -> RunMode {
        match self {
            Self::Fit => RunMode::Fit,
            Self::Apply(_) => RunMode::Apply,
        }
    }
}

/// Stages of a validation run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    Loading,
    Imputation,
    OutlierCorrection,
    Persistence,
    Export,
}

impl ValidationStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading",
            Self::Imputation => "Imputation",
            Self::OutlierCorrection => "Outlier Correction",
            Self::Persistence => "Parameter Persistence",
            Self::Export => "Export",
        }
    }
}

// ============================================================================
// Column kinds and fill values
// ============================================================================

/// The two column kinds the validation stage works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl ColumnKind {
    /// Classify a polars dtype. Returns `None` for dtypes the stage skips.
    pub fn from_dtype(dtype: &DataType) -> Option<Self> {
        if is_numeric_dtype(dtype) {
            Some(Self::Numeric)
        } else if matches!(dtype, DataType::String) {
            Some(Self::Categorical)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "numeric" => Ok(Self::Numeric),
            "categorical" => Ok(Self::Categorical),
            other => Err(format!("unknown column kind '{other}'")),
        }
    }
}

/// A single imputation value: the median of a numeric column or the mode
/// of a categorical one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Numeric(f64),
    Text(String),
}

impl FillValue {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Numeric(_) => ColumnKind::Numeric,
            Self::Text(_) => ColumnKind::Categorical,
        }
    }
}

impl fmt::Display for FillValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // f64's Display is the shortest representation that parses back
            // to the same value.
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// ============================================================================
// Fitted parameters
// ============================================================================

/// Column → fill value, in dataset column order.
///
/// Produced once by a fit and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImputationParameters {
    values: IndexMap<String, FillValue>,
}

impl ImputationParameters {
    pub fn get(&self, column: &str) -> Option<&FillValue> {
        self.values.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FillValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, FillValue)> for ImputationParameters {
    fn from_iter<I: IntoIterator<Item = (String, FillValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// First/third quartile and interquartile range of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuartileBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
}

impl QuartileBounds {
    pub fn from_quartiles(q1: f64, q3: f64) -> Self {
        Self { q1, q3, iqr: q3 - q1 }
    }

    /// `Q1 - multiplier * IQR`
    pub fn lower(&self, multiplier: f64) -> f64 {
        self.q1 - multiplier * self.iqr
    }

    /// `Q3 + multiplier * IQR`
    pub fn upper(&self, multiplier: f64) -> f64 {
        self.q3 + multiplier * self.iqr
    }

    /// Bounds are exclusive: a value sitting exactly on a bound is kept.
    pub fn is_outlier(&self, value: f64, multiplier: f64) -> bool {
        value < self.lower(multiplier) || value > self.upper(multiplier)
    }
}

/// Numeric column → quartile bounds, in dataset column order, plus the IQR
/// multiplier the fit used.
///
/// Produced once by a fit and never mutated afterwards. Applying these
/// parameters always derives bounds with the stored multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierParameters {
    multiplier: f64,
    bounds: IndexMap<String, QuartileBounds>,
}

impl Default for OutlierParameters {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_IQR_MULTIPLIER,
            bounds: IndexMap::new(),
        }
    }
}

impl OutlierParameters {
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn get(&self, column: &str) -> Option<&QuartileBounds> {
        self.bounds.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.bounds.contains_key(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QuartileBounds)> {
        self.bounds.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

/// Collects bounds under the default multiplier; see
/// [`OutlierParameters::with_multiplier`].
impl FromIterator<(String, QuartileBounds)> for OutlierParameters {
    fn from_iter<I: IntoIterator<Item = (String, QuartileBounds)>>(iter: I) -> Self {
        Self {
            multiplier: DEFAULT_IQR_MULTIPLIER,
            bounds: iter.into_iter().collect(),
        }
    }
}

/// Both parameter sets produced by fitting a training dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FittedParameters {
    pub imputation: ImputationParameters,
    pub outliers: OutlierParameters,
}

// ============================================================================
// Stage reports
// ============================================================================

/// What the imputer did to one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFill {
    pub column: String,
    pub kind: ColumnKind,
    pub value: FillValue,
    /// Number of missing cells that were filled.
    pub filled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationReport {
    pub mode: RunMode,
    pub fills: Vec<ColumnFill>,
    /// Columns present in the dataset but absent from the parameters.
    pub unmapped_columns: Vec<String>,
}

impl ImputationReport {
    pub fn total_filled(&self) -> usize {
        self.fills.iter().map(|f| f.filled).sum()
    }
}

/// What the outlier corrector did to one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCorrection {
    pub column: String,
    pub lower: f64,
    pub upper: f64,
    /// Number of out-of-range cells replaced by `ln(1 + x)`.
    pub dampened: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub mode: RunMode,
    pub corrections: Vec<ColumnCorrection>,
    /// Numeric columns present in the dataset but absent from the parameters.
    pub unmapped_columns: Vec<String>,
}

impl OutlierReport {
    pub fn total_dampened(&self) -> usize {
        self.corrections.iter().map(|c| c.dampened).sum()
    }
}
