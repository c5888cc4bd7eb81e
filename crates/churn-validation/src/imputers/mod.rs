//! Imputation module for handling missing values.
//!
//! Provides median (numeric) and mode (categorical) imputation with separate
//! fit and apply paths.

mod statistical;

pub use statistical::StatisticalImputer;
