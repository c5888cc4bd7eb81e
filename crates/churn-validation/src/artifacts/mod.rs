//! Durable storage for fitted parameters.
//!
//! Parameters live behind the [`ArtifactStore`] trait: a flat key/value store
//! whose `write` replaces an artifact atomically, so a concurrent `read`
//! observes either the previous or the new version and never a partial one.
//!
//! Two implementations are provided:
//!
//! - [`FileArtifactStore`] - one file per key under a root directory,
//!   written to a temp file and renamed into place
//! - [`MemoryArtifactStore`] - an in-process map, useful for tests and for
//!   embedding the validator in a long-running service
//!
//! The typed helpers ([`save_imputation`], [`load_outliers`], ...) encode
//! parameters with the CSV formats in [`codec`].

pub mod codec;
mod store;

pub use store::{FileArtifactStore, MemoryArtifactStore};

use crate::error::{Result, ValidationError};
use crate::types::{FittedParameters, ImputationParameters, OutlierParameters};
use std::sync::Arc;
use tracing::{debug, warn};

/// A key/value store for parameter artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Replace the artifact stored under `key`.
    ///
    /// Implementations must make the replacement atomic.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read the artifact stored under `key`, or `None` if it was never written.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

impl<T: ArtifactStore + ?Sized> ArtifactStore for Arc<T> {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        (**self).write(key, bytes)
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).read(key)
    }
}

impl<T: ArtifactStore + ?Sized> ArtifactStore for &T {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        (**self).write(key, bytes)
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).read(key)
    }
}

/// Read an artifact that must exist.
fn read_required<S: ArtifactStore + ?Sized>(store: &S, key: &str) -> Result<Vec<u8>> {
    store
        .read(key)?
        .ok_or_else(|| ValidationError::MissingParameters {
            artifact: key.to_string(),
        })
}

/// Persist imputation parameters under `key`, replacing any prior version.
pub fn save_imputation<S: ArtifactStore + ?Sized>(
    store: &S,
    key: &str,
    params: &ImputationParameters,
) -> Result<()> {
    let bytes = codec::encode_imputation(params)?;
    store.write(key, &bytes)?;
    debug!("Saved imputation values for {} columns to '{}'", params.len(), key);
    Ok(())
}

/// Load imputation parameters, failing with `MissingParameters` if no fit
/// has written them yet.
pub fn load_imputation<S: ArtifactStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<ImputationParameters> {
    let bytes = read_required(store, key)?;
    codec::decode_imputation(key, &bytes)
}

/// Persist outlier parameters under `key`, replacing any prior version.
pub fn save_outliers<S: ArtifactStore + ?Sized>(
    store: &S,
    key: &str,
    params: &OutlierParameters,
) -> Result<()> {
    let bytes = codec::encode_outliers(params)?;
    store.write(key, &bytes)?;
    debug!("Saved outlier bounds for {} columns to '{}'", params.len(), key);
    Ok(())
}

/// Load outlier parameters, failing with `MissingParameters` if no fit has
/// written them yet.
pub fn load_outliers<S: ArtifactStore + ?Sized>(store: &S, key: &str) -> Result<OutlierParameters> {
    let bytes = read_required(store, key)?;
    codec::decode_outliers(key, &bytes)
}

/// Persist both parameter sets of one fit.
///
/// Both artifacts are encoded before anything is written. If the outlier
/// write fails after the imputation write succeeded, the previous imputation
/// artifact is written back, so the store never pairs values from two fits.
/// A store that held no imputation artifact before keeps the new one, and a
/// later apply fails with `MissingParameters` on the outlier artifact.
pub fn save_parameters<S: ArtifactStore + ?Sized>(
    store: &S,
    imputation_key: &str,
    outlier_key: &str,
    params: &FittedParameters,
) -> Result<()> {
    let imputation = codec::encode_imputation(&params.imputation)?;
    let outliers = codec::encode_outliers(&params.outliers)?;

    let previous = store.read(imputation_key)?;
    store.write(imputation_key, &imputation)?;

    if let Err(err) = store.write(outlier_key, &outliers) {
        if let Some(previous) = previous {
            if let Err(restore_err) = store.write(imputation_key, &previous) {
                warn!(
                    "Failed to restore previous '{}' after a failed save: {}",
                    imputation_key, restore_err
                );
            }
        }
        return Err(err);
    }

    debug!(
        "Saved parameters for {} columns ({} with outlier bounds)",
        params.imputation.len(),
        params.outliers.len()
    );
    Ok(())
}
