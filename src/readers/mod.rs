//! Loading retrieval files into memory.
//!
//! The pipeline only depends on the [`RetrievalReader`] trait, so the gridding
//! can run against anything that produces a [`RetrievalFile`]. The netCDF
//! implementation lives in [`retrieval_nc`] and needs the `netcdf` feature.
use std::path::{Path, PathBuf};

use crate::extraction::RetrievalFile;

#[cfg(feature = "netcdf")]
pub mod retrieval_nc;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Could not open {}", .0.display())]
    Open(PathBuf),
    #[error("Variable '{0}' not found")]
    MissingVariable(String),
    #[error("Could not read variable '{0}'")]
    ReadVariable(String),
    #[error("Variable '{name}' should be 1D but has {ndim} dimensions")]
    NotOneDimensional { name: String, ndim: usize },
}

/// Something that can load the arrays of one retrieval file.
///
/// Implementations must release whatever they opened before returning, whether
/// or not the read succeeded.
pub trait RetrievalReader {
    fn read(&self, path: &Path) -> error_stack::Result<RetrievalFile, ReadError>;
}

impl<R: RetrievalReader + ?Sized> RetrievalReader for &R {
    fn read(&self, path: &Path) -> error_stack::Result<RetrievalFile, ReadError> {
        (**self).read(path)
    }
}

/// Replace every value equal to `fill` with NaN.
#[cfg_attr(not(feature = "netcdf"), allow(dead_code))]
pub(crate) fn mask_fill(values: &mut ndarray::ArrayD<f64>, fill: f64) -> usize {
    let mut n_masked = 0;
    values.mapv_inplace(|v| {
        if v == fill {
            n_masked += 1;
            f64::NAN
        } else {
            v
        }
    });
    n_masked
}
