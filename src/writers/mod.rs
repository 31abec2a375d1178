//! Output of the averaged field: a CF-style netCDF file and a quick-look image.
use std::path::PathBuf;

#[cfg(feature = "netcdf")]
pub mod nc_output;
#[cfg(feature = "plotting")]
pub mod plot;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Could not create output file {}", .0.display())]
    Create(PathBuf),
    #[error("Error writing {0} to the output file")]
    Write(String),
    #[error("Could not render the plot to {}", .0.display())]
    Plot(PathBuf),
    #[error("Could not remove the existing plot {}", .0.display())]
    RemoveStale(PathBuf),
}
