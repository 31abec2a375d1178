//! Geographic bounding box and the regular latitude/longitude target grid.
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// A closed latitude/longitude box, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Result<Self, GridError> {
        let bbox = Self { lat_min, lat_max, lon_min, lon_max };
        bbox.validate()?;
        Ok(bbox)
    }

    pub fn validate(&self) -> Result<(), GridError> {
        check_range("latitude", self.lat_min, self.lat_max)?;
        check_range("longitude", self.lon_min, self.lon_max)
    }

    /// Whether a point falls inside the box, edges included.
    /// Any NaN coordinate is outside.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lon >= self.lon_min && lon <= self.lon_max
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self { lat_min: -15.0, lat_max: 30.0, lon_min: 90.0, lon_max: 150.0 }
    }
}

fn check_range(axis: &'static str, min: f64, max: f64) -> Result<(), GridError> {
    if !min.is_finite() || !max.is_finite() {
        return Err(GridError::NonFiniteRange { axis, min, max });
    }
    if min >= max {
        return Err(GridError::EmptyRange { axis, min, max });
    }
    Ok(())
}

/// The output grid geometry.
///
/// Both axes start at the bounding box minimum and advance by the resolution
/// up to and including the maximum. When the resolution does not evenly divide
/// the range, the last point is the largest step that does not exceed the
/// maximum. A grid is immutable once built, so every file interpolated onto the
/// same `TargetGrid` can be stacked.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGrid {
    lat: Array1<f64>,
    lon: Array1<f64>,
}

impl TargetGrid {
    pub fn new(bbox: &BoundingBox, resolution: f64) -> Result<Self, GridError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(GridError::BadResolution(resolution));
        }
        bbox.validate()?;

        let lat = inclusive_axis(bbox.lat_min, bbox.lat_max, resolution);
        let lon = inclusive_axis(bbox.lon_min, bbox.lon_max, resolution);
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> &Array1<f64> {
        &self.lat
    }

    pub fn lon(&self) -> &Array1<f64> {
        &self.lon
    }

    /// Shape of a field on this grid, as (n_lat, n_lon)
    pub fn shape(&self) -> (usize, usize) {
        (self.lat.len(), self.lon.len())
    }
}

fn inclusive_axis(min: f64, max: f64, step: f64) -> Array1<f64> {
    // The small tolerance keeps e.g. (30 - -15) / 0.25 = 180 from rounding down to 179.
    let nstep = ((max - min) / step + 1e-9).floor() as usize;
    // Multiplying rather than accumulating avoids drift over long axes.
    Array1::from_iter((0..=nstep).map(|i| min + i as f64 * step))
}
