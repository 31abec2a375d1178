//! Interpolation of scattered surface samples onto a regular grid.
//!
//! Three methods are provided through the [`InterpolationMethod`] trait:
//!
//! - [`LinearInterp`] blends the three vertices of the Delaunay triangle that
//!   encloses each grid point. Grid points outside the convex hull of the
//!   samples are left as NaN.
//! - [`NearestInterp`] takes the value of the closest sample, everywhere.
//! - [`LinearWithNearestFill`] runs the linear pass, then fills every cell it
//!   left as NaN from the nearest sample. This is what the monthly gridding uses.
//!
//! Distances are Euclidean in (longitude, latitude) degrees.
use ndarray::{Array2, Zip};

use crate::extraction::SurfaceSample;
use crate::grid::TargetGrid;
use crate::triangulation::Triangulation;

/// Barycentric weights down to this (negative) value still count as inside a
/// triangle, so grid points lying on an edge are not lost to round-off.
const EDGE_TOLERANCE: f64 = 1e-10;

#[derive(Debug, thiserror::Error)]
pub enum InterpolationError {
    #[error(
        "Input arrays were too short, needed at least {req_len} elements but got only {actual_len}"
    )]
    InputTooShort { req_len: usize, actual_len: usize },
}

pub trait InterpolationMethod {
    fn interp2d(&self, samples: &[SurfaceSample], grid: &TargetGrid) -> Result<Array2<f64>, InterpolationError>;

    fn check_2d_inputs(&self, samples: &[SurfaceSample], min_len: usize) -> Result<(), InterpolationError> {
        if samples.len() < min_len {
            return Err(InterpolationError::InputTooShort {
                req_len: min_len,
                actual_len: samples.len(),
            });
        }
        Ok(())
    }
}

/// Piecewise linear interpolation on the Delaunay triangulation of the samples.
///
/// With fewer than three non-collinear samples there are no triangles, so the
/// whole output is NaN.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearInterp;

impl InterpolationMethod for LinearInterp {
    fn interp2d(&self, samples: &[SurfaceSample], grid: &TargetGrid) -> Result<Array2<f64>, InterpolationError> {
        self.check_2d_inputs(samples, 1)?;
        let mut out = Array2::from_elem(grid.shape(), f64::NAN);
        let mut assigned = Array2::from_elem(grid.shape(), false);

        let points: Vec<[f64; 2]> = samples.iter().map(|s| [s.longitude, s.latitude]).collect();
        let tri = Triangulation::new(&points);
        if tri.is_empty() {
            log::debug!("{} sample(s) do not span an area, linear interpolation is empty", samples.len());
            return Ok(out);
        }

        let lat = grid.lat();
        let lon = grid.lon();
        for (itri, verts) in tri.triangles().iter().enumerate() {
            let corners = tri.vertices(itri);
            let [ia, ib, ic] = *verts;
            let values = [samples[ia].value, samples[ib].value, samples[ic].value];

            let (ilat_lo, ilat_hi) = axis_index_span(lat.as_slice(), corners.map(|c| c[1]));
            let (ilon_lo, ilon_hi) = axis_index_span(lon.as_slice(), corners.map(|c| c[0]));

            for ilat in ilat_lo..ilat_hi {
                for ilon in ilon_lo..ilon_hi {
                    // The first triangle to claim a point on a shared edge keeps it.
                    if assigned[[ilat, ilon]] {
                        continue;
                    }
                    if let Some(weights) = barycentric(corners, [lon[ilon], lat[ilat]]) {
                        out[[ilat, ilon]] = weights[0] * values[0] + weights[1] * values[1] + weights[2] * values[2];
                        assigned[[ilat, ilon]] = true;
                    }
                }
            }
        }

        Ok(out)
    }
}

/// Nearest sample value; ties go to the sample that comes first.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestInterp;

impl NearestInterp {
    /// The value of the sample closest to (`x`, `y`), or NaN if no sample has
    /// finite coordinates.
    pub fn nearest_value(samples: &[SurfaceSample], x: f64, y: f64) -> f64 {
        let mut best_dist = f64::INFINITY;
        let mut best_value = f64::NAN;
        for s in samples {
            let d = (s.longitude - x).powi(2) + (s.latitude - y).powi(2);
            if d < best_dist {
                best_dist = d;
                best_value = s.value;
            }
        }
        best_value
    }
}

impl InterpolationMethod for NearestInterp {
    fn interp2d(&self, samples: &[SurfaceSample], grid: &TargetGrid) -> Result<Array2<f64>, InterpolationError> {
        self.check_2d_inputs(samples, 1)?;
        let lat = grid.lat();
        let lon = grid.lon();
        let out = Array2::from_shape_fn(grid.shape(), |(ilat, ilon)| {
            Self::nearest_value(samples, lon[ilon], lat[ilat])
        });
        Ok(out)
    }
}

/// Linear interpolation inside the convex hull, nearest neighbor everywhere it left a gap.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearWithNearestFill;

impl InterpolationMethod for LinearWithNearestFill {
    fn interp2d(&self, samples: &[SurfaceSample], grid: &TargetGrid) -> Result<Array2<f64>, InterpolationError> {
        let mut out = LinearInterp.interp2d(samples, grid)?;
        let lat = grid.lat();
        let lon = grid.lon();

        let mut n_filled = 0usize;
        Zip::indexed(&mut out).for_each(|(ilat, ilon), v| {
            if v.is_nan() {
                *v = NearestInterp::nearest_value(samples, lon[ilon], lat[ilat]);
                n_filled += 1;
            }
        });
        log::debug!("Filled {n_filled} of {} grid cells by nearest neighbor", out.len());
        Ok(out)
    }
}

/// Interpolate one file's samples onto `grid` the way the monthly product does.
pub fn interpolate(samples: &[SurfaceSample], grid: &TargetGrid) -> Result<Array2<f64>, InterpolationError> {
    LinearWithNearestFill.interp2d(samples, grid)
}

/// Half-open range of indices into the increasing `axis` that could fall
/// between the smallest and largest of `coords`.
fn axis_index_span(axis: Option<&[f64]>, coords: [f64; 3]) -> (usize, usize) {
    let axis = match axis {
        Some(a) => a,
        None => return (0, 0),
    };
    let lo = coords.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = coords.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let start = axis.partition_point(|&x| x < lo);
    let end = axis.partition_point(|&x| x <= hi);
    // Widen by one on each side; the barycentric test does the exact check.
    (start.saturating_sub(1), (end + 1).min(axis.len()))
}

fn barycentric(corners: [[f64; 2]; 3], p: [f64; 2]) -> Option<[f64; 3]> {
    let [a, b, c] = corners;
    let det = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
    if det == 0.0 {
        return None;
    }
    let w0 = ((b[1] - c[1]) * (p[0] - c[0]) + (c[0] - b[0]) * (p[1] - c[1])) / det;
    let w1 = ((c[1] - a[1]) * (p[0] - c[0]) + (a[0] - c[0]) * (p[1] - c[1])) / det;
    let w2 = 1.0 - w0 - w1;
    if w0 >= -EDGE_TOLERANCE && w1 >= -EDGE_TOLERANCE && w2 >= -EDGE_TOLERANCE {
        Some([w0, w1, w2])
    } else {
        None
    }
}
