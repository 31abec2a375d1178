//! Reduce the retrieved profiles in one file to surface-level samples.
//!
//! A retrieval file holds N soundings, each with a concentration profile on L
//! vertical levels. The pressure of those levels is stored one of two ways,
//! depending on the product: either a single profile that every sounding in the
//! file shares, or one profile per sounding. [`ProfileLayout`] decides which of
//! these a file uses once, up front, and then both layouts answer the same
//! question: "which level is closest to the target pressure for sounding `i`?"
//!
//! The concentration array must be `(N, L)`, with its first axis in the same
//! order as the latitude/longitude arrays. This is checked before any value is
//! read; a file that fails the check is rejected as a whole rather than risk
//! pairing a sounding with another sounding's value. When the reader recorded
//! dimension names, the concentration's dimensions must be (latitude's
//! dimension, the pressure's level dimension). Without names a square `(N, N)`
//! array cannot be oriented, so it is rejected.
use ndarray::{Array1, ArrayD, ArrayView1, ArrayView2, Ix1, Ix2};
use num_traits::Float;

use crate::grid::BoundingBox;

/// Reference near-surface pressure, in hPa
pub const SURFACE_PRESSURE_HPA: f64 = 1000.0;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Latitude and longitude arrays have different lengths ({n_lat} vs. {n_lon})")]
    GeolocationMismatch { n_lat: usize, n_lon: usize },
    #[error("Pressure array has {ndim} dimensions, only a shared 1D or per-observation 2D profile is supported")]
    UnsupportedPressureLayout { ndim: usize },
    #[error("Per-observation pressure has shape {shape:?}, but there are {n_obs} observations (expected the first dimension to match)")]
    PressureObservationMismatch { shape: Vec<usize>, n_obs: usize },
    #[error("Pressure profile has no levels")]
    NoLevels,
    #[error("Cannot align concentration array of shape {shape:?} with {n_obs} observations on {n_levels} levels (expected ({n_obs}, {n_levels}))")]
    ConcentrationMisaligned { shape: Vec<usize>, n_obs: usize, n_levels: usize },
    #[error("Concentration has dimensions {found:?}, expected {expected:?} (observation, level)")]
    ConcentrationDimensionOrder { found: Vec<String>, expected: Vec<String> },
    #[error("Concentration array is {n}x{n} with no dimension names, so its observation and level axes cannot be told apart")]
    AmbiguousConcentration { n: usize },
}

/// Dimension names of the variables in a [`RetrievalFile`], for sources that record them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionNames {
    pub latitude: Vec<String>,
    pub pressure: Vec<String>,
    pub concentration: Vec<String>,
}

impl DimensionNames {
    /// The concentration dimensions that would put observations first and levels second.
    fn expected_concentration(&self) -> Option<Vec<String>> {
        let obs = self.latitude.first()?;
        let level = self.pressure.last()?;
        Some(vec![obs.clone(), level.clone()])
    }
}

/// The arrays from one retrieval file that the extractor needs.
///
/// Fill values are expected to have already been replaced with NaN by whatever
/// read the file.
#[derive(Debug, Clone)]
pub struct RetrievalFile {
    pub latitude: Array1<f64>,
    pub longitude: Array1<f64>,
    pub pressure: ArrayD<f64>,
    pub concentration: ArrayD<f64>,
    pub dimensions: Option<DimensionNames>,
}

impl RetrievalFile {
    pub fn new(
        latitude: Array1<f64>,
        longitude: Array1<f64>,
        pressure: ArrayD<f64>,
        concentration: ArrayD<f64>,
    ) -> Self {
        Self { latitude, longitude, pressure, concentration, dimensions: None }
    }

    pub fn with_dimensions(mut self, dimensions: DimensionNames) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Number of soundings, after checking that latitude and longitude agree on it.
    pub fn num_observations(&self) -> Result<usize, ExtractError> {
        let n_lat = self.latitude.len();
        let n_lon = self.longitude.len();
        if n_lat != n_lon {
            return Err(ExtractError::GeolocationMismatch { n_lat, n_lon });
        }
        Ok(n_lat)
    }
}

/// One sounding reduced to its value at the level nearest the target pressure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub longitude: f64,
    pub latitude: f64,
    pub value: f64,
}

/// How the vertical pressure levels are laid out in a file.
#[derive(Debug, Clone, Copy, strum::Display)]
pub enum ProfileLayout<'a> {
    /// One pressure profile, shape `(L)`, shared by all soundings.
    #[strum(to_string = "shared profile")]
    SharedProfile(ArrayView1<'a, f64>),
    /// One pressure profile per sounding, shape `(N, L)`.
    #[strum(to_string = "per-observation profile")]
    PerObservationProfile(ArrayView2<'a, f64>),
}

impl<'a> ProfileLayout<'a> {
    /// Work out which layout `pressure` uses for a file with `n_obs` soundings.
    pub fn probe(pressure: &'a ArrayD<f64>, n_obs: usize) -> Result<Self, ExtractError> {
        let layout = match pressure.ndim() {
            1 => {
                let view = pressure
                    .view()
                    .into_dimensionality::<Ix1>()
                    .map_err(|_| ExtractError::UnsupportedPressureLayout { ndim: 1 })?;
                Self::SharedProfile(view)
            }
            2 => {
                if pressure.shape()[0] != n_obs {
                    return Err(ExtractError::PressureObservationMismatch {
                        shape: pressure.shape().to_vec(),
                        n_obs,
                    });
                }
                let view = pressure
                    .view()
                    .into_dimensionality::<Ix2>()
                    .map_err(|_| ExtractError::UnsupportedPressureLayout { ndim: 2 })?;
                Self::PerObservationProfile(view)
            }
            ndim => return Err(ExtractError::UnsupportedPressureLayout { ndim }),
        };

        if layout.num_levels() == 0 {
            return Err(ExtractError::NoLevels);
        }
        Ok(layout)
    }

    pub fn num_levels(&self) -> usize {
        match self {
            Self::SharedProfile(levels) => levels.len(),
            Self::PerObservationProfile(levels) => levels.ncols(),
        }
    }

    /// Return a closure giving the surface level index of each sounding.
    ///
    /// For a shared profile the search happens once here; for per-observation
    /// profiles it happens on every call.
    pub fn surface_indexer(&self, target_pressure: f64) -> impl Fn(usize) -> Option<usize> + 'a {
        let shared = match self {
            Self::SharedProfile(levels) => Some(nearest_level_index(levels.iter().copied(), target_pressure)),
            Self::PerObservationProfile(_) => None,
        };
        let per_obs = match self {
            Self::PerObservationProfile(levels) => Some(*levels),
            Self::SharedProfile(_) => None,
        };

        move |iobs| match (shared, per_obs) {
            (Some(idx), _) => idx,
            (None, Some(levels)) => nearest_level_index(levels.row(iobs).iter().copied(), target_pressure),
            (None, None) => None,
        }
    }
}

/// Index of the value in `levels` closest to `target`.
///
/// NaN levels are never selected; if every level is NaN (or there are none), returns `None`.
/// Ties go to the first level, matching the usual argmin convention.
pub fn nearest_level_index<F: Float, I: IntoIterator<Item = F>>(levels: I, target: F) -> Option<usize> {
    levels
        .into_iter()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .fold(None, |acc: Option<(usize, F)>, (i, p)| {
            let diff = (p - target).abs();
            match acc {
                Some((_, best)) if best <= diff => acc,
                _ => Some((i, diff)),
            }
        })
        .map(|(i, _)| i)
}

/// Extract the surface-level samples inside `bbox` from one file.
///
/// Returns an empty vector if no sounding falls inside the box; that is not an error.
/// Samples are returned in the same order as the soundings in the file. A sounding
/// whose pressure profile is entirely missing yields a NaN value rather than being
/// dropped.
pub fn extract_surface_samples(
    file: &RetrievalFile,
    bbox: &BoundingBox,
    target_pressure: f64,
) -> Result<Vec<SurfaceSample>, ExtractError> {
    let n_obs = file.num_observations()?;
    let layout = ProfileLayout::probe(&file.pressure, n_obs)?;
    let n_levels = layout.num_levels();
    log::debug!("Pressure uses a {layout} with {n_levels} levels");

    let conc = check_concentration_alignment(&file.concentration, file.dimensions.as_ref(), n_obs, n_levels)?;
    let surface_index = layout.surface_indexer(target_pressure);

    let samples = file
        .latitude
        .iter()
        .zip(file.longitude.iter())
        .enumerate()
        .filter(|(_, (&lat, &lon))| bbox.contains(lat, lon))
        .map(|(iobs, (&latitude, &longitude))| {
            let value = surface_index(iobs)
                .map(|ilev| conc[[iobs, ilev]])
                .unwrap_or(f64::NAN);
            SurfaceSample { longitude, latitude, value }
        })
        .collect();
    Ok(samples)
}

fn check_concentration_alignment<'a>(
    conc: &'a ArrayD<f64>,
    dims: Option<&DimensionNames>,
    n_obs: usize,
    n_levels: usize,
) -> Result<ArrayView2<'a, f64>, ExtractError> {
    let misaligned = || ExtractError::ConcentrationMisaligned {
        shape: conc.shape().to_vec(),
        n_obs,
        n_levels,
    };

    if conc.shape() != [n_obs, n_levels] {
        return Err(misaligned());
    }

    match dims.and_then(|d| d.expected_concentration().map(|e| (d, e))) {
        Some((d, expected)) if d.concentration != expected => {
            return Err(ExtractError::ConcentrationDimensionOrder { found: d.concentration.clone(), expected });
        }
        Some(_) => (),
        None if n_obs == n_levels => return Err(ExtractError::AmbiguousConcentration { n: n_obs }),
        None => (),
    }

    conc.view().into_dimensionality::<Ix2>().map_err(|_| misaligned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};
    use rstest::{fixture, rstest};

    #[fixture]
    fn shared_file() -> RetrievalFile {
        // Levels ordered top of atmosphere to surface; 1000 hPa is index 3
        let pressure = array![100.0, 500.0, 900.0, 1000.0, 1100.0].into_dyn();
        let conc = Array2::from_shape_fn((4, 5), |(i, j)| 1800.0 + 10.0 * i as f64 + j as f64).into_dyn();
        RetrievalFile::new(
            array![0.0, 10.0, 50.0, 20.0],
            array![100.0, 120.0, 120.0, 140.0],
            pressure,
            conc,
        )
    }

    #[rstest]
    fn test_shared_profile_extraction(shared_file: RetrievalFile) {
        let samples = extract_surface_samples(&shared_file, &BoundingBox::default(), SURFACE_PRESSURE_HPA).unwrap();
        // latitude 50 is outside the box
        assert_eq!(samples.len(), 3);
        assert_abs_diff_eq!(samples[0].value, 1803.0);
        assert_abs_diff_eq!(samples[1].value, 1813.0);
        assert_abs_diff_eq!(samples[2].value, 1833.0);
        assert_abs_diff_eq!(samples[2].latitude, 20.0);
        assert_abs_diff_eq!(samples[2].longitude, 140.0);
    }

    #[test]
    fn test_per_observation_profile() {
        let pressure = array![[1000.0, 800.0, 600.0], [1200.0, 990.0, 700.0]].into_dyn();
        let conc = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn();
        let file = RetrievalFile::new(array![0.0, 1.0], array![100.0, 101.0], pressure, conc);
        let samples = extract_surface_samples(&file, &BoundingBox::default(), 1000.0).unwrap();
        assert_eq!(samples.len(), 2);
        assert_abs_diff_eq!(samples[0].value, 1.0);
        assert_abs_diff_eq!(samples[1].value, 5.0);
    }

    #[rstest]
    fn test_nothing_in_box(mut shared_file: RetrievalFile) {
        shared_file.latitude.fill(-60.0);
        let samples = extract_surface_samples(&shared_file, &BoundingBox::default(), 1000.0).unwrap();
        assert!(samples.is_empty());
    }

    #[rstest]
    fn test_out_of_box_never_returned(shared_file: RetrievalFile) {
        let bbox = BoundingBox::new(5.0, 25.0, 110.0, 145.0).unwrap();
        let samples = extract_surface_samples(&shared_file, &bbox, 1000.0).unwrap();
        assert!(!samples.is_empty());
        for s in samples {
            assert!(bbox.contains(s.latitude, s.longitude), "{s:?} is outside {bbox:?}");
        }
    }

    #[rstest]
    fn test_transposed_concentration_rejected(mut shared_file: RetrievalFile) {
        shared_file.concentration = shared_file.concentration.t().to_owned();
        let err = extract_surface_samples(&shared_file, &BoundingBox::default(), 1000.0).unwrap_err();
        assert!(matches!(err, ExtractError::ConcentrationMisaligned { n_obs: 4, n_levels: 5, .. }));
    }

    #[rstest]
    fn test_3d_pressure_rejected(mut shared_file: RetrievalFile) {
        shared_file.pressure = ndarray::Array3::<f64>::zeros((4, 5, 2)).into_dyn();
        let err = extract_surface_samples(&shared_file, &BoundingBox::default(), 1000.0).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedPressureLayout { ndim: 3 }));
    }

    #[rstest]
    fn test_geolocation_mismatch(mut shared_file: RetrievalFile) {
        shared_file.longitude = array![100.0, 120.0];
        let err = extract_surface_samples(&shared_file, &BoundingBox::default(), 1000.0).unwrap_err();
        assert!(matches!(err, ExtractError::GeolocationMismatch { n_lat: 4, n_lon: 2 }));
    }

    #[test]
    fn test_per_observation_pressure_wrong_length() {
        let pressure = Array2::<f64>::zeros((3, 2)).into_dyn();
        let conc = Array2::<f64>::zeros((2, 2)).into_dyn();
        let file = RetrievalFile::new(array![0.0, 1.0], array![100.0, 101.0], pressure, conc);
        let err = extract_surface_samples(&file, &BoundingBox::default(), 1000.0).unwrap_err();
        assert!(matches!(err, ExtractError::PressureObservationMismatch { n_obs: 2, .. }));
    }

    #[test]
    fn test_missing_profile_gives_nan() {
        let pressure = array![[f64::NAN, f64::NAN], [900.0, 1000.0]].into_dyn();
        let conc = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let file = RetrievalFile::new(array![0.0, 1.0], array![100.0, 101.0], pressure, conc)
            .with_dimensions(dims(&["target"], &["target", "level"], &["target", "level"]));
        let samples = extract_surface_samples(&file, &BoundingBox::default(), 1000.0).unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].value.is_nan());
        assert_abs_diff_eq!(samples[1].value, 4.0);
    }

    fn dims(latitude: &[&str], pressure: &[&str], concentration: &[&str]) -> DimensionNames {
        let owned = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
        DimensionNames {
            latitude: owned(latitude),
            pressure: owned(pressure),
            concentration: owned(concentration),
        }
    }

    /// Three soundings on three levels; the surface (1000 hPa) values are 1800, 1900, 2000.
    fn square_file(transposed: bool) -> RetrievalFile {
        let conc = array![[1800.0, 1.0, 2.0], [1900.0, 3.0, 4.0], [2000.0, 5.0, 6.0]];
        let conc = if transposed { conc.t().to_owned() } else { conc };
        RetrievalFile::new(
            array![0.0, 1.0, 2.0],
            array![100.0, 101.0, 102.0],
            array![1000.0, 700.0, 300.0].into_dyn(),
            conc.into_dyn(),
        )
    }

    #[test]
    fn test_square_concentration_with_names() {
        let file = square_file(false).with_dimensions(dims(&["target"], &["level"], &["target", "level"]));
        let samples = extract_surface_samples(&file, &BoundingBox::default(), 1000.0).unwrap();
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1800.0, 1900.0, 2000.0]);
    }

    #[test]
    fn test_square_transposed_concentration_rejected() {
        let file = square_file(true).with_dimensions(dims(&["target"], &["level"], &["level", "target"]));
        let err = extract_surface_samples(&file, &BoundingBox::default(), 1000.0).unwrap_err();
        assert!(
            matches!(&err, ExtractError::ConcentrationDimensionOrder { found, .. } if found == &["level", "target"]),
            "unexpected error: {err:?}"
        );
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_square_concentration_without_names_rejected(#[case] transposed: bool) {
        let err = extract_surface_samples(&square_file(transposed), &BoundingBox::default(), 1000.0).unwrap_err();
        assert!(matches!(err, ExtractError::AmbiguousConcentration { n: 3 }));
    }

    #[rstest]
    fn test_non_square_without_names_accepted(shared_file: RetrievalFile) {
        assert!(shared_file.dimensions.is_none());
        assert!(extract_surface_samples(&shared_file, &BoundingBox::default(), 1000.0).is_ok());
    }

    #[rstest]
    #[case(&[1100.0, 1000.0, 900.0], Some(1))]
    #[case(&[950.0, 1050.0], Some(0))]
    #[case(&[f64::NAN, 700.0, 990.0], Some(2))]
    #[case(&[f64::NAN, f64::NAN], None)]
    #[case(&[], None)]
    fn test_nearest_level_index(#[case] levels: &[f64], #[case] expected: Option<usize>) {
        assert_eq!(nearest_level_index(levels.iter().copied(), 1000.0), expected);
    }
}
