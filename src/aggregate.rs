//! Combine the per-file interpolated fields into the monthly mean.
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::{Array1, Array2, Zip};

use crate::error::DateTimeError;
use crate::grid::TargetGrid;

/// Reference time for the output time coordinate
pub const TIME_EPOCH: &str = "2000-01-01 00:00:00";
pub const TIME_UNITS: &str = "hours since 2000-01-01 00:00:00";
pub const TIME_CALENDAR: &str = "standard";

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("No file produced usable data, nothing to average")]
    NoFields,
    #[error("Field {index} has shape {actual:?}, but the grid is {expected:?}")]
    ShapeMismatch { index: usize, expected: (usize, usize), actual: (usize, usize) },
    #[error(transparent)]
    Time(#[from] DateTimeError),
}

/// Descriptive metadata for the averaged quantity.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FieldMetadata {
    /// Variable name in the output file
    pub name: String,
    pub long_name: String,
    pub units: String,
}

impl Default for FieldMetadata {
    fn default() -> Self {
        Self {
            name: "ch4".to_string(),
            long_name: "CH₄ VMR at Surface (~1000 hPa)".to_string(),
            units: "ppb".to_string(),
        }
    }
}

/// The monthly mean, ready to be written out.
#[derive(Debug, Clone)]
pub struct AveragedField {
    /// Mean value on the grid, shape (n_lat, n_lon); NaN where no file had data.
    pub values: Array2<f32>,
    pub lat: Array1<f64>,
    pub lon: Array1<f64>,
    /// Time coordinate in [`TIME_UNITS`]
    pub time_hours: i64,
    pub year: i32,
    pub month: u32,
    /// Number of files that went into the mean
    pub n_files: usize,
    pub metadata: FieldMetadata,
}

impl AveragedField {
    /// `YYYY-MM` label for titles and log messages
    pub fn month_label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Per-cell mean over `fields`, skipping NaN.
///
/// A cell that is NaN in every field stays NaN.
pub fn nan_mean(fields: &[Array2<f64>]) -> Option<Array2<f64>> {
    let first = fields.first()?;
    let mut sum = Array2::<f64>::zeros(first.dim());
    let mut count = Array2::<u32>::zeros(first.dim());

    for field in fields {
        Zip::from(&mut sum).and(&mut count).and(field).for_each(|s, c, &v| {
            if !v.is_nan() {
                *s += v;
                *c += 1;
            }
        });
    }

    Some(Zip::from(&sum).and(&count).map_collect(|&s, &c| if c == 0 { f64::NAN } else { s / c as f64 }))
}

/// Whole hours from [`TIME_EPOCH`] to midnight on the first day of `year`-`month`.
pub fn month_start_hours(year: i32, month: u32) -> Result<i64, DateTimeError> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or(DateTimeError::InvalidYearMonth(year, month))?
        .and_hms_opt(0, 0, 0)
        .ok_or(DateTimeError::InvalidYearMonth(year, month))?;
    let epoch = NaiveDateTime::parse_from_str(TIME_EPOCH, "%Y-%m-%d %H:%M:%S")
        .map_err(|_| DateTimeError::InvalidEpoch(TIME_EPOCH.to_string()))?;

    let delta = start - epoch;
    if delta.num_seconds() % 3600 != 0 {
        return Err(DateTimeError::FractionalHours { start, epoch });
    }
    Ok(delta.num_hours())
}

/// Average the per-file fields for one month onto `grid`.
pub fn aggregate(
    fields: &[Array2<f64>],
    grid: &TargetGrid,
    year: i32,
    month: u32,
    metadata: FieldMetadata,
) -> Result<AveragedField, AggregateError> {
    if fields.is_empty() {
        return Err(AggregateError::NoFields);
    }
    for (index, field) in fields.iter().enumerate() {
        if field.dim() != grid.shape() {
            return Err(AggregateError::ShapeMismatch { index, expected: grid.shape(), actual: field.dim() });
        }
    }

    let time_hours = month_start_hours(year, month)?;
    let mean = nan_mean(fields).ok_or(AggregateError::NoFields)?;
    let n_missing = mean.iter().filter(|v| v.is_nan()).count();
    if n_missing > 0 {
        log::warn!("{n_missing} of {} grid cells have no data in any file", mean.len());
    }

    Ok(AveragedField {
        values: mean.mapv(|v| v as f32),
        lat: grid.lat().clone(),
        lon: grid.lon().clone(),
        time_hours,
        year,
        month,
        n_files: fields.len(),
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::BoundingBox;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rstest::rstest;

    #[test]
    fn test_nan_mean_skips_missing() {
        let nan = f64::NAN;
        let fields = [
            array![[1.0, nan, nan], [4.0, 5.0, 6.0]],
            array![[3.0, 2.0, nan], [nan, 7.0, 6.0]],
            array![[5.0, nan, nan], [nan, 9.0, 6.0]],
        ];
        let mean = nan_mean(&fields).unwrap();
        assert_abs_diff_eq!(mean[[0, 0]], 3.0);
        assert_abs_diff_eq!(mean[[0, 1]], 2.0);
        assert!(mean[[0, 2]].is_nan());
        assert_abs_diff_eq!(mean[[1, 0]], 4.0);
        assert_abs_diff_eq!(mean[[1, 1]], 7.0);
        assert_abs_diff_eq!(mean[[1, 2]], 6.0);
    }

    #[test]
    fn test_nan_mean_empty() {
        assert!(nan_mean(&[]).is_none());
    }

    #[rstest]
    #[case(2000, 1, 0)]
    #[case(2000, 2, 744)]
    #[case(2001, 1, 8784)]
    #[case(2025, 2, 219_912)]
    #[case(1999, 12, -744)]
    fn test_month_start_hours(#[case] year: i32, #[case] month: u32, #[case] expected: i64) {
        assert_eq!(month_start_hours(year, month).unwrap(), expected);
    }

    #[test]
    fn test_bad_month() {
        assert!(matches!(month_start_hours(2025, 13), Err(DateTimeError::InvalidYearMonth(2025, 13))));
    }

    #[test]
    fn test_aggregate() {
        let bbox = BoundingBox::new(0.0, 1.0, 0.0, 2.0).unwrap();
        let grid = TargetGrid::new(&bbox, 1.0).unwrap();
        let fields = vec![
            array![[1.0, 2.0, f64::NAN], [1.0, 1.0, 1.0]],
            array![[3.0, f64::NAN, f64::NAN], [1.0, 1.0, 1.0]],
        ];
        let avg = aggregate(&fields, &grid, 2025, 2, FieldMetadata::default()).unwrap();
        assert_eq!(avg.values.dim(), (2, 3));
        assert_eq!(avg.values[[0, 0]], 2.0f32);
        assert_eq!(avg.values[[0, 1]], 2.0f32);
        assert!(avg.values[[0, 2]].is_nan());
        assert_eq!(avg.time_hours, 219_912);
        assert_eq!(avg.n_files, 2);
        assert_eq!(avg.month_label(), "2025-02");
        assert_eq!(avg.metadata.units, "ppb");
    }

    #[test]
    fn test_aggregate_no_fields() {
        let grid = TargetGrid::new(&BoundingBox::default(), 1.0).unwrap();
        let err = aggregate(&[], &grid, 2025, 2, FieldMetadata::default()).unwrap_err();
        assert!(matches!(err, AggregateError::NoFields));
    }

    #[test]
    fn test_aggregate_shape_mismatch() {
        let grid = TargetGrid::new(&BoundingBox::new(0.0, 1.0, 0.0, 1.0).unwrap(), 1.0).unwrap();
        let fields = vec![Array2::<f64>::zeros((2, 2)), Array2::<f64>::zeros((3, 2))];
        let err = aggregate(&fields, &grid, 2025, 2, FieldMetadata::default()).unwrap_err();
        assert!(matches!(err, AggregateError::ShapeMismatch { index: 1, .. }));
    }
}
