//! Common errors across the ch4-grid crate

/// Errors related to working with datetimes
#[derive(Debug, thiserror::Error)]
pub enum DateTimeError {
    #[error("Year {0}, month {1} is not a valid year/month")]
    InvalidYearMonth(i32, u32),
    #[error("Could not parse '{0}' as a CF time epoch")]
    InvalidEpoch(String),
    #[error("Offset between {start} and {epoch} is not a whole number of hours")]
    FractionalHours { start: chrono::NaiveDateTime, epoch: chrono::NaiveDateTime },
}

/// Errors describing an invalid target grid or bounding box
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("Grid resolution must be a positive, finite number of degrees (got {0})")]
    BadResolution(f64),
    #[error("The {axis} range is empty or inverted ({min} to {max})")]
    EmptyRange { axis: &'static str, min: f64, max: f64 },
    #[error("The {axis} range is not finite ({min} to {max})")]
    NonFiniteRange { axis: &'static str, min: f64, max: f64 },
}
