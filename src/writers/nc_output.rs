//! Write the monthly mean as a `(time, lat, lon)` netCDF file that GrADS and
//! CF-aware tools can open directly.
use std::path::Path;

use error_stack::ResultExt;
use ndarray::Axis;
use netcdf::Extents;

use super::WriteError;
use crate::aggregate::{AveragedField, TIME_CALENDAR, TIME_UNITS};

pub const TIME_DIM_NAME: &str = "time";
pub const LAT_DIM_NAME: &str = "lat";
pub const LON_DIM_NAME: &str = "lon";

/// Create `path` (overwriting any existing file) and write `field` to it.
pub fn write_averaged_field(path: &Path, field: &AveragedField) -> error_stack::Result<(), WriteError> {
    let mut ds = netcdf::create(path).change_context_lazy(|| WriteError::Create(path.to_path_buf()))?;
    let (nlat, nlon) = field.values.dim();

    ds.add_dimension(TIME_DIM_NAME, 1)
        .change_context_lazy(|| WriteError::Write("the time dimension".to_string()))?;
    ds.add_dimension(LAT_DIM_NAME, nlat)
        .change_context_lazy(|| WriteError::Write("the lat dimension".to_string()))?;
    ds.add_dimension(LON_DIM_NAME, nlon)
        .change_context_lazy(|| WriteError::Write("the lon dimension".to_string()))?;

    write_time_var(&mut ds, field).change_context_lazy(|| WriteError::Write("the time variable".to_string()))?;
    write_coord_var(&mut ds, LAT_DIM_NAME, field.lat.as_slice(), "degrees_north", "latitude")
        .change_context_lazy(|| WriteError::Write("the lat variable".to_string()))?;
    write_coord_var(&mut ds, LON_DIM_NAME, field.lon.as_slice(), "degrees_east", "longitude")
        .change_context_lazy(|| WriteError::Write("the lon variable".to_string()))?;
    write_data_var(&mut ds, field)
        .change_context_lazy(|| WriteError::Write(format!("the {} variable", field.metadata.name)))?;
    write_global_attributes(&mut ds, field)
        .change_context_lazy(|| WriteError::Write("the global attributes".to_string()))?;

    Ok(())
}

fn write_time_var(ds: &mut netcdf::FileMut, field: &AveragedField) -> error_stack::Result<(), netcdf::Error> {
    let mut var = ds.add_variable::<i64>(TIME_DIM_NAME, &[TIME_DIM_NAME])?;
    var.put_values(&[field.time_hours], Extents::All)?;
    var.put_attribute("standard_name", "time")?;
    var.put_attribute("units", TIME_UNITS)?;
    var.put_attribute("calendar", TIME_CALENDAR)?;
    var.put_attribute("axis", "T")?;
    Ok(())
}

fn write_coord_var(
    ds: &mut netcdf::FileMut,
    name: &str,
    values: Option<&[f64]>,
    units: &str,
    standard_name: &str,
) -> error_stack::Result<(), netcdf::Error> {
    let values = values
        .ok_or_else(|| netcdf::Error::Str(format!("{name} coordinate is not contiguous")))?
        .iter()
        .map(|&v| v as f32)
        .collect::<Vec<_>>();

    let mut var = ds.add_variable::<f32>(name, &[name])?;
    var.put_values(&values, Extents::All)?;
    var.put_attribute("units", units)?;
    var.put_attribute("standard_name", standard_name)?;
    Ok(())
}

fn write_data_var(ds: &mut netcdf::FileMut, field: &AveragedField) -> error_stack::Result<(), netcdf::Error> {
    let mut var = ds.add_variable::<f32>(&field.metadata.name, &[TIME_DIM_NAME, LAT_DIM_NAME, LON_DIM_NAME])?;
    // Must be set before any data is written
    var.set_fill_value(f32::NAN)?;
    let values = field.values.view().insert_axis(Axis(0));
    var.put(values, Extents::All)?;
    var.put_attribute("long_name", field.metadata.long_name.as_str())?;
    var.put_attribute("units", field.metadata.units.as_str())?;
    Ok(())
}

fn write_global_attributes(ds: &mut netcdf::FileMut, field: &AveragedField) -> error_stack::Result<(), netcdf::Error> {
    ds.add_attribute("title", format!("Mean {} {}", field.metadata.long_name, field.month_label()))?;
    ds.add_attribute("number_of_source_files", field.n_files as i32)?;
    ds.add_attribute(
        "history",
        format!(
            "{}: created by {} {}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ),
    )?;
    Ok(())
}
