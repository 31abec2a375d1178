//! Read TROPESS-style level 2 summary files from netCDF.
use std::path::Path;

use error_stack::ResultExt;
use ndarray::{ArrayD, Ix1};
use netcdf::{AttributeValue, Extents};

use super::{mask_fill, ReadError, RetrievalReader};
use crate::config::VariableNames;
use crate::extraction::{DimensionNames, RetrievalFile};

/// Attributes that may mark missing data in a retrieval file
const FILL_ATTRIBUTES: [&str; 2] = ["_FillValue", "missing_value"];

#[derive(Debug, Clone, Default)]
pub struct NcRetrievalReader {
    variables: VariableNames,
}

impl NcRetrievalReader {
    pub fn new(variables: VariableNames) -> Self {
        Self { variables }
    }
}

impl RetrievalReader for NcRetrievalReader {
    fn read(&self, path: &Path) -> error_stack::Result<RetrievalFile, ReadError> {
        // The file handle is dropped at the end of this function, on success or error.
        let ds = netcdf::open(path).change_context_lazy(|| ReadError::Open(path.to_path_buf()))?;
        let vars = &self.variables;

        let latitude = read_1d_var(&ds, &vars.latitude)?;
        let longitude = read_1d_var(&ds, &vars.longitude)?;
        let pressure = read_var(&ds, &vars.pressure)?;
        let concentration = read_var(&ds, &vars.concentration)?;
        let dimensions = DimensionNames {
            latitude: dimension_names(&ds, &vars.latitude)?,
            pressure: dimension_names(&ds, &vars.pressure)?,
            concentration: dimension_names(&ds, &vars.concentration)?,
        };

        log::debug!(
            "Read {} soundings from {} (pressure shape {:?}, concentration shape {:?}, dimensions {:?})",
            latitude.len(),
            path.display(),
            pressure.shape(),
            concentration.shape(),
            dimensions.concentration
        );
        Ok(RetrievalFile::new(latitude, longitude, pressure, concentration).with_dimensions(dimensions))
    }
}

/// Read a variable as `f64`, converting any declared fill values to NaN.
fn read_var(ds: &netcdf::File, varname: &str) -> error_stack::Result<ArrayD<f64>, ReadError> {
    let var = ds
        .variable(varname)
        .ok_or_else(|| ReadError::MissingVariable(varname.to_string()))?;
    let mut values = var
        .get::<f64, _>(Extents::All)
        .change_context_lazy(|| ReadError::ReadVariable(varname.to_string()))?;

    for attr_name in FILL_ATTRIBUTES {
        let fill = var
            .attribute(attr_name)
            .map(|a| a.value())
            .transpose()
            .change_context_lazy(|| ReadError::ReadVariable(varname.to_string()))
            .attach_printable_lazy(|| format!("could not read the '{attr_name}' attribute"))?
            .and_then(|v| attribute_as_f64(&v));

        if let Some(fill) = fill {
            let n = mask_fill(&mut values, fill);
            if n > 0 {
                log::debug!("Masked {n} values of {varname} equal to {attr_name} = {fill}");
            }
        }
    }

    Ok(values)
}

fn dimension_names(ds: &netcdf::File, varname: &str) -> error_stack::Result<Vec<String>, ReadError> {
    let var = ds
        .variable(varname)
        .ok_or_else(|| ReadError::MissingVariable(varname.to_string()))?;
    Ok(var.dimensions().iter().map(|d| d.name()).collect())
}

fn read_1d_var(ds: &netcdf::File, varname: &str) -> error_stack::Result<ndarray::Array1<f64>, ReadError> {
    let values = read_var(ds, varname)?;
    let ndim = values.ndim();
    values
        .into_dimensionality::<Ix1>()
        .change_context_lazy(|| ReadError::NotOneDimensional { name: varname.to_string(), ndim })
}

fn attribute_as_f64(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::Double(v) => Some(*v),
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Float(v) => Some(*v as f64),
        AttributeValue::Floats(v) => v.first().map(|&x| x as f64),
        AttributeValue::Short(v) => Some(*v as f64),
        AttributeValue::Int(v) => Some(*v as f64),
        AttributeValue::Longlong(v) => Some(*v as f64),
        _ => None,
    }
}
