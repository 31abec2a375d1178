//! Run configuration.
//!
//! Every parameter of a gridding run lives in [`RunConfig`], which is handed
//! explicitly to the pipeline. It is assembled in three layers, later ones
//! winning:
//!
//! 1. the built-in defaults (February 2025, the Maritime Continent box at 0.25°),
//! 2. an optional TOML file, and
//! 3. command line overrides.
//!
//! A TOML file only needs the keys it changes, for example:
//!
//! ```toml
//! year = 2024
//! month = 7
//! data_dir = "/data/tropess/ch4"
//! grid_res = 0.5
//!
//! [bbox]
//! lat_min = -10.0
//! lat_max = 10.0
//! lon_min = 95.0
//! lon_max = 140.0
//! ```
use std::path::{Path, PathBuf};

use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::aggregate::{month_start_hours, FieldMetadata};
use crate::error::{DateTimeError, GridError};
use crate::extraction::SURFACE_PRESSURE_HPA;
use crate::grid::{BoundingBox, TargetGrid};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file {} does not exist", .0.display())]
    MissingFile(PathBuf),
    #[error("Error loading configuration: {0}")]
    Load(#[from] figment::Error),
    #[error("Month must be between 1 and 12, got {0}")]
    BadMonth(u32),
    #[error("Cannot encode the month start as a time: {0}")]
    BadDate(#[from] DateTimeError),
    #[error("Target pressure must be a positive number of hPa, got {0}")]
    BadPressure(f64),
    #[error("Invalid grid: {0}")]
    Grid(#[from] GridError),
}

/// Names of the variables to read from each retrieval file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableNames {
    pub latitude: String,
    pub longitude: String,
    pub pressure: String,
    pub concentration: String,
}

impl Default for VariableNames {
    fn default() -> Self {
        Self {
            latitude: "latitude".to_string(),
            longitude: "longitude".to_string(),
            pressure: "pressure".to_string(),
            concentration: "x".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub year: i32,
    pub month: u32,
    /// Directory searched (recursively) for the retrieval files
    pub data_dir: PathBuf,
    /// File name prefix identifying the instrument and product
    pub product: String,
    /// Where to write the outputs. Defaults to the parent of `data_dir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Output file name without extension. Defaults to `ch4_surface_YYYYMM`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_stem: Option<String>,
    /// Grid spacing in degrees
    pub grid_res: f64,
    /// Pressure (hPa) of the level taken as the surface value
    pub target_pressure: f64,
    pub bbox: BoundingBox,
    pub variables: VariableNames,
    pub field: FieldMetadata,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            year: 2025,
            month: 2,
            data_dir: PathBuf::from("1-data"),
            product: "TROPESS_AIRS-Aqua_L2_Summary_CH4".to_string(),
            output_dir: None,
            output_stem: None,
            grid_res: 0.25,
            target_pressure: SURFACE_PRESSURE_HPA,
            bbox: BoundingBox::default(),
            variables: VariableNames::default(),
            field: FieldMetadata::default(),
        }
    }
}

/// Values given on the command line that take precedence over the file.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl RunConfig {
    /// Build the configuration from the defaults, an optional TOML file, and overrides.
    pub fn load(toml_file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(RunConfig::default()));
        if let Some(p) = toml_file {
            // figment quietly skips missing files, but a file the user named must exist
            if !p.exists() {
                return Err(ConfigError::MissingFile(p.to_path_buf()));
            }
            figment = figment.merge(Toml::file(p));
        }
        let config: RunConfig = figment.merge(Serialized::defaults(overrides)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = Figment::from(Serialized::defaults(RunConfig::default()))
            .merge(Toml::string(s))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The default configuration as a TOML document, to use as a starting point.
    pub fn template_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&RunConfig::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=12).contains(&self.month) {
            return Err(ConfigError::BadMonth(self.month));
        }
        month_start_hours(self.year, self.month)?;
        if !self.target_pressure.is_finite() || self.target_pressure <= 0.0 {
            return Err(ConfigError::BadPressure(self.target_pressure));
        }
        self.target_grid()?;
        Ok(())
    }

    pub fn target_grid(&self) -> Result<TargetGrid, GridError> {
        TargetGrid::new(&self.bbox, self.grid_res)
    }

    pub fn output_dir(&self) -> PathBuf {
        if let Some(d) = &self.output_dir {
            return d.clone();
        }
        match self.data_dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn output_stem(&self) -> String {
        self.output_stem
            .clone()
            .unwrap_or_else(|| format!("ch4_surface_{:04}{:02}", self.year, self.month))
    }

    pub fn netcdf_path(&self) -> PathBuf {
        self.output_dir().join(format!("{}.nc", self.output_stem()))
    }

    pub fn plot_path(&self) -> PathBuf {
        self.output_dir().join(format!("{}.png", self.output_stem()))
    }
}
