//! Command line interface definitions
use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use ch4_grid::config::ConfigOverrides;

/// Grid one month of satellite CH₄ retrievals to a regular lat/lon grid at the
/// surface and write the monthly mean as netCDF (plus a PNG quick-look, if built
/// with plotting support).
#[derive(Debug, Parser)]
pub(crate) struct Cli {
    /// TOML file with run settings. Anything not given there uses the built-in defaults.
    #[clap(short, long)]
    pub(crate) config: Option<PathBuf>,

    /// Year to process, overrides the configuration file.
    #[clap(short, long)]
    pub(crate) year: Option<i32>,

    /// Month (1-12) to process, overrides the configuration file.
    #[clap(short, long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub(crate) month: Option<u32>,

    /// Directory to search (including subdirectories) for the retrieval files.
    #[clap(short, long)]
    pub(crate) data_dir: Option<PathBuf>,

    /// Directory to write the outputs to. The default is the parent of the data directory.
    #[clap(short, long)]
    pub(crate) output_dir: Option<PathBuf>,

    /// Also write log messages to this file.
    #[clap(long)]
    pub(crate) log_file: Option<PathBuf>,

    /// Load and validate the configuration, print it, and exit without processing anything.
    #[clap(long)]
    pub(crate) check_config_only: bool,

    /// Write a configuration file with all the default values to this path and exit.
    #[clap(long, conflicts_with = "check_config_only")]
    pub(crate) write_config_template: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) verbosity: Verbosity<InfoLevel>,
}

impl Cli {
    pub(crate) fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            year: self.year,
            month: self.month,
            data_dir: self.data_dir.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}
