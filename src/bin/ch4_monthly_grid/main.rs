use std::process::ExitCode;

use clap::Parser;
use error_stack::ResultExt;

use ch4_grid::config::RunConfig;
use ch4_grid::logging::init_logging;
use ch4_grid::pipeline::{run_month, PipelineError};
use ch4_grid::readers::retrieval_nc::NcRetrievalReader;
use ch4_grid::writers::nc_output::write_averaged_field;

mod cli;

fn main() -> ExitCode {
    let clargs = cli::Cli::parse();
    init_logging(clargs.verbosity.log_level_filter(), clargs.log_file.as_deref());
    if let Err(e) = main_inner(clargs) {
        if matches!(e.downcast_ref::<PipelineError>(), Some(PipelineError::NoUsableData)) {
            log::error!("No data was successfully interpolated. NetCDF file not created.");
        }
        eprintln!("ERROR: {e:?}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn main_inner(clargs: cli::Cli) -> error_stack::Result<(), CliError> {
    if let Some(template) = clargs.write_config_template.as_deref() {
        let s = RunConfig::template_toml().change_context_lazy(|| CliError::context("Error serializing the configuration template"))?;
        std::fs::write(template, s).change_context_lazy(|| {
            CliError::context(format!("Error writing the configuration template to {}", template.display()))
        })?;
        log::info!("Wrote configuration template to {}", template.display());
        return Ok(());
    }

    let config = RunConfig::load(clargs.config.as_deref(), &clargs.overrides()).change_context(CliError::Config)?;
    if clargs.check_config_only {
        println!("Configuration:\n\n{config:#?}");
        return Ok(());
    }

    grid_driver(&config)
}

/// Grid the configured month and write the outputs.
fn grid_driver(config: &RunConfig) -> error_stack::Result<(), CliError> {
    log::info!(
        "Gridding {} for {:04}-{:02} from {}",
        config.product,
        config.year,
        config.month,
        config.data_dir.display()
    );

    let reader = NcRetrievalReader::new(config.variables.clone());
    let output = run_month(config, &reader).change_context(CliError::Gridding)?;

    let output_dir = config.output_dir();
    std::fs::create_dir_all(&output_dir).change_context_lazy(|| {
        CliError::context(format!("Error creating output directory {}", output_dir.display()))
    })?;

    let nc_path = config.netcdf_path();
    write_averaged_field(&nc_path, &output.field).change_context(CliError::Output)?;
    log::info!("NetCDF file saved to {}", nc_path.display());

    write_quicklook(config, &output.field);
    Ok(())
}

#[cfg(feature = "plotting")]
fn write_quicklook(config: &RunConfig, field: &ch4_grid::aggregate::AveragedField) {
    ch4_grid::writers::plot::write_quicklook(&config.plot_path(), field);
}

#[cfg(not(feature = "plotting"))]
fn write_quicklook(_config: &RunConfig, _field: &ch4_grid::aggregate::AveragedField) {
    log::info!("Built without the plotting feature, no plot will be made");
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Could not load the run configuration")]
    Config,
    #[error("Gridding failed")]
    Gridding,
    #[error("Could not write the netCDF output")]
    Output,
    #[error("{0}")]
    Context(String),
}

impl CliError {
    fn context<S: ToString>(ctx: S) -> Self {
        Self::Context(ctx.to_string())
    }
}
