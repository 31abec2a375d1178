//! Grid one month of retrieval files.
//!
//! Files are handled one at a time, in sorted order. Each is read, reduced to
//! surface samples, and interpolated onto the target grid. Any problem with a
//! single file is logged and that file is left out; only finding no files, or
//! finding that none of them gave usable data, stops the run.
use std::path::{Path, PathBuf};

use error_stack::ResultExt;
use ndarray::Array2;
use tabled::{Table, Tabled};

use crate::aggregate::{aggregate, AveragedField};
use crate::config::RunConfig;
use crate::discovery::find_month_files;
use crate::extraction::extract_surface_samples;
use crate::grid::TargetGrid;
use crate::interpolation::interpolate;
use crate::readers::RetrievalReader;
use crate::utils::{file_name_lossy, report_chain};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid run configuration")]
    Config,
    #[error("Could not find input files")]
    Discovery,
    #[error("No data was successfully interpolated, no output will be written")]
    NoUsableData,
    #[error("Could not average the interpolated fields")]
    Aggregation,
}

/// Why a single file was left out of the average.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("could not read the file")]
    Read,
    #[error("could not extract surface values")]
    Extract,
    #[error("could not interpolate onto the grid")]
    Interpolate,
}

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    /// Interpolated from this many samples and included in the mean
    Used { n_samples: usize },
    /// No sounding inside the bounding box
    NoDataInBox,
    /// Skipped because of an error
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
}

impl FileReport {
    pub fn is_used(&self) -> bool {
        matches!(self.status, FileStatus::Used { .. })
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Samples")]
    samples: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

impl From<&FileReport> for SummaryRow {
    fn from(report: &FileReport) -> Self {
        let file = file_name_lossy(&report.path);
        match &report.status {
            FileStatus::Used { n_samples } => Self {
                file,
                status: "used",
                samples: n_samples.to_string(),
                reason: String::new(),
            },
            FileStatus::NoDataInBox => Self {
                file,
                status: "skipped",
                samples: "0".to_string(),
                reason: "no data within the lat/lon bounds".to_string(),
            },
            FileStatus::Failed { reason } => Self {
                file,
                status: "failed",
                samples: "-".to_string(),
                reason: reason.clone(),
            },
        }
    }
}

/// Render the per-file outcomes as a text table.
pub fn summary_table(reports: &[FileReport]) -> String {
    Table::new(reports.iter().map(SummaryRow::from)).to_string()
}

/// The result of gridding one month.
#[derive(Debug)]
pub struct MonthOutput {
    pub field: AveragedField,
    pub reports: Vec<FileReport>,
}

/// Find the month's files under the configured data directory and grid them.
pub fn run_month<R: RetrievalReader>(config: &RunConfig, reader: &R) -> error_stack::Result<MonthOutput, PipelineError> {
    let files = find_month_files(&config.data_dir, &config.product, config.year, config.month)
        .change_context(PipelineError::Discovery)?;
    grid_files(&files, config, reader)
}

/// Grid and average the given files, in the order given.
pub fn grid_files<R: RetrievalReader>(
    files: &[PathBuf],
    config: &RunConfig,
    reader: &R,
) -> error_stack::Result<MonthOutput, PipelineError> {
    config.validate().change_context(PipelineError::Config)?;
    let grid = config.target_grid().change_context(PipelineError::Config)?;

    let mut fields: Vec<Array2<f64>> = Vec::with_capacity(files.len());
    let mut reports = Vec::with_capacity(files.len());

    for path in files {
        log::info!("Processing file: {}", path.display());
        let status = match process_file(path, config, &grid, reader) {
            Ok(Some((field, n_samples))) => {
                fields.push(field);
                FileStatus::Used { n_samples }
            }
            Ok(None) => {
                log::info!("No data within specified lat/lon bounds for {}. Skipping.", file_name_lossy(path));
                FileStatus::NoDataInBox
            }
            Err(e) => {
                let reason = report_chain(&e);
                log::warn!("Error processing file {}: {reason}", path.display());
                log::debug!("Full error for {}:\n{e:?}", path.display());
                FileStatus::Failed { reason }
            }
        };
        reports.push(FileReport { path: path.clone(), status });
    }

    let n_used = reports.iter().filter(|r| r.is_used()).count();
    log::info!(
        "{n_used} of {} files were used, {} skipped\n{}",
        reports.len(),
        reports.len() - n_used,
        summary_table(&reports)
    );

    if fields.is_empty() {
        return Err(PipelineError::NoUsableData.into());
    }

    let field = aggregate(&fields, &grid, config.year, config.month, config.field.clone())
        .change_context(PipelineError::Aggregation)?;
    Ok(MonthOutput { field, reports })
}

/// Read, extract, and interpolate one file.
///
/// Returns `Ok(None)` if the file has no soundings inside the bounding box,
/// otherwise the interpolated field and the number of samples that went into it.
pub fn process_file<R: RetrievalReader>(
    path: &Path,
    config: &RunConfig,
    grid: &TargetGrid,
    reader: &R,
) -> error_stack::Result<Option<(Array2<f64>, usize)>, FileError> {
    let file = reader.read(path).change_context(FileError::Read)?;
    let samples = extract_surface_samples(&file, &config.bbox, config.target_pressure)
        .change_context(FileError::Extract)?;
    // The full profiles are no longer needed
    drop(file);

    if samples.is_empty() {
        return Ok(None);
    }

    let field = interpolate(&samples, grid).change_context(FileError::Interpolate)?;
    Ok(Some((field, samples.len())))
}
