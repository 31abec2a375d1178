//! Quick-look color map of the monthly mean.
use std::panic::AssertUnwindSafe;
use std::path::Path;

use plotly::{
    common::{ColorBar, ColorScale, ColorScalePalette, Title},
    layout::Axis,
    HeatMap, ImageFormat, Layout, Plot,
};

use super::WriteError;
use crate::aggregate::AveragedField;

const PLOT_WIDTH: usize = 1000;
const PLOT_HEIGHT: usize = 600;

/// Build the heatmap for `field`. Missing cells are left blank.
pub fn make_plot(field: &AveragedField) -> Plot {
    // serde_json writes NaN as null, which plotly draws as a gap
    let z: Vec<Vec<f64>> = field
        .values
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|&v| v as f64).collect())
        .collect();

    let colorbar_label = format!("Surface-Level CH₄ VMR ({})", field.metadata.units);
    let trace = HeatMap::new(field.lon.to_vec(), field.lat.to_vec(), z)
        .color_scale(ColorScale::Palette(ColorScalePalette::Viridis))
        .color_bar(ColorBar::new().title(Title::new(&colorbar_label)));

    let mut plot = Plot::new();
    plot.add_trace(trace);

    let title = format!("Mean Surface-Level CH₄ - {}", field.month_label());
    let layout = Layout::new()
        .title(Title::new(&title))
        .x_axis(Axis::new().title(Title::new("Longitude")))
        .y_axis(Axis::new().title(Title::new("Latitude")));
    plot.set_layout(layout);
    plot
}

/// Render `field` to a PNG at `path`.
///
/// The image export runs an external renderer which panics when it fails, so
/// that is caught here and turned into an error.
pub fn write_plot(path: &Path, field: &AveragedField) -> Result<(), WriteError> {
    render_with(path, field, |plot, path| {
        plot.write_image(path, ImageFormat::PNG, PLOT_WIDTH, PLOT_HEIGHT, 1.0)
    })
}

/// Write the quick-look image, logging rather than returning any failure.
///
/// Returns `true` if the image was written.
pub fn write_quicklook(path: &Path, field: &AveragedField) -> bool {
    report_quicklook(path, write_plot(path, field))
}

fn report_quicklook(path: &Path, result: Result<(), WriteError>) -> bool {
    match result {
        Ok(()) => {
            log::info!("Plot saved to {}", path.display());
            true
        }
        Err(e) => {
            log::warn!("{e}; the netCDF output is unaffected");
            false
        }
    }
}

fn render_with<F: FnOnce(&Plot, &Path)>(path: &Path, field: &AveragedField, render: F) -> Result<(), WriteError> {
    // A leftover image from an earlier run would otherwise pass for this one
    if path.exists() {
        std::fs::remove_file(path).map_err(|_| WriteError::RemoveStale(path.to_path_buf()))?;
    }

    let plot = make_plot(field);
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| render(&plot, path)));

    if result.is_err() || !path.exists() {
        return Err(WriteError::Plot(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::FieldMetadata;
    use ndarray::array;
    use std::path::PathBuf;

    fn small_field() -> AveragedField {
        AveragedField {
            values: array![[1800.0f32, f32::NAN], [1900.0, 1901.0]],
            lat: array![0.0, 1.0],
            lon: array![100.0, 101.0],
            time_hours: 219_912,
            year: 2025,
            month: 2,
            n_files: 1,
            metadata: FieldMetadata::default(),
        }
    }

    #[test]
    fn test_plot_json_has_labels() {
        let json = make_plot(&small_field()).to_json();
        assert!(json.contains("Mean Surface-Level CH₄ - 2025-02"));
        assert!(json.contains("Longitude"));
        assert!(json.contains("null"));
    }

    #[test]
    fn test_stale_image_not_mistaken_for_success() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ch4_surface_202502.png");
        std::fs::write(&path, b"old image").unwrap();

        // A renderer that silently produces nothing
        let res = render_with(&path, &small_field(), |_, _| ());
        assert!(matches!(res, Err(WriteError::Plot(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_render_panic_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("plot.png");
        let res = render_with(&path, &small_field(), |_, _| panic!("renderer crashed"));
        assert!(matches!(res, Err(WriteError::Plot(_))));
    }

    #[test]
    fn test_render_success_replaces_old_image() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("plot.png");
        std::fs::write(&path, b"old image").unwrap();
        render_with(&path, &small_field(), |_, p| std::fs::write(p, b"new image").unwrap()).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new image");
    }

    #[test]
    fn test_quicklook_failure_is_not_fatal() {
        let path = PathBuf::from("/nonexistent/plot.png");
        assert!(!report_quicklook(&path, Err(WriteError::Plot(path.clone()))));
        assert!(report_quicklook(&path, Ok(())));
    }
}
