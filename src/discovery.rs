//! Find the retrieval files for one month under a data directory.
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("No files found in '{}' matching pattern '{pattern}'", .dir.display())]
    NoFiles { dir: PathBuf, pattern: String },
    #[error("There is a problem with the search pattern '{pattern}': {error}")]
    BadPattern { pattern: String, error: String },
    #[error("Could not read a directory entry while searching for files: {0}")]
    Unreadable(String),
}

/// File name pattern for one month of a product, e.g.
/// `TROPESS_AIRS-Aqua_L2_Summary_CH4_202502*.nc`
///
/// The product is matched literally, glob metacharacters in it are escaped.
pub fn month_file_pattern(product: &str, year: i32, month: u32) -> String {
    format!("{}_{year:04}{month:02}*.nc", glob::Pattern::escape(product))
}

/// All files under `data_dir` (searching subdirectories too) matching the
/// product/month pattern, in lexicographic order.
///
/// Finding nothing is an error, since there is nothing to grid.
pub fn find_month_files(data_dir: &Path, product: &str, year: i32, month: u32) -> Result<Vec<PathBuf>, DiscoveryError> {
    let pattern = month_file_pattern(product, year, month);
    let escaped_dir = glob::Pattern::escape(&data_dir.to_string_lossy());
    let full_pattern = format!("{escaped_dir}/**/{pattern}");

    let entries = glob::glob(&full_pattern).map_err(|e| DiscoveryError::BadPattern {
        pattern: full_pattern.clone(),
        error: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DiscoveryError::Unreadable(e.to_string()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(DiscoveryError::NoFiles { dir: data_dir.to_path_buf(), pattern });
    }

    log::info!("Found {} files matching the pattern: {pattern}", files.len());
    for f in files.iter() {
        log::info!(" - {}", f.file_name().map(|n| n.to_string_lossy()).unwrap_or_default());
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT: &str = "TROPESS_AIRS-Aqua_L2_Summary_CH4";

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_pattern() {
        assert_eq!(month_file_pattern(PRODUCT, 2025, 2), "TROPESS_AIRS-Aqua_L2_Summary_CH4_202502*.nc");
    }

    #[test]
    fn test_finds_nested_files_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("b/TROPESS_AIRS-Aqua_L2_Summary_CH4_20250203_MUSES_R1p23.nc"));
        touch(&root.join("a/TROPESS_AIRS-Aqua_L2_Summary_CH4_20250201_MUSES_R1p23.nc"));
        touch(&root.join("TROPESS_AIRS-Aqua_L2_Summary_CH4_20250202_MUSES_R1p23.nc"));
        // wrong month, wrong product, wrong extension
        touch(&root.join("a/TROPESS_AIRS-Aqua_L2_Summary_CH4_20250301_MUSES_R1p23.nc"));
        touch(&root.join("a/TROPESS_AIRS-Aqua_L2_Summary_CO_20250201_MUSES_R1p23.nc"));
        touch(&root.join("a/TROPESS_AIRS-Aqua_L2_Summary_CH4_20250204_MUSES_R1p23.txt"));

        let files = find_month_files(root, PRODUCT, 2025, 2).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            [
                "TROPESS_AIRS-Aqua_L2_Summary_CH4_20250202_MUSES_R1p23.nc",
                "a/TROPESS_AIRS-Aqua_L2_Summary_CH4_20250201_MUSES_R1p23.nc",
                "b/TROPESS_AIRS-Aqua_L2_Summary_CH4_20250203_MUSES_R1p23.nc",
            ]
        );
    }

    #[test]
    fn test_product_matched_literally() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("CH4[v2]_20250201.nc"));
        touch(&root.join("CH4v_20250201.nc"));
        touch(&root.join("CH4_20250201.nc"));

        let files = find_month_files(root, "CH4[v2]", 2025, 2).unwrap();
        assert_eq!(files, vec![root.join("CH4[v2]_20250201.nc")]);

        let err = find_month_files(root, "*", 2025, 2).unwrap_err();
        assert!(matches!(err, DiscoveryError::NoFiles { .. }));
    }

    #[test]
    fn test_no_files_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = find_month_files(tmp.path(), PRODUCT, 2025, 2).unwrap_err();
        match err {
            DiscoveryError::NoFiles { dir, pattern } => {
                assert_eq!(dir, tmp.path());
                assert_eq!(pattern, month_file_pattern(PRODUCT, 2025, 2));
            }
            other => panic!("Expected NoFiles error, got {other:?}"),
        }
    }
}
