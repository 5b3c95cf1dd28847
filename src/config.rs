//! Pipeline configuration and one-time process setup

use crate::catalog::LatestSelection;
use crate::core::extract::ExtractorParams;
use crate::types::CropResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Pipeline settings; missing keys in a config file take the defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Local mirror of the remote source rasters
    pub source_root: PathBuf,
    /// Where per-region rasters are written
    pub output_root: PathBuf,
    /// Where per-region, per-parameter catalog documents live
    pub catalog_root: PathBuf,
    /// Prefix of public URLs; output keys are appended to it
    pub public_base_url: String,
    pub preview_target_size: usize,
    pub compression: String,
    pub min_valid_fraction: f64,
    pub same_day_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let extractor = ExtractorParams::default();
        let selection = LatestSelection::default();
        Self {
            source_root: PathBuf::from("data"),
            output_root: PathBuf::from("data_output"),
            catalog_root: PathBuf::from("catalog"),
            public_base_url: String::new(),
            preview_target_size: extractor.preview_target_size,
            compression: extractor.compression,
            min_valid_fraction: selection.min_valid_fraction,
            same_day_window: selection.same_day_window,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> CropResult<Self> {
        log::info!("Loading pipeline config from: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn extractor_params(&self) -> ExtractorParams {
        ExtractorParams {
            preview_target_size: self.preview_target_size,
            compression: self.compression.clone(),
        }
    }

    pub fn selection(&self) -> LatestSelection {
        LatestSelection {
            min_valid_fraction: self.min_valid_fraction,
            same_day_window: self.same_day_window,
        }
    }
}

/// Point PROJ at the active conda environment's data directory.
///
/// Call once from the process entry point before any GDAL work. Does
/// nothing when `PROJ_DATA` is already set or no conda env is active;
/// returns the path it set otherwise.
pub fn init_environment() -> Option<PathBuf> {
    if std::env::var_os("PROJ_DATA").is_some() {
        return None;
    }
    let prefix = std::env::var_os("CONDA_PREFIX")?;
    let proj_data = PathBuf::from(prefix).join("share").join("proj");
    std::env::set_var("PROJ_DATA", &proj_data);
    log::info!("PROJ_DATA set to {}", proj_data.display());
    Some(proj_data)
}
