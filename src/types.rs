use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Value band of a source raster (rows x cols), NaN marks nodata
pub type ValueBand = Array2<f32>;

/// Binary region mask aligned with a raster grid, 1 = inside
pub type RegionMask = Array2<u8>;

/// Sentinel written for provenance tags missing from a source raster
pub const MISSING_TAG: &str = "false";

/// Affine georeferencing parameters in GDAL order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: &[f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// World coordinate of the top-left corner of pixel (col, row)
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.top_left_x + col * self.pixel_width + row * self.rotation_x,
            self.top_left_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// Fails when the transform is singular and cannot map world onto pixels
    pub fn validate(&self) -> CropResult<()> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det == 0.0 || !det.is_finite() {
            return Err(CropError::InvalidGeoTransform(format!("{:?}", self.to_gdal())));
        }
        Ok(())
    }

    /// Geotransform of a sub-grid whose pixel (0, 0) is pixel (col, row) here
    pub fn shifted(&self, col: usize, row: usize) -> Self {
        let (x, y) = self.pixel_to_world(col as f64, row as f64);
        Self {
            top_left_x: x,
            top_left_y: y,
            ..*self
        }
    }

    /// Same origin, pixels `factor` times larger along both axes
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            pixel_width: self.pixel_width * factor,
            rotation_x: self.rotation_x * factor,
            rotation_y: self.rotation_y * factor,
            pixel_height: self.pixel_height * factor,
            ..*self
        }
    }
}

/// Axis-aligned bounding box of a polygon in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// Clamped pixel window `[min_col, max_col) x [min_row, max_row)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelWindow {
    pub min_col: usize,
    pub min_row: usize,
    pub max_col: usize,
    pub max_row: usize,
}

impl PixelWindow {
    pub fn width(&self) -> usize {
        self.max_col - self.min_col
    }

    pub fn height(&self) -> usize {
        self.max_row - self.min_row
    }

    pub fn is_empty(&self) -> bool {
        self.max_col <= self.min_col || self.max_row <= self.min_row
    }
}

/// Optional processing-version tags carried by a source raster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceTags {
    pub commit: String,
    pub reproduce: String,
}

impl Default for ProvenanceTags {
    fn default() -> Self {
        Self {
            commit: MISSING_TAG.to_string(),
            reproduce: MISSING_TAG.to_string(),
        }
    }
}

/// Statistics over the valid pixels of one region crop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelStatistics {
    pub total_pixels: u64,
    pub valid_pixels: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p10: f64,
    pub p90: f64,
}

/// Result of extracting one region from one source raster
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub region_key: String,
    pub window: PixelWindow,
    pub statistics: PixelStatistics,
    /// Full-resolution crop written to disk
    pub full_path: PathBuf,
    /// File the catalog should reference (the preview when it won)
    pub output_path: PathBuf,
    pub provenance: ProvenanceTags,
}

/// Why a region produced no result for a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Polygon envelope does not overlap the raster grid
    OutsideRaster,
    /// Every pixel of the masked crop is nodata
    NoValidPixels,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::OutsideRaster => write!(f, "outside raster"),
            SkipReason::NoValidPixels => write!(f, "no valid pixels"),
        }
    }
}

/// Outcome of one region for one raster: skipping is not an error
#[derive(Debug, Clone, PartialEq)]
pub enum RegionOutcome {
    Extracted(ExtractionResult),
    Skipped(SkipReason),
}

/// Error types for raster clipping and catalog maintenance
#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed filename: {0}")]
    InvalidFilename(String),

    #[error("Invalid region set: {0}")]
    InvalidRegion(String),

    #[error("Invalid geotransform: {0}")]
    InvalidGeoTransform(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Failed to process {} file(s): {}", .0.len(), .0.join(", "))]
    BatchFailed(Vec<String>),
}

/// Result type for clipping and catalog operations
pub type CropResult<T> = Result<T, CropError>;
