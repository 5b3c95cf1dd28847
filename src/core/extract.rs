use crate::core::mask::{GdalRasterizer, MaskRasterizer};
use crate::core::stats::compute_statistics;
use crate::core::window::CoordinateWindowMapper;
use crate::io::raster::{preview_factor, GeoTiffWriter, SourceRaster};
use crate::io::regions::{Region, RegionSet};
use crate::types::{CropError, CropResult, ExtractionResult, RegionOutcome, SkipReason};
use ndarray::{s, Zip};
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Region extraction parameters
#[derive(Debug, Clone)]
pub struct ExtractorParams {
    /// Longest preview side aimed for; a preview is made only when the crop
    /// is at least twice this size
    pub preview_target_size: usize,
    /// GeoTIFF COMPRESS creation option
    pub compression: String,
}

impl Default for ExtractorParams {
    fn default() -> Self {
        Self {
            preview_target_size: 500,
            compression: "DEFLATE".to_string(),
        }
    }
}

/// Naming of the per-region products of one source raster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    pub full: PathBuf,
    pub preview: PathBuf,
}

impl OutputNames {
    /// `{dir}/{region}/{stem}_{region}{ext}` and the `_lowres` sibling
    pub fn new(output_dir: &Path, source: &Path, region_key: &str) -> CropResult<Self> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CropError::InvalidFilename(source.display().to_string()))?;
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let dir = output_dir.join(region_key);
        Ok(Self {
            full: dir.join(format!("{}_{}{}", stem, region_key, ext)),
            preview: dir.join(format!("{}_{}_lowres{}", stem, region_key, ext)),
        })
    }
}

/// True when the preview should replace the full-resolution file in the catalog
pub fn preview_wins(full_size: u64, preview_size: u64) -> bool {
    preview_size < full_size
}

/// Crops, masks, measures and encodes regions of a source raster
pub struct RegionExtractor {
    params: ExtractorParams,
    writer: GeoTiffWriter,
    rasterizer: Box<dyn MaskRasterizer>,
}

impl RegionExtractor {
    pub fn new(params: ExtractorParams, rasterizer: Box<dyn MaskRasterizer>) -> Self {
        let writer = GeoTiffWriter::new(params.compression.clone());
        Self {
            params,
            writer,
            rasterizer,
        }
    }

    /// Default parameters with the GDAL rasterizer
    pub fn standard() -> Self {
        Self::new(ExtractorParams::default(), Box::new(GdalRasterizer))
    }

    /// Extract one region; outputs go under `output_dir/{region key}/`
    pub fn extract_region(
        &self,
        raster: &SourceRaster,
        source: &Path,
        region: &Region,
        output_dir: &Path,
    ) -> CropResult<RegionOutcome> {
        let (width, height) = raster.size();
        let mapping = match region
            .envelope()
            .and_then(|env| CoordinateWindowMapper::map(&raster.geo_transform, &env, width, height))
        {
            Some(m) => m,
            None => return Ok(RegionOutcome::Skipped(SkipReason::OutsideRaster)),
        };
        let w = mapping.window;

        let mask = self
            .rasterizer
            .rasterize(region, &raster.geo_transform, &raster.projection, width, height)?;
        let mask = mask.slice(s![w.min_row..w.max_row, w.min_col..w.max_col]);

        let mut crop = raster
            .band
            .slice(s![w.min_row..w.max_row, w.min_col..w.max_col])
            .to_owned();
        Zip::from(&mut crop).and(&mask).for_each(|v, &m| {
            if m != 1 {
                *v = f32::NAN;
            }
        });

        let total_pixels = mask.iter().filter(|&&m| m == 1).count() as u64;
        let statistics = match compute_statistics(crop.view(), total_pixels) {
            Some(s) => s,
            None => return Ok(RegionOutcome::Skipped(SkipReason::NoValidPixels)),
        };

        log::info!("Processing {}", region.key);
        log::debug!("Window {:?}, {}/{} valid pixels", w, statistics.valid_pixels, total_pixels);

        let names = OutputNames::new(output_dir, source, &region.key)?;
        if let Some(dir) = names.full.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let full_size = self
            .writer
            .write(&crop, &mapping.geo_transform, &raster.projection, &names.full)?;

        if names.preview.exists() {
            std::fs::remove_file(&names.preview)?;
        }
        let mut output_path = names.full.clone();
        if let Some(factor) = preview_factor(w.width(), w.height(), self.params.preview_target_size) {
            let preview_size = self.writer.write_preview(&names.full, &names.preview, factor)?;
            if preview_wins(full_size, preview_size) {
                output_path = names.preview.clone();
            } else {
                log::debug!(
                    "Discarding preview for {}: {} bytes vs {} bytes",
                    region.key,
                    preview_size,
                    full_size
                );
                std::fs::remove_file(&names.preview)?;
            }
        }

        Ok(RegionOutcome::Extracted(ExtractionResult {
            region_key: region.key.clone(),
            window: w,
            statistics,
            full_path: names.full,
            output_path,
            provenance: raster.provenance.clone(),
        }))
    }

    /// Extract every region in set order. The first error aborts the raster.
    pub fn extract_all(
        &self,
        raster: &SourceRaster,
        source: &Path,
        regions: &RegionSet,
        output_dir: &Path,
    ) -> CropResult<Vec<(String, RegionOutcome)>> {
        let run = |region: &Region| {
            self.extract_region(raster, source, region, output_dir)
                .map(|outcome| (region.key.clone(), outcome))
        };

        #[cfg(feature = "parallel")]
        let outcomes: Vec<CropResult<(String, RegionOutcome)>> = regions.as_slice().par_iter().map(run).collect();
        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<CropResult<(String, RegionOutcome)>> = regions.iter().map(run).collect();

        outcomes.into_iter().collect()
    }
}
