use crate::types::{CropError, CropResult, GeoTransform, ProvenanceTags, ValueBand};
use gdal::raster::{Buffer, RasterCreationOption, ResampleAlg};
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::Array2;
use std::path::Path;

/// Metadata item carrying the processing commit of a source raster
pub const COMMIT_TAG: &str = "Commit Hash";
/// Metadata item carrying the reproduce flag of a source raster
pub const REPRODUCE_TAG: &str = "Reproduce";

/// A decoded source raster: value band with nodata applied, plus georeferencing
#[derive(Debug, Clone)]
pub struct SourceRaster {
    pub band: ValueBand,
    pub geo_transform: GeoTransform,
    /// Projection as WKT, copied verbatim onto every output
    pub projection: String,
    pub provenance: ProvenanceTags,
}

impl SourceRaster {
    pub fn new(band: ValueBand, geo_transform: GeoTransform, projection: impl Into<String>) -> Self {
        Self {
            band,
            geo_transform,
            projection: projection.into(),
            provenance: ProvenanceTags::default(),
        }
    }

    /// Open a single- or dual-band raster.
    ///
    /// Band 1 is read as `f32`; its declared nodata value becomes NaN. When a
    /// second band exists it is a flag layer and pixels flagged 1 become NaN.
    pub fn open<P: AsRef<Path>>(path: P) -> CropResult<Self> {
        log::info!("Reading raster: {}", path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let geo_transform = GeoTransform::from_gdal(&dataset.geo_transform()?);
        geo_transform.validate()?;
        let projection = dataset.projection();
        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count();

        log::debug!("Raster size: {}x{}, {} band(s)", width, height, band_count);
        log::debug!("Raster geotransform: {:?}", geo_transform);

        let value_band = dataset.rasterband(1)?;
        let no_data = value_band.no_data_value();
        let values = value_band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
        let mut band = Array2::from_shape_vec((height, width), values.data)
            .map_err(|e| CropError::Processing(format!("Failed to reshape value band: {}", e)))?;

        if let Some(nd) = no_data.filter(|v| !v.is_nan()) {
            let nd = nd as f32;
            band.mapv_inplace(|v| if v == nd { f32::NAN } else { v });
        }

        if band_count >= 2 {
            let flags = dataset
                .rasterband(2)?
                .read_as::<u8>((0, 0), (width, height), (width, height), None)?;
            let flags = Array2::from_shape_vec((height, width), flags.data)
                .map_err(|e| CropError::Processing(format!("Failed to reshape flag band: {}", e)))?;
            apply_nodata_flags(&mut band, &flags);
        }

        let provenance = ProvenanceTags {
            commit: dataset
                .metadata_item(COMMIT_TAG, "")
                .unwrap_or_else(|| ProvenanceTags::default().commit),
            reproduce: dataset
                .metadata_item(REPRODUCE_TAG, "")
                .unwrap_or_else(|| ProvenanceTags::default().reproduce),
        };

        Ok(Self {
            band,
            geo_transform,
            projection,
            provenance,
        })
    }

    /// (width, height) in pixels
    pub fn size(&self) -> (usize, usize) {
        let (rows, cols) = self.band.dim();
        (cols, rows)
    }
}

/// Set every pixel whose flag is 1 to NaN
pub fn apply_nodata_flags(band: &mut ValueBand, flags: &Array2<u8>) {
    ndarray::Zip::from(band).and(flags).for_each(|v, &flag| {
        if flag == 1 {
            *v = f32::NAN;
        }
    });
}

/// Writes compressed, tiled single-band Float32 GeoTIFFs
#[derive(Debug, Clone)]
pub struct GeoTiffWriter {
    compression: String,
}

impl Default for GeoTiffWriter {
    fn default() -> Self {
        Self::new("DEFLATE")
    }
}

impl GeoTiffWriter {
    pub fn new(compression: impl Into<String>) -> Self {
        Self {
            compression: compression.into(),
        }
    }

    /// Write `image` with NaN nodata; returns the encoded file size in bytes
    pub fn write<P: AsRef<Path>>(
        &self,
        image: &Array2<f32>,
        transform: &GeoTransform,
        projection: &str,
        output_path: P,
    ) -> CropResult<u64> {
        let output_path = output_path.as_ref();
        log::debug!("Writing GeoTIFF: {}", output_path.display());

        let (height, width) = image.dim();
        let data: Vec<f32> = image.iter().cloned().collect();
        self.write_buffer(Buffer::new((width, height), data), transform, projection, output_path)?;

        Ok(std::fs::metadata(output_path)?.len())
    }

    /// Write a bilinear downsample of an existing GeoTIFF.
    ///
    /// Pixel size grows by `factor`; the output size is the source size
    /// divided by `factor`, rounded, and at least one pixel.
    pub fn write_preview<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        source_path: P,
        output_path: Q,
        factor: usize,
    ) -> CropResult<u64> {
        let output_path = output_path.as_ref();
        log::debug!("Writing preview (factor {}): {}", factor, output_path.display());

        let (buffer, transform, projection) = {
            let dataset = Dataset::open(source_path.as_ref())?;
            let (width, height) = dataset.raster_size();
            let (out_w, out_h) = preview_size(width, height, factor);
            let transform = GeoTransform::from_gdal(&dataset.geo_transform()?).scaled(factor as f64);
            let buffer = dataset.rasterband(1)?.read_as::<f32>(
                (0, 0),
                (width, height),
                (out_w, out_h),
                Some(ResampleAlg::Bilinear),
            )?;
            (buffer, transform, dataset.projection())
        };

        self.write_buffer(buffer, &transform, &projection, output_path)?;
        Ok(std::fs::metadata(output_path)?.len())
    }

    fn write_buffer(
        &self,
        buffer: Buffer<f32>,
        transform: &GeoTransform,
        projection: &str,
        output_path: &Path,
    ) -> CropResult<()> {
        let (width, height) = buffer.size;
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let options = [
            RasterCreationOption {
                key: "COMPRESS",
                value: &self.compression,
            },
            RasterCreationOption {
                key: "TILED",
                value: "YES",
            },
        ];

        let mut dataset = driver.create_with_band_type_with_options::<f32, _>(
            output_path,
            width as isize,
            height as isize,
            1,
            &options,
        )?;
        dataset.set_geo_transform(&transform.to_gdal())?;
        if !projection.is_empty() {
            dataset.set_projection(projection)?;
        }

        let mut rasterband = dataset.rasterband(1)?;
        rasterband.set_no_data_value(Some(f32::NAN as f64))?;
        rasterband.write((0, 0), (width, height), &buffer)?;

        // dataset is closed (and flushed) on drop
        Ok(())
    }
}

/// Integer downsampling factor for a preview, if one is warranted
pub fn preview_factor(width: usize, height: usize, target_size: usize) -> Option<usize> {
    if target_size == 0 {
        return None;
    }
    let factor = (width / target_size).max(height / target_size);
    (factor > 1).then_some(factor)
}

/// Preview dimensions for a given factor
pub fn preview_size(width: usize, height: usize, factor: usize) -> (usize, usize) {
    let shrink = |n: usize| ((n as f64 / factor as f64).round() as usize).max(1);
    (shrink(width), shrink(height))
}
