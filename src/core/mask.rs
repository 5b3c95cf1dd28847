//! Polygon-to-raster mask rasterization aligned with a source grid
//!
//! Masks always cover the full raster extent so that slicing with the
//! region's pixel window lines up exactly with the cropped value band.
//! Pixel inclusion follows GDAL's polygon fill: a pixel is burned when its
//! centre falls inside the polygon, holes excluded.

use crate::io::regions::Region;
use crate::types::{CropError, CropResult, GeoTransform, RegionMask};
use gdal::vector::Geometry;
use gdal::DriverManager;
use ndarray::Array2;

/// Burns a region into a 0/1 byte mask over a raster grid
pub trait MaskRasterizer: Send + Sync {
    fn rasterize(
        &self,
        region: &Region,
        transform: &GeoTransform,
        projection: &str,
        width: usize,
        height: usize,
    ) -> CropResult<RegionMask>;
}

/// Delegates to GDAL's polygon fill, burning 1 into an in-memory byte raster
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalRasterizer;

impl GdalRasterizer {
    fn to_wkt(region: &Region) -> String {
        let polygons: Vec<String> = region
            .geometry
            .0
            .iter()
            .map(|polygon| {
                let rings: Vec<String> = std::iter::once(polygon.exterior())
                    .chain(polygon.interiors().iter())
                    .map(|ring| {
                        let coords: Vec<String> = ring.0.iter().map(|c| format!("{} {}", c.x, c.y)).collect();
                        format!("({})", coords.join(", "))
                    })
                    .collect();
                format!("({})", rings.join(", "))
            })
            .collect();
        format!("MULTIPOLYGON ({})", polygons.join(", "))
    }
}

impl MaskRasterizer for GdalRasterizer {
    fn rasterize(
        &self,
        region: &Region,
        transform: &GeoTransform,
        projection: &str,
        width: usize,
        height: usize,
    ) -> CropResult<RegionMask> {
        if width == 0 || height == 0 {
            return Ok(Array2::zeros((height, width)));
        }

        let driver = DriverManager::get_driver_by_name("MEM")?;
        let mut dataset = driver.create_with_band_type::<u8, _>("", width as isize, height as isize, 1)?;
        dataset.set_geo_transform(&transform.to_gdal())?;
        if !projection.is_empty() {
            dataset.set_projection(projection)?;
        }

        let geometry = Geometry::from_wkt(&Self::to_wkt(region))?;
        gdal::raster::rasterize(&mut dataset, &[1], &[geometry], &[1.0], None)?;

        let buffer = dataset
            .rasterband(1)?
            .read_as::<u8>((0, 0), (width, height), (width, height), None)?;
        Array2::from_shape_vec((height, width), buffer.data)
            .map_err(|e| CropError::Processing(format!("Failed to reshape mask: {}", e)))
    }
}
