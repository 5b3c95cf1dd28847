//! I/O modules for source rasters, region sets and filenames

pub mod filename;
pub mod raster;
pub mod regions;

pub use filename::{FileProperties, FilenameParser};
pub use raster::{GeoTiffWriter, SourceRaster};
pub use regions::{Region, RegionSet};
