//! satcrop: clips satellite rasters to regions of interest
//!
//! Each source raster (one parameter per satellite pass) is cropped and
//! masked to every region polygon it overlaps. Per-region statistics are
//! recorded in a per-region, per-parameter catalog that also tracks the
//! latest valid reading.

pub mod types;
pub mod io;
pub mod core;
pub mod catalog;
pub mod config;
pub mod pipeline;

// Re-export main types and functions for easier access
pub use types::{
    CropError, CropResult, Envelope, ExtractionResult, GeoTransform, PixelStatistics, PixelWindow,
    ProvenanceTags, RegionOutcome, SkipReason,
};

pub use catalog::{CatalogRecord, LatestSelection, MetadataCatalog, PublicEntry};
pub use config::{init_environment, PipelineConfig};
pub use io::{FileProperties, FilenameParser, GeoTiffWriter, Region, RegionSet, SourceRaster};
pub use pipeline::{BatchReport, Pipeline, RemoteSync, SyncPlan};
