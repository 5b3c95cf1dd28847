//! Core clipping modules

pub mod window;
pub mod mask;
pub mod stats;
pub mod extract;

// Re-export main types
pub use window::{CoordinateWindowMapper, WindowMapping};
pub use mask::{GdalRasterizer, MaskRasterizer};
pub use stats::{compute_statistics, percentile, round5};
pub use extract::{ExtractorParams, OutputNames, RegionExtractor};
