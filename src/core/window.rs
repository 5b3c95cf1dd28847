use crate::types::{Envelope, GeoTransform, PixelWindow};

/// A region's clamped window in a raster grid and the geotransform of the crop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMapping {
    pub window: PixelWindow,
    /// Geotransform of a raster holding exactly the window's pixels
    pub geo_transform: GeoTransform,
}

/// Maps polygon envelopes onto pixel windows of a raster grid
pub struct CoordinateWindowMapper;

impl CoordinateWindowMapper {
    /// Window covering `envelope`, clamped to `[0, width] x [0, height]`.
    ///
    /// Returns `None` when the envelope does not overlap the grid; that is a
    /// skip, not an error.
    pub fn map(
        transform: &GeoTransform,
        envelope: &Envelope,
        width: usize,
        height: usize,
    ) -> Option<WindowMapping> {
        let to_col = |x: f64| (x - transform.top_left_x) / transform.pixel_width;
        let to_row = |y: f64| (y - transform.top_left_y) / transform.pixel_height;

        // pixel_height < 0 puts max_y on the smallest row, so order explicitly
        let (c0, c1) = (to_col(envelope.min_x), to_col(envelope.max_x));
        let (r0, r1) = (to_row(envelope.max_y), to_row(envelope.min_y));
        let bounds = [c0.min(c1).floor(), c0.max(c1).ceil(), r0.min(r1).floor(), r0.max(r1).ceil()];
        if bounds.iter().any(|v| !v.is_finite()) {
            log::warn!("Non-finite window for envelope {:?}", envelope);
            return None;
        }
        let [min_col, max_col, min_row, max_row] = bounds.map(|v| v as i64);

        let (w, h) = (width as i64, height as i64);
        if max_col <= 0 || max_row <= 0 || min_col >= w || min_row >= h {
            return None;
        }

        let window = PixelWindow {
            min_col: min_col.clamp(0, w) as usize,
            min_row: min_row.clamp(0, h) as usize,
            max_col: max_col.clamp(0, w) as usize,
            max_row: max_row.clamp(0, h) as usize,
        };
        if window.is_empty() {
            return None;
        }

        let geo_transform = transform.shifted(window.min_col, window.min_row);
        Some(WindowMapping { window, geo_transform })
    }
}
