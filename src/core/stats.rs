use crate::types::PixelStatistics;
use ndarray::ArrayView2;

const DECIMALS: f64 = 1e5;

/// Round to five decimals
pub fn round5(value: f64) -> f64 {
    (value * DECIMALS).round() / DECIMALS
}

/// Percentile `q` (0..=100) of ascending `sorted` values, interpolating
/// linearly between the two nearest order statistics.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Statistics over the finite pixels of a masked crop.
///
/// NaN and +/-inf count as nodata. `total_pixels` is the mask coverage of
/// the window and is passed through. Returns `None` when no pixel is valid.
pub fn compute_statistics(crop: ArrayView2<f32>, total_pixels: u64) -> Option<PixelStatistics> {
    let mut valid: Vec<f64> = crop.iter().filter(|v| v.is_finite()).map(|&v| v as f64).collect();
    if valid.is_empty() {
        return None;
    }
    valid.sort_by(|a, b| a.total_cmp(b));

    let sum: f64 = valid.iter().sum();
    let mean = sum / valid.len() as f64;

    Some(PixelStatistics {
        total_pixels,
        valid_pixels: valid.len() as u64,
        min: round5(valid[0]),
        max: round5(valid[valid.len() - 1]),
        mean: round5(mean),
        p10: round5(percentile(&valid, 10.0)?),
        p90: round5(percentile(&valid, 90.0)?),
    })
}
