//! # Image Quality Assessment Module
//!
//! Sharpness and edge-clarity measurements. The blur score is a diagnostic
//! surfaced to the capture UI; the edge score ranks binarization strategies.

use tracing;

use super::buffer::PixelBuffer;

/// Blur scores below this value are classified as blurry.
pub const DEFAULT_BLUR_THRESHOLD: f64 = 100.0;

/// Luma delta above which a sampled pixel pair counts as an edge.
pub const EDGE_DELTA_THRESHOLD: u8 = 200;

/// Pixel step between sampled pairs (every 4th pixel, i.e. a 16-byte RGBA stride).
pub const EDGE_SAMPLE_STEP: usize = 4;

/// Sharpness assessment for one capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurAssessment {
    /// Mean absolute Laplacian × 10
    pub score: f64,
    /// `score` fell below the threshold
    pub is_blurry: bool,
}

/// Scores sharpness as the mean absolute discrete Laplacian over all interior
/// pixels, multiplied by 10.
///
/// Images smaller than 3×3 have no interior and score 0.
pub fn calculate_blur_score(buffer: &PixelBuffer) -> f64 {
    let (width, height) = buffer.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut laplacian_sum = 0.0f64;
    let mut pixel_count = 0u64;

    // Kernel: [[0, 1, 0], [1, -4, 1], [0, 1, 0]]
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = buffer.luma(x, y) as f64;
            let top = buffer.luma(x, y - 1) as f64;
            let bottom = buffer.luma(x, y + 1) as f64;
            let left = buffer.luma(x - 1, y) as f64;
            let right = buffer.luma(x + 1, y) as f64;

            laplacian_sum += (4.0 * center - top - bottom - left - right).abs();
            pixel_count += 1;
        }
    }

    laplacian_sum / pixel_count as f64 * 10.0
}

/// Scores a capture and classifies it against `threshold`.
pub fn assess_blur(buffer: &PixelBuffer, threshold: f64) -> BlurAssessment {
    let start_time = std::time::Instant::now();
    let score = calculate_blur_score(buffer);
    let is_blurry = score < threshold;

    tracing::debug!(
        target: "ocr_preprocessing",
        "Blur assessment completed in {}ms: score={:.2}, blurry={}",
        start_time.elapsed().as_millis(),
        score,
        is_blurry
    );

    BlurAssessment { score, is_blurry }
}

/// Counts sampled adjacent pixel pairs whose luma delta exceeds
/// [`EDGE_DELTA_THRESHOLD`].
///
/// Pairs are taken every [`EDGE_SAMPLE_STEP`] pixels in row-major order, each
/// pixel compared with the next one in memory (pairs may straddle a row end).
pub fn calculate_edge_score(buffer: &PixelBuffer) -> u32 {
    let width = buffer.width() as usize;
    let total = buffer.pixel_count();
    if total < 2 {
        return 0;
    }

    let coords = |p: usize| ((p % width) as u32, (p / width) as u32);

    (0..total - 1)
        .step_by(EDGE_SAMPLE_STEP)
        .filter(|&p| {
            let (x0, y0) = coords(p);
            let (x1, y1) = coords(p + 1);
            buffer.luma(x0, y0).abs_diff(buffer.luma(x1, y1)) > EDGE_DELTA_THRESHOLD
        })
        .count() as u32
}
