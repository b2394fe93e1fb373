//! # Orientation Detection Module
//!
//! Coarse detection of sideways photographs from edge-energy ratios. This
//! only recovers the common 90° case; it is not a fine deskew.

use tracing;

use super::buffer::PixelBuffer;
use super::types::{OrientationResult, PreprocessingError};

/// Ratio of vertical to horizontal edge energy above which a capture is
/// treated as rotated.
pub const DEFAULT_ROTATION_RATIO_THRESHOLD: f64 = 1.2;

/// Grid spacing and edge margin of the energy sampler, in pixels.
pub const SAMPLE_STRIDE: u32 = 10;

/// Accumulates horizontal (`|p - right|`) and vertical (`|p - below|`) luma
/// differences on a coarse grid and returns `vertical / (horizontal + 1)`.
pub fn edge_energy_ratio(buffer: &PixelBuffer) -> f64 {
    let (width, height) = buffer.dimensions();
    let mut horizontal = 0u64;
    let mut vertical = 0u64;

    if width > 2 * SAMPLE_STRIDE && height > 2 * SAMPLE_STRIDE {
        for y in (SAMPLE_STRIDE..height - SAMPLE_STRIDE).step_by(SAMPLE_STRIDE as usize) {
            for x in (SAMPLE_STRIDE..width - SAMPLE_STRIDE).step_by(SAMPLE_STRIDE as usize) {
                let here = buffer.luma(x, y);
                horizontal += here.abs_diff(buffer.luma(x + 1, y)) as u64;
                vertical += here.abs_diff(buffer.luma(x, y + 1)) as u64;
            }
        }
    }

    vertical as f64 / (horizontal as f64 + 1.0)
}

/// Detects a sideways capture and rotates the buffer 90° when the edge-energy
/// ratio exceeds `ratio_threshold`.
///
/// Only a 90° correction is ever applied. The ratio cannot tell 90° from 270°
/// (or 180° from upright), and the heuristic deliberately stays at 90°.
pub fn correct_orientation(
    buffer: PixelBuffer,
    ratio_threshold: f64,
) -> Result<OrientationResult, PreprocessingError> {
    let ratio = edge_energy_ratio(&buffer);

    if ratio > ratio_threshold {
        let rotated = buffer.rotate90()?;
        tracing::debug!(
            target: "ocr_preprocessing",
            "Edge ratio {:.3} exceeds {:.2}, rotated to {}x{}",
            ratio,
            ratio_threshold,
            rotated.width(),
            rotated.height()
        );
        return Ok(OrientationResult {
            buffer: rotated,
            ratio,
            rotation_degrees: 90,
        });
    }

    tracing::debug!(
        target: "ocr_preprocessing",
        "Edge ratio {:.3} within {:.2}, orientation unchanged",
        ratio,
        ratio_threshold
    );

    Ok(OrientationResult {
        buffer,
        ratio,
        rotation_degrees: 0,
    })
}
