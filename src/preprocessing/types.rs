//! # Shared Types for Image Preprocessing
//!
//! This module contains the shared types, structs, and enums used across
//! the preprocessing sub-modules.

use serde::{Deserialize, Serialize};

use super::buffer::PixelBuffer;

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessingError {
    /// Source bytes could not be decoded into a pixel buffer
    ImageLoad { message: String },
    /// A working buffer could not be allocated
    BufferAllocation { width: u32, height: u32 },
    /// Pixel data does not match the declared dimensions
    InvalidDimensions {
        width: u32,
        height: u32,
        data_len: usize,
    },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::ImageLoad { message } => {
                write!(f, "Failed to load image: {}", message)
            }
            PreprocessingError::BufferAllocation { width, height } => {
                write!(
                    f,
                    "Failed to allocate working buffer of {}x{} pixels",
                    width, height
                )
            }
            PreprocessingError::InvalidDimensions {
                width,
                height,
                data_len,
            } => {
                write!(
                    f,
                    "Pixel data length {} does not match {}x{} RGBA dimensions",
                    data_len, width, height
                )
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

/// Competing preprocessing strategies, in selection priority order.
///
/// Declaration order matters: when two strategies produce the same edge score
/// the one declared first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreprocessingStrategy {
    /// Contrast 1.5, threshold 128
    Standard,
    /// Contrast 2.0, threshold 140, for faded or low-ink labels
    HighContrast,
    /// 5-point neighbour averaging, threshold 128, for grainy captures
    Denoise,
    /// Contrast 2.5, threshold 120, last resort for very poor sources
    Aggressive,
}

impl PreprocessingStrategy {
    /// All strategies in declaration order.
    pub const ALL: [PreprocessingStrategy; 4] = [
        PreprocessingStrategy::Standard,
        PreprocessingStrategy::HighContrast,
        PreprocessingStrategy::Denoise,
        PreprocessingStrategy::Aggressive,
    ];

    /// Stable name used in logs, metrics and diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            PreprocessingStrategy::Standard => "standard",
            PreprocessingStrategy::HighContrast => "high_contrast",
            PreprocessingStrategy::Denoise => "denoise",
            PreprocessingStrategy::Aggressive => "aggressive",
        }
    }

    /// Contrast factor applied before binarization, if any.
    pub fn contrast_factor(&self) -> Option<f32> {
        match self {
            PreprocessingStrategy::Standard => Some(1.5),
            PreprocessingStrategy::HighContrast => Some(2.0),
            PreprocessingStrategy::Denoise => None,
            PreprocessingStrategy::Aggressive => Some(2.5),
        }
    }

    /// Binarization threshold.
    pub fn threshold(&self) -> u8 {
        match self {
            PreprocessingStrategy::Standard => 128,
            PreprocessingStrategy::HighContrast => 140,
            PreprocessingStrategy::Denoise => 128,
            PreprocessingStrategy::Aggressive => 120,
        }
    }
}

impl std::fmt::Display for PreprocessingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one strategy run over its own copy of the source buffer.
#[derive(Debug, Clone)]
pub struct StrategyTrial {
    /// Strategy that produced the buffer
    pub strategy: PreprocessingStrategy,
    /// Binarized output
    pub buffer: PixelBuffer,
    /// Count of high-delta sampled pixel pairs
    pub edge_score: u32,
}

/// Capture diagnostics surfaced to the caller so the UI can offer a retake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDiagnostics {
    /// Laplacian sharpness estimate (higher is sharper)
    pub blur_score: f64,
    /// `blur_score` fell below the configured threshold
    pub is_blurry: bool,
    /// Applied rotation: 0 or 90
    pub rotation_degrees: u16,
    /// The working buffer was rotated before recognition
    pub rotation_corrected: bool,
    /// Winning preprocessing strategy
    pub strategy: PreprocessingStrategy,
    /// Edge score of the winning strategy
    pub edge_score: u32,
}

/// Result of the rotation heuristic.
#[derive(Debug, Clone)]
pub struct OrientationResult {
    /// Buffer after any correction (unchanged when not rotated)
    pub buffer: PixelBuffer,
    /// Vertical / horizontal edge-energy ratio
    pub ratio: f64,
    /// Applied rotation: 0 or 90
    pub rotation_degrees: u16,
}

impl OrientationResult {
    pub fn rotation_corrected(&self) -> bool {
        self.rotation_degrees != 0
    }
}
