//! # Image Preprocessing Module
//!
//! Adaptive preprocessing that maximizes label legibility before text
//! recognition: upscaling, blur and orientation diagnostics, and a
//! multi-strategy contrast/threshold search.
//!
//! The module is organized into focused sub-modules:
//! - `buffer`: owned RGBA pixel storage, grayscale, rotation, upscaling
//! - `filtering`: contrast scaling and neighbour averaging
//! - `thresholding`: fixed-threshold binarization
//! - `quality`: blur score and edge score
//! - `orientation`: sideways-capture detection and correction
//! - `strategy`: strategy trials and selection
//! - `types`: shared types and error definitions

pub mod buffer;
pub mod filtering;
pub mod orientation;
pub mod quality;
pub mod strategy;
pub mod thresholding;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use buffer::{upscale_factor, PixelBuffer, DEFAULT_MAX_UPSCALE, DEFAULT_TARGET_LONG_EDGE};
pub use filtering::{neighbor_average, scale_contrast};
pub use orientation::{correct_orientation, edge_energy_ratio, DEFAULT_ROTATION_RATIO_THRESHOLD};
pub use quality::{
    assess_blur, calculate_blur_score, calculate_edge_score, BlurAssessment,
    DEFAULT_BLUR_THRESHOLD,
};
pub use strategy::{apply_strategy, run_all_trials, select_best_trial, select_strategy};
pub use thresholding::binarize;
pub use types::{
    ImageDiagnostics, OrientationResult, PreprocessingError, PreprocessingStrategy, StrategyTrial,
};
