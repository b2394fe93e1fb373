//! # Pipeline Error Types
//!
//! This module defines the typed failures the image-to-medication pipeline
//! surfaces to its callers. Field parsing never fails; only loading,
//! allocation, recognition and configuration problems are errors.

use std::fmt;

use crate::ocr_errors::OcrError;
use crate::preprocessing::PreprocessingError;

/// Failure of one pipeline invocation
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Configuration validation errors
    Config(String),
    /// Source bytes could not be decoded into a pixel buffer
    ImageLoad(String),
    /// A working buffer could not be created
    BufferAllocation(String),
    /// The recognition engine failed or timed out
    Recognition(OcrError),
    /// Internal pipeline errors
    Internal(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            PipelineError::ImageLoad(msg) => write!(f, "[IMAGE_LOAD] {}", msg),
            PipelineError::BufferAllocation(msg) => write!(f, "[ALLOCATION] {}", msg),
            PipelineError::Recognition(err) => write!(f, "[RECOGNITION] {}", err),
            PipelineError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Recognition(err) => Some(err),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Internal(err.to_string())
    }
}

impl From<OcrError> for PipelineError {
    fn from(err: OcrError) -> Self {
        PipelineError::Recognition(err)
    }
}

impl From<PreprocessingError> for PipelineError {
    fn from(err: PreprocessingError) -> Self {
        match err {
            PreprocessingError::BufferAllocation { .. } => {
                PipelineError::BufferAllocation(err.to_string())
            }
            PreprocessingError::ImageLoad { .. } | PreprocessingError::InvalidDimensions { .. } => {
                PipelineError::ImageLoad(err.to_string())
            }
        }
    }
}

/// Result type alias for convenience
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Standardized error logging utilities for consistent error reporting across the pipeline
pub mod error_logging {
    use tracing::error;

    /// Log a failed pipeline invocation with image and stage context
    pub fn log_pipeline_error(
        error: &impl std::fmt::Display,
        stage: &str,
        image_size: Option<u64>,
        dimensions: Option<(u32, u32)>,
    ) {
        error!(
            error = %error,
            stage = %stage,
            image_size_bytes = ?image_size,
            dimensions = ?dimensions,
            "Medication image pipeline failed"
        );
    }

    /// Log OCR processing errors with engine and timing context
    pub fn log_ocr_error(
        error: &impl std::fmt::Display,
        operation: &str,
        dimensions: Option<(u32, u32)>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            dimensions = ?dimensions,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "OCR processing failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(
        error: &impl std::fmt::Display,
        config_key: &str,
        operation: &str,
    ) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}
