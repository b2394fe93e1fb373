//! # OCR Configuration Module
//!
//! This module defines configuration structures for text recognition and for
//! the image input boundary, including engine settings, timeouts and
//! format-specific size limits.

use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, PipelineResult};

// Constants for OCR configuration
pub const DEFAULT_LANGUAGES: &str = "eng";
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_INSTANCES: usize = 2;
pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024; // 20MB limit for captured images
pub const DEFAULT_MAX_MEMORY_MB: f64 = 120.0;

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PageSegMode {
    /// Fully automatic page segmentation
    #[default]
    Auto = 3,
    /// Assume a single column of text
    SingleColumn = 4,
    /// Assume a single uniform block of text
    SingleBlock = 6,
    /// Find as much text as possible in no particular order
    SparseText = 11,
}

impl PageSegMode {
    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SparseText => "11",
        }
    }
}

/// Tesseract model type for different accuracy/speed trade-offs
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ModelType {
    /// Fast model (tessdata_fast) - faster processing, lower accuracy
    #[default]
    Fast,
    /// Best model (tessdata_best) - slower processing, higher accuracy
    Best,
}

impl ModelType {
    /// Get the tessdata directory name for this model type
    pub fn tessdata_dir(&self) -> &'static str {
        match self {
            ModelType::Fast => "tessdata_fast",
            ModelType::Best => "tessdata_best",
        }
    }
}

/// Configuration of the recognition adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// OCR language codes (e.g., "eng", "eng+fra")
    pub languages: String,
    /// Tesseract model type (Fast vs Best accuracy)
    pub model_type: ModelType,
    /// Page segmentation mode
    pub psm_mode: PageSegMode,
    /// Path to a user words file (drug names) for improved recognition
    pub user_words_file: Option<String>,
    /// Character whitelist restricting OCR output
    pub character_whitelist: Option<String>,
    /// Timeout for one acquire + recognize cycle in milliseconds
    pub operation_timeout_ms: u64,
    /// Maximum number of engine instances held by the pool
    pub max_instances: usize,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            model_type: ModelType::default(),
            psm_mode: PageSegMode::default(),
            user_words_file: None,
            character_whitelist: None,
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            max_instances: DEFAULT_MAX_INSTANCES,
        }
    }
}

impl RecognitionConfig {
    /// Operation timeout as a `Duration`
    pub fn operation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.operation_timeout_ms)
    }

    /// Validate recognition configuration parameters
    pub fn validate(&self) -> PipelineResult<()> {
        if self.languages.trim().is_empty() {
            return Err(PipelineError::Config(
                "languages cannot be empty".to_string(),
            ));
        }
        if self.operation_timeout_ms == 0 {
            return Err(PipelineError::Config(
                "operation_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_instances == 0 {
            return Err(PipelineError::Config(
                "max_instances must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Format-specific byte limits for accepted image formats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatSizeLimits {
    /// PNG format limit (higher due to lossless screenshots of labels)
    pub png_max: u64,
    /// JPEG format limit (typical phone capture)
    pub jpeg_max: u64,
    /// BMP format limit (lower due to uncompressed nature)
    pub bmp_max: u64,
    /// TIFF format limit (scanner output)
    pub tiff_max: u64,
    /// WebP format limit (browser uploads)
    pub webp_max: u64,
}

impl Default for FormatSizeLimits {
    fn default() -> Self {
        Self {
            png_max: 15 * 1024 * 1024,  // 15MB for PNG
            jpeg_max: 10 * 1024 * 1024, // 10MB for JPEG
            bmp_max: 5 * 1024 * 1024,   // 5MB for BMP
            tiff_max: 20 * 1024 * 1024, // 20MB for TIFF
            webp_max: 10 * 1024 * 1024, // 10MB for WebP
        }
    }
}

impl FormatSizeLimits {
    /// Validate format size limits
    pub fn validate(&self) -> PipelineResult<()> {
        for (name, value) in [
            ("png_max", self.png_max),
            ("jpeg_max", self.jpeg_max),
            ("bmp_max", self.bmp_max),
            ("tiff_max", self.tiff_max),
            ("webp_max", self.webp_max),
        ] {
            if value == 0 {
                return Err(PipelineError::Config(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Limits applied to raw image input before decoding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputLimits {
    /// Maximum allowed input size in bytes (general limit)
    pub max_file_size: u64,
    /// Format-specific size limits
    pub format_limits: FormatSizeLimits,
    /// Maximum estimated decode memory in megabytes
    pub max_memory_mb: f64,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            format_limits: FormatSizeLimits::default(),
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
        }
    }
}

impl InputLimits {
    /// Validate input limits
    pub fn validate(&self) -> PipelineResult<()> {
        if self.max_file_size == 0 {
            return Err(PipelineError::Config(
                "max_file_size must be greater than 0".to_string(),
            ));
        }
        if self.max_memory_mb <= 0.0 {
            return Err(PipelineError::Config(
                "max_memory_mb must be greater than 0".to_string(),
            ));
        }
        self.format_limits.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognition_config_defaults() {
        let config = RecognitionConfig::default();
        assert_eq!(config.languages, "eng");
        assert_eq!(config.operation_timeout_ms, 30_000);
        assert_eq!(config.max_instances, 2);
        assert_eq!(config.psm_mode.as_str(), "3");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_recognition_config_rejects_zero_timeout() {
        let config = RecognitionConfig {
            operation_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_recognition_config_rejects_empty_languages() {
        let config = RecognitionConfig {
            languages: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_format_size_limits_defaults() {
        let limits = FormatSizeLimits::default();
        assert_eq!(limits.png_max, 15 * 1024 * 1024);
        assert_eq!(limits.jpeg_max, 10 * 1024 * 1024);
        assert_eq!(limits.bmp_max, 5 * 1024 * 1024);
        assert_eq!(limits.tiff_max, 20 * 1024 * 1024);
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_input_limits_reject_zero_format_limit() {
        let limits = InputLimits {
            format_limits: FormatSizeLimits {
                bmp_max: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = limits.validate().unwrap_err();
        assert!(err.to_string().contains("bmp_max"));
    }

    #[test]
    fn test_model_type_tessdata_dir() {
        assert_eq!(ModelType::Fast.tessdata_dir(), "tessdata_fast");
        assert_eq!(ModelType::Best.tessdata_dir(), "tessdata_best");
    }
}
