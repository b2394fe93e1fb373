//! # Pipeline Configuration
//!
//! This module provides the single configuration object passed into the
//! pipeline entry point. Nothing in the crate reads ambient global state:
//! verbose tracing, thresholds and engine settings all travel here.

use serde::{Deserialize, Serialize};
use std::env;

use crate::errors::{PipelineError, PipelineResult};
use crate::ocr_config::{InputLimits, RecognitionConfig};
use crate::preprocessing::{
    DEFAULT_BLUR_THRESHOLD, DEFAULT_MAX_UPSCALE, DEFAULT_ROTATION_RATIO_THRESHOLD,
    DEFAULT_TARGET_LONG_EDGE,
};

/// Configuration for one or more pipeline invocations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Raise per-stage diagnostics from debug to info
    pub verbose_logging: bool,
    /// Long-edge target for upscaling small captures
    pub target_long_edge: u32,
    /// Maximum upscale factor
    pub max_upscale: f32,
    /// Blur scores below this are reported as blurry
    pub blur_threshold: f64,
    /// Vertical/horizontal edge ratio above which a capture is rotated
    pub rotation_ratio_threshold: f64,
    /// Run the strategy trials on scoped worker threads
    pub parallel_strategies: bool,
    /// Recognition engine settings
    pub recognition: RecognitionConfig,
    /// Raw input limits
    pub input: InputLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            verbose_logging: false,
            target_long_edge: DEFAULT_TARGET_LONG_EDGE,
            max_upscale: DEFAULT_MAX_UPSCALE,
            blur_threshold: DEFAULT_BLUR_THRESHOLD,
            rotation_ratio_threshold: DEFAULT_ROTATION_RATIO_THRESHOLD,
            parallel_strategies: true,
            recognition: RecognitionConfig::default(),
            input: InputLimits::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> PipelineResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PipelineError::Config(format!("{} has an invalid value: '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> PipelineResult<Self> {
        let mut config = Self::default();

        config.verbose_logging = env::var("MEDSCAN_VERBOSE")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";
        config.target_long_edge = parse_env("MEDSCAN_TARGET_LONG_EDGE", config.target_long_edge)?;
        config.max_upscale = parse_env("MEDSCAN_MAX_UPSCALE", config.max_upscale)?;
        config.blur_threshold = parse_env("MEDSCAN_BLUR_THRESHOLD", config.blur_threshold)?;
        config.parallel_strategies =
            parse_env("MEDSCAN_PARALLEL_STRATEGIES", config.parallel_strategies)?;

        if let Ok(languages) = env::var("OCR_LANGUAGES") {
            config.recognition.languages = languages;
        }
        config.recognition.operation_timeout_ms =
            parse_env("OCR_TIMEOUT_MS", config.recognition.operation_timeout_ms)?;
        config.recognition.max_instances =
            parse_env("OCR_MAX_INSTANCES", config.recognition.max_instances)?;
        config.recognition.user_words_file = env::var("OCR_USER_WORDS_FILE").ok();
        config.input.max_file_size = parse_env("MAX_IMAGE_SIZE_BYTES", config.input.max_file_size)?;
        config.input.max_memory_mb = parse_env("OCR_MEMORY_LIMIT_MB", config.input.max_memory_mb)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> PipelineResult<()> {
        if self.target_long_edge == 0 {
            return Err(PipelineError::Config(
                "target_long_edge must be greater than 0".to_string(),
            ));
        }
        if self.max_upscale.is_nan() || self.max_upscale < 1.0 {
            return Err(PipelineError::Config(format!(
                "max_upscale must be at least 1.0, got {}",
                self.max_upscale
            )));
        }
        if self.blur_threshold.is_nan() || self.blur_threshold <= 0.0 {
            return Err(PipelineError::Config(
                "blur_threshold must be greater than 0".to_string(),
            ));
        }
        if self.rotation_ratio_threshold.is_nan() || self.rotation_ratio_threshold <= 0.0 {
            return Err(PipelineError::Config(
                "rotation_ratio_threshold must be greater than 0".to_string(),
            ));
        }

        self.recognition.validate()?;
        self.input.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = PipelineConfig::default();
        assert!(!config.verbose_logging);
        assert_eq!(config.target_long_edge, 2000);
        assert_eq!(config.max_upscale, 2.0);
        assert_eq!(config.blur_threshold, 100.0);
        assert_eq!(config.rotation_ratio_threshold, 1.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_downscaling_cap() {
        let config = PipelineConfig {
            max_upscale: 0.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_rejects_nan_thresholds() {
        let config = PipelineConfig {
            blur_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nested_sections_are_validated() {
        let mut config = PipelineConfig::default();
        config.recognition.max_instances = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_instances"));
    }

    #[test]
    fn test_config_serializes() {
        let json = serde_json::to_string(&PipelineConfig::default()).unwrap();
        assert!(json.contains("\"verbose_logging\":false"));
    }
}
