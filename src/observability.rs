//! Observability module for structured logging setup, spans and metrics.
//!
//! This module provides:
//! - Structured logging with configurable levels (pretty or JSON)
//! - Spans for pipeline and OCR operations
//! - Metrics recorded through the `metrics` facade
//!
//! No metrics exporter is installed here; the embedding service installs its
//! own recorder. Without one, metric calls are no-ops.

use anyhow::Result;
use tracing_subscriber::prelude::*;

use crate::observability_config::ObservabilityConfig;

/// Initialize structured logging with tracing and configuration
///
/// Safe to call more than once: if a global subscriber is already installed
/// the call leaves it in place.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    config.validate().map_err(anyhow::Error::msg)?;

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("medication_label_ocr={}", config.log_level).parse()?);

    // Pretty for development, JSON for others
    let installed = if config.use_pretty_format() {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already installed, keeping it");
        return Ok(());
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Create a span for one pipeline invocation
pub fn pipeline_span(operation: &str) -> tracing::Span {
    tracing::info_span!("pipeline_operation", operation = operation, component = "pipeline")
}

/// Create a span for OCR operations
pub fn ocr_span(operation: &str) -> tracing::Span {
    tracing::info_span!("ocr_operation", operation = operation, component = "ocr")
}

/// Record OCR operation metrics
pub fn record_ocr_metrics(success: bool, duration: std::time::Duration, characters: usize) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!("ocr_operations_total", "result" => result).increment(1);
    metrics::histogram!("ocr_duration_seconds").record(duration.as_secs_f64());
    if success {
        metrics::histogram!("ocr_characters_extracted").record(characters as f64);
    }
}

/// Record which preprocessing strategy won and its edge score
pub fn record_strategy_selected(strategy: &'static str, edge_score: u32) {
    metrics::counter!("preprocessing_strategy_selected_total", "strategy" => strategy).increment(1);
    metrics::histogram!("preprocessing_edge_score").record(f64::from(edge_score));
}

/// Record capture quality diagnostics
pub fn record_image_quality(blur_score: f64, is_blurry: bool, rotation_corrected: bool) {
    metrics::histogram!("image_blur_score").record(blur_score);
    if is_blurry {
        metrics::counter!("images_blurry_total").increment(1);
    }
    if rotation_corrected {
        metrics::counter!("images_rotation_corrected_total").increment(1);
    }
}

/// Record parse outcome for one batch
pub fn record_batch_metrics(confidences: &[u8], duration: std::time::Duration) {
    metrics::histogram!("medication_records_parsed").record(confidences.len() as f64);
    for confidence in confidences {
        metrics::histogram!("medication_record_confidence").record(f64::from(*confidence));
    }
    metrics::histogram!("pipeline_duration_seconds").record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        let config = ObservabilityConfig {
            log_level: "debug".to_string(),
            ..Default::default()
        };
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&config).is_ok());
    }

    #[test]
    fn test_init_tracing_rejects_invalid_level() {
        let config = ObservabilityConfig {
            log_level: "chatty".to_string(),
            ..Default::default()
        };
        assert!(init_tracing(&config).is_err());
    }

    #[test]
    fn test_metrics_without_recorder_are_noops() {
        record_ocr_metrics(true, std::time::Duration::from_millis(5), 42);
        record_strategy_selected("standard", 10);
        record_image_quality(12.5, true, false);
        record_batch_metrics(&[55, 100], std::time::Duration::from_millis(9));
    }
}
