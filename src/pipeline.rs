//! # Medication Image Pipeline
//!
//! End-to-end entry point: raw capture in, ordered medication records out.
//!
//! ```text
//! load → upscale → blur + orientation diagnostics → preview copy
//!      → grayscale → strategy selection → recognition (worker + timeout)
//!      → segmentation → field parsing → confidence
//! ```
//!
//! Every buffer and intermediate result is owned by the invocation; the only
//! shared resource is the recognition engine pool.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, Instrument};

use crate::config::PipelineConfig;
use crate::errors::{error_logging, PipelineError, PipelineResult};
use crate::input::{load_image, ImageSource};
use crate::instance_manager::OcrInstanceManager;
use crate::medication_parser::ParsedBatch;
use crate::observability;
use crate::ocr::{recognize_text, RecognitionResult};
use crate::preprocessing::{
    assess_blur, correct_orientation, select_strategy, ImageDiagnostics, PixelBuffer,
};
use crate::segmentation::parse_multiple_medications;

/// Output of the preprocessing stage
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    /// Winning binarized buffer, fed to recognition
    pub binarized: PixelBuffer,
    /// Scaled and oriented full-color buffer for the capture UI
    pub preview: PixelBuffer,
    pub diagnostics: ImageDiagnostics,
}

/// Result of one pipeline invocation
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Parsed medications in text order; may be empty
    pub batch: ParsedBatch,
    /// Scaled, oriented color preview
    pub preview: PixelBuffer,
    pub diagnostics: ImageDiagnostics,
    /// Cleaned recognition output
    pub recognition: RecognitionResult,
    pub processed_at: DateTime<Utc>,
}

impl PipelineOutput {
    pub fn preview_dimensions(&self) -> (u32, u32) {
        self.preview.dimensions()
    }
}

/// Runs the synchronous preprocessing stage on a decoded buffer.
///
/// Blur and rotation are diagnostics only and never stop processing.
///
/// # Errors
///
/// `PipelineError::BufferAllocation` when a working buffer cannot be created.
pub fn preprocess(
    buffer: PixelBuffer,
    config: &PipelineConfig,
) -> PipelineResult<PreprocessedImage> {
    let start_time = Instant::now();
    let (source_width, source_height) = buffer.dimensions();

    let scaled = buffer.upscale(config.target_long_edge, config.max_upscale)?;
    let blur = assess_blur(&scaled, config.blur_threshold);
    let oriented = correct_orientation(scaled, config.rotation_ratio_threshold)?;
    let rotation_degrees = oriented.rotation_degrees;
    let rotation_corrected = oriented.rotation_corrected();

    let preview = oriented.buffer.try_clone()?;
    let grayscale = oriented.buffer.to_grayscale();
    let winner = select_strategy(&grayscale, config.parallel_strategies, config.verbose_logging)?;

    let diagnostics = ImageDiagnostics {
        blur_score: blur.score,
        is_blurry: blur.is_blurry,
        rotation_degrees,
        rotation_corrected,
        strategy: winner.strategy,
        edge_score: winner.edge_score,
    };

    observability::record_image_quality(blur.score, blur.is_blurry, rotation_corrected);
    observability::record_strategy_selected(winner.strategy.as_str(), winner.edge_score);

    if config.verbose_logging {
        info!(
            source_width,
            source_height,
            width = preview.width(),
            height = preview.height(),
            blur_score = diagnostics.blur_score,
            is_blurry = diagnostics.is_blurry,
            rotation_degrees,
            strategy = %diagnostics.strategy,
            edge_score = diagnostics.edge_score,
            duration_ms = start_time.elapsed().as_millis(),
            "Preprocessing completed"
        );
    } else {
        debug!(
            source_width,
            source_height,
            blur_score = diagnostics.blur_score,
            rotation_degrees,
            strategy = %diagnostics.strategy,
            duration_ms = start_time.elapsed().as_millis(),
            "Preprocessing completed"
        );
    }

    Ok(PreprocessedImage {
        binarized: winner.buffer,
        preview,
        diagnostics,
    })
}

/// Processes one medication label capture.
///
/// Load, allocation and recognition failures are returned immediately and
/// nothing is retried. Finding no medication is not an error: the batch is
/// simply empty.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use medication_label_ocr::config::PipelineConfig;
/// use medication_label_ocr::input::ImageSource;
/// use medication_label_ocr::instance_manager::OcrInstanceManager;
/// use medication_label_ocr::ocr::{MockTextRecognizer, TextRecognizer};
/// use medication_label_ocr::pipeline::process_medication_image;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::default();
/// let engines = Arc::new(OcrInstanceManager::new(config.recognition.max_instances, || {
///     Ok(Box::new(MockTextRecognizer::new("Lisinopril 10mg", 90.0)) as Box<dyn TextRecognizer>)
/// }));
///
/// let output = process_medication_image(
///     ImageSource::File("label.jpg".into()),
///     &config,
///     engines,
/// )
/// .await?;
/// println!("{}", output.batch.to_json()?);
/// # Ok(())
/// # }
/// ```
pub async fn process_medication_image(
    source: ImageSource,
    config: &PipelineConfig,
    instance_manager: Arc<OcrInstanceManager>,
) -> PipelineResult<PipelineOutput> {
    let span = observability::pipeline_span("process_medication_image");

    async move {
        let start_time = Instant::now();

        if let Err(err) = config.validate() {
            error_logging::log_config_error(&err, "pipeline_config", "process_medication_image");
            return Err(err);
        }

        let source_reference = source.reference();
        let buffer = load_image(source, &config.input).map_err(|err| {
            error_logging::log_pipeline_error(&err, "load", None, None);
            err
        })?;
        let dimensions = buffer.dimensions();

        let prepared = preprocess(buffer, config).map_err(|err| {
            error_logging::log_pipeline_error(&err, "preprocess", None, Some(dimensions));
            err
        })?;
        let PreprocessedImage {
            binarized,
            preview,
            diagnostics,
        } = prepared;

        let recognition = recognize_text(binarized, &config.recognition, instance_manager)
            .await
            .map_err(|err| {
                let err = PipelineError::from(err);
                error_logging::log_pipeline_error(&err, "recognition", None, Some(dimensions));
                err
            })?;

        if config.verbose_logging {
            info!(
                text = %recognition.text,
                confidence = recognition.overall_confidence,
                "Recognized label text"
            );
        } else {
            debug!(characters = recognition.text.len(), "Recognized label text");
        }

        let mut batch = parse_multiple_medications(&recognition.text);
        if let Some(reference) = &source_reference {
            batch = batch.with_source_image(reference);
        }

        let confidences: Vec<u8> = batch.iter().map(|record| record.confidence).collect();
        observability::record_batch_metrics(&confidences, start_time.elapsed());

        info!(
            records = batch.len(),
            confidences = ?confidences,
            is_blurry = diagnostics.is_blurry,
            rotation_corrected = diagnostics.rotation_corrected,
            strategy = %diagnostics.strategy,
            duration_ms = start_time.elapsed().as_millis(),
            "Medication image processed"
        );

        Ok(PipelineOutput {
            batch,
            preview,
            diagnostics,
            recognition,
            processed_at: Utc::now(),
        })
    }
    .instrument(span)
    .await
}
