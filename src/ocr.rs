//! # OCR Processing Module
//!
//! This module wraps the external text-recognition engine. The pipeline hands
//! over one binarized [`PixelBuffer`] and receives raw text, an overall
//! confidence and a flat, ordered word list with bounding boxes.
//!
//! ## Features
//!
//! - Engine abstraction through the [`TextRecognizer`] trait
//! - Pooled engine instances with guaranteed release (see [`crate::instance_manager`])
//! - Explicit operation timeout, no automatic retries
//! - Cleanup of recognized text and correction of common digit misreads in dosages
//!
//! ## Dependencies
//!
//! - `leptess`: Tesseract bindings, behind the `tesseract` cargo feature
//! - `tokio`: blocking worker and timeout
//! - `regex`: misread correction patterns

use std::sync::Arc;
use std::time::Instant;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};

use crate::errors::error_logging;
use crate::observability;
use crate::ocr_config::RecognitionConfig;
pub use crate::instance_manager::{EngineLease, OcrInstanceManager};
pub use crate::ocr_errors::OcrError;
use crate::preprocessing::PixelBuffer;

/// Rectangular pixel region a recognized word occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl BoundingBox {
    /// Builds a box from engine geometry (left, top, width, height).
    /// Negative coordinates are clamped to zero.
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        let x0 = x.max(0) as u32;
        let y0 = y.max(0) as u32;
        Self {
            x0,
            y0,
            x1: x0.saturating_add(width.max(0) as u32),
            y1: y0.saturating_add(height.max(0) as u32),
        }
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }
}

/// One recognized word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedWord {
    pub text: String,
    pub bbox: BoundingBox,
    /// Engine confidence, 0-100
    pub confidence: f32,
}

/// Output of one recognition call. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Recognized text, one source line per line
    pub text: String,
    /// Engine's overall confidence, 0-100
    pub overall_confidence: f32,
    /// Words in reading order
    pub words: Vec<RecognizedWord>,
}

fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

impl RecognitionResult {
    /// Assembles a result, clamping confidences to 0-100 and dropping empty words.
    pub fn from_parts(text: String, overall_confidence: f32, words: Vec<RecognizedWord>) -> Self {
        let words = words
            .into_iter()
            .filter_map(|mut word| {
                let trimmed = word.text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                if trimmed.len() != word.text.len() {
                    word.text = trimmed.to_string();
                }
                word.confidence = clamp_confidence(word.confidence);
                Some(word)
            })
            .collect();

        Self {
            text,
            overall_confidence: clamp_confidence(overall_confidence),
            words,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A text-recognition engine instance.
///
/// Instances are not required to be `Sync`: the pool hands each one to a
/// single worker at a time.
pub trait TextRecognizer: Send {
    /// Recognizes text in a binarized buffer
    fn recognize(&mut self, buffer: &PixelBuffer) -> Result<RecognitionResult, OcrError>;

    /// Engine name for logs
    fn name(&self) -> &str;
}

/// Recognizer returning fixed text, for wiring and tests without Tesseract.
///
/// Words get synthetic boxes laid out on a 10px-per-character, 20px-per-line grid.
#[derive(Debug, Clone)]
pub struct MockTextRecognizer {
    pub text: String,
    pub confidence: f32,
}

impl MockTextRecognizer {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
        }
    }
}

impl TextRecognizer for MockTextRecognizer {
    fn recognize(&mut self, _buffer: &PixelBuffer) -> Result<RecognitionResult, OcrError> {
        let mut words = Vec::new();
        for (line_idx, line) in self.text.lines().enumerate() {
            let y0 = line_idx as u32 * 20;
            let mut search_from = 0;
            for token in line.split_whitespace() {
                let start = line[search_from..]
                    .find(token)
                    .map_or(search_from, |offset| search_from + offset);
                search_from = start + token.len();
                let x0 = start as u32 * 10;
                let x1 = x0 + token.chars().count() as u32 * 10;
                words.push(RecognizedWord {
                    text: token.to_string(),
                    bbox: BoundingBox { x0, y0, x1, y1: y0 + 16 },
                    confidence: self.confidence,
                });
            }
        }
        Ok(RecognitionResult::from_parts(
            self.text.clone(),
            self.confidence,
            words,
        ))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

lazy_static! {
    /// Dosage amounts with letter/digit confusions, e.g. `1Omg`, `l0 mg`, `2O mcg`
    static ref DOSAGE_MISREAD: Regex = Regex::new(
        r"\b([0-9][0-9OolI]*|[OolI][0-9OolI]*[0-9][0-9OolI]*)(\s?)((?i:mcg|mg|ml|units?|g))\b"
    )
    .expect("Failed to compile DOSAGE_MISREAD regex");
}

/// Blank-line runs longer than this are shortened during cleanup
pub const MAX_BLANK_RUN: usize = 2;

/// Trims every line and shortens blank-line runs to [`MAX_BLANK_RUN`].
///
/// One blank line and two blank lines mean different things to the list
/// segmenter, so runs are capped rather than collapsed. Leading and trailing
/// blank lines are removed.
///
/// # Examples
///
/// ```rust
/// use medication_label_ocr::ocr::clean_recognized_text;
///
/// let cleaned = clean_recognized_text("  Amoxicillin 500mg \n\n\n\n  Take 1 capsule  \n");
/// assert_eq!(cleaned, "Amoxicillin 500mg\n\n\nTake 1 capsule");
/// ```
pub fn clean_recognized_text(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    // Starts saturated so leading blank lines are dropped
    let mut blank_run = MAX_BLANK_RUN;

    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            if blank_run < MAX_BLANK_RUN {
                lines.push("");
            }
            blank_run += 1;
        } else {
            lines.push(line);
            blank_run = 0;
        }
    }

    while lines.last() == Some(&"") {
        lines.pop();
    }

    lines.join("\n")
}

/// Correct common OCR digit misreads inside dosage amounts
///
/// Tesseract often reads `0` as `O`/`o` and `1` as `l`/`I` when they sit next
/// to a unit. Only tokens containing at least one real digit and directly
/// followed by a dosage unit are touched.
pub fn correct_dosage_misreads(text: &str) -> String {
    DOSAGE_MISREAD
        .replace_all(text, |caps: &regex::Captures| {
            let amount: String = caps[1]
                .chars()
                .map(|c| match c {
                    'O' | 'o' => '0',
                    'l' | 'I' => '1',
                    other => other,
                })
                .collect();
            if amount != caps[1] {
                debug!("OCR correction: '{}' -> '{}'", &caps[1], amount);
            }
            format!("{}{}{}", amount, &caps[2], &caps[3])
        })
        .into_owned()
}

/// Applies text cleanup and misread correction to an engine result.
///
/// Word texts get the same misread correction so they agree with `text`.
pub fn finalize_recognition(raw: RecognitionResult) -> RecognitionResult {
    let text = correct_dosage_misreads(&clean_recognized_text(&raw.text));
    let words = raw
        .words
        .into_iter()
        .map(|word| RecognizedWord {
            text: correct_dosage_misreads(&word.text),
            ..word
        })
        .collect();
    RecognitionResult::from_parts(text, raw.overall_confidence, words)
}

/// Runs recognition on a pooled engine instance with an explicit timeout.
///
/// Acquire, recognize and release happen on a blocking worker thread. The
/// engine lease is returned to the pool on every exit path; when the timeout
/// fires first, the worker keeps its lease until the engine call finishes and
/// releases it then. Failures are surfaced immediately, nothing is retried.
///
/// # Errors
///
/// - `OcrError::EngineUnavailable` - no instance free before the timeout
/// - `OcrError::Initialization` - the factory could not build an instance
/// - `OcrError::Extraction` - the engine rejected the buffer or the worker panicked
/// - `OcrError::Timeout` - the whole operation exceeded `operation_timeout_ms`
pub async fn recognize_text(
    buffer: PixelBuffer,
    config: &RecognitionConfig,
    instance_manager: Arc<OcrInstanceManager>,
) -> Result<RecognitionResult, OcrError> {
    let span = observability::ocr_span("recognize_text");

    async move {
        let start_time = Instant::now();
        let dimensions = buffer.dimensions();
        let timeout_duration = config.operation_timeout();

        let worker = tokio::task::spawn_blocking(move || {
            let mut engine = instance_manager.acquire(timeout_duration)?;
            debug!(engine = engine.name(), "Acquired recognition engine");
            engine.recognize(&buffer)
        });

        let outcome = match tokio::time::timeout(timeout_duration, worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(OcrError::Extraction(format!(
                "Recognition worker failed: {}",
                join_error
            ))),
            Err(_) => Err(OcrError::Timeout(format!(
                "recognition did not finish within {}ms",
                config.operation_timeout_ms
            ))),
        };

        let duration = start_time.elapsed();

        match outcome {
            Ok(raw) => {
                let result = finalize_recognition(raw);
                observability::record_ocr_metrics(true, duration, result.text.len());
                info!(
                    duration_ms = duration.as_millis(),
                    characters = result.text.len(),
                    words = result.words.len(),
                    confidence = result.overall_confidence,
                    "OCR processing completed"
                );
                debug!(text = %result.text, "Recognized text");
                Ok(result)
            }
            Err(err) => {
                observability::record_ocr_metrics(false, duration, 0);
                warn!("OCR processing failed after {}ms: {}", duration.as_millis(), err);
                error_logging::log_ocr_error(
                    &err,
                    "recognize_text",
                    Some(dimensions),
                    Some(duration),
                );
                Err(err)
            }
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_recognized_text_caps_blank_runs() {
        let raw = "\n\n  1. Metformin 500mg  \n\n\n\n2. Lisinopril 10mg\n   \n";
        assert_eq!(
            clean_recognized_text(raw),
            "1. Metformin 500mg\n\n\n2. Lisinopril 10mg"
        );
    }

    #[test]
    fn test_clean_recognized_text_keeps_single_blank_line() {
        let raw = "* Metformin 500mg\n  \nTake 1 tablet by mouth twice daily";
        assert_eq!(
            clean_recognized_text(raw),
            "* Metformin 500mg\n\nTake 1 tablet by mouth twice daily"
        );
    }

    #[test]
    fn test_clean_recognized_text_empty() {
        assert_eq!(clean_recognized_text("  \n \n"), "");
    }

    #[test]
    fn test_correct_dosage_misreads() {
        assert_eq!(correct_dosage_misreads("Lisinopril 1Omg"), "Lisinopril 10mg");
        assert_eq!(correct_dosage_misreads("Take l0 mg daily"), "Take 10 mg daily");
        assert_eq!(correct_dosage_misreads("Levothyroxine 5O mcg"), "Levothyroxine 50 mcg");
    }

    #[test]
    fn test_correct_dosage_misreads_leaves_words_alone() {
        let text = "Oral tablet\nIOU mg\nTake 1 daily";
        assert_eq!(correct_dosage_misreads(text), text);
        assert_eq!(correct_dosage_misreads("0.5mg"), "0.5mg");
    }

    #[test]
    fn test_bounding_box_from_xywh() {
        let bbox = BoundingBox::from_xywh(-3, 10, 40, 12);
        assert_eq!(bbox, BoundingBox { x0: 0, y0: 10, x1: 40, y1: 22 });
        assert_eq!(bbox.width(), 40);
        assert_eq!(bbox.height(), 12);
    }

    #[test]
    fn test_from_parts_clamps_and_drops_empty_words() {
        let words = vec![
            RecognizedWord {
                text: " Rx ".to_string(),
                bbox: BoundingBox::default(),
                confidence: 120.0,
            },
            RecognizedWord {
                text: "   ".to_string(),
                bbox: BoundingBox::default(),
                confidence: 50.0,
            },
        ];
        let result = RecognitionResult::from_parts("Rx".to_string(), -4.0, words);
        assert_eq!(result.overall_confidence, 0.0);
        assert_eq!(result.words.len(), 1);
        assert_eq!(result.words[0].text, "Rx");
        assert_eq!(result.words[0].confidence, 100.0);
    }

    #[test]
    fn test_mock_recognizer_words_in_reading_order() {
        let mut engine = MockTextRecognizer::new("Metformin 500mg\nTake 1 tablet", 91.0);
        let buffer = PixelBuffer::allocate(4, 4).unwrap();
        let result = engine.recognize(&buffer).unwrap();

        let texts: Vec<&str> = result.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Metformin", "500mg", "Take", "1", "tablet"]);
        assert_eq!(result.words[1].bbox.x0, 100);
        assert_eq!(result.words[2].bbox.y0, 20);
        assert_eq!(result.overall_confidence, 91.0);
    }

    #[test]
    fn test_finalize_recognition_cleans_text() {
        let raw =
            RecognitionResult::from_parts(" Aspirin 8lmg \n\n\n".to_string(), 77.0, Vec::new());
        let result = finalize_recognition(raw);
        assert_eq!(result.text, "Aspirin 81mg");
        assert_eq!(result.overall_confidence, 77.0);
    }

    #[test]
    fn test_finalize_recognition_corrects_word_texts() {
        let mut engine = MockTextRecognizer::new("Metformin 5OOmg", 90.0);
        let buffer = PixelBuffer::allocate(4, 4).unwrap();
        let result = finalize_recognition(engine.recognize(&buffer).unwrap());

        assert_eq!(result.text, "Metformin 500mg");
        let texts: Vec<&str> = result.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Metformin", "500mg"]);
        assert_eq!(result.words[1].bbox.x0, 100);
    }
}
