//! # Tesseract Recognition Backend
//!
//! [`TextRecognizer`] implementation on top of Tesseract via `leptess`.
//! Compiled only with the `tesseract` cargo feature, which requires the
//! Tesseract and Leptonica system libraries.

use leptess::{LepTess, Variable};
use tracing::{debug, info};

use crate::ocr::{BoundingBox, RecognitionResult, RecognizedWord, TextRecognizer};
use crate::ocr_config::{ModelType, RecognitionConfig};
use crate::ocr_errors::OcrError;
use crate::preprocessing::PixelBuffer;

/// One initialized Tesseract engine
pub struct TesseractRecognizer {
    tess: LepTess,
    languages: String,
}

impl TesseractRecognizer {
    /// Initialize Tesseract with the configured languages, model and variables
    ///
    /// # Errors
    ///
    /// Returns `OcrError::Initialization` if the language data cannot be
    /// loaded or a variable is rejected.
    pub fn new(config: &RecognitionConfig) -> Result<Self, OcrError> {
        let tessdata_path = tessdata_path(config.model_type);

        let mut tess = LepTess::new(tessdata_path.as_deref(), &config.languages).map_err(|e| {
            OcrError::Initialization(format!("Failed to initialize Tesseract OCR instance: {}", e))
        })?;

        tess.set_variable(Variable::TesseditPagesegMode, config.psm_mode.as_str())
            .map_err(|e| OcrError::Initialization(format!("Failed to set PSM mode: {}", e)))?;

        if let Some(user_words_path) = &config.user_words_file {
            tess.set_variable(Variable::UserWordsFile, user_words_path)
                .map_err(|e| {
                    OcrError::Initialization(format!("Failed to set user words file: {}", e))
                })?;
            info!(
                "Configured Tesseract with custom user words file: {}",
                user_words_path
            );
        }

        if let Some(whitelist) = &config.character_whitelist {
            tess.set_variable(Variable::TesseditCharWhitelist, whitelist)
                .map_err(|e| {
                    OcrError::Initialization(format!("Failed to set character whitelist: {}", e))
                })?;
            info!(
                "Configured Tesseract with character whitelist: {} characters",
                whitelist.len()
            );
        }

        info!(
            "Initialized Tesseract for languages: {} with model: {}",
            config.languages,
            config.model_type.tessdata_dir()
        );

        Ok(Self {
            tess,
            languages: config.languages.clone(),
        })
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }

    fn word_boxes(&mut self, width: u32, height: u32) -> Vec<RecognizedWord> {
        let boxes = match self
            .tess
            .get_component_boxes(leptess::capi::TessPageIteratorLevel_RIL_WORD, true)
        {
            Some(boxes) => boxes,
            None => return Vec::new(),
        };

        let mut words = Vec::new();
        for component in &boxes {
            let geom = component.get_geometry();
            self.tess.set_rectangle(geom.x, geom.y, geom.w, geom.h);

            let text = self.tess.get_utf8_text().unwrap_or_default();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            words.push(RecognizedWord {
                text: text.to_string(),
                bbox: BoundingBox::from_xywh(geom.x, geom.y, geom.w, geom.h),
                confidence: self.tess.mean_text_conf().max(0) as f32,
            });
        }

        self.tess.set_rectangle(0, 0, width as i32, height as i32);
        words
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&mut self, buffer: &PixelBuffer) -> Result<RecognitionResult, OcrError> {
        let png = buffer.encode_png()?;

        self.tess.set_image_from_mem(&png).map_err(|e| {
            OcrError::Extraction(format!("Failed to load image for OCR: {}", e))
        })?;

        let text = self.tess.get_utf8_text().map_err(|e| {
            OcrError::Extraction(format!("Failed to extract text from image: {}", e))
        })?;
        let overall_confidence = self.tess.mean_text_conf().max(0) as f32;

        let words = self.word_boxes(buffer.width(), buffer.height());
        debug!(
            words = words.len(),
            confidence = overall_confidence,
            "Tesseract recognition finished"
        );

        Ok(RecognitionResult::from_parts(text, overall_confidence, words))
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

/// Find the tessdata directory for the specified model type
///
/// Falls back to Tesseract's default lookup (`None`) when no model-specific
/// directory is installed.
pub fn tessdata_path(model_type: ModelType) -> Option<String> {
    let possible_paths = match model_type {
        ModelType::Fast => [
            "/usr/share/tesseract-ocr/5/tessdata_fast",
            "/usr/share/tesseract-ocr/4.00/tessdata_fast",
            "/usr/share/tessdata_fast",
            "/usr/local/share/tessdata_fast",
        ],
        ModelType::Best => [
            "/usr/share/tesseract-ocr/5/tessdata_best",
            "/usr/share/tesseract-ocr/4.00/tessdata_best",
            "/usr/share/tessdata_best",
            "/usr/local/share/tessdata_best",
        ],
    };

    for path in possible_paths {
        if std::path::Path::new(path).exists() {
            info!("Using tessdata path: {}", path);
            return Some(path.to_string());
        }
    }

    debug!(
        "No specific tessdata path found for model type {:?}, using default",
        model_type
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{binarize, PixelBuffer};

    fn engine_available() -> bool {
        LepTess::new(None, "eng").is_ok()
    }

    #[test]
    fn test_blank_page_yields_no_words() {
        if !engine_available() {
            eprintln!("skipping: no tessdata installed");
            return;
        }
        let mut engine = TesseractRecognizer::new(&RecognitionConfig::default()).unwrap();
        let blank = binarize(PixelBuffer::from_gray_fn(120, 60, |_, _| 255).unwrap(), 128);

        let result = engine.recognize(&blank).unwrap();
        assert!(result.words.is_empty());
        assert!(result.text.trim().is_empty());
    }

    #[test]
    fn test_invalid_language_fails_initialization() {
        let config = RecognitionConfig {
            languages: "no_such_language".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            TesseractRecognizer::new(&config),
            Err(OcrError::Initialization(_))
        ));
    }
}
