//! # Pipeline Tests
//!
//! End-to-end runs with in-process recognizers standing in for Tesseract.

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use base64::Engine as _;
    use medication_label_ocr::config::PipelineConfig;
    use medication_label_ocr::errors::PipelineError;
    use medication_label_ocr::input::ImageSource;
    use medication_label_ocr::instance_manager::OcrInstanceManager;
    use medication_label_ocr::ocr::{MockTextRecognizer, RecognitionResult, TextRecognizer};
    use medication_label_ocr::ocr_errors::OcrError;
    use medication_label_ocr::pipeline::process_medication_image;
    use medication_label_ocr::preprocessing::PixelBuffer;
    use tempfile::NamedTempFile;

    const TWO_PRESCRIPTIONS: &str = "Rx: 123456\nMetformin 5OOmg\nTake 1 tablet by mouth twice daily\n\n\nRx: 654321\nLisinopril l0 mg\nTake 1 tablet by mouth once daily";

    struct FailingRecognizer;

    impl TextRecognizer for FailingRecognizer {
        fn recognize(&mut self, _buffer: &PixelBuffer) -> Result<RecognitionResult, OcrError> {
            Err(OcrError::Extraction("engine rejected image".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct SlowRecognizer(Duration);

    impl TextRecognizer for SlowRecognizer {
        fn recognize(&mut self, _buffer: &PixelBuffer) -> Result<RecognitionResult, OcrError> {
            std::thread::sleep(self.0);
            Ok(RecognitionResult::from_parts("Aspirin 81mg".to_string(), 80.0, Vec::new()))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn label_png() -> Vec<u8> {
        // Upright strokes only; rows are identical so the capture never reads as sideways
        PixelBuffer::from_gray_fn(300, 200, |x, _| if (x / 3) % 2 == 0 { 30 } else { 220 })
            .unwrap()
            .encode_png()
            .unwrap()
    }

    fn mock_pool(text: &'static str) -> Arc<OcrInstanceManager> {
        Arc::new(OcrInstanceManager::new(1, move || {
            Ok(Box::new(MockTextRecognizer::new(text, 88.0)) as Box<dyn TextRecognizer>)
        }))
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            parallel_strategies: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_two_prescriptions_end_to_end() {
        let output = process_medication_image(
            ImageSource::Bytes(label_png()),
            &test_config(),
            mock_pool(TWO_PRESCRIPTIONS),
        )
        .await
        .unwrap();

        assert_eq!(output.batch.len(), 2);
        let first = &output.batch.records()[0];
        let second = &output.batch.records()[1];
        assert_eq!(first.name.as_deref(), Some("Metformin"));
        assert_eq!(first.dosage.as_deref(), Some("500 mg"));
        assert_eq!(second.name.as_deref(), Some("Lisinopril"));
        assert_eq!(second.dosage.as_deref(), Some("10 mg"));

        // 300x200 capture upscaled by the maximum factor
        assert_eq!(output.preview_dimensions(), (600, 400));
        assert!(!output.diagnostics.rotation_corrected);
        assert!(output.recognition.text.contains("\n\nRx: 654321"));
        assert!(!output.recognition.words.is_empty());
    }

    #[tokio::test]
    async fn test_base64_source() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(label_png());
        let data_url = format!("data:image/png;base64,{}", encoded);

        let output = process_medication_image(
            ImageSource::Base64(data_url),
            &test_config(),
            mock_pool("Lisinopril 10mg"),
        )
        .await
        .unwrap();

        assert_eq!(output.batch.len(), 1);
        assert_eq!(output.batch.records()[0].confidence, 55);
        assert!(output.batch.records()[0].source_image.is_none());
    }

    #[tokio::test]
    async fn test_file_source_tags_records() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&label_png()).unwrap();
        let path = file.path().to_path_buf();

        let output = process_medication_image(
            ImageSource::File(path.clone()),
            &test_config(),
            mock_pool("Amoxicillin 500mg\nTake 1 capsule by mouth three times daily"),
        )
        .await
        .unwrap();

        let record = &output.batch.records()[0];
        assert_eq!(record.source_image.as_deref(), Some(path.display().to_string().as_str()));
        assert_eq!(record.frequency.as_deref(), Some("three times daily"));
    }

    #[tokio::test]
    async fn test_no_medication_text_is_empty_batch() {
        let output = process_medication_image(
            ImageSource::Bytes(label_png()),
            &test_config(),
            mock_pool("Keep out of reach of children"),
        )
        .await
        .unwrap();

        assert!(output.batch.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_bytes_fail_before_recognition() {
        let pool = mock_pool("Lisinopril 10mg");
        let result = process_medication_image(
            ImageSource::Bytes(b"not an image".to_vec()),
            &test_config(),
            pool.clone(),
        )
        .await;

        assert!(matches!(result, Err(PipelineError::ImageLoad(_))));
        assert_eq!(pool.instance_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            max_upscale: 0.5,
            ..test_config()
        };
        let result =
            process_medication_image(ImageSource::Bytes(label_png()), &config, mock_pool("x"))
                .await;

        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn test_engine_failure_releases_instance() {
        let pool = Arc::new(OcrInstanceManager::new(1, || {
            Ok(Box::new(FailingRecognizer) as Box<dyn TextRecognizer>)
        }));

        let result =
            process_medication_image(ImageSource::Bytes(label_png()), &test_config(), pool.clone())
                .await;

        assert!(matches!(
            result,
            Err(PipelineError::Recognition(OcrError::Extraction(_)))
        ));
        assert_eq!(pool.instance_count(), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_recognition_timeout() {
        let pool = Arc::new(OcrInstanceManager::new(1, || {
            Ok(Box::new(SlowRecognizer(Duration::from_millis(400))) as Box<dyn TextRecognizer>)
        }));
        let mut config = test_config();
        config.recognition.operation_timeout_ms = 50;

        let result =
            process_medication_image(ImageSource::Bytes(label_png()), &config, pool.clone()).await;
        assert!(matches!(
            result,
            Err(PipelineError::Recognition(OcrError::Timeout(_)))
        ));

        // The worker returns its lease once the engine call finishes
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(pool.idle_count(), 1);
    }
}
