//! # Preprocessing Tests
//!
//! Upscaling bounds, blur ordering, orientation and strategy selection.

#[cfg(test)]
mod tests {
    use medication_label_ocr::preprocessing::{
        assess_blur, calculate_blur_score, correct_orientation, neighbor_average, run_all_trials,
        select_strategy, PixelBuffer, PreprocessingStrategy, DEFAULT_BLUR_THRESHOLD,
        DEFAULT_MAX_UPSCALE, DEFAULT_ROTATION_RATIO_THRESHOLD, DEFAULT_TARGET_LONG_EDGE,
    };

    fn checkerboard(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::from_gray_fn(width, height, |x, y| if (x + y) % 2 == 0 { 0 } else { 255 })
            .unwrap()
    }

    fn label_like(width: u32, height: u32) -> PixelBuffer {
        // Dark glyph-sized blocks on a light, slightly uneven background
        PixelBuffer::from_gray_fn(width, height, |x, y| {
            if (x / 6) % 3 == 0 && (y / 10) % 2 == 0 {
                40
            } else {
                190 + ((x + y) % 20) as u8
            }
        })
        .unwrap()
    }

    #[test]
    fn test_upscale_respects_factor_and_target() {
        let small = PixelBuffer::allocate(500, 300).unwrap();
        let scaled = small
            .upscale(DEFAULT_TARGET_LONG_EDGE, DEFAULT_MAX_UPSCALE)
            .unwrap();
        assert_eq!(scaled.dimensions(), (1000, 600));

        let medium = PixelBuffer::allocate(1500, 1000).unwrap();
        let scaled = medium
            .upscale(DEFAULT_TARGET_LONG_EDGE, DEFAULT_MAX_UPSCALE)
            .unwrap();
        let long_edge = scaled.width().max(scaled.height());
        assert!(long_edge >= 1500 && long_edge <= 2000);
    }

    #[test]
    fn test_large_images_are_never_downscaled() {
        let large = PixelBuffer::allocate(3000, 2000).unwrap();
        let scaled = large
            .upscale(DEFAULT_TARGET_LONG_EDGE, DEFAULT_MAX_UPSCALE)
            .unwrap();
        assert_eq!(scaled.dimensions(), (3000, 2000));
    }

    #[test]
    fn test_smoothing_lowers_blur_score() {
        let sharp = checkerboard(50, 50);
        let smoothed = neighbor_average(&sharp).unwrap();

        let sharp_score = calculate_blur_score(&sharp);
        let smoothed_score = calculate_blur_score(&smoothed);
        assert!(smoothed_score < sharp_score);
        assert!(!assess_blur(&sharp, DEFAULT_BLUR_THRESHOLD).is_blurry);
    }

    #[test]
    fn test_uniform_capture_is_blurry() {
        let flat = PixelBuffer::from_gray_fn(40, 40, |_, _| 128).unwrap();
        let assessment = assess_blur(&flat, DEFAULT_BLUR_THRESHOLD);
        assert_eq!(assessment.score, 0.0);
        assert!(assessment.is_blurry);
    }

    #[test]
    fn test_orientation_round_trip() {
        let upright = PixelBuffer::from_gray_fn(120, 80, |x, _| if x % 2 == 0 { 0 } else { 255 })
            .unwrap();
        let unchanged =
            correct_orientation(upright.clone(), DEFAULT_ROTATION_RATIO_THRESHOLD).unwrap();
        assert!(!unchanged.rotation_corrected());

        let sideways = upright.rotate90().unwrap();
        let corrected = correct_orientation(sideways, DEFAULT_ROTATION_RATIO_THRESHOLD).unwrap();
        assert!(corrected.rotation_corrected());
        assert_eq!(corrected.buffer.dimensions(), (120, 80));
    }

    #[test]
    fn test_every_strategy_runs_once_in_order() {
        let trials = run_all_trials(&label_like(90, 60), false).unwrap();
        let order: Vec<_> = trials.iter().map(|t| t.strategy).collect();
        assert_eq!(order, PreprocessingStrategy::ALL.to_vec());
    }

    #[test]
    fn test_winner_has_highest_edge_score() {
        let source = label_like(90, 60);
        let trials = run_all_trials(&source, false).unwrap();
        let best_score = trials.iter().map(|t| t.edge_score).max().unwrap();

        let winner = select_strategy(&source, false, false).unwrap();
        assert_eq!(winner.edge_score, best_score);

        let first_with_best = trials.iter().find(|t| t.edge_score == best_score).unwrap();
        assert_eq!(winner.strategy, first_with_best.strategy);
    }

    #[test]
    fn test_parallel_selection_matches_sequential() {
        let source = label_like(120, 80);
        let sequential = select_strategy(&source, false, false).unwrap();
        let parallel = select_strategy(&source, true, true).unwrap();

        assert_eq!(sequential.strategy, parallel.strategy);
        assert_eq!(sequential.edge_score, parallel.edge_score);
        assert_eq!(sequential.buffer, parallel.buffer);
    }
}
