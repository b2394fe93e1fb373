//! # Preprocessing Strategy Module
//!
//! Runs the four competing binarization strategies over independent copies of
//! the oriented grayscale buffer, scores each by edge clarity and picks the
//! winner. Trials share no state and may run on scoped worker threads.

use tracing::{debug, info};

use super::buffer::PixelBuffer;
use super::filtering::{neighbor_average, scale_contrast};
use super::quality::calculate_edge_score;
use super::thresholding::binarize;
use super::types::{PreprocessingError, PreprocessingStrategy, StrategyTrial};

/// Applies one strategy to an owned grayscale buffer.
pub fn apply_strategy(
    strategy: PreprocessingStrategy,
    buffer: PixelBuffer,
) -> Result<PixelBuffer, PreprocessingError> {
    let prepared = match strategy.contrast_factor() {
        Some(factor) => scale_contrast(buffer, factor),
        None => neighbor_average(&buffer)?,
    };
    Ok(binarize(prepared, strategy.threshold()))
}

/// Runs one strategy on its own copy of `source` and scores the result.
pub fn run_trial(
    strategy: PreprocessingStrategy,
    source: &PixelBuffer,
) -> Result<StrategyTrial, PreprocessingError> {
    let buffer = apply_strategy(strategy, source.try_clone()?)?;
    let edge_score = calculate_edge_score(&buffer);
    Ok(StrategyTrial {
        strategy,
        buffer,
        edge_score,
    })
}

/// Runs every strategy exactly once, returning trials in declaration order.
///
/// With `parallel` set each trial runs on its own scoped thread; the output is
/// identical either way.
pub fn run_all_trials(
    source: &PixelBuffer,
    parallel: bool,
) -> Result<Vec<StrategyTrial>, PreprocessingError> {
    if !parallel {
        return PreprocessingStrategy::ALL
            .iter()
            .map(|&strategy| run_trial(strategy, source))
            .collect();
    }

    std::thread::scope(|scope| {
        let handles: Vec<_> = PreprocessingStrategy::ALL
            .iter()
            .map(|&strategy| (strategy, scope.spawn(move || run_trial(strategy, source))))
            .collect();

        handles
            .into_iter()
            .map(|(strategy, handle)| match handle.join() {
                Ok(result) => result,
                Err(panic) => {
                    tracing::error!(strategy = %strategy, "Strategy trial thread panicked");
                    std::panic::resume_unwind(panic)
                }
            })
            .collect()
    })
}

/// Picks the trial with the highest edge score; ties go to the earliest trial.
pub fn select_best_trial(trials: Vec<StrategyTrial>) -> Option<StrategyTrial> {
    let mut best: Option<StrategyTrial> = None;
    for trial in trials {
        match &best {
            Some(current) if trial.edge_score <= current.edge_score => {}
            _ => best = Some(trial),
        }
    }
    best
}

/// Runs all strategies over `grayscale` and returns the winning trial.
pub fn select_strategy(
    grayscale: &PixelBuffer,
    parallel: bool,
    verbose: bool,
) -> Result<StrategyTrial, PreprocessingError> {
    let start_time = std::time::Instant::now();
    let trials = run_all_trials(grayscale, parallel)?;

    for trial in &trials {
        if verbose {
            info!(
                strategy = %trial.strategy,
                edge_score = trial.edge_score,
                "Strategy trial scored"
            );
        } else {
            debug!(
                strategy = %trial.strategy,
                edge_score = trial.edge_score,
                "Strategy trial scored"
            );
        }
    }

    let best = select_best_trial(trials).ok_or(PreprocessingError::BufferAllocation {
        width: grayscale.width(),
        height: grayscale.height(),
    })?;

    debug!(
        target: "ocr_preprocessing",
        "Strategy selection completed in {}ms: winner={} edge_score={}",
        start_time.elapsed().as_millis(),
        best.strategy,
        best.edge_score
    );

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::thresholding::is_binary;

    fn faded_label(width: u32, height: u32) -> PixelBuffer {
        // Low-contrast strokes around mid-gray with a little texture
        PixelBuffer::from_gray_fn(width, height, |x, y| {
            let stroke = (x / 3) % 2 == 0;
            let base: u32 = if stroke { 118 } else { 150 };
            (base + (x * 7 + y * 13) % 9) as u8
        })
        .unwrap()
    }

    fn trial(strategy: PreprocessingStrategy, edge_score: u32) -> StrategyTrial {
        StrategyTrial {
            strategy,
            buffer: PixelBuffer::allocate(1, 1).unwrap(),
            edge_score,
        }
    }

    #[test]
    fn test_every_strategy_outputs_binary_buffer() {
        let source = faded_label(40, 30);
        for strategy in PreprocessingStrategy::ALL {
            let output = apply_strategy(strategy, source.clone()).unwrap();
            assert!(is_binary(&output), "{strategy} produced non-binary output");
            assert_eq!(output.dimensions(), source.dimensions());
        }
    }

    #[test]
    fn test_one_trial_per_strategy_in_order() {
        let trials = run_all_trials(&faded_label(32, 32), false).unwrap();
        let order: Vec<_> = trials.iter().map(|t| t.strategy).collect();
        assert_eq!(order, PreprocessingStrategy::ALL.to_vec());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let source = faded_label(64, 48);
        let sequential = run_all_trials(&source, false).unwrap();
        let parallel = run_all_trials(&source, true).unwrap();
        for (a, b) in sequential.iter().zip(parallel.iter()) {
            assert_eq!(a.strategy, b.strategy);
            assert_eq!(a.edge_score, b.edge_score);
            assert_eq!(a.buffer, b.buffer);
        }
    }

    #[test]
    fn test_trials_do_not_touch_source() {
        let source = faded_label(20, 20);
        let snapshot = source.clone();
        run_all_trials(&source, true).unwrap();
        assert_eq!(source, snapshot);
    }

    #[test]
    fn test_highest_edge_score_wins() {
        let best = select_best_trial(vec![
            trial(PreprocessingStrategy::Standard, 3),
            trial(PreprocessingStrategy::HighContrast, 9),
            trial(PreprocessingStrategy::Denoise, 4),
            trial(PreprocessingStrategy::Aggressive, 8),
        ])
        .unwrap();
        assert_eq!(best.strategy, PreprocessingStrategy::HighContrast);
    }

    #[test]
    fn test_ties_resolve_to_first_declared() {
        let best = select_best_trial(vec![
            trial(PreprocessingStrategy::Standard, 5),
            trial(PreprocessingStrategy::HighContrast, 5),
            trial(PreprocessingStrategy::Denoise, 5),
            trial(PreprocessingStrategy::Aggressive, 5),
        ])
        .unwrap();
        assert_eq!(best.strategy, PreprocessingStrategy::Standard);
    }

    #[test]
    fn test_uniform_input_selects_standard() {
        let source = PixelBuffer::from_gray_fn(30, 30, |_, _| 255).unwrap();
        let best = select_strategy(&source, true, false).unwrap();
        assert_eq!(best.strategy, PreprocessingStrategy::Standard);
        assert_eq!(best.edge_score, 0);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let source = faded_label(50, 40);
        let first = select_strategy(&source, true, false).unwrap();
        let second = select_strategy(&source, true, true).unwrap();
        assert_eq!(first.strategy, second.strategy);
        assert_eq!(first.buffer, second.buffer);
    }

    #[test]
    fn test_empty_trial_list() {
        assert!(select_best_trial(Vec::new()).is_none());
    }
}
