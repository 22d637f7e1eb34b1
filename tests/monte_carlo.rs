use std::sync::atomic::{AtomicBool, Ordering};

use hoopcast::error::EngineError;
use hoopcast::monte_carlo::simulate;

#[test]
fn fixed_seed_is_fully_deterministic() {
    let probs: Vec<f64> = (0..30).map(|i| 0.30 + 0.01 * i as f64).collect();
    let a = simulate(20, 32, &probs, 2_000, Some(1234), None).unwrap();
    let b = simulate(20, 32, &probs, 2_000, Some(1234), None).unwrap();
    assert_eq!(a, b);
}

#[test]
fn near_certain_game_wins_about_ninety_five_percent() {
    // One remaining game at probability 1.0 pre-clamp; the clamp caps it at
    // 0.95, so across 10k replays roughly 95% should land on 41 wins.
    let result = simulate(40, 30, &[1.0], 10_000, Some(99), None).unwrap();
    let wins_41 = result
        .distribution
        .iter()
        .filter(|&&w| w == 41)
        .count() as f64
        / result.distribution.len() as f64;
    assert!(
        (wins_41 - 0.95).abs() < 0.02,
        "observed win rate {wins_41} outside 0.95 +/- 0.02"
    );
    assert!(result.distribution.iter().all(|&w| w == 40 || w == 41));
}

#[test]
fn mean_tracks_expected_wins_for_neutral_schedule() {
    let probs = vec![0.5; 40];
    let result = simulate(0, 0, &probs, 10_000, Some(7), None).unwrap();
    // 40 coin flips: expected 20 wins, sd per run sqrt(10) ~ 3.16.
    assert!((result.mean - 20.0).abs() < 0.5);
    assert!(result.std_dev > 2.0 && result.std_dev < 4.5);
    assert!(result.percentile_10 < result.percentile_90);
    assert!(result.distribution.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn zero_simulations_rejected() {
    let err = simulate(0, 0, &[0.5], 0, None, None).unwrap_err();
    assert_eq!(err, EngineError::InvalidSimulationCount { requested: 0 });
}

#[test]
fn pre_set_cancel_flag_discards_everything() {
    let cancel = AtomicBool::new(false);
    cancel.store(true, Ordering::Relaxed);
    let err = simulate(10, 10, &[0.5; 20], 5_000, Some(5), Some(&cancel)).unwrap_err();
    assert_eq!(err, EngineError::Cancelled);
}

#[test]
fn uncancelled_flag_does_not_interfere() {
    let cancel = AtomicBool::new(false);
    let result = simulate(10, 10, &[0.5; 4], 200, Some(5), Some(&cancel)).unwrap();
    assert_eq!(result.distribution.len(), 200);
}
