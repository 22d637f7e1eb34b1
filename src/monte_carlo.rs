use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;

pub const DEFAULT_NUM_SIMULATIONS: usize = 10_000;

const MOMENTUM_WINDOW: usize = 5;
const MOMENTUM_BOOST: f64 = 0.02;
const PROB_FLOOR: f64 = 0.05;
const PROB_CEIL: f64 = 0.95;
// Odd multiplier keeps per-run seeds distinct for any base seed.
const RUN_SEED_STRIDE: u64 = 0x9e37_79b9_7f4a_7c15;

/// Distribution summary of simulated final win totals. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub mean: f64,
    /// Element at sorted index N/2 (truncating), not interpolated.
    pub median: u32,
    /// Population standard deviation (divide by N).
    pub std_dev: f64,
    /// Nearest-rank: sorted element at floor(N * 0.10).
    pub percentile_10: u32,
    /// Nearest-rank: sorted element at floor(N * 0.90).
    pub percentile_90: u32,
    /// All simulated final win totals, sorted ascending.
    pub distribution: Vec<u32>,
}

/// Replays the remaining schedule `num_simulations` times and summarizes the
/// final win totals.
///
/// `remaining_probs` are team-oriented win probabilities in schedule order
/// (home/away already corrected by the caller). Entries that are not finite
/// or outside [0, 1] are excluded from every replay rather than failing.
///
/// Runs are independent: each owns its RNG, seeded from the base seed and the
/// run index, so a fixed `seed` reproduces the exact result regardless of how
/// rayon schedules the runs. `seed: None` draws a fresh base seed.
///
/// `cancel` is checked at run granularity; once set, the call returns
/// [`EngineError::Cancelled`] and all partial samples are discarded.
pub fn simulate(
    current_wins: u32,
    current_losses: u32,
    remaining_probs: &[f64],
    num_simulations: usize,
    seed: Option<u64>,
    cancel: Option<&AtomicBool>,
) -> Result<SimulationResult, EngineError> {
    if num_simulations == 0 {
        return Err(EngineError::InvalidSimulationCount { requested: 0 });
    }

    let usable: Vec<f64> = remaining_probs
        .iter()
        .copied()
        .filter(|p| p.is_finite() && (0.0..=1.0).contains(p))
        .collect();
    if usable.len() < remaining_probs.len() {
        debug!(
            excluded = remaining_probs.len() - usable.len(),
            "remaining games without a usable probability excluded from replay"
        );
    }
    let _ = current_losses; // final tallies only need the win column

    let base_seed = seed.unwrap_or_else(rand::random);

    let samples: Vec<Option<u32>> = (0..num_simulations)
        .into_par_iter()
        .map(|run| {
            if let Some(flag) = cancel
                && flag.load(Ordering::Relaxed)
            {
                return None;
            }
            let run_seed = base_seed
                .wrapping_add(run as u64)
                .wrapping_mul(RUN_SEED_STRIDE);
            let mut rng = StdRng::seed_from_u64(run_seed);
            Some(replay_season(current_wins, &usable, &mut rng))
        })
        .collect();

    let mut distribution = Vec::with_capacity(num_simulations);
    for sample in samples {
        match sample {
            Some(wins) => distribution.push(wins),
            None => return Err(EngineError::Cancelled),
        }
    }
    // A flag set while the last runs were in flight still voids the result.
    if let Some(flag) = cancel
        && flag.load(Ordering::Relaxed)
    {
        return Err(EngineError::Cancelled);
    }

    distribution.sort_unstable();
    Ok(summarize(distribution))
}

fn replay_season(current_wins: u32, probs: &[f64], rng: &mut StdRng) -> u32 {
    let mut wins = current_wins;
    let mut recent: VecDeque<bool> = VecDeque::with_capacity(MOMENTUM_WINDOW + 1);

    for &p in probs {
        let adjusted = (p + momentum_shift(&recent)).clamp(PROB_FLOOR, PROB_CEIL);
        let won = rng.r#gen::<f64>() < adjusted;
        if won {
            wins += 1;
        }
        recent.push_back(won);
        if recent.len() > MOMENTUM_WINDOW {
            recent.pop_front();
        }
    }
    wins
}

/// Small bounded streak effect: 4+ wins in the last 5 simulated games nudges
/// the next probability up, 1 or fewer nudges it down.
fn momentum_shift(recent: &VecDeque<bool>) -> f64 {
    if recent.len() < MOMENTUM_WINDOW {
        return 0.0;
    }
    let recent_wins = recent.iter().filter(|won| **won).count();
    if recent_wins >= 4 {
        MOMENTUM_BOOST
    } else if recent_wins <= 1 {
        -MOMENTUM_BOOST
    } else {
        0.0
    }
}

fn summarize(distribution: Vec<u32>) -> SimulationResult {
    let n = distribution.len();
    let mean = distribution.iter().map(|&w| w as f64).sum::<f64>() / n as f64;
    let variance = distribution
        .iter()
        .map(|&w| (w as f64 - mean).powi(2))
        .sum::<f64>()
        / n as f64;

    let p10_idx = ((n as f64 * 0.10) as usize).min(n - 1);
    let p90_idx = ((n as f64 * 0.90) as usize).min(n - 1);

    SimulationResult {
        mean,
        median: distribution[n / 2],
        std_dev: variance.sqrt(),
        percentile_10: distribution[p10_idx],
        percentile_90: distribution[p90_idx],
        distribution,
    }
}
