use thiserror::Error;

use crate::ledger::TeamId;

/// Failures surfaced by the rating engine and its downstream consumers.
///
/// Input errors carry enough context (game id, team id, offending value) to
/// diagnose the bad record. Missing-data conditions are not errors; they are
/// handled by documented fallbacks at the call sites.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("game {game_id} is malformed: home={home_id} away={away_id}")]
    MalformedGame {
        game_id: u64,
        home_id: TeamId,
        away_id: TeamId,
    },

    #[error("duplicate snapshot for game {game_id}, team {team_id}")]
    DuplicateSnapshot { game_id: u64, team_id: TeamId },

    #[error("snapshot for game {game_id}, team {team_id} arrived out of chronological order")]
    OutOfOrderSnapshot { game_id: u64, team_id: TeamId },

    #[error("external probability {value} for game {game_id} is outside [0, 1]")]
    InvalidExternalProbability { game_id: u64, value: f64 },

    #[error("blend weights must be non-negative and sum to 1.0: external={external} rating={rating}")]
    InvalidWeights { external: f64, rating: f64 },

    #[error("rating K-factor must be positive, got {k}")]
    InvalidKFactor { k: f64 },

    #[error("num_simulations must be at least 1, got {requested}")]
    InvalidSimulationCount { requested: usize },

    #[error("simulation cancelled before all runs completed")]
    Cancelled,
}
