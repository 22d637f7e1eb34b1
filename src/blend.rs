use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::ledger::{Game, TeamId};
use crate::rating_store::RatingStore;
use crate::walk_forward::expected_score;

/// Neutral probability used when the external oracle has nothing for a game.
pub const FALLBACK_EXTERNAL_PROB: f64 = 0.5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlendWeights {
    pub external: f64,
    pub rating: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            external: 0.70,
            rating: 0.30,
        }
    }
}

impl BlendWeights {
    pub fn validate(&self) -> Result<(), EngineError> {
        let sum = self.external + self.rating;
        if !sum.is_finite()
            || (sum - 1.0).abs() > 1e-6
            || self.external < 0.0
            || self.rating < 0.0
        {
            return Err(EngineError::InvalidWeights {
                external: self.external,
                rating: self.rating,
            });
        }
        Ok(())
    }
}

/// Tagged so downstream consumers can tell a modeled probability from the
/// neutral fallback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExternalProb {
    Modeled(f64),
    Fallback,
}

impl ExternalProb {
    pub fn value(&self) -> f64 {
        match self {
            ExternalProb::Modeled(p) => *p,
            ExternalProb::Fallback => FALLBACK_EXTERNAL_PROB,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ExternalProb::Fallback)
    }
}

/// Home-side win probability with its two components retained for audit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlendedProbability {
    pub game_id: u64,
    pub home_id: TeamId,
    pub away_id: TeamId,
    pub blended: f64,
    pub external: ExternalProb,
    pub rating_prob: f64,
}

impl BlendedProbability {
    /// Win probability oriented to `team`; None when the game does not
    /// involve it.
    pub fn for_team(&self, team: TeamId) -> Option<f64> {
        if team == self.home_id {
            Some(self.blended)
        } else if team == self.away_id {
            Some(1.0 - self.blended)
        } else {
            None
        }
    }
}

/// Probability implied by two ratings alone. Same logistic curve as the
/// rating update, fed with pre-game values.
pub fn rating_win_probability(team_rating: f64, opponent_rating: f64) -> f64 {
    expected_score(team_rating, opponent_rating)
}

/// Combines the oracle's probability with the rating-implied one.
///
/// Both teams' ratings are read strictly before the game's own key, so a
/// completed game blends exactly what was knowable before tip-off.
pub fn blend(
    game: &Game,
    store: &RatingStore,
    external: Option<f64>,
    weights: BlendWeights,
    initial_rating: f64,
) -> Result<BlendedProbability, EngineError> {
    weights.validate()?;
    game.validate()?;

    if let Some(p) = external
        && (!p.is_finite() || !(0.0..=1.0).contains(&p))
    {
        return Err(EngineError::InvalidExternalProbability {
            game_id: game.id,
            value: p,
        });
    }

    let home_rating = store.rating_before(game.home_id, game.key(), initial_rating);
    let away_rating = store.rating_before(game.away_id, game.key(), initial_rating);
    let rating_prob = rating_win_probability(home_rating, away_rating);

    let external = match external {
        Some(p) => ExternalProb::Modeled(p),
        None => {
            debug!(game_id = game.id, "no external probability, using neutral fallback");
            ExternalProb::Fallback
        }
    };

    let blended = (weights.external * external.value() + weights.rating * rating_prob)
        .clamp(0.0, 1.0);

    Ok(BlendedProbability {
        game_id: game.id,
        home_id: game.home_id,
        away_id: game.away_id,
        blended,
        external,
        rating_prob,
    })
}
