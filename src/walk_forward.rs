use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::ledger::{Game, TeamId};
use crate::rating_store::{RatingSnapshot, RatingStore, WindowAverages};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RatingConfig {
    pub k: f64,
    pub initial: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            k: 32.0,
            initial: 1500.0,
        }
    }
}

impl RatingConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.k.is_finite() || self.k <= 0.0 {
            return Err(EngineError::InvalidKFactor { k: self.k });
        }
        Ok(())
    }
}

/// Logistic expected score: the probability a team at `team_rating` beats an
/// opponent at `opponent_rating`.
pub fn expected_score(team_rating: f64, opponent_rating: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((opponent_rating - team_rating) / 400.0))
}

/// Single-pass walk-forward scan over a game ledger.
///
/// The scan is deliberately sequential across the whole league: the total
/// order interleaves every team's games, and pre/post rating semantics only
/// hold if games are applied one at a time in that order.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkForwardEngine {
    cfg: RatingConfig,
}

struct PriorGame {
    date: NaiveDate,
    points_for: f64,
    points_against: f64,
    won: bool,
}

impl WalkForwardEngine {
    pub fn new(cfg: RatingConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> RatingConfig {
        self.cfg
    }

    /// Processes games in (date, ordinal) order, writing two snapshots per
    /// completed game. Input order does not matter; the engine sorts a copy.
    /// Non-final games are skipped; a malformed game aborts the whole pass.
    pub fn process(&self, games: &[Game]) -> Result<RatingStore, EngineError> {
        self.cfg.validate()?;

        let mut ordered: Vec<&Game> = games.iter().collect();
        ordered.sort_by_key(|g| g.key());

        let mut store = RatingStore::default();
        let mut history: HashMap<TeamId, Vec<PriorGame>> = HashMap::new();
        let total = ordered.len();

        for (idx, game) in ordered.into_iter().enumerate() {
            game.validate()?;
            if (idx + 1) % 500 == 0 {
                info!(processed = idx + 1, total, "walk-forward scan progress");
            }

            let (Some(home_score), Some(away_score)) = (game.home_score, game.away_score) else {
                debug!(game_id = game.id, "skipping game without final scores");
                continue;
            };
            if !game.is_final() {
                debug!(game_id = game.id, "skipping non-final game");
                continue;
            }

            let home_won = home_score > away_score;

            // Pre-game ratings come from the snapshot log, never from this
            // game's own (not yet written) snapshots.
            let home_rating = store.rating_before(game.home_id, game.key(), self.cfg.initial);
            let away_rating = store.rating_before(game.away_id, game.key(), self.cfg.initial);
            let home_post = self.updated_rating(home_rating, away_rating, home_won);
            let away_post = self.updated_rating(away_rating, home_rating, !home_won);

            let home_snapshot = build_snapshot(
                game,
                game.home_id,
                true,
                home_won,
                home_post,
                history.get(&game.home_id).map(Vec::as_slice).unwrap_or(&[]),
            );
            let away_snapshot = build_snapshot(
                game,
                game.away_id,
                false,
                !home_won,
                away_post,
                history.get(&game.away_id).map(Vec::as_slice).unwrap_or(&[]),
            );

            store.insert(home_snapshot)?;
            store.insert(away_snapshot)?;

            history.entry(game.home_id).or_default().push(PriorGame {
                date: game.date,
                points_for: home_score as f64,
                points_against: away_score as f64,
                won: home_won,
            });
            history.entry(game.away_id).or_default().push(PriorGame {
                date: game.date,
                points_for: away_score as f64,
                points_against: home_score as f64,
                won: !home_won,
            });
        }

        info!(snapshots = store.len(), "walk-forward scan complete");
        Ok(store)
    }

    fn updated_rating(&self, team: f64, opponent: f64, won: bool) -> f64 {
        let actual = if won { 1.0 } else { 0.0 };
        team + self.cfg.k * (actual - expected_score(team, opponent))
    }
}

fn build_snapshot(
    game: &Game,
    team_id: TeamId,
    is_home: bool,
    won: bool,
    post_rating: f64,
    prior: &[PriorGame],
) -> RatingSnapshot {
    let games_played = prior.len() as u32;
    let wins = prior.iter().filter(|g| g.won).count() as u32;
    let losses = games_played - wins;
    let win_pct = if games_played > 0 {
        wins as f64 / games_played as f64
    } else {
        0.0
    };

    let (ppf, ppa) = if games_played > 0 {
        let n = games_played as f64;
        (
            prior.iter().map(|g| g.points_for).sum::<f64>() / n,
            prior.iter().map(|g| g.points_against).sum::<f64>() / n,
        )
    } else {
        (0.0, 0.0)
    };

    let rest_days = prior.last().map(|g| (game.date - g.date).num_days());
    let back_to_back = rest_days == Some(0);

    RatingSnapshot {
        game_id: game.id,
        team_id,
        date: game.date,
        ordinal: game.ordinal,
        is_home,
        games_played,
        wins,
        losses,
        win_pct,
        points_for: ppf,
        points_against: ppa,
        point_diff: ppf - ppa,
        last_5: window_averages(prior, 5),
        last_10: window_averages(prior, 10),
        last_20: window_averages(prior, 20),
        last_100: window_averages(prior, 100),
        rating: post_rating,
        rest_days,
        back_to_back,
        won,
    }
}

/// Average over up to the last `n` prior games; None only when no prior games
/// exist. Short histories average over however many games there are.
fn window_averages(prior: &[PriorGame], n: usize) -> Option<WindowAverages> {
    if prior.is_empty() {
        return None;
    }
    let tail = &prior[prior.len().saturating_sub(n)..];
    let len = tail.len() as f64;
    let points_for = tail.iter().map(|g| g.points_for).sum::<f64>() / len;
    let points_against = tail.iter().map(|g| g.points_against).sum::<f64>() / len;
    Some(WindowAverages {
        points_for,
        points_against,
        differential: points_for - points_against,
    })
}
