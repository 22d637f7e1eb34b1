use serde::Serialize;

use crate::ledger::Game;
use crate::rating_store::{RatingSnapshot, RatingStore};

/// Column order the external classifier was trained against. `values()`
/// emits in exactly this order, with NaN marking a missing rolling window.
pub const FEATURE_COLUMNS: [&str; 38] = [
    "home_elo",
    "home_ppf",
    "home_ppa",
    "home_point_diff",
    "home_win_pct",
    "home_ppf_5game",
    "home_ppa_5game",
    "home_diff_5game",
    "home_ppf_10game",
    "home_ppa_10game",
    "home_diff_10game",
    "home_ppf_20game",
    "home_ppa_20game",
    "home_diff_20game",
    "home_days_rest",
    "home_back_to_back",
    "away_elo",
    "away_ppf",
    "away_ppa",
    "away_point_diff",
    "away_win_pct",
    "away_ppf_5game",
    "away_ppa_5game",
    "away_diff_5game",
    "away_ppf_10game",
    "away_ppa_10game",
    "away_diff_10game",
    "away_ppf_20game",
    "away_ppa_20game",
    "away_diff_20game",
    "away_days_rest",
    "away_back_to_back",
    "elo_diff",
    "ppf_diff",
    "ppa_diff",
    "diff_5game_delta",
    "diff_10game_delta",
    "diff_20game_delta",
];

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SideFeatures {
    /// Pre-game rating, read strictly before the game.
    pub elo: f64,
    pub ppf: f64,
    pub ppa: f64,
    pub point_diff: f64,
    pub win_pct: f64,
    pub ppf_5game: Option<f64>,
    pub ppa_5game: Option<f64>,
    pub diff_5game: Option<f64>,
    pub ppf_10game: Option<f64>,
    pub ppa_10game: Option<f64>,
    pub diff_10game: Option<f64>,
    pub ppf_20game: Option<f64>,
    pub ppa_20game: Option<f64>,
    pub diff_20game: Option<f64>,
    /// 0 for a team with no prior game, matching the training data.
    pub days_rest: i64,
    pub back_to_back: bool,
}

/// Pre-game feature vector for one game, the oracle-boundary payload.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeatureRow {
    pub game_id: u64,
    pub home: SideFeatures,
    pub away: SideFeatures,
    pub elo_diff: f64,
    pub ppf_diff: f64,
    pub ppa_diff: f64,
    pub diff_5game_delta: Option<f64>,
    pub diff_10game_delta: Option<f64>,
    pub diff_20game_delta: Option<f64>,
}

impl FeatureRow {
    /// Builds the row from the engine's snapshots for this game. Requires
    /// both teams' snapshots to exist (the game has been processed); the
    /// pre-game ratings come from `latest_before`, never from the game's own
    /// snapshots.
    pub fn build(game: &Game, store: &RatingStore, initial_rating: f64) -> Option<Self> {
        let home_snap = store.snapshot(game.id, game.home_id)?;
        let away_snap = store.snapshot(game.id, game.away_id)?;

        let home_elo = store.rating_before(game.home_id, game.key(), initial_rating);
        let away_elo = store.rating_before(game.away_id, game.key(), initial_rating);

        let home = side_features(home_snap, home_elo);
        let away = side_features(away_snap, away_elo);

        Some(Self {
            game_id: game.id,
            home,
            away,
            elo_diff: home.elo - away.elo,
            ppf_diff: home.ppf - away.ppf,
            ppa_diff: home.ppa - away.ppa,
            diff_5game_delta: delta(home.diff_5game, away.diff_5game),
            diff_10game_delta: delta(home.diff_10game, away.diff_10game),
            diff_20game_delta: delta(home.diff_20game, away.diff_20game),
        })
    }

    /// Flat vector in `FEATURE_COLUMNS` order; missing windows become NaN.
    pub fn values(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(FEATURE_COLUMNS.len());
        push_side(&mut out, &self.home);
        push_side(&mut out, &self.away);
        out.push(self.elo_diff);
        out.push(self.ppf_diff);
        out.push(self.ppa_diff);
        out.push(self.diff_5game_delta.unwrap_or(f64::NAN));
        out.push(self.diff_10game_delta.unwrap_or(f64::NAN));
        out.push(self.diff_20game_delta.unwrap_or(f64::NAN));
        out
    }
}

fn side_features(snap: &RatingSnapshot, elo: f64) -> SideFeatures {
    SideFeatures {
        elo,
        ppf: snap.points_for,
        ppa: snap.points_against,
        point_diff: snap.point_diff,
        win_pct: snap.win_pct,
        ppf_5game: snap.last_5.map(|w| w.points_for),
        ppa_5game: snap.last_5.map(|w| w.points_against),
        diff_5game: snap.last_5.map(|w| w.differential),
        ppf_10game: snap.last_10.map(|w| w.points_for),
        ppa_10game: snap.last_10.map(|w| w.points_against),
        diff_10game: snap.last_10.map(|w| w.differential),
        ppf_20game: snap.last_20.map(|w| w.points_for),
        ppa_20game: snap.last_20.map(|w| w.points_against),
        diff_20game: snap.last_20.map(|w| w.differential),
        days_rest: snap.rest_days.unwrap_or(0),
        back_to_back: snap.back_to_back,
    }
}

fn push_side(out: &mut Vec<f64>, side: &SideFeatures) {
    out.push(side.elo);
    out.push(side.ppf);
    out.push(side.ppa);
    out.push(side.point_diff);
    out.push(side.win_pct);
    out.push(side.ppf_5game.unwrap_or(f64::NAN));
    out.push(side.ppa_5game.unwrap_or(f64::NAN));
    out.push(side.diff_5game.unwrap_or(f64::NAN));
    out.push(side.ppf_10game.unwrap_or(f64::NAN));
    out.push(side.ppa_10game.unwrap_or(f64::NAN));
    out.push(side.diff_10game.unwrap_or(f64::NAN));
    out.push(side.ppf_20game.unwrap_or(f64::NAN));
    out.push(side.ppa_20game.unwrap_or(f64::NAN));
    out.push(side.diff_20game.unwrap_or(f64::NAN));
    out.push(side.days_rest as f64);
    out.push(if side.back_to_back { 1.0 } else { 0.0 });
}

fn delta(home: Option<f64>, away: Option<f64>) -> Option<f64> {
    Some(home? - away?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Game, GameStatus};
    use crate::walk_forward::WalkForwardEngine;
    use chrono::NaiveDate;

    fn final_game(id: u64, day: u32, home: u32, away: u32, hs: i32, aws: i32) -> Game {
        Game {
            id,
            date: NaiveDate::from_ymd_opt(2025, 2, day).unwrap(),
            ordinal: id as u32,
            home_id: home,
            away_id: away,
            home_score: Some(hs),
            away_score: Some(aws),
            status: GameStatus::Final,
            season: "2025".to_string(),
        }
    }

    #[test]
    fn values_match_column_count() {
        let games = vec![
            final_game(1, 1, 10, 20, 100, 90),
            final_game(2, 3, 20, 10, 95, 99),
        ];
        let store = WalkForwardEngine::default().process(&games).unwrap();
        let row = FeatureRow::build(&games[1], &store, 1500.0).unwrap();
        assert_eq!(row.values().len(), FEATURE_COLUMNS.len());
    }

    #[test]
    fn elo_is_pre_game_not_post_game() {
        let games = vec![
            final_game(1, 1, 10, 20, 100, 90),
            final_game(2, 3, 10, 20, 90, 95),
        ];
        let store = WalkForwardEngine::default().process(&games).unwrap();

        let row = FeatureRow::build(&games[1], &store, 1500.0).unwrap();
        // Team 10 won game 1: 1500 + 32 * 0.5 = 1516 going into game 2,
        // not the post-game-2 value stored in game 2's snapshot.
        assert!((row.home.elo - 1516.0).abs() < 1e-9);
        assert!((row.away.elo - 1484.0).abs() < 1e-9);
        assert!((row.elo_diff - 32.0).abs() < 1e-9);
        assert_ne!(row.home.elo, store.snapshot(2, 10).unwrap().rating);
    }

    #[test]
    fn first_game_row_has_nan_windows_and_zero_rest() {
        let games = vec![final_game(1, 1, 10, 20, 100, 90)];
        let store = WalkForwardEngine::default().process(&games).unwrap();
        let row = FeatureRow::build(&games[0], &store, 1500.0).unwrap();
        assert!(row.home.ppf_5game.is_none());
        assert_eq!(row.home.days_rest, 0);
        assert!(row.diff_5game_delta.is_none());
        let values = row.values();
        assert!(values[5].is_nan());
    }

    #[test]
    fn unprocessed_game_has_no_row() {
        let store = crate::rating_store::RatingStore::default();
        let game = final_game(1, 1, 10, 20, 100, 90);
        assert!(FeatureRow::build(&game, &store, 1500.0).is_none());
    }
}
