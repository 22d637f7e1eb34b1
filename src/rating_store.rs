use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::ledger::{GameKey, TeamId};

/// Rolling averages over a trailing window of prior games.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowAverages {
    pub points_for: f64,
    pub points_against: f64,
    pub differential: f64,
}

/// Per-(game, team) snapshot written by the walk-forward engine.
///
/// Every field except `rating` and `won` derives from games strictly before
/// this one in (date, ordinal) order. `rating` is the post-game value; callers
/// that need the pre-game rating go through [`RatingStore::latest_before`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub game_id: u64,
    pub team_id: TeamId,
    pub date: NaiveDate,
    pub ordinal: u32,
    pub is_home: bool,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_pct: f64,
    pub points_for: f64,
    pub points_against: f64,
    pub point_diff: f64,
    pub last_5: Option<WindowAverages>,
    pub last_10: Option<WindowAverages>,
    pub last_20: Option<WindowAverages>,
    pub last_100: Option<WindowAverages>,
    /// Rating after this game's result has been applied.
    pub rating: f64,
    pub rest_days: Option<i64>,
    pub back_to_back: bool,
    /// Outcome bookkeeping only; no other field in this snapshot derives from it.
    pub won: bool,
}

impl RatingSnapshot {
    pub fn key(&self) -> GameKey {
        (self.date, self.ordinal)
    }
}

/// Append-only log of rating snapshots, indexed by (game, team) and by team
/// in chronological order. Snapshots are created exactly once per (game, team)
/// and never updated afterward.
#[derive(Debug, Clone, Default)]
pub struct RatingStore {
    snapshots: Vec<RatingSnapshot>,
    by_game_team: HashMap<(u64, TeamId), usize>,
    by_team: HashMap<TeamId, Vec<usize>>,
}

impl RatingStore {
    pub fn insert(&mut self, snapshot: RatingSnapshot) -> Result<(), EngineError> {
        let key = (snapshot.game_id, snapshot.team_id);
        if self.by_game_team.contains_key(&key) {
            return Err(EngineError::DuplicateSnapshot {
                game_id: snapshot.game_id,
                team_id: snapshot.team_id,
            });
        }
        // Per-team history must stay chronological or `latest_before` would
        // return the wrong pre-game rating.
        if let Some(rows) = self.by_team.get(&snapshot.team_id)
            && let Some(&last) = rows.last()
            && self.snapshots[last].key() >= snapshot.key()
        {
            return Err(EngineError::OutOfOrderSnapshot {
                game_id: snapshot.game_id,
                team_id: snapshot.team_id,
            });
        }

        let idx = self.snapshots.len();
        self.by_game_team.insert(key, idx);
        self.by_team.entry(snapshot.team_id).or_default().push(idx);
        self.snapshots.push(snapshot);
        Ok(())
    }

    pub fn snapshot(&self, game_id: u64, team_id: TeamId) -> Option<&RatingSnapshot> {
        self.by_game_team
            .get(&(game_id, team_id))
            .map(|&idx| &self.snapshots[idx])
    }

    /// Most recent snapshot for `team_id` strictly before `key`. This is the
    /// only sanctioned pre-game rating access path: asking for a game's own
    /// snapshot would leak its post-game rating.
    pub fn latest_before(&self, team_id: TeamId, key: GameKey) -> Option<&RatingSnapshot> {
        let rows = self.by_team.get(&team_id)?;
        rows.iter()
            .rev()
            .map(|&idx| &self.snapshots[idx])
            .find(|s| s.key() < key)
    }

    /// Pre-game rating with the configured initial value as the new-team fallback.
    pub fn rating_before(&self, team_id: TeamId, key: GameKey, initial: f64) -> f64 {
        self.latest_before(team_id, key)
            .map(|s| s.rating)
            .unwrap_or(initial)
    }

    pub fn team_snapshots(&self, team_id: TeamId) -> impl Iterator<Item = &RatingSnapshot> {
        self.by_team
            .get(&team_id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.snapshots[idx])
    }

    pub fn snapshots(&self) -> &[RatingSnapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(game_id: u64, team_id: TeamId, day: u32, ordinal: u32, rating: f64) -> RatingSnapshot {
        RatingSnapshot {
            game_id,
            team_id,
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            ordinal,
            is_home: true,
            games_played: 0,
            wins: 0,
            losses: 0,
            win_pct: 0.0,
            points_for: 0.0,
            points_against: 0.0,
            point_diff: 0.0,
            last_5: None,
            last_10: None,
            last_20: None,
            last_100: None,
            rating,
            rest_days: None,
            back_to_back: false,
            won: true,
        }
    }

    #[test]
    fn one_snapshot_per_game_and_team() {
        let mut store = RatingStore::default();
        store.insert(snap(1, 10, 1, 0, 1510.0)).unwrap();
        let err = store.insert(snap(1, 10, 1, 0, 1490.0)).unwrap_err();
        assert_eq!(
            err,
            EngineError::DuplicateSnapshot {
                game_id: 1,
                team_id: 10
            }
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn out_of_order_insert_is_rejected() {
        let mut store = RatingStore::default();
        store.insert(snap(2, 10, 3, 0, 1510.0)).unwrap();
        let err = store.insert(snap(1, 10, 1, 0, 1505.0)).unwrap_err();
        assert_eq!(
            err,
            EngineError::OutOfOrderSnapshot {
                game_id: 1,
                team_id: 10
            }
        );
    }

    #[test]
    fn latest_before_excludes_the_game_itself() {
        let mut store = RatingStore::default();
        store.insert(snap(1, 10, 1, 0, 1510.0)).unwrap();
        store.insert(snap(2, 10, 3, 0, 1522.0)).unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        // At game 2's own key, only game 1's rating is visible.
        let before = store.latest_before(10, (date, 0)).unwrap();
        assert_eq!(before.game_id, 1);
        assert_eq!(before.rating, 1510.0);

        // Strictly after game 2, its post-game rating becomes visible.
        let after = store.latest_before(10, (date, 1)).unwrap();
        assert_eq!(after.game_id, 2);
    }

    #[test]
    fn rating_before_falls_back_to_initial() {
        let store = RatingStore::default();
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(store.rating_before(99, (date, 0), 1500.0), 1500.0);
    }

    #[test]
    fn same_day_ordinal_breaks_ties() {
        let mut store = RatingStore::default();
        store.insert(snap(1, 10, 1, 0, 1510.0)).unwrap();
        store.insert(snap(2, 10, 1, 1, 1520.0)).unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let before = store.latest_before(10, (date, 1)).unwrap();
        assert_eq!(before.game_id, 1);
    }
}
