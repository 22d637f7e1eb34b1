use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub type TeamId = u32;

/// Total order used throughout the engine: calendar day first, then the
/// loader-assigned ordinal to break same-day ties deterministically.
pub type GameKey = (NaiveDate, u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Scheduled,
    Final,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: u64,
    pub date: NaiveDate,
    pub ordinal: u32,
    pub home_id: TeamId,
    pub away_id: TeamId,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub status: GameStatus,
    pub season: String,
}

impl Game {
    pub fn key(&self) -> GameKey {
        (self.date, self.ordinal)
    }

    /// Final with both scores present. Anything else contributes no snapshot.
    pub fn is_final(&self) -> bool {
        self.status == GameStatus::Final && self.home_score.is_some() && self.away_score.is_some()
    }

    pub fn involves(&self, team: TeamId) -> bool {
        self.home_id == team || self.away_id == team
    }

    /// The loader uses id 0 as "no team"; a game missing a participant (or
    /// listing the same team twice) is a fatal input error, never skipped.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.home_id == 0 || self.away_id == 0 || self.home_id == self.away_id {
            return Err(EngineError::MalformedGame {
                game_id: self.id,
                home_id: self.home_id,
                away_id: self.away_id,
            });
        }
        Ok(())
    }
}

/// Ordered, append-only record of a league's games. The loader supplies games
/// in no guaranteed order; construction sorts them once.
#[derive(Debug, Clone, Default)]
pub struct GameLedger {
    games: Vec<Game>,
}

impl GameLedger {
    pub fn from_games(mut games: Vec<Game>) -> Result<Self, EngineError> {
        for game in &games {
            game.validate()?;
        }
        games.sort_by_key(Game::key);
        Ok(Self { games })
    }

    /// Inserts at the ordered position; out-of-order appends (late backfills)
    /// keep the ledger sorted.
    pub fn push(&mut self, game: Game) -> Result<(), EngineError> {
        game.validate()?;
        let pos = self.games.partition_point(|g| g.key() <= game.key());
        self.games.insert(pos, game);
        Ok(())
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Completed games involving `team` strictly before `key`, oldest first.
    pub fn prior_games(&self, team: TeamId, key: GameKey) -> impl Iterator<Item = &Game> {
        self.games
            .iter()
            .filter(move |g| g.involves(team) && g.is_final() && g.key() < key)
    }

    /// Distinct participant ids across the whole ledger, ascending.
    pub fn team_ids(&self) -> Vec<TeamId> {
        let mut ids: Vec<TeamId> = self
            .games
            .iter()
            .flat_map(|g| [g.home_id, g.away_id])
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn game(id: u64, d: u32, ordinal: u32, home: TeamId, away: TeamId) -> Game {
        Game {
            id,
            date: day(d),
            ordinal,
            home_id: home,
            away_id: away,
            home_score: Some(100),
            away_score: Some(95),
            status: GameStatus::Final,
            season: "2025".to_string(),
        }
    }

    #[test]
    fn from_games_sorts_by_date_then_ordinal() {
        let ledger = GameLedger::from_games(vec![
            game(3, 2, 0, 1, 2),
            game(1, 1, 1, 3, 4),
            game(2, 1, 0, 1, 3),
        ])
        .unwrap();
        let ids: Vec<u64> = ledger.games().iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn missing_participant_is_rejected() {
        let mut bad = game(1, 1, 0, 1, 2);
        bad.away_id = 0;
        let err = GameLedger::from_games(vec![bad]).unwrap_err();
        assert!(matches!(err, EngineError::MalformedGame { game_id: 1, .. }));
    }

    #[test]
    fn self_match_is_rejected() {
        let bad = game(7, 1, 0, 5, 5);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn prior_games_is_strictly_before() {
        let ledger = GameLedger::from_games(vec![
            game(1, 1, 0, 1, 2),
            game(2, 2, 0, 1, 3),
            game(3, 2, 1, 1, 4),
        ])
        .unwrap();
        // Same day, lower ordinal counts as prior; the game itself does not.
        let prior: Vec<u64> = ledger.prior_games(1, (day(2), 1)).map(|g| g.id).collect();
        assert_eq!(prior, vec![1, 2]);
    }

    #[test]
    fn scheduled_games_are_not_prior() {
        let mut future = game(2, 2, 0, 1, 3);
        future.status = GameStatus::Scheduled;
        future.home_score = None;
        future.away_score = None;
        let ledger = GameLedger::from_games(vec![game(1, 1, 0, 1, 2), future]).unwrap();
        let prior: Vec<u64> = ledger.prior_games(1, (day(5), 0)).map(|g| g.id).collect();
        assert_eq!(prior, vec![1]);
    }
}
