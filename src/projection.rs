use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blend::BlendedProbability;
use crate::ledger::TeamId;

/// Season-end expected-wins projection for one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub team_id: TeamId,
    pub current_wins: u32,
    pub current_losses: u32,
    pub remaining_games: u32,
    /// After the strength-of-schedule adjustment.
    pub expected_remaining_wins: f64,
    /// 1.0 when no adjustment applied; reported so consumers can see the
    /// correction rather than a silently reshaped number.
    pub schedule_adjustment: f64,
    pub projected_wins: f64,
    pub projected_losses: f64,
    pub projected_win_pct: f64,
}

/// Expected remaining wins is the sum of team-oriented win probabilities,
/// rescaled toward a league-average slate: a remaining schedule whose average
/// opponent implied win probability is above 0.5 is harder than neutral, so
/// the raw sum shrinks by 0.5 / avg, and vice versa.
pub fn project(
    team: TeamId,
    current_wins: u32,
    current_losses: u32,
    total_season_games: u32,
    remaining: &[BlendedProbability],
) -> Projection {
    let mut expected = 0.0;
    let mut opponent_strength = 0.0;
    let mut counted = 0u32;

    for bp in remaining {
        let Some(p) = bp.for_team(team) else {
            debug!(game_id = bp.game_id, team, "remaining game does not involve team, skipped");
            continue;
        };
        expected += p;
        opponent_strength += 1.0 - p;
        counted += 1;
    }

    let schedule_adjustment = if counted > 0 {
        let avg = opponent_strength / counted as f64;
        if avg > 0.0 { 0.5 / avg } else { 1.0 }
    } else {
        1.0
    };

    let expected_remaining_wins = expected * schedule_adjustment;
    let projected_wins = current_wins as f64 + expected_remaining_wins;
    let projected_losses = total_season_games as f64 - projected_wins;
    let projected_win_pct = if total_season_games > 0 {
        projected_wins / total_season_games as f64
    } else {
        0.0
    };

    Projection {
        team_id: team,
        current_wins,
        current_losses,
        remaining_games: counted,
        expected_remaining_wins,
        schedule_adjustment,
        projected_wins,
        projected_losses,
        projected_win_pct,
    }
}

/// Team-oriented win probabilities for the remaining schedule, in schedule
/// order. Games not involving the team are dropped.
pub fn team_oriented_probs(team: TeamId, remaining: &[BlendedProbability]) -> Vec<f64> {
    remaining
        .iter()
        .filter_map(|bp| bp.for_team(team))
        .collect()
}
