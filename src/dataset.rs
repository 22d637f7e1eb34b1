use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, params};

use crate::ledger::{Game, GameStatus, TeamId};
use crate::monte_carlo::SimulationResult;
use crate::rating_store::{RatingSnapshot, RatingStore, WindowAverages};

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS games (
            game_id INTEGER PRIMARY KEY,
            game_date TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            home_id INTEGER NOT NULL,
            away_id INTEGER NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            status TEXT NOT NULL,
            season TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_games_order ON games(game_date, ordinal);
        CREATE INDEX IF NOT EXISTS idx_games_season ON games(season);

        CREATE TABLE IF NOT EXISTS team_game_snapshots (
            game_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            game_date TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            is_home INTEGER NOT NULL,
            games_played INTEGER NOT NULL,
            wins INTEGER NOT NULL,
            losses INTEGER NOT NULL,
            win_pct REAL NOT NULL,
            points_for REAL NOT NULL,
            points_against REAL NOT NULL,
            point_diff REAL NOT NULL,
            ppf_5game REAL NULL,
            ppa_5game REAL NULL,
            diff_5game REAL NULL,
            ppf_10game REAL NULL,
            ppa_10game REAL NULL,
            diff_10game REAL NULL,
            ppf_20game REAL NULL,
            ppa_20game REAL NULL,
            diff_20game REAL NULL,
            ppf_100game REAL NULL,
            ppa_100game REAL NULL,
            diff_100game REAL NULL,
            rating REAL NOT NULL,
            rest_days INTEGER NULL,
            back_to_back INTEGER NOT NULL,
            won INTEGER NOT NULL,
            PRIMARY KEY (game_id, team_id)
        );
        CREATE INDEX IF NOT EXISTS idx_snapshots_team ON team_game_snapshots(team_id, game_date, ordinal);

        CREATE TABLE IF NOT EXISTS simulation_runs (
            team_id INTEGER NOT NULL,
            run_timestamp TEXT NOT NULL,
            num_simulations INTEGER NOT NULL,
            mean REAL NOT NULL,
            median INTEGER NOT NULL,
            std_dev REAL NOT NULL,
            percentile_10 INTEGER NOT NULL,
            percentile_90 INTEGER NOT NULL,
            distribution_json TEXT NOT NULL,
            PRIMARY KEY (team_id, run_timestamp)
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn upsert_games(conn: &mut Connection, games: &[Game]) -> Result<usize> {
    let tx = conn.transaction().context("begin games transaction")?;
    let mut written = 0usize;
    for game in games {
        tx.execute(
            r#"
            INSERT INTO games (
                game_id, game_date, ordinal, home_id, away_id,
                home_score, away_score, status, season
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(game_id) DO UPDATE SET
                game_date = excluded.game_date,
                ordinal = excluded.ordinal,
                home_id = excluded.home_id,
                away_id = excluded.away_id,
                home_score = excluded.home_score,
                away_score = excluded.away_score,
                status = excluded.status,
                season = excluded.season
            "#,
            params![
                game.id as i64,
                game.date.to_string(),
                game.ordinal as i64,
                game.home_id as i64,
                game.away_id as i64,
                game.home_score,
                game.away_score,
                status_str(game.status),
                game.season,
            ],
        )
        .context("upsert game")?;
        written += 1;
    }
    tx.commit().context("commit games transaction")?;
    Ok(written)
}

pub fn load_games(conn: &Connection) -> Result<Vec<Game>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT game_id, game_date, ordinal, home_id, away_id,
                   home_score, away_score, status, season
            FROM games
            ORDER BY game_date ASC, ordinal ASC
            "#,
        )
        .context("prepare load games query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, u64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, Option<i32>>(5)?,
                row.get::<_, Option<i32>>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })
        .context("query load games")?;

    let mut out = Vec::new();
    for row in rows {
        let (id, date, ordinal, home_id, away_id, home_score, away_score, status, season) =
            row.context("decode game row")?;
        out.push(Game {
            id,
            date: parse_date(&date)?,
            ordinal,
            home_id,
            away_id,
            home_score,
            away_score,
            status: parse_status(&status)?,
            season,
        });
    }
    Ok(out)
}

/// One row per (game, team); reruns of the engine overwrite in place so a
/// full recompute stays idempotent at the storage layer too.
pub fn save_snapshots(conn: &mut Connection, store: &RatingStore) -> Result<usize> {
    let tx = conn.transaction().context("begin snapshots transaction")?;
    let mut written = 0usize;
    for snap in store.snapshots() {
        tx.execute(
            r#"
            INSERT INTO team_game_snapshots (
                game_id, team_id, game_date, ordinal, is_home,
                games_played, wins, losses, win_pct,
                points_for, points_against, point_diff,
                ppf_5game, ppa_5game, diff_5game,
                ppf_10game, ppa_10game, diff_10game,
                ppf_20game, ppa_20game, diff_20game,
                ppf_100game, ppa_100game, diff_100game,
                rating, rest_days, back_to_back, won
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24,
                ?25, ?26, ?27, ?28
            )
            ON CONFLICT(game_id, team_id) DO UPDATE SET
                game_date = excluded.game_date,
                ordinal = excluded.ordinal,
                is_home = excluded.is_home,
                games_played = excluded.games_played,
                wins = excluded.wins,
                losses = excluded.losses,
                win_pct = excluded.win_pct,
                points_for = excluded.points_for,
                points_against = excluded.points_against,
                point_diff = excluded.point_diff,
                ppf_5game = excluded.ppf_5game,
                ppa_5game = excluded.ppa_5game,
                diff_5game = excluded.diff_5game,
                ppf_10game = excluded.ppf_10game,
                ppa_10game = excluded.ppa_10game,
                diff_10game = excluded.diff_10game,
                ppf_20game = excluded.ppf_20game,
                ppa_20game = excluded.ppa_20game,
                diff_20game = excluded.diff_20game,
                ppf_100game = excluded.ppf_100game,
                ppa_100game = excluded.ppa_100game,
                diff_100game = excluded.diff_100game,
                rating = excluded.rating,
                rest_days = excluded.rest_days,
                back_to_back = excluded.back_to_back,
                won = excluded.won
            "#,
            params![
                snap.game_id as i64,
                snap.team_id as i64,
                snap.date.to_string(),
                snap.ordinal as i64,
                snap.is_home as i64,
                snap.games_played as i64,
                snap.wins as i64,
                snap.losses as i64,
                snap.win_pct,
                snap.points_for,
                snap.points_against,
                snap.point_diff,
                snap.last_5.map(|w| w.points_for),
                snap.last_5.map(|w| w.points_against),
                snap.last_5.map(|w| w.differential),
                snap.last_10.map(|w| w.points_for),
                snap.last_10.map(|w| w.points_against),
                snap.last_10.map(|w| w.differential),
                snap.last_20.map(|w| w.points_for),
                snap.last_20.map(|w| w.points_against),
                snap.last_20.map(|w| w.differential),
                snap.last_100.map(|w| w.points_for),
                snap.last_100.map(|w| w.points_against),
                snap.last_100.map(|w| w.differential),
                snap.rating,
                snap.rest_days,
                snap.back_to_back as i64,
                snap.won as i64,
            ],
        )
        .context("upsert snapshot")?;
        written += 1;
    }
    tx.commit().context("commit snapshots transaction")?;
    Ok(written)
}

/// Loads every snapshot in (date, ordinal) order, rebuilding the in-memory
/// store. Insertion order matters: the store rejects out-of-order rows.
pub fn load_snapshots(conn: &Connection) -> Result<RatingStore> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT game_id, team_id, game_date, ordinal, is_home,
                   games_played, wins, losses, win_pct,
                   points_for, points_against, point_diff,
                   ppf_5game, ppa_5game, diff_5game,
                   ppf_10game, ppa_10game, diff_10game,
                   ppf_20game, ppa_20game, diff_20game,
                   ppf_100game, ppa_100game, diff_100game,
                   rating, rest_days, back_to_back, won
            FROM team_game_snapshots
            ORDER BY game_date ASC, ordinal ASC, team_id ASC
            "#,
        )
        .context("prepare load snapshots query")?;

    let rows = stmt
        .query_map([], decode_snapshot_row)
        .context("query load snapshots")?;

    let mut store = RatingStore::default();
    for row in rows {
        let snap = row.context("decode snapshot row")?;
        store.insert(snap).context("rebuild rating store")?;
    }
    Ok(store)
}

pub fn save_simulation_run(
    conn: &Connection,
    team_id: TeamId,
    run_timestamp: &str,
    result: &SimulationResult,
) -> Result<()> {
    let distribution_json =
        serde_json::to_string(&result.distribution).context("serialize distribution")?;
    conn.execute(
        r#"
        INSERT INTO simulation_runs (
            team_id, run_timestamp, num_simulations,
            mean, median, std_dev, percentile_10, percentile_90, distribution_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(team_id, run_timestamp) DO UPDATE SET
            num_simulations = excluded.num_simulations,
            mean = excluded.mean,
            median = excluded.median,
            std_dev = excluded.std_dev,
            percentile_10 = excluded.percentile_10,
            percentile_90 = excluded.percentile_90,
            distribution_json = excluded.distribution_json
        "#,
        params![
            team_id as i64,
            run_timestamp,
            result.distribution.len() as i64,
            result.mean,
            result.median as i64,
            result.std_dev,
            result.percentile_10 as i64,
            result.percentile_90 as i64,
            distribution_json,
        ],
    )
    .context("upsert simulation run")?;
    Ok(())
}

pub fn load_simulation_runs(
    conn: &Connection,
    team_id: TeamId,
) -> Result<Vec<(String, SimulationResult)>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT run_timestamp, mean, median, std_dev,
                   percentile_10, percentile_90, distribution_json
            FROM simulation_runs
            WHERE team_id = ?1
            ORDER BY run_timestamp ASC
            "#,
        )
        .context("prepare load simulation runs query")?;

    let rows = stmt
        .query_map(params![team_id as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .context("query load simulation runs")?;

    let mut out = Vec::new();
    for row in rows {
        let (run_timestamp, mean, median, std_dev, p10, p90, distribution_json) =
            row.context("decode simulation run row")?;
        let distribution: Vec<u32> =
            serde_json::from_str(&distribution_json).context("parse distribution json")?;
        out.push((
            run_timestamp,
            SimulationResult {
                mean,
                median: median as u32,
                std_dev,
                percentile_10: p10 as u32,
                percentile_90: p90 as u32,
                distribution,
            },
        ));
    }
    Ok(out)
}

fn decode_snapshot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RatingSnapshot> {
    let date: String = row.get(2)?;
    let date = date.parse::<NaiveDate>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(err))
    })?;
    let snap = RatingSnapshot {
        game_id: row.get::<_, u64>(0)?,
        team_id: row.get::<_, u32>(1)?,
        date,
        ordinal: row.get::<_, u32>(3)?,
        is_home: row.get::<_, i64>(4)? != 0,
        games_played: row.get::<_, u32>(5)?,
        wins: row.get::<_, u32>(6)?,
        losses: row.get::<_, u32>(7)?,
        win_pct: row.get(8)?,
        points_for: row.get(9)?,
        points_against: row.get(10)?,
        point_diff: row.get(11)?,
        last_5: window_from_cols(row, 12)?,
        last_10: window_from_cols(row, 15)?,
        last_20: window_from_cols(row, 18)?,
        last_100: window_from_cols(row, 21)?,
        rating: row.get(24)?,
        rest_days: row.get(25)?,
        back_to_back: row.get::<_, i64>(26)? != 0,
        won: row.get::<_, i64>(27)? != 0,
    };
    Ok(snap)
}

fn window_from_cols(row: &rusqlite::Row<'_>, start: usize) -> rusqlite::Result<Option<WindowAverages>> {
    let points_for: Option<f64> = row.get(start)?;
    let points_against: Option<f64> = row.get(start + 1)?;
    let differential: Option<f64> = row.get(start + 2)?;
    Ok(match (points_for, points_against, differential) {
        (Some(points_for), Some(points_against), Some(differential)) => Some(WindowAverages {
            points_for,
            points_against,
            differential,
        }),
        _ => None,
    })
}

fn status_str(status: GameStatus) -> &'static str {
    match status {
        GameStatus::Scheduled => "scheduled",
        GameStatus::Final => "final",
    }
}

fn parse_status(raw: &str) -> Result<GameStatus> {
    match raw {
        "scheduled" => Ok(GameStatus::Scheduled),
        "final" => Ok(GameStatus::Final),
        other => anyhow::bail!("unknown game status {other:?}"),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    raw.parse::<NaiveDate>()
        .with_context(|| format!("invalid game date {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        assert_eq!(parse_status(status_str(GameStatus::Final)).unwrap(), GameStatus::Final);
        assert_eq!(
            parse_status(status_str(GameStatus::Scheduled)).unwrap(),
            GameStatus::Scheduled
        );
        assert!(parse_status("postponed").is_err());
    }

    #[test]
    fn date_round_trips_through_text() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        assert_eq!(parse_date(&date.to_string()).unwrap(), date);
    }
}
