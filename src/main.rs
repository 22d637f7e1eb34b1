use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hoopcast::blend::{BlendedProbability, blend};
use hoopcast::calibration;
use hoopcast::dataset;
use hoopcast::ledger::{GameLedger, TeamId};
use hoopcast::monte_carlo::simulate;
use hoopcast::params::{ModelParams, load_params};
use hoopcast::projection::{Projection, project, team_oriented_probs};
use hoopcast::walk_forward::WalkForwardEngine;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(db_path) = args.next().map(PathBuf::from) else {
        bail!("usage: hoopcast <db-path> [external-predictions.json] [params.json]");
    };
    let external_path = args.next().map(PathBuf::from);
    let params_path = args.next().map(PathBuf::from);

    let params = match params_path {
        Some(path) => load_params(&path)?,
        None => ModelParams::default(),
    };
    params.validate()?;

    let external_probs = match external_path {
        Some(path) => load_external_predictions(&path)?,
        None => HashMap::new(),
    };

    let mut conn = dataset::open_db(&db_path)?;
    let ledger = GameLedger::from_games(dataset::load_games(&conn)?)?;
    if ledger.is_empty() {
        bail!("no games in {}", db_path.display());
    }
    info!(games = ledger.len(), "loaded game ledger");

    let engine = WalkForwardEngine::new(params.rating);
    let store = engine.process(ledger.games())?;
    let written = dataset::save_snapshots(&mut conn, &store)?;
    info!(snapshots = written, "persisted rating snapshots");

    // Walk-forward backtest: blend every completed game with only what was
    // knowable before it and score against the actual outcome.
    let mut backtest_preds = Vec::new();
    let mut backtest_outcomes = Vec::new();
    for game in ledger.games().iter().filter(|g| g.is_final()) {
        let (Some(home_score), Some(away_score)) = (game.home_score, game.away_score) else {
            continue;
        };
        let bp = blend(
            game,
            &store,
            external_probs.get(&game.id).copied(),
            params.weights,
            params.rating.initial,
        )?;
        backtest_preds.push(bp.blended);
        backtest_outcomes.push(home_score > away_score);
    }
    let metrics = calibration::evaluate_probs(&backtest_preds, &backtest_outcomes);
    if metrics.samples > 0 {
        info!(
            samples = metrics.samples,
            brier = format!("{:.4}", metrics.brier),
            log_loss = format!("{:.4}", metrics.log_loss),
            accuracy = format!("{:.3}", metrics.accuracy),
            "blended model backtest"
        );
    }

    // Blend the remaining schedule once; every team's projection reads from
    // the same per-game probabilities.
    let mut remaining: Vec<BlendedProbability> = Vec::new();
    for game in ledger.games().iter().filter(|g| !g.is_final()) {
        let external = external_probs.get(&game.id).copied();
        if external.is_none() {
            warn!(game_id = game.id, "no external probability for scheduled game");
        }
        remaining.push(blend(
            game,
            &store,
            external,
            params.weights,
            params.rating.initial,
        )?);
    }

    let run_timestamp = Utc::now().to_rfc3339();
    let mut projections = Vec::new();
    for team in ledger.team_ids() {
        let (wins, losses) = current_record(&ledger, team);
        let projection = project(team, wins, losses, params.total_season_games, &remaining);

        let probs = team_oriented_probs(team, &remaining);
        if !probs.is_empty() {
            let result = simulate(wins, losses, &probs, params.num_simulations, None, None)?;
            dataset::save_simulation_run(&conn, team, &run_timestamp, &result)?;
            info!(
                team,
                mean = format!("{:.1}", result.mean),
                p10 = result.percentile_10,
                p90 = result.percentile_90,
                "simulated season range"
            );
        }
        projections.push(projection);
    }

    projections.sort_by(|a, b| {
        b.projected_wins
            .partial_cmp(&a.projected_wins)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    print_table(&projections);
    Ok(())
}

fn current_record(ledger: &GameLedger, team: TeamId) -> (u32, u32) {
    let mut wins = 0u32;
    let mut losses = 0u32;
    for game in ledger.games().iter().filter(|g| g.is_final() && g.involves(team)) {
        let (Some(home_score), Some(away_score)) = (game.home_score, game.away_score) else {
            continue;
        };
        let won = if game.home_id == team {
            home_score > away_score
        } else {
            away_score > home_score
        };
        if won {
            wins += 1;
        } else {
            losses += 1;
        }
    }
    (wins, losses)
}

fn load_external_predictions(path: &PathBuf) -> Result<HashMap<u64, f64>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read external predictions {}", path.display()))?;
    let parsed: HashMap<String, f64> = serde_json::from_str(&raw)
        .with_context(|| format!("parse external predictions {}", path.display()))?;

    let mut out = HashMap::with_capacity(parsed.len());
    for (key, prob) in parsed {
        let game_id = key
            .parse::<u64>()
            .with_context(|| format!("non-numeric game id {key:?} in external predictions"))?;
        out.insert(game_id, prob);
    }
    Ok(out)
}

fn print_table(projections: &[Projection]) {
    println!(
        "{:<5} {:<6} {:>4} {:>4} {:>8} {:>8} {:>7} {:>5}",
        "Rank", "Team", "W", "L", "Proj W", "Proj L", "Win%", "SOS"
    );
    for (rank, p) in projections.iter().enumerate() {
        println!(
            "{:<5} {:<6} {:>4} {:>4} {:>8.1} {:>8.1} {:>6.1}% {:>5.3}",
            rank + 1,
            p.team_id,
            p.current_wins,
            p.current_losses,
            p.projected_wins,
            p.projected_losses,
            p.projected_win_pct * 100.0,
            p.schedule_adjustment,
        );
    }
}
