use std::collections::HashMap;

use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        leaderboard::standings,
        record::{MatchRecord, MatchStatus},
        schedule::Schedule,
        team::Team,
    },
    dto::{
        championship::{
            ActionResponse, LeaderboardRow, RegisterRequest, ScheduleResponse, StatusResponse,
            TeamView, round_views,
        },
        events::MatchEvent,
    },
    error::ServiceError,
    services::{events, scheduler},
    state::{
        RunHandle, SharedState,
        phase::{Phase, PhaseEvent},
    },
};

/// Register a team while the waiting room is open.
pub async fn register(
    state: &SharedState,
    request: RegisterRequest,
) -> Result<ActionResponse, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let _gate = state.admin_gate().lock().await;
    if state.phase().await != Phase::Waiting {
        return Err(ServiceError::InvalidState(
            "registration is closed once the championship has started".into(),
        ));
    }

    let store = state.store();
    let teams = store.list_teams().await?;
    if teams.len() >= state.config().max_teams {
        return Err(ServiceError::InvalidInput(format!(
            "the roster is full ({} teams max)",
            state.config().max_teams
        )));
    }
    if teams.iter().any(|team| team.name == request.team_name) {
        return Err(ServiceError::InvalidInput(format!(
            "team name `{}` is already registered",
            request.team_name
        )));
    }

    let team = Team::new(request.team_name, request.api_endpoint);
    store.save_team(team.clone()).await?;
    info!(team = %team.name, endpoint = %team.endpoint, "team registered");
    events::broadcast_status(state).await;
    Ok(ActionResponse::ok(format!("team `{}` registered", team.name)))
}

/// Start the championship: build (or reuse) the schedule, seed the match
/// records, and launch the scheduler task.
pub async fn start(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let _gate = state.admin_gate().lock().await;
    if state.phase().await != Phase::Waiting {
        return Err(ServiceError::InvalidState(
            "championship already started".into(),
        ));
    }

    let store = state.store();
    let teams = store.list_teams().await?;
    if teams.len() < state.config().min_teams {
        return Err(ServiceError::InvalidState(format!(
            "at least {} teams are required to start",
            state.config().min_teams
        )));
    }

    // A restart leaves the previous schedule in place so replayed matches
    // keep their identity; only a blank store gets a fresh one.
    let schedule = match store.load_schedule().await? {
        Some(existing) => existing,
        None => {
            let ids: Vec<Uuid> = teams.iter().map(|team| team.id).collect();
            let schedule = Schedule::round_robin(&ids);
            store.save_schedule(schedule.clone()).await?;
            for round in &schedule.rounds {
                for pairing in &round.pairings {
                    store
                        .update_match(MatchRecord::scheduled(
                            pairing.match_id,
                            round.index,
                            pairing.team_a,
                            pairing.team_b,
                            state.config().match_bank_ms(),
                        ))
                        .await?;
                }
            }
            schedule
        }
    };

    state
        .apply_phase(PhaseEvent::Start)
        .await
        .map_err(|err| ServiceError::InvalidState(err.to_string()))?;
    state.set_total_rounds(schedule.total_rounds()).await;
    state.set_current_round(0).await;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let task = tokio::spawn(scheduler::run(state.clone(), cancel_rx));
    state.install_run(RunHandle::new(cancel_tx, task)).await;

    info!(
        teams = teams.len(),
        rounds = schedule.total_rounds(),
        "championship started"
    );
    events::broadcast_status(state).await;
    Ok(ActionResponse::ok("championship started"))
}

/// Championship progress for the status route.
pub async fn status(state: &SharedState) -> StatusResponse {
    events::status_response(state).await
}

/// Registered teams in roster order.
pub async fn teams(state: &SharedState) -> Result<Vec<TeamView>, ServiceError> {
    let teams = state.store().list_teams().await?;
    Ok(teams.iter().map(TeamView::from).collect())
}

/// The published schedule with per-match summaries.
pub async fn schedule_view(state: &SharedState) -> Result<ScheduleResponse, ServiceError> {
    let snapshot = state.store().snapshot().await?;
    let names: HashMap<Uuid, String> = snapshot
        .teams
        .iter()
        .map(|team| (team.id, team.name.clone()))
        .collect();
    let matches: HashMap<Uuid, MatchRecord> = snapshot
        .matches
        .into_iter()
        .map(|record| (record.id, record))
        .collect();
    Ok(ScheduleResponse {
        rounds: snapshot
            .schedule
            .map(|schedule| round_views(&schedule, &matches, &names))
            .unwrap_or_default(),
    })
}

/// Current standings sorted by `(-points, time_used, name)`.
pub async fn leaderboard(state: &SharedState) -> Result<Vec<LeaderboardRow>, ServiceError> {
    let store = state.store();
    let teams = store.list_teams().await?;
    let matches = store.list_matches().await?;
    Ok(standings(&teams, &matches).iter().map(Into::into).collect())
}

/// Explicit restart command: cancel the runners, revert every in-progress
/// match to `scheduled` (telling its spectators to reload), and return to
/// the waiting room with the roster and schedule intact.
pub async fn restart(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let _gate = state.admin_gate().lock().await;
    if let Some(run) = state.take_run().await {
        run.shutdown().await;
    }

    let store = state.store();
    let bank = state.config().match_bank_ms();
    for mut record in store.list_matches().await? {
        if record.status == MatchStatus::InProgress {
            record.reschedule(bank);
            store.update_match(record.clone()).await?;
            state.hub().publish_match(
                record.id,
                MatchEvent::MatchRestart {
                    match_id: record.id,
                },
            );
            events::broadcast_match_update(state, &record).await;
        }
    }

    if let Err(err) = state.apply_phase(PhaseEvent::Halt).await {
        warn!(error = %err, "halt transition rejected during restart");
    }
    events::broadcast_status(state).await;
    info!("championship halted; in-progress matches rescheduled");
    Ok(ActionResponse::ok(
        "championship halted; in-progress matches will replay from game 1",
    ))
}

/// Full reset: cancel the runners and wipe teams, schedule, and matches.
pub async fn reset(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let _gate = state.admin_gate().lock().await;
    if let Some(run) = state.take_run().await {
        run.shutdown().await;
    }

    // Courtesy notice to match spectators before their topics disappear.
    if let Ok(records) = state.store().list_matches().await {
        for record in records.iter().filter(|record| !record.is_sealed()) {
            state.hub().publish_match(
                record.id,
                MatchEvent::MatchRestart {
                    match_id: record.id,
                },
            );
        }
    }

    state.store().clear().await?;
    state.hub().clear_match_topics();
    if let Err(err) = state.apply_phase(PhaseEvent::Halt).await {
        warn!(error = %err, "halt transition rejected during reset");
    }
    events::broadcast_status(state).await;
    events::broadcast_leaderboard(state).await;
    info!("championship reset");
    Ok(ActionResponse::ok("championship reset"))
}

/// Admin-gated store wipe. When an admin token is configured the caller has
/// to present it.
pub async fn clear_cache(
    state: &SharedState,
    token: Option<&str>,
) -> Result<ActionResponse, ServiceError> {
    if let Some(expected) = &state.config().admin_token {
        if token != Some(expected.as_str()) {
            return Err(ServiceError::Unauthorized(
                "valid admin token required".into(),
            ));
        }
    }
    reset(state).await?;
    Ok(ActionResponse::ok("cache cleared"))
}

/// Boot-time normalization: a process restart replays any match that was in
/// flight from game 1, so in-progress records drop back to `scheduled`.
pub async fn recover(state: &SharedState) -> Result<(), ServiceError> {
    let store = state.store();
    let bank = state.config().match_bank_ms();
    for mut record in store.list_matches().await? {
        if record.status == MatchStatus::InProgress {
            record.reschedule(bank);
            store.update_match(record).await?;
        }
    }
    Ok(())
}
