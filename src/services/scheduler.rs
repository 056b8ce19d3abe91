use std::{collections::HashMap, sync::Arc};

use tokio::{
    sync::{Semaphore, watch},
    task::JoinSet,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    domain::team::Team,
    services::{
        events,
        match_runner::{self, MatchAssignment},
    },
    state::{SharedState, phase::PhaseEvent},
};

/// Execute the stored schedule: rounds strictly sequential, matches within a
/// round fanned out to a worker pool bounded by `max_parallel`.
///
/// A round only completes once every non-bye match reached a terminal
/// status; sealed matches left over from a halted run are not replayed. The
/// cancel signal is honored between rounds and inside every runner.
pub async fn run(state: SharedState, cancel: watch::Receiver<bool>) {
    let store = state.store();
    let schedule = match store.load_schedule().await {
        Ok(Some(schedule)) => schedule,
        Ok(None) => {
            warn!("scheduler started without a stored schedule");
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to load the schedule");
            return;
        }
    };
    let roster: HashMap<Uuid, Team> = match store.list_teams().await {
        Ok(teams) => teams.into_iter().map(|team| (team.id, team)).collect(),
        Err(err) => {
            warn!(error = %err, "failed to load the roster");
            return;
        }
    };

    let pool = Arc::new(Semaphore::new(state.config().max_parallel));

    for round in &schedule.rounds {
        if *cancel.borrow() {
            return;
        }

        state.set_current_round(round.index + 1).await;
        events::broadcast_round_start(&state, round.index);
        events::broadcast_status(&state).await;
        info!(round = round.index + 1, matches = round.pairings.len(), "round started");

        let mut runners = JoinSet::new();
        for pairing in &round.pairings {
            let record = match store.find_match(pairing.match_id).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    warn!(match_id = %pairing.match_id, "scheduled match missing from the store");
                    continue;
                }
                Err(err) => {
                    warn!(match_id = %pairing.match_id, error = %err, "failed to load match");
                    continue;
                }
            };
            if record.is_sealed() {
                continue;
            }
            let (Some(team_a), Some(team_b)) = (
                roster.get(&record.team_a).cloned(),
                roster.get(&record.team_b).cloned(),
            ) else {
                warn!(match_id = %record.id, "match references teams missing from the roster");
                continue;
            };

            let assignment = MatchAssignment {
                record,
                team_a,
                team_b,
            };
            let pool = pool.clone();
            let state = state.clone();
            let cancel = cancel.clone();
            runners.spawn(async move {
                let Ok(_permit) = pool.acquire_owned().await else {
                    return;
                };
                if *cancel.borrow() {
                    return;
                }
                match_runner::run_match(state, assignment, cancel).await;
            });
        }
        while runners.join_next().await.is_some() {}

        if *cancel.borrow() {
            return;
        }
        events::broadcast_round_complete(&state, round.index);
    }

    if state.apply_phase(PhaseEvent::RoundsCompleted).await.is_ok() {
        info!("championship finished");
        events::broadcast_status(&state).await;
        events::broadcast_leaderboard(&state).await;
    }
}
