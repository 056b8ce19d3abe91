use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::{events, sse_service},
    state::SharedState,
};

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/dashboard", get(dashboard_stream))
        .route("/sse/match/{match_id}", get(match_stream))
}

/// Stream the championship overview: an initial snapshot, then status,
/// round, match, and leaderboard updates.
#[utoipa::path(
    get,
    path = "/sse/dashboard",
    tag = "sse",
    responses((status = 200, description = "Dashboard SSE stream", content_type = "text/event-stream", body = String))
)]
pub async fn dashboard_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = state.hub().dashboard().subscribe();
    info!("new dashboard SSE connection");
    let initial = vec![events::dashboard_snapshot(&state).await];
    sse_service::to_sse_stream(initial, receiver, || {
        info!("dashboard SSE stream disconnected");
    })
}

/// Stream one match: the match header and current game snapshot, then the
/// live move and game events.
#[utoipa::path(
    get,
    path = "/sse/match/{match_id}",
    tag = "sse",
    params(("match_id" = Uuid, Path, description = "Identifier of the match to watch")),
    responses(
        (status = 200, description = "Match SSE stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown match"),
    )
)]
pub async fn match_stream(
    State(state): State<SharedState>,
    Path(match_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let record = state
        .store()
        .find_match(match_id)
        .await
        .map_err(crate::error::ServiceError::from)?
        .ok_or_else(|| AppError::NotFound(format!("match `{match_id}` not found")))?;

    let receiver = state.hub().match_topic(match_id).subscribe();
    info!(%match_id, "new match SSE connection");

    let names = events::roster_names(&state).await;
    let mut initial = vec![events::match_info_event(&record, &names)];
    if let Some(game) = record.games.last() {
        initial.push(events::game_info_event(&record, game));
    }

    // Everyone on the topic, the newcomer included, learns the new count.
    events::broadcast_spectator_count(&state, match_id);

    let disconnect_state = state.clone();
    Ok(sse_service::to_sse_stream(initial, receiver, move || {
        events::broadcast_spectator_count(&disconnect_state, match_id);
        info!(%match_id, "match SSE stream disconnected");
    }))
}
