use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};

use crate::{
    dto::championship::{
        ActionResponse, LeaderboardRow, RegisterRequest, ScheduleResponse, StatusResponse, TeamView,
    },
    error::AppError,
    services::championship_service,
    state::SharedState,
};

/// Header carrying the admin token for the cache-clearing route.
const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Routes administering the championship plus its read surfaces.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/championship/register", post(register))
        .route("/api/championship/start", post(start))
        .route("/api/championship/status", get(status))
        .route("/api/championship/teams", get(teams))
        .route("/api/championship/schedule", get(schedule))
        .route("/api/championship/leaderboard", get(leaderboard))
        .route("/api/championship/restart", post(restart))
        .route("/api/championship/reset", post(reset))
        .route("/api/clear-cache", post(clear_cache))
}

/// Register a team and its agent endpoint while the waiting room is open.
#[utoipa::path(
    post,
    path = "/api/championship/register",
    tag = "championship",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Team registered", body = ActionResponse),
        (status = 400, description = "Invalid name or endpoint, duplicate name, or full roster"),
        (status = 409, description = "Registration closed"),
    )
)]
pub async fn register(
    State(state): State<SharedState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let response = championship_service::register(&state, payload).await?;
    Ok(Json(response))
}

/// Start the championship once at least two teams have registered.
#[utoipa::path(
    post,
    path = "/api/championship/start",
    tag = "championship",
    responses(
        (status = 200, description = "Championship started", body = ActionResponse),
        (status = 409, description = "Already started or not enough teams"),
    )
)]
pub async fn start(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    let response = championship_service::start(&state).await?;
    Ok(Json(response))
}

/// Current lifecycle phase and round progress.
#[utoipa::path(
    get,
    path = "/api/championship/status",
    tag = "championship",
    responses((status = 200, description = "Championship status", body = StatusResponse))
)]
pub async fn status(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(championship_service::status(&state).await)
}

/// The registered teams in roster order.
#[utoipa::path(
    get,
    path = "/api/championship/teams",
    tag = "championship",
    responses((status = 200, description = "Registered teams", body = [TeamView]))
)]
pub async fn teams(State(state): State<SharedState>) -> Result<Json<Vec<TeamView>>, AppError> {
    let teams = championship_service::teams(&state).await?;
    Ok(Json(teams))
}

/// The full schedule with per-match summaries.
#[utoipa::path(
    get,
    path = "/api/championship/schedule",
    tag = "championship",
    responses((status = 200, description = "Round-robin schedule", body = ScheduleResponse))
)]
pub async fn schedule(
    State(state): State<SharedState>,
) -> Result<Json<ScheduleResponse>, AppError> {
    let response = championship_service::schedule_view(&state).await?;
    Ok(Json(response))
}

/// Standings sorted by points, then time used, then name.
#[utoipa::path(
    get,
    path = "/api/championship/leaderboard",
    tag = "championship",
    responses((status = 200, description = "Current standings", body = [LeaderboardRow]))
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<Vec<LeaderboardRow>>, AppError> {
    let rows = championship_service::leaderboard(&state).await?;
    Ok(Json(rows))
}

/// Halt the championship and reschedule in-progress matches from game 1.
#[utoipa::path(
    post,
    path = "/api/championship/restart",
    tag = "championship",
    responses((status = 200, description = "Championship halted for replay", body = ActionResponse))
)]
pub async fn restart(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    let response = championship_service::restart(&state).await?;
    Ok(Json(response))
}

/// Wipe every team, schedule, and match, returning to the waiting room.
#[utoipa::path(
    post,
    path = "/api/championship/reset",
    tag = "championship",
    responses((status = 200, description = "Championship reset", body = ActionResponse))
)]
pub async fn reset(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    let response = championship_service::reset(&state).await?;
    Ok(Json(response))
}

/// Admin-gated store wipe, kept for operational tooling.
#[utoipa::path(
    post,
    path = "/api/clear-cache",
    tag = "championship",
    responses(
        (status = 200, description = "Store cleared", body = ActionResponse),
        (status = 401, description = "Missing or invalid admin token"),
    )
)]
pub async fn clear_cache(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ActionResponse>, AppError> {
    let token = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    let response = championship_service::clear_cache(&state, token).await?;
    Ok(Json(response))
}
