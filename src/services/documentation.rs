use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the championship backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::championship::register,
        crate::routes::championship::start,
        crate::routes::championship::status,
        crate::routes::championship::teams,
        crate::routes::championship::schedule,
        crate::routes::championship::leaderboard,
        crate::routes::championship::restart,
        crate::routes::championship::reset,
        crate::routes::championship::clear_cache,
        crate::routes::sse::dashboard_stream,
        crate::routes::sse::match_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::championship::RegisterRequest,
            crate::dto::championship::ActionResponse,
            crate::dto::championship::StatusResponse,
            crate::dto::championship::TeamView,
            crate::dto::championship::ScheduleResponse,
            crate::dto::championship::RoundView,
            crate::dto::championship::MatchView,
            crate::dto::championship::LeaderboardRow,
            crate::dto::events::DashboardEvent,
            crate::dto::events::MatchEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "championship", description = "Championship administration and read surfaces"),
        (name = "sse", description = "Server-sent event streams for spectators"),
    )
)]
pub struct ApiDoc;
