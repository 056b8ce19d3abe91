use crate::{dto::health::HealthResponse, state::SharedState};

/// Report backend health, probing the store with a cheap read.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().list_teams().await {
        Ok(_) => HealthResponse::ok(),
        Err(_) => HealthResponse::degraded(),
    }
}
