use std::time::SystemTime;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Championship admin API data structures.
pub mod championship;
/// Event stream data structures.
pub mod events;
/// Health check data structures.
pub mod health;

/// Formats a SystemTime as an RFC3339 timestamp string.
pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
