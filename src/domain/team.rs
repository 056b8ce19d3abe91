use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length accepted for a team display name.
pub const MAX_NAME_LENGTH: usize = 64;

/// A registered team and the agent endpoint playing on its behalf.
///
/// The roster is append-only while registration is open and read-only once a
/// championship starts; only a full reset removes teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Stable identifier, assigned at registration.
    pub id: Uuid,
    /// Display name, unique across the roster (1 to 64 characters).
    pub name: String,
    /// HTTP endpoint implementing the move protocol. May be shared between
    /// teams.
    pub endpoint: String,
    /// Registration timestamp, for auditing and the admin surface.
    pub registered_at: SystemTime,
}

impl Team {
    /// Build a new team with a fresh identifier.
    pub fn new(name: String, endpoint: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            endpoint,
            registered_at: SystemTime::now(),
        }
    }
}
