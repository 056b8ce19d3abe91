/// In-memory store backend.
pub mod memory;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{record::MatchRecord, schedule::Schedule, team::Team};

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying engine.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("storage encoding failed: {message}")]
    Encoding {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(
        message: String,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct an encoding error from a (de)serialization failure.
    pub fn encoding(
        message: String,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StorageError::Encoding {
            message,
            source: Box::new(source),
        }
    }
}

/// Full store contents used to seed dashboard subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub teams: Vec<Team>,
    pub schedule: Option<Schedule>,
    pub matches: Vec<MatchRecord>,
}

/// Abstraction over the persistence layer for the championship state.
///
/// Logical layout is a keyed JSON document space with three namespaces:
/// `teams:{id}`, `schedule`, and `matches:{id}`. Writes are idempotent and
/// keyed, so replays are safe; `update_match` is last-writer-wins, which is
/// sound because exactly one match runner owns a record at a time.
pub trait ChampionshipStore: Send + Sync {
    fn save_team(&self, team: Team) -> BoxFuture<'static, StorageResult<()>>;
    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<Team>>>;
    fn save_schedule(&self, schedule: Schedule) -> BoxFuture<'static, StorageResult<()>>;
    fn load_schedule(&self) -> BoxFuture<'static, StorageResult<Option<Schedule>>>;
    fn update_match(&self, record: MatchRecord) -> BoxFuture<'static, StorageResult<()>>;
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchRecord>>>;
    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchRecord>>>;
    fn snapshot(&self) -> BoxFuture<'static, StorageResult<StoreSnapshot>>;
    /// Remove every stored document across all namespaces.
    fn clear(&self) -> BoxFuture<'static, StorageResult<()>>;
}
