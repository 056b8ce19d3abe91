use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    dao::{ChampionshipStore, StorageError, StorageResult, StoreSnapshot},
    domain::{record::MatchRecord, schedule::Schedule, team::Team},
};

const TEAM_PREFIX: &str = "teams:";
const MATCH_PREFIX: &str = "matches:";
const SCHEDULE_KEY: &str = "schedule";

fn team_key(id: Uuid) -> String {
    format!("{TEAM_PREFIX}{id}")
}

fn match_key(id: Uuid) -> String {
    format!("{MATCH_PREFIX}{id}")
}

/// Keyed JSON-document store held entirely in memory.
///
/// This is the backend shipped with the binary; it honors the namespace and
/// idempotence contract of [`ChampionshipStore`] and doubles as the test
/// double for everything above the dao layer.
#[derive(Clone, Default)]
pub struct MemoryStore {
    documents: Arc<DashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn put<T: Serialize>(&self, key: String, value: &T) -> StorageResult<()> {
        let document = serde_json::to_value(value)
            .map_err(|err| StorageError::encoding(format!("encoding `{key}`"), err))?;
        self.documents.insert(key, document);
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(document) = self.documents.get(key) else {
            return Ok(None);
        };
        serde_json::from_value(document.clone())
            .map(Some)
            .map_err(|err| StorageError::encoding(format!("decoding `{key}`"), err))
    }

    fn list<T: DeserializeOwned>(&self, prefix: &str) -> StorageResult<Vec<T>> {
        self.documents
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| {
                serde_json::from_value(entry.value().clone()).map_err(|err| {
                    StorageError::encoding(format!("decoding `{}`", entry.key()), err)
                })
            })
            .collect()
    }
}

impl ChampionshipStore for MemoryStore {
    fn save_team(&self, team: Team) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.put(team_key(team.id), &team) })
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<Team>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut teams: Vec<Team> = store.list(TEAM_PREFIX)?;
            // Roster order is registration order; names break clock ties so
            // schedule generation stays deterministic.
            teams.sort_by(|lhs, rhs| {
                lhs.registered_at
                    .cmp(&rhs.registered_at)
                    .then_with(|| lhs.name.cmp(&rhs.name))
            });
            Ok(teams)
        })
    }

    fn save_schedule(&self, schedule: Schedule) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.put(SCHEDULE_KEY.to_string(), &schedule) })
    }

    fn load_schedule(&self) -> BoxFuture<'static, StorageResult<Option<Schedule>>> {
        let store = self.clone();
        Box::pin(async move { store.get(SCHEDULE_KEY) })
    }

    fn update_match(&self, record: MatchRecord) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.put(match_key(record.id), &record) })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchRecord>>> {
        let store = self.clone();
        Box::pin(async move { store.get(&match_key(id)) })
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchRecord>>> {
        let store = self.clone();
        Box::pin(async move { store.list(MATCH_PREFIX) })
    }

    fn snapshot(&self) -> BoxFuture<'static, StorageResult<StoreSnapshot>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(StoreSnapshot {
                teams: store.list_teams().await?,
                schedule: store.get(SCHEDULE_KEY)?,
                matches: store.list(MATCH_PREFIX)?,
            })
        })
    }

    fn clear(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.documents.clear();
            Ok(())
        })
    }
}
