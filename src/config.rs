//! Application-level configuration loading, covering time controls and the
//! match worker pool.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CONNECT_ARENA_CONFIG_PATH";

/// Hard deadline for a single agent call, in milliseconds.
const DEFAULT_PER_TURN_CAP_MS: u64 = 10_000;
/// Per-team time budget for a whole match, in milliseconds.
const DEFAULT_MATCH_BANK_MS: u64 = 240_000;
/// Wall-clock window for the match setup reachability check, in milliseconds.
const DEFAULT_SETUP_WINDOW_MS: u64 = 30_000;
/// Matches allowed to run concurrently within a round.
const DEFAULT_MAX_PARALLEL: usize = 5;
/// Roster size bounds for starting a championship.
const DEFAULT_MIN_TEAMS: usize = 2;
const DEFAULT_MAX_TEAMS: usize = 20;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub per_turn_cap: Duration,
    pub match_bank: Duration,
    pub setup_window: Duration,
    pub max_parallel: usize,
    pub min_teams: usize,
    pub max_teams: usize,
    /// Token required by the cache-clearing admin route when set.
    pub admin_token: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// built-in championship defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded championship settings from config");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    pub fn match_bank_ms(&self) -> u64 {
        self.match_bank.as_millis() as u64
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            per_turn_cap: Duration::from_millis(DEFAULT_PER_TURN_CAP_MS),
            match_bank: Duration::from_millis(DEFAULT_MATCH_BANK_MS),
            setup_window: Duration::from_millis(DEFAULT_SETUP_WINDOW_MS),
            max_parallel: DEFAULT_MAX_PARALLEL,
            min_teams: DEFAULT_MIN_TEAMS,
            max_teams: DEFAULT_MAX_TEAMS,
            admin_token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at
/// [`DEFAULT_CONFIG_PATH`]. Every field is optional and defaults to the
/// championship rules.
struct RawConfig {
    per_turn_cap_ms: Option<u64>,
    match_bank_ms: Option<u64>,
    setup_window_ms: Option<u64>,
    max_parallel: Option<usize>,
    min_teams: Option<usize>,
    max_teams: Option<usize>,
    admin_token: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            per_turn_cap: raw
                .per_turn_cap_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.per_turn_cap),
            match_bank: raw
                .match_bank_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.match_bank),
            setup_window: raw
                .setup_window_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.setup_window),
            max_parallel: raw.max_parallel.unwrap_or(defaults.max_parallel),
            min_teams: raw.min_teams.unwrap_or(defaults.min_teams),
            max_teams: raw.max_teams.unwrap_or(defaults.max_teams),
            admin_token: raw.admin_token,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_championship_rules() {
        let config = AppConfig::default();
        assert_eq!(config.per_turn_cap, Duration::from_secs(10));
        assert_eq!(config.match_bank, Duration::from_secs(240));
        assert_eq!(config.setup_window, Duration::from_secs(30));
        assert_eq!(config.max_parallel, 5);
        assert_eq!((config.min_teams, config.max_teams), (2, 20));
    }

    #[test]
    fn partial_raw_config_keeps_defaults_elsewhere() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"per_turn_cap_ms": 500, "max_parallel": 2}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.per_turn_cap, Duration::from_millis(500));
        assert_eq!(config.max_parallel, 2);
        assert_eq!(config.match_bank, Duration::from_secs(240));
        assert_eq!(config.admin_token, None);
    }
}
