//! Application-level configuration loading: round timings and seeded tokens.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HIT_GUESSR_CONFIG_PATH";

/// Reference round length in seconds.
const DEFAULT_ROUND_DURATION_SECS: u64 = 30;
/// Reference pause between a round result and the next round.
const DEFAULT_SETTLE_DELAY_SECS: u64 = 5;
/// How long a `WAITING` room may sit idle before it is cancelled.
const DEFAULT_WAITING_TIMEOUT_SECS: u64 = 600;

/// Bearer token seeded into the identity resolver at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedToken {
    /// Opaque credential presented by the client.
    pub token: String,
    /// Display name resolved for this credential.
    pub display_name: String,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    round_duration_secs: u64,
    settle_delay_secs: u64,
    waiting_timeout_secs: u64,
    seed_tokens: Vec<SeedToken>,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        round_duration_secs = config.round_duration_secs,
                        settle_delay_secs = config.settle_delay_secs,
                        tokens = config.seed_tokens.len(),
                        "loaded configuration"
                    );
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

    /// Configuration with explicit timings, used by the integration tests to
    /// keep countdowns short.
    pub fn with_timings(
        round_duration: Duration,
        settle_delay: Duration,
        waiting_timeout: Duration,
    ) -> Self {
        Self {
            round_duration_secs: round_duration.as_secs(),
            settle_delay_secs: settle_delay.as_secs(),
            waiting_timeout_secs: waiting_timeout.as_secs(),
            seed_tokens: Vec::new(),
        }
    }

    /// Fixed duration of every round.
    pub fn round_duration(&self) -> Duration {
        Duration::from_secs(self.round_duration_secs)
    }

    /// Round duration in whole seconds, as used by the scoring engine.
    pub fn round_duration_secs(&self) -> u64 {
        self.round_duration_secs
    }

    /// Pause after a round result before the next round is armed.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    /// Idle span after which a `WAITING` room is cancelled and evicted.
    pub fn waiting_timeout(&self) -> Duration {
        Duration::from_secs(self.waiting_timeout_secs)
    }

    /// Tokens seeded into the identity resolver at startup.
    pub fn seed_tokens(&self) -> &[SeedToken] {
        &self.seed_tokens
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: DEFAULT_ROUND_DURATION_SECS,
            settle_delay_secs: DEFAULT_SETTLE_DELAY_SECS,
            waiting_timeout_secs: DEFAULT_WAITING_TIMEOUT_SECS,
            seed_tokens: vec![
                SeedToken {
                    token: "demo-player-1".into(),
                    display_name: "Player One".into(),
                },
                SeedToken {
                    token: "demo-player-2".into(),
                    display_name: "Player Two".into(),
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file.
struct RawConfig {
    #[serde(default = "default_round_duration")]
    round_duration_secs: u64,
    #[serde(default = "default_settle_delay")]
    settle_delay_secs: u64,
    #[serde(default = "default_waiting_timeout")]
    waiting_timeout_secs: u64,
    #[serde(default)]
    tokens: Vec<SeedToken>,
}

fn default_round_duration() -> u64 {
    DEFAULT_ROUND_DURATION_SECS
}

fn default_settle_delay() -> u64 {
    DEFAULT_SETTLE_DELAY_SECS
}

fn default_waiting_timeout() -> u64 {
    DEFAULT_WAITING_TIMEOUT_SECS
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            round_duration_secs: value.round_duration_secs.max(1),
            settle_delay_secs: value.settle_delay_secs,
            waiting_timeout_secs: value.waiting_timeout_secs.max(1),
            seed_tokens: value.tokens,
        }
    }
}

fn resolve_config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}
