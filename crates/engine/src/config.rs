use std::time::Duration;

/// Default base URL of the generation service.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
/// Default SQLite location for version history.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://studio.db?mode=rwc";
/// Default fixed delay between job status polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Default broadcast buffer for engine events.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;
/// Default model list for comparison columns.
pub const DEFAULT_STREAM_MODELS: &str = "default-model";

/// Engine configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    /// Base URL of the generation service.
    pub api_url: String,
    /// SQLite URL for the version store.
    pub database_url: String,
    /// Fixed delay between job status polls.
    pub poll_interval: Duration,
    /// Model ids for the initial comparison columns, in order.
    pub stream_models: Vec<String>,
    /// Broadcast channel capacity for engine events.
    pub event_channel_capacity: usize,
}

impl StudioConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                        |
    /// |--------------------------|--------------------------------|
    /// | `GENERATION_API_URL`     | `http://localhost:8000`        |
    /// | `STUDIO_DATABASE_URL`    | `sqlite://studio.db?mode=rwc`  |
    /// | `JOB_POLL_INTERVAL_SECS` | `5`                            |
    /// | `STREAM_MODELS`          | `default-model`                |
    /// | `EVENT_CHANNEL_CAPACITY` | `256`                          |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_url = lookup("GENERATION_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        let database_url =
            lookup("STUDIO_DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into());

        let poll_interval_secs = parse_or_default(
            &lookup,
            "JOB_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )
        .max(1);

        let stream_models: Vec<String> = lookup("STREAM_MODELS")
            .unwrap_or_else(|| DEFAULT_STREAM_MODELS.into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let event_channel_capacity = parse_or_default(
            &lookup,
            "EVENT_CHANNEL_CAPACITY",
            DEFAULT_EVENT_CHANNEL_CAPACITY,
        );

        Self {
            api_url,
            database_url,
            poll_interval: Duration::from_secs(poll_interval_secs),
            stream_models,
            event_channel_capacity,
        }
    }
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or_default<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Invalid value, using default");
            default
        }),
    }
}
