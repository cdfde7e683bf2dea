use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port the studio service listens on
    pub port: u16,
    /// Path to the studio SQLite database
    pub database_url: String,
    /// URL of the hosted question-generation function
    pub generation_endpoint: String,
    /// Per-call timeout for generation requests
    pub generation_timeout: Duration,
    /// How long edits must be quiet before an autosave fires
    pub autosave_debounce: Duration,
    /// Language a new draft starts in when the client does not say
    pub default_language: String,
    /// Origins allowed through CORS
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: env_parse("STUDIO_PORT", 8080)?,
            database_url: env_str("STUDIO_DATABASE_URL", "sqlite:./data/studio.db"),
            generation_endpoint: env_str(
                "STUDIO_GENERATION_URL",
                "http://127.0.0.1:9400/functions/v1/generate-questions",
            ),
            generation_timeout: Duration::from_millis(env_parse(
                "STUDIO_GENERATION_TIMEOUT_MS",
                60_000,
            )?),
            autosave_debounce: Duration::from_millis(env_parse(
                "STUDIO_AUTOSAVE_DEBOUNCE_MS",
                2_000,
            )?),
            default_language: env_str("STUDIO_DEFAULT_LANGUAGE", "en"),
            cors_origins: env_csv(
                "STUDIO_CORS_ORIGINS",
                &["http://localhost:3000", "http://127.0.0.1:3000"],
            ),
        })
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_csv(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        Err(_) => default.iter().map(|s| (*s).to_string()).collect(),
    }
}
