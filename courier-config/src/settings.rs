//! Typed settings for the notification queue, resolved from the environment.
//!
//! Defaults differ by deployment profile: development and test favor short
//! intervals and few retry attempts, production favors long intervals,
//! exponential backoff, and deeper retention. Explicit environment variables
//! always win over profile defaults.

use crate::{ConfigError, Result, env};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deployment profile, selected by `COURIER_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    /// Parse a profile name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Environment::Development),
            "test" => Some(Environment::Test),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }

    /// Resolve the profile from `COURIER_ENV`, defaulting to development.
    pub fn detect() -> Self {
        env::optional("COURIER_ENV")
            .and_then(|s| Self::parse(&s))
            .unwrap_or_default()
    }
}

/// Retry backoff policy applied by the durable queue backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backoff {
    /// Constant delay between attempts
    Fixed { delay_ms: u64 },
    /// Delay doubles with each attempt
    Exponential { delay_ms: u64 },
}

impl Backoff {
    /// Delay before the given retry attempt (1-based), capped at one hour.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        const MAX_MS: u64 = 3_600_000;
        let ms = match self {
            Backoff::Fixed { delay_ms } => *delay_ms,
            Backoff::Exponential { delay_ms } => {
                let factor = 1u64 << attempt.saturating_sub(1).min(20);
                delay_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(ms.min(MAX_MS))
    }
}

/// Redis connection parameters for the durable backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,
    pub tls: bool,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            tls: false,
        }
    }
}

impl RedisSettings {
    /// Build the connection URL for the redis client.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let auth = match &self.password {
            Some(password) => format!(":{}@", password),
            None => String::new(),
        };
        format!("{}://{}{}:{}/{}", scheme, auth, self.host, self.port, self.db)
    }
}

/// Default options applied to every enqueued job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSettings {
    /// Maximum processing attempts before a job parks in the failed state
    pub attempts: u32,
    /// How many completed jobs the durable backend retains
    pub remove_on_complete: usize,
    /// How many failed jobs the durable backend retains
    pub remove_on_fail: usize,
    /// Retry backoff policy
    pub backoff: Backoff,
}

/// Settings for the notification queue service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Whether the durable backend is enabled; off means in-memory queue
    pub enabled: bool,
    /// Key prefix for the durable backend
    pub prefix: String,
    pub redis: RedisSettings,
    /// Interval between scheduler passes
    pub check_interval: Duration,
    /// Worker pool size for the durable backend
    pub concurrency: usize,
    pub job: JobSettings,
}

impl QueueSettings {
    /// Profile defaults for the given deployment environment.
    pub fn for_environment(environment: Environment) -> Self {
        let (attempts, backoff, check_interval, retention) = match environment {
            Environment::Development => (
                3,
                Backoff::Fixed { delay_ms: 5_000 },
                Duration::from_secs(30),
                (100, 100),
            ),
            Environment::Test => (
                2,
                Backoff::Fixed { delay_ms: 5_000 },
                Duration::from_secs(10),
                (10, 10),
            ),
            Environment::Production => (
                8,
                Backoff::Exponential { delay_ms: 10_000 },
                Duration::from_secs(300),
                (500, 500),
            ),
        };

        Self {
            enabled: false,
            prefix: "notification".to_string(),
            redis: RedisSettings::default(),
            check_interval,
            concurrency: 5,
            job: JobSettings {
                attempts,
                remove_on_complete: retention.0,
                remove_on_fail: retention.1,
                backoff,
            },
        }
    }

    /// Resolve settings from environment variables over profile defaults.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::for_environment(Environment::detect());

        if let Some(enabled) = env::flag("COURIER_QUEUE_ENABLED") {
            settings.enabled = enabled;
        }
        if let Some(prefix) = env::optional("COURIER_QUEUE_PREFIX") {
            settings.prefix = prefix;
        }

        if let Some(host) = env::optional("REDIS_HOST") {
            settings.redis.host = host;
        }
        if let Some(port) = env::parse("REDIS_PORT")? {
            settings.redis.port = port;
        }
        settings.redis.password = env::optional("REDIS_PASSWORD");
        if let Some(db) = env::parse("REDIS_DB")? {
            settings.redis.db = db;
        }
        if let Some(tls) = env::flag("REDIS_TLS") {
            settings.redis.tls = tls;
        }

        if let Some(interval_ms) = env::parse::<u64>("COURIER_CHECK_INTERVAL")? {
            settings.check_interval = Duration::from_millis(interval_ms);
        }
        if let Some(concurrency) = env::parse("COURIER_CONCURRENCY")? {
            settings.concurrency = concurrency;
        }
        if let Some(attempts) = env::parse("COURIER_JOB_ATTEMPTS")? {
            settings.job.attempts = attempts;
        }
        if let Some(keep) = env::parse("COURIER_REMOVE_COMPLETED")? {
            settings.job.remove_on_complete = keep;
        }
        if let Some(keep) = env::parse("COURIER_REMOVE_FAILED")? {
            settings.job.remove_on_fail = keep;
        }

        let delay_ms = env::parse::<u64>("COURIER_BACKOFF_DELAY")?;
        if let Some(kind) = env::optional("COURIER_BACKOFF") {
            settings.job.backoff = match kind.to_lowercase().as_str() {
                "fixed" => Backoff::Fixed {
                    delay_ms: delay_ms.unwrap_or(5_000),
                },
                "exponential" => Backoff::Exponential {
                    delay_ms: delay_ms.unwrap_or(5_000),
                },
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "COURIER_BACKOFF".to_string(),
                        value: kind,
                    });
                }
            };
        } else if let Some(delay_ms) = delay_ms {
            settings.job.backoff = match settings.job.backoff {
                Backoff::Fixed { .. } => Backoff::Fixed { delay_ms },
                Backoff::Exponential { .. } => Backoff::Exponential { delay_ms },
            };
        }

        Ok(settings)
    }

    /// Load `.env` if present, then resolve from the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}
