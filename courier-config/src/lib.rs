// Configuration management for the Courier services

pub mod env;
pub mod error;
pub mod settings;

pub use error::{ConfigError, Result};
pub use settings::{Backoff, Environment, JobSettings, QueueSettings, RedisSettings};
