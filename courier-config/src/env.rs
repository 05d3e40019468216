// Environment variable access helpers

use crate::{ConfigError, Result};
use std::env;
use std::str::FromStr;

/// Read an optional environment variable, treating empty values as unset.
pub fn optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

/// Read and parse an optional environment variable.
///
/// Returns `Ok(None)` when the variable is unset; a set-but-malformed value
/// is an error rather than a silent fallback.
pub fn parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

/// Read an optional boolean flag (`1`/`true`/`yes` are truthy).
pub fn flag(key: &str) -> Option<bool> {
    optional(key).map(|v| {
        let v = v.trim().to_lowercase();
        v == "1" || v == "true" || v == "yes"
    })
}
