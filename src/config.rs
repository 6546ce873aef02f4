//! Environment configuration
//!
//! Every setting has a default; variables only override them.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `PAINT_RECIPE_MAX_COLORS` | 3 |
//! | `PAINT_RECIPE_MAX_TOTAL_PARTS` | 10 |
//! | `PAINT_RECIPE_LOW_MATCH` | 60 |
//! | `PAINT_RECIPE_TIMEOUT_MS` | 2000 |
//! | `PAINT_RECIPE_SUGGESTION_CACHE` | 250 |
//! | `PAINT_RECIPE_PALETTE_CACHE` | 8 |

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{ColorError, SuggestOptions, LOW_MATCH_THRESHOLD};
use crate::services::cache::{DEFAULT_PALETTE_CAPACITY, DEFAULT_SUGGESTION_CAPACITY};

pub const ENV_MAX_COLORS: &str = "PAINT_RECIPE_MAX_COLORS";
pub const ENV_MAX_TOTAL_PARTS: &str = "PAINT_RECIPE_MAX_TOTAL_PARTS";
pub const ENV_LOW_MATCH: &str = "PAINT_RECIPE_LOW_MATCH";
pub const ENV_TIMEOUT_MS: &str = "PAINT_RECIPE_TIMEOUT_MS";
pub const ENV_SUGGESTION_CACHE: &str = "PAINT_RECIPE_SUGGESTION_CACHE";
pub const ENV_PALETTE_CACHE: &str = "PAINT_RECIPE_PALETTE_CACHE";

const DEFAULT_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeConfig {
    pub options: SuggestOptions,
    /// Match percentage below which a suggestion is flagged as a poor match
    pub low_match_threshold: f64,
    pub worker_timeout_ms: u64,
    pub suggestion_cache_capacity: usize,
    pub palette_cache_capacity: usize,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            options: SuggestOptions::default(),
            low_match_threshold: LOW_MATCH_THRESHOLD,
            worker_timeout_ms: DEFAULT_TIMEOUT_MS,
            suggestion_cache_capacity: DEFAULT_SUGGESTION_CAPACITY,
            palette_cache_capacity: DEFAULT_PALETTE_CAPACITY,
        }
    }
}

impl RecipeConfig {
    pub fn from_env() -> Result<Self, ColorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ColorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = setting(&lookup, ENV_MAX_COLORS)? {
            config.options.max_colors = v;
        }
        if let Some(v) = setting(&lookup, ENV_MAX_TOTAL_PARTS)? {
            config.options.max_total_parts = v;
        }
        if let Some(v) = setting::<f64, _>(&lookup, ENV_LOW_MATCH)? {
            if !(0.0..=100.0).contains(&v) {
                return Err(invalid(ENV_LOW_MATCH, &v.to_string()));
            }
            config.low_match_threshold = v;
        }
        if let Some(v) = setting(&lookup, ENV_TIMEOUT_MS)? {
            config.worker_timeout_ms = v;
        }
        if let Some(v) = setting(&lookup, ENV_SUGGESTION_CACHE)? {
            config.suggestion_cache_capacity = v;
        }
        if let Some(v) = setting(&lookup, ENV_PALETTE_CACHE)? {
            config.palette_cache_capacity = v;
        }
        Ok(config)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }
}

fn setting<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ColorError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, &raw)),
        _ => Ok(None),
    }
}

fn invalid(key: &str, value: &str) -> ColorError {
    ColorError::InvalidSetting {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = RecipeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RecipeConfig::default());
        assert_eq!(config.worker_timeout(), Duration::from_millis(2000));
    }

    #[test]
    fn reads_overrides() {
        let config = RecipeConfig::from_lookup(lookup(&[
            (ENV_MAX_COLORS, "2"),
            (ENV_MAX_TOTAL_PARTS, " 6 "),
            (ENV_LOW_MATCH, "75.5"),
            (ENV_TIMEOUT_MS, "50"),
            (ENV_SUGGESTION_CACHE, "10"),
            (ENV_PALETTE_CACHE, ""),
        ]))
        .unwrap();
        assert_eq!(config.options, SuggestOptions::new(2, 6));
        assert_eq!(config.low_match_threshold, 75.5);
        assert_eq!(config.worker_timeout_ms, 50);
        assert_eq!(config.suggestion_cache_capacity, 10);
        assert_eq!(config.palette_cache_capacity, DEFAULT_PALETTE_CAPACITY);
    }

    #[test]
    fn rejects_garbage() {
        let err = RecipeConfig::from_lookup(lookup(&[(ENV_MAX_COLORS, "three")])).unwrap_err();
        match err {
            ColorError::InvalidSetting { key, value } => {
                assert_eq!(key, ENV_MAX_COLORS);
                assert_eq!(value, "three");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(RecipeConfig::from_lookup(lookup(&[(ENV_MAX_COLORS, "-1")])).is_err());
        assert!(RecipeConfig::from_lookup(lookup(&[(ENV_LOW_MATCH, "120")])).is_err());
    }
}
