use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

pub const STORE_PATH_VAR: &str = "VOTING_STORE_PATH";
pub const WEEK_CHECK_SECS_VAR: &str = "VOTING_WEEK_CHECK_SECS";
pub const PLAYTIME_REQUIREMENT_VAR: &str = "VOTING_PLAYTIME_REQUIREMENT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store_path: PathBuf,
    pub week_check_interval: Duration,
    /// Written to the store only when it has no requirement yet.
    pub default_playtime_requirement: Option<i64>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store_path = lookup(STORE_PATH_VAR).unwrap_or_else(|| "config.yml".to_owned());

        let week_check_secs = match lookup(WEEK_CHECK_SECS_VAR) {
            None => 60,
            Some(v) => v.trim().parse::<u64>()
                .with_context(|| format!("{} must be a whole number of seconds, got '{}'", WEEK_CHECK_SECS_VAR, v))?,
        };
        if week_check_secs == 0 {
            anyhow::bail!("{} must be at least 1", WEEK_CHECK_SECS_VAR);
        }

        let default_playtime_requirement = match lookup(PLAYTIME_REQUIREMENT_VAR) {
            None => None,
            Some(v) => Some(v.trim().parse::<i64>()
                .with_context(|| format!("{} must be a number of milliseconds, got '{}'", PLAYTIME_REQUIREMENT_VAR, v))?),
        };

        Ok(Self {
            store_path: PathBuf::from(store_path),
            week_check_interval: Duration::from_secs(week_check_secs),
            default_playtime_requirement,
        })
    }
}
