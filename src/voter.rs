use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::VotingError;
use crate::store::{keys, Store, StoreError, Value};
use crate::week::WeekBucket;

static VALIDATE_VOTER_ID: Lazy<Regex> = Lazy::new(|| Regex::new("^[A-Za-z0-9_-]+$").unwrap());

/// Stable, opaque voter identifier (a player UUID in practice). Restricted to
/// characters that cannot break a dotted store path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoterId(String);

impl VoterId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for VoterId {
    type Err = VotingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match VALIDATE_VOTER_ID.is_match(s) {
            true => Ok(Self(s.to_owned())),
            false => Err(VotingError::InvalidVoter(s.to_owned())),
        }
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn opted_in(store: &dyn Store, voter: &VoterId) -> Result<bool, StoreError> {
    Ok(store.get_bool(&keys::opt_in(voter))?.unwrap_or(false))
}

pub fn set_opted_in(store: &dyn Store, voter: &VoterId, opt_in: bool) -> Result<(), StoreError> {
    store.set(&keys::opt_in(voter), Value::Bool(opt_in))
}

/// Accumulated milliseconds for `voter` in `bucket`; zero if nothing was logged.
pub fn playtime(store: &dyn Store, voter: &VoterId, bucket: &WeekBucket) -> Result<i64, StoreError> {
    Ok(store.get_int(&keys::playtime(bucket, voter))?.unwrap_or(0))
}

/// Adds `ms` to the voter's record for `bucket` and returns the new total.
pub fn add_playtime(store: &dyn Store, voter: &VoterId, bucket: &WeekBucket, ms: i64) -> Result<i64, StoreError> {
    let total = playtime(store, voter, bucket)?.saturating_add(ms.max(0));
    store.set(&keys::playtime(bucket, voter), Value::Int(total))?;
    Ok(total)
}
