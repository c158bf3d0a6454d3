use std::sync::Arc;

use chrono::{DateTime, Utc};
use evlog::meta;

use crate::runtime::get_logger;
use crate::store::{keys, Store, StoreError, Value};
use crate::voter::{self, VoterId};
use crate::week::WeekClock;

/// Result of an opt-in or opt-out request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptInChange {
    Changed,
    Unchanged,
}

/// Decides who may vote: opted-in voters whose playtime in the current week
/// bucket meets the configured requirement.
pub struct EligibilityService {
    store: Arc<dyn Store>,
    clock: WeekClock,
}

impl EligibilityService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            clock: WeekClock,
        }
    }

    /// The requirement is global today; `_proposal` is where a per-proposal
    /// threshold would be looked up.
    pub fn is_eligible(&self, voter: &VoterId, _proposal: u32, now: DateTime<Utc>) -> Result<bool, StoreError> {
        if !voter::opted_in(self.store.as_ref(), voter)? {
            return Ok(false);
        }

        let playtime = self.playtime(voter, now)?;
        Ok(playtime >= self.requirement()?)
    }

    /// Unconditional write; reports whether the stored value actually changed.
    pub fn set_opt_in(&self, voter: &VoterId, opt_in: bool) -> Result<OptInChange, StoreError> {
        let before = voter::opted_in(self.store.as_ref(), voter)?;
        voter::set_opted_in(self.store.as_ref(), voter, opt_in)?;

        let change = match before == opt_in {
            true => OptInChange::Unchanged,
            false => OptInChange::Changed,
        };

        get_logger().info("Voter opt-in updated.", meta! {
            "Voter" => voter,
            "OptIn" => opt_in,
            "Changed" => change == OptInChange::Changed,
        });

        Ok(change)
    }

    pub fn opted_in(&self, voter: &VoterId) -> Result<bool, StoreError> {
        voter::opted_in(self.store.as_ref(), voter)
    }

    /// Logged playtime in the bucket `now` falls in, in milliseconds.
    pub fn playtime(&self, voter: &VoterId, now: DateTime<Utc>) -> Result<i64, StoreError> {
        voter::playtime(self.store.as_ref(), voter, &self.clock.current_bucket(now))
    }

    /// Required weekly playtime in milliseconds; zero when unset.
    pub fn requirement(&self) -> Result<i64, StoreError> {
        Ok(self.store.get_int(keys::PLAYTIME_REQUIREMENT)?.unwrap_or(0))
    }

    pub fn set_requirement(&self, ms: i64) -> Result<(), StoreError> {
        let ms = ms.max(0);
        self.store.set(keys::PLAYTIME_REQUIREMENT, Value::Int(ms))?;

        get_logger().info("Playtime requirement updated.", meta! {
            "Milliseconds" => ms,
        });

        Ok(())
    }
}
