use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use evlog::meta;
use itertools::Itertools;

use crate::runtime::get_logger;
use crate::store::{Store, StoreError};
use crate::voter::{self, VoterId};
use crate::week::{WeekBucket, WeekClock};

/// An open session of a connected voter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterSession {
    pub voter: VoterId,
    pub login: DateTime<Utc>,
}

struct TrackerState {
    bucket: WeekBucket,
    sessions: HashMap<VoterId, DateTime<Utc>>,
}

/// Accrues connected time per voter into week buckets.
///
/// All operations go through one lock, so a rollover never interleaves with
/// a connect or disconnect.
pub struct PlaytimeTracker {
    store: Arc<dyn Store>,
    clock: WeekClock,
    state: Mutex<TrackerState>,
}

impl PlaytimeTracker {
    pub fn new(store: Arc<dyn Store>, now: DateTime<Utc>) -> Self {
        let clock = WeekClock;

        Self {
            store,
            clock,
            state: Mutex::new(TrackerState {
                bucket: clock.current_bucket(now),
                sessions: HashMap::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The bucket sessions are currently accruing into.
    pub fn current_bucket(&self) -> WeekBucket {
        self.state().bucket
    }

    pub fn session(&self, voter: &VoterId) -> Option<VoterSession> {
        self.state().sessions.get(voter).map(|login| VoterSession {
            voter: voter.clone(),
            login: *login,
        })
    }

    pub fn active_voters(&self) -> Vec<VoterId> {
        self.state().sessions.keys().cloned().sorted().collect()
    }

    /// Opens a session. A repeated connect restarts the session from `now`.
    pub fn on_connect(&self, voter: VoterId, now: DateTime<Utc>) {
        let mut state = self.state();

        if state.sessions.insert(voter.clone(), now).is_some() {
            get_logger().debug("Voter connected while a session was open; restarting session.", meta! {
                "Voter" => voter,
            });
        }
    }

    /// Closes the session and credits its length to the bucket `now` falls in.
    /// Returns the session length, or `None` if no session was open. If the
    /// playtime cannot be written the session stays open.
    pub fn on_disconnect(&self, voter: &VoterId, now: DateTime<Utc>) -> Result<Option<i64>, StoreError> {
        let mut state = self.state();

        let login = match state.sessions.get(voter) {
            None => {
                get_logger().debug("Disconnect for voter without an open session.", meta! {
                    "Voter" => voter,
                });
                return Ok(None);
            }
            Some(v) => *v,
        };

        let elapsed = (now - login).num_milliseconds().max(0);
        self.flush(voter, &self.clock.current_bucket(now), elapsed)?;
        state.sessions.remove(voter);

        Ok(Some(elapsed))
    }

    /// Splits every open session at each week start it spans up to the week
    /// of `now`: time goes to the bucket it was played in, and the session
    /// continues in the new one. Returns whether a rollover happened; stale
    /// or repeated ticks are no-ops.
    ///
    /// A session whose playtime cannot be written keeps its login time from
    /// the last week that was written, so nothing is counted twice.
    pub fn on_week_rollover(&self, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut state = self.state();

        if !self.clock.has_changed(state.bucket, now) {
            return Ok(false);
        }

        let new_bucket = self.clock.current_bucket(now);
        if new_bucket < state.bucket {
            get_logger().debug("Ignoring week check from before the current bucket.", meta! {
                "Current" => state.bucket,
                "Tick" => new_bucket,
            });
            return Ok(false);
        }

        let old_bucket = state.bucket;
        let boundary = self.clock.week_start(now);
        let mut first_err = None;

        for (voter, login) in state.sessions.iter_mut() {
            while *login < boundary {
                let week_end = (self.clock.week_start(*login) + Duration::weeks(1)).min(boundary);
                let bucket = self.clock.current_bucket(*login);
                let elapsed = (week_end - *login).num_milliseconds();

                match self.flush(voter, &bucket, elapsed) {
                    Ok(()) => *login = week_end,
                    Err(e) => {
                        get_logger().error("Failed to flush playtime at week rollover.", meta! {
                            "Voter" => voter,
                            "Bucket" => bucket,
                            "Error" => &e,
                        });
                        first_err.get_or_insert(e);
                        break;
                    }
                }
            }
        }

        state.bucket = new_bucket;

        get_logger().info("Week rolled over.", meta! {
            "From" => old_bucket,
            "To" => new_bucket,
            "ActiveSessions" => state.sessions.len(),
        });

        match first_err {
            None => Ok(true),
            Some(e) => Err(e),
        }
    }

    /// Opens sessions for voters that were already connected at start-up.
    pub fn resume(&self, voters: impl IntoIterator<Item = VoterId>, now: DateTime<Utc>) {
        for voter in voters {
            self.on_connect(voter, now);
        }
    }

    /// Closes every open session. Returns how many were closed.
    ///
    /// Every session is attempted even if some fail; those stay open and the
    /// first error is returned.
    pub fn shutdown(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut state = self.state();
        let bucket = self.clock.current_bucket(now);

        let sessions: Vec<(VoterId, DateTime<Utc>)> = state.sessions.iter()
            .map(|(voter, login)| (voter.clone(), *login))
            .sorted()
            .collect();

        let mut closed = 0;
        let mut first_err = None;

        for (voter, login) in sessions {
            let elapsed = (now - login).num_milliseconds().max(0);

            match self.flush(&voter, &bucket, elapsed) {
                Ok(()) => {
                    state.sessions.remove(&voter);
                    closed += 1;
                }
                Err(e) => {
                    get_logger().error("Failed to flush playtime at shutdown.", meta! {
                        "Voter" => voter,
                        "Bucket" => bucket,
                        "Error" => &e,
                    });
                    first_err.get_or_insert(e);
                }
            }
        }

        match first_err {
            None => Ok(closed),
            Some(e) => Err(e),
        }
    }

    fn flush(&self, voter: &VoterId, bucket: &WeekBucket, elapsed: i64) -> Result<(), StoreError> {
        if !voter::opted_in(self.store.as_ref(), voter)? {
            get_logger().debug("Discarding playtime of voter who has not opted in.", meta! {
                "Voter" => voter,
                "Milliseconds" => elapsed,
            });
            return Ok(());
        }

        let total = voter::add_playtime(self.store.as_ref(), voter, bucket, elapsed)?;

        get_logger().debug("Logged playtime.", meta! {
            "Voter" => voter,
            "Bucket" => bucket,
            "Milliseconds" => elapsed,
            "Total" => total,
        });

        Ok(())
    }
}
