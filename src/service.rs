use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::eligibility::{EligibilityService, OptInChange};
use crate::error::{VoteOutcome, VotingError};
use crate::playtime::PlaytimeTracker;
use crate::proposal::{Proposal, ProposalField, ProposalStore};
use crate::store::Store;
use crate::voter::VoterId;
use crate::voting::VotingEngine;

/// The assembled voting core. Hosts feed it connect/disconnect notifications
/// and a periodic tick; the command layer calls the rest.
pub struct VotingService {
    tracker: PlaytimeTracker,
    eligibility: Arc<EligibilityService>,
    proposals: Arc<ProposalStore>,
    engine: VotingEngine,
}

impl VotingService {
    pub fn new(store: Arc<dyn Store>, now: DateTime<Utc>) -> Self {
        let eligibility = Arc::new(EligibilityService::new(store.clone()));
        let proposals = Arc::new(ProposalStore::new(store.clone()));

        Self {
            tracker: PlaytimeTracker::new(store.clone(), now),
            engine: VotingEngine::new(store, proposals.clone(), eligibility.clone()),
            eligibility,
            proposals,
        }
    }

    pub fn tracker(&self) -> &PlaytimeTracker {
        &self.tracker
    }

    pub fn eligibility(&self) -> &EligibilityService {
        &self.eligibility
    }

    pub fn proposals(&self) -> &ProposalStore {
        &self.proposals
    }

    pub fn on_connect(&self, voter: VoterId, now: DateTime<Utc>) {
        self.tracker.on_connect(voter, now)
    }

    pub fn on_disconnect(&self, voter: &VoterId, now: DateTime<Utc>) -> Result<Option<i64>, VotingError> {
        Ok(self.tracker.on_disconnect(voter, now)?)
    }

    /// Periodic week check.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<bool, VotingError> {
        Ok(self.tracker.on_week_rollover(now)?)
    }

    pub fn shutdown(&self, now: DateTime<Utc>) -> Result<usize, VotingError> {
        Ok(self.tracker.shutdown(now)?)
    }

    pub fn opt_in(&self, voter: &VoterId) -> Result<OptInChange, VotingError> {
        Ok(self.eligibility.set_opt_in(voter, true)?)
    }

    pub fn opt_out(&self, voter: &VoterId) -> Result<OptInChange, VotingError> {
        Ok(self.eligibility.set_opt_in(voter, false)?)
    }

    pub fn is_eligible(&self, voter: &VoterId, proposal: u32, now: DateTime<Utc>) -> Result<bool, VotingError> {
        Ok(self.eligibility.is_eligible(voter, proposal, now)?)
    }

    pub fn cast_vote(
        &self,
        voter: &VoterId,
        proposal: u32,
        option: u32,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome, VotingError> {
        self.engine.cast_vote(voter, proposal, option, now)
    }

    pub fn create_proposal(&self) -> Result<u32, VotingError> {
        self.proposals.create()
    }

    /// `field` is `title`, `description` or `option:<id>`.
    pub fn edit_proposal(&self, id: u32, field: &str, value: &str) -> Result<(), VotingError> {
        let field = field.parse::<ProposalField>()?;
        self.proposals.edit(id, field, value)
    }

    pub fn remove_proposal(&self, id: u32) -> Result<bool, VotingError> {
        self.proposals.remove(id)
    }

    pub fn toggle_proposal(&self, id: u32) -> Result<bool, VotingError> {
        self.proposals.toggle_enabled(id)
    }

    pub fn get_votes(&self, id: u32, option: u32) -> Result<u64, VotingError> {
        self.engine.get_votes(id, option)
    }

    pub fn proposal(&self, id: u32) -> Result<Proposal, VotingError> {
        self.proposals.get(id)
    }
}
