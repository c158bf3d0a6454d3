use std::sync::Arc;

use chrono::{DateTime, Utc};
use evlog::meta;

use crate::eligibility::EligibilityService;
use crate::error::{Rejection, VoteOutcome, VotingError};
use crate::proposal::ProposalStore;
use crate::runtime::get_logger;
use crate::store::{keys, Store, Value};
use crate::voter::VoterId;

/// Casts single-choice votes, at most one per voter per proposal.
pub struct VotingEngine {
    store: Arc<dyn Store>,
    proposals: Arc<ProposalStore>,
    eligibility: Arc<EligibilityService>,
}

impl VotingEngine {
    pub fn new(store: Arc<dyn Store>, proposals: Arc<ProposalStore>, eligibility: Arc<EligibilityService>) -> Self {
        Self {
            store,
            proposals,
            eligibility,
        }
    }

    /// Checks run in a fixed order: the proposal and option must exist, then
    /// voting must be open, then the voter must be eligible, then they must
    /// not have voted yet. The check and the write happen under the
    /// proposal's lock.
    pub fn cast_vote(
        &self,
        voter: &VoterId,
        proposal: u32,
        option: u32,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome, VotingError> {
        self.proposals.with_lock(proposal, || -> Result<VoteOutcome, VotingError> {
            self.proposals.require_option(proposal, option)?;

            let rejection = if !self.proposals.is_enabled(proposal)? {
                Some(Rejection::Disabled)
            } else if !self.eligibility.is_eligible(voter, proposal, now)? {
                Some(Rejection::NotEligible)
            } else if self.proposals.has_voted(proposal, voter)? {
                Some(Rejection::AlreadyVoted)
            } else {
                None
            };

            if let Some(reason) = rejection {
                get_logger().info("Vote rejected.", meta! {
                    "Voter" => voter,
                    "ProposalID" => proposal,
                    "OptionID" => option,
                    "Reason" => reason,
                });
                return Ok(VoteOutcome::Rejected(reason));
            }

            self.record(voter, proposal, option)?;

            get_logger().info("Vote accepted.", meta! {
                "Voter" => voter,
                "ProposalID" => proposal,
                "OptionID" => option,
            });

            Ok(VoteOutcome::Accepted)
        })
    }

    /// Bumps the tally, then marks the voter. If the marker cannot be written
    /// the tally is put back so counts keep matching markers.
    fn record(&self, voter: &VoterId, proposal: u32, option: u32) -> Result<(), VotingError> {
        let votes_key = keys::option_votes(proposal, option);
        let votes = self.store.get_int(&votes_key)?.unwrap_or(0);
        self.store.set(&votes_key, Value::Int(votes + 1))?;

        if let Err(e) = self.store.set(&keys::voted(proposal, voter), Value::Bool(true)) {
            get_logger().error("Failed to mark voter; reverting tally.", meta! {
                "Voter" => voter,
                "ProposalID" => proposal,
                "OptionID" => option,
                "Error" => &e,
            });
            if let Err(revert) = self.store.set(&votes_key, Value::Int(votes)) {
                get_logger().error("Failed to revert tally.", meta! {
                    "ProposalID" => proposal,
                    "OptionID" => option,
                    "Error" => revert,
                });
            }
            return Err(e.into());
        }

        Ok(())
    }

    pub fn get_votes(&self, proposal: u32, option: u32) -> Result<u64, VotingError> {
        self.proposals.get_votes(proposal, option)
    }
}
