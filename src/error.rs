use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum VotingError {
    #[error("proposal {0} does not exist")]
    ProposalNotFound(u32),

    #[error("option {option} of proposal {proposal} does not exist")]
    OptionNotFound { proposal: u32, option: u32 },

    #[error("'{0}' is not an editable proposal field")]
    InvalidField(String),

    #[error("'{0}' is not a valid voter identifier")]
    InvalidVoter(String),

    #[error("stored proposal ID counter {0} is out of range")]
    InvalidIdCounter(i64),

    #[error("no proposal IDs are left to hand out")]
    IdsExhausted,

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl VotingError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, VotingError::ProposalNotFound(_) | VotingError::OptionNotFound { .. })
    }
}

/// Why a well-formed vote was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Disabled,
    NotEligible,
    AlreadyVoted,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Disabled => write!(f, "voting on this proposal is closed"),
            Rejection::NotEligible => write!(f, "voter is not eligible"),
            Rejection::AlreadyVoted => write!(f, "voter has already voted on this proposal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Accepted,
    Rejected(Rejection),
}

impl VoteOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, VoteOutcome::Accepted)
    }
}
