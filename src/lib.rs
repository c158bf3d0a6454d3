pub mod commands;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod handler;
pub mod playtime;
pub mod proposal;
pub mod runtime;
pub mod service;
pub mod store;
pub mod support;
pub mod voter;
pub mod voting;
pub mod week;

pub use error::{Rejection, VoteOutcome, VotingError};
pub use service::VotingService;
