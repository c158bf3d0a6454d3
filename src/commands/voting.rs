use itertools::Itertools;

use crate::commands::{parse_id, CommandError, Invocation};
use crate::eligibility::OptInChange;
use crate::error::{Rejection, VoteOutcome};
use crate::service::VotingService;
use crate::support::durations::format_duration_ms;

pub const INFO: &str = "info";
pub const OPT_IN: &str = "opt-in";
pub const OPT_OUT: &str = "opt-out";
pub const VOTE: &str = "vote";

const VOTE_USAGE: &str = "vote <proposal> <option>";

pub fn info(service: &VotingService, inv: &Invocation) -> Result<String, CommandError> {
    let requirement = service.eligibility().requirement()?;
    let open = service.proposals().ids(true)?;

    let mut lines = vec![format!("Playtime requirement: {} per week.", format_duration_ms(requirement))];

    if let Some(voter) = &inv.sender.voter {
        match service.eligibility().opted_in(voter)? {
            true => lines.push(format!(
                "You have opted in. Playtime this week: {}.",
                format_duration_ms(service.eligibility().playtime(voter, inv.now)?)
            )),
            false => lines.push(format!("You have not opted in; use '{}' to start logging your playtime.", OPT_IN)),
        }
    }

    match open.is_empty() {
        true => lines.push("No proposals are open for voting.".to_owned()),
        false => lines.push(format!("Open proposals: {}.", open.iter().join(", "))),
    }

    Ok(lines.join("\n"))
}

pub fn opt_in(service: &VotingService, inv: &Invocation) -> Result<String, CommandError> {
    if !inv.args.is_empty() {
        return Err(CommandError::WrongSyntax(OPT_IN));
    }
    let voter = inv.sender.require_voter()?;

    Ok(match service.opt_in(voter)? {
        OptInChange::Changed => "You have opted in. Your playtime per week will be logged, \
            so that only active players can vote."
            .to_owned(),
        OptInChange::Unchanged => "You have already opted in.".to_owned(),
    })
}

pub fn opt_out(service: &VotingService, inv: &Invocation) -> Result<String, CommandError> {
    if !inv.args.is_empty() {
        return Err(CommandError::WrongSyntax(OPT_OUT));
    }
    let voter = inv.sender.require_voter()?;

    Ok(match service.opt_out(voter)? {
        OptInChange::Changed => "You have opted out. Your playtime will no longer be logged.".to_owned(),
        OptInChange::Unchanged => "You have not opted in.".to_owned(),
    })
}

pub fn vote(service: &VotingService, inv: &Invocation) -> Result<String, CommandError> {
    let voter = inv.sender.require_voter()?;

    let (proposal, option) = match inv.args {
        [proposal, option] => (parse_id(proposal, VOTE_USAGE)?, parse_id(option, VOTE_USAGE)?),
        _ => return Err(CommandError::WrongSyntax(VOTE_USAGE)),
    };

    Ok(match service.cast_vote(voter, proposal, option, inv.now)? {
        VoteOutcome::Accepted => "Your vote has been registered.".to_owned(),
        VoteOutcome::Rejected(Rejection::Disabled) => format!("Voting on proposal {} is closed.", proposal),
        VoteOutcome::Rejected(Rejection::NotEligible) => format!(
            "You are not eligible to vote. Opt in with '{}' and play at least {} this week.",
            OPT_IN,
            format_duration_ms(service.eligibility().requirement()?)
        ),
        VoteOutcome::Rejected(Rejection::AlreadyVoted) => format!("You have already voted on proposal {}.", proposal),
    })
}
