use crate::commands::{parse_id, text_after, CommandError, Invocation};
use crate::proposal::ProposalField;
use crate::service::VotingService;
use crate::support::durations::{format_duration_ms, parse_duration_ms};

pub const PROPOSAL: &str = "proposal";
pub const REQUIREMENT: &str = "requirement";

const USAGE: &str = "proposal <check|add|remove|edit|toggle|show|list> ...";
const CHECK_USAGE: &str = "proposal check <proposal> <option>";
const REMOVE_USAGE: &str = "proposal remove <proposal>";
const EDIT_USAGE: &str = "proposal edit <proposal> <title|description|option <option>> <text>";
const TOGGLE_USAGE: &str = "proposal toggle <proposal>";
const SHOW_USAGE: &str = "proposal show <proposal>";
const REQUIREMENT_USAGE: &str = "requirement [duration, e.g. 30m or 2h]";

/// A `proposal` sub-command, parsed once from the text after `proposal`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProposalAction {
    Check { id: u32, option: u32 },
    Add,
    Remove(u32),
    Edit { id: u32, field: ProposalField, text: String },
    Toggle(u32),
    Show(u32),
    List,
}

impl ProposalAction {
    fn parse(raw: &str) -> Result<Self, CommandError> {
        let args: Vec<&str> = raw.split_whitespace().collect();
        let (action, rest) = args.split_first().ok_or(CommandError::WrongSyntax(USAGE))?;

        match (*action, rest) {
            ("check", [id, option]) => Ok(ProposalAction::Check {
                id: parse_id(id, CHECK_USAGE)?,
                option: parse_id(option, CHECK_USAGE)?,
            }),
            ("check", _) => Err(CommandError::WrongSyntax(CHECK_USAGE)),
            ("add", []) => Ok(ProposalAction::Add),
            ("remove", [id]) => Ok(ProposalAction::Remove(parse_id(id, REMOVE_USAGE)?)),
            ("remove", _) => Err(CommandError::WrongSyntax(REMOVE_USAGE)),
            ("edit", [id, "option", option, text @ ..]) if !text.is_empty() => Ok(ProposalAction::Edit {
                id: parse_id(id, EDIT_USAGE)?,
                field: ProposalField::Option(parse_id(option, EDIT_USAGE)?),
                text: text_after(raw, 4).to_owned(),
            }),
            ("edit", [_, "option", ..]) => Err(CommandError::WrongSyntax(EDIT_USAGE)),
            ("edit", [id, field, text @ ..]) if !text.is_empty() => Ok(ProposalAction::Edit {
                id: parse_id(id, EDIT_USAGE)?,
                field: field.parse::<ProposalField>()?,
                text: text_after(raw, 3).to_owned(),
            }),
            ("edit", _) => Err(CommandError::WrongSyntax(EDIT_USAGE)),
            ("toggle", [id]) => Ok(ProposalAction::Toggle(parse_id(id, TOGGLE_USAGE)?)),
            ("toggle", _) => Err(CommandError::WrongSyntax(TOGGLE_USAGE)),
            ("show", [id]) => Ok(ProposalAction::Show(parse_id(id, SHOW_USAGE)?)),
            ("show", _) => Err(CommandError::WrongSyntax(SHOW_USAGE)),
            ("list", []) => Ok(ProposalAction::List),
            _ => Err(CommandError::WrongSyntax(USAGE)),
        }
    }

    fn requires_admin(&self) -> bool {
        matches!(
            self,
            ProposalAction::Add | ProposalAction::Remove(_) | ProposalAction::Edit { .. } | ProposalAction::Toggle(_)
        )
    }
}

pub fn proposal(service: &VotingService, inv: &Invocation) -> Result<String, CommandError> {
    let action = ProposalAction::parse(inv.raw)?;
    if action.requires_admin() {
        inv.sender.require_admin()?;
    }

    match action {
        ProposalAction::Check { id, option } => check(service, id, option),
        ProposalAction::Add => add(service),
        ProposalAction::Remove(id) => remove(service, id),
        ProposalAction::Edit { id, field, text } => edit(service, id, field, &text),
        ProposalAction::Toggle(id) => toggle(service, id),
        ProposalAction::Show(id) => show(service, id),
        ProposalAction::List => list(service),
    }
}

fn check(service: &VotingService, id: u32, option: u32) -> Result<String, CommandError> {
    let votes = service.get_votes(id, option)?;
    Ok(format!("{} players have voted for option {} of proposal {}.", votes, option, id))
}

fn add(service: &VotingService) -> Result<String, CommandError> {
    let id = service.create_proposal()?;
    Ok(format!(
        "Created proposal with ID {}. Give it a title, a description and options with 'proposal edit', \
        then open it with 'proposal toggle {}'.",
        id, id
    ))
}

fn remove(service: &VotingService, id: u32) -> Result<String, CommandError> {
    Ok(match service.remove_proposal(id)? {
        true => format!("Deleted proposal with ID {}.", id),
        false => format!("Proposal with ID {} does not exist.", id),
    })
}

fn edit(service: &VotingService, id: u32, field: ProposalField, text: &str) -> Result<String, CommandError> {
    service.proposals().edit(id, field, text)?;
    Ok(format!("Proposal {} was changed successfully.", id))
}

fn toggle(service: &VotingService, id: u32) -> Result<String, CommandError> {
    Ok(match service.toggle_proposal(id)? {
        true => format!("Voting on proposal {} is now enabled.", id),
        false => format!("Voting on proposal {} is now disabled.", id),
    })
}

fn show(service: &VotingService, id: u32) -> Result<String, CommandError> {
    let proposal = service.proposal(id)?;

    let mut out = format!(
        "Proposal {}: {} [{}]\n{}\n",
        proposal.id,
        proposal.title,
        if proposal.enabled { "open" } else { "closed" },
        proposal.description
    );
    for option in &proposal.options {
        out.push_str(&format!("  {}. {} ({} votes)\n", option.id, option.description, option.votes));
    }
    out.push_str(&format!("{} players have voted.", proposal.voters.len()));

    Ok(out)
}

fn list(service: &VotingService) -> Result<String, CommandError> {
    let ids = service.proposals().ids(false)?;
    if ids.is_empty() {
        return Ok("There are no proposals.".to_owned());
    }

    let mut lines = Vec::new();
    for id in ids {
        let proposal = service.proposal(id)?;
        lines.push(format!(
            "{}. {} [{}]",
            proposal.id,
            proposal.title,
            if proposal.enabled { "open" } else { "closed" }
        ));
    }
    Ok(lines.join("\n"))
}

/// Shows the weekly playtime requirement, or sets it when given a duration.
pub fn requirement(service: &VotingService, inv: &Invocation) -> Result<String, CommandError> {
    match inv.args {
        [] => Ok(format!(
            "Voters need {} of playtime per week.",
            format_duration_ms(service.eligibility().requirement()?)
        )),
        [duration] => {
            inv.sender.require_admin()?;
            let ms = parse_duration_ms(duration).ok_or(CommandError::WrongSyntax(REQUIREMENT_USAGE))?;
            service.eligibility().set_requirement(ms)?;
            Ok(format!("Voters now need {} of playtime per week.", format_duration_ms(ms)))
        }
        _ => Err(CommandError::WrongSyntax(REQUIREMENT_USAGE)),
    }
}
