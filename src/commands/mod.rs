mod proposal;
mod voting;

pub use self::voting::INFO;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::error::VotingError;
use crate::service::VotingService;
use crate::store::StoreError;
use crate::voter::VoterId;

/// Who issued a command. Permission checks happen in the host; it only tells
/// us the outcome through `admin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub voter: Option<VoterId>,
    pub admin: bool,
}

impl Sender {
    pub fn console() -> Self {
        Self { voter: None, admin: true }
    }

    pub fn voter(id: VoterId, admin: bool) -> Self {
        Self { voter: Some(id), admin }
    }

    pub(crate) fn require_voter(&self) -> Result<&VoterId, CommandError> {
        self.voter.as_ref().ok_or(CommandError::WrongSenderType)
    }

    pub(crate) fn require_admin(&self) -> Result<(), CommandError> {
        match self.admin {
            true => Ok(()),
            false => Err(CommandError::NoPermission),
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Usage: {0}")]
    WrongSyntax(&'static str),

    #[error("You do not have permission to do that.")]
    NoPermission,

    #[error("Only players can use this command.")]
    WrongSenderType,

    #[error("Unknown command '{0}'.")]
    UnknownCommand(String),

    #[error("{0}")]
    Voting(#[from] VotingError),
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        CommandError::Voting(VotingError::from(e))
    }
}

pub struct Invocation<'a> {
    pub sender: &'a Sender,
    /// Arguments after the command name.
    pub args: &'a [&'a str],
    /// The unsplit text after the command name.
    pub raw: &'a str,
    pub now: DateTime<Utc>,
}

pub type CommandHandler = fn(&VotingService, &Invocation) -> Result<String, CommandError>;

pub struct CommandDef {
    pub name: &'static str,
    pub handler: CommandHandler,
}

pub const COMMANDS: &[CommandDef] = &[
    CommandDef { name: voting::INFO, handler: voting::info },
    CommandDef { name: voting::OPT_IN, handler: voting::opt_in },
    CommandDef { name: voting::OPT_OUT, handler: voting::opt_out },
    CommandDef { name: voting::VOTE, handler: voting::vote },
    CommandDef { name: proposal::PROPOSAL, handler: proposal::proposal },
    CommandDef { name: proposal::REQUIREMENT, handler: proposal::requirement },
];

static COMMAND_MAP: Lazy<DashMap<String, CommandHandler>> = Lazy::new(|| {
    let map = DashMap::new();

    for cmd in COMMANDS {
        map.insert(cmd.name.to_string(), cmd.handler);
    }

    map
});

pub fn get_handler(command_name: &str) -> Option<CommandHandler> {
    COMMAND_MAP
        .get(command_name)
        .as_ref()
        .map(|entry| *entry.value())
}

/// Runs one command line. An empty line means `info`.
pub fn dispatch(service: &VotingService, sender: &Sender, line: &str, now: DateTime<Utc>) -> Result<String, CommandError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let (name, rest) = match words.split_first() {
        None => (INFO, &[][..]),
        Some((name, rest)) => (*name, rest),
    };

    let handler = get_handler(name).ok_or_else(|| CommandError::UnknownCommand(name.to_owned()))?;

    handler(service, &Invocation {
        sender,
        args: rest,
        raw: text_after(line, 1),
        now,
    })
}

/// What follows the first `n` words of `line`, with its inner spacing kept.
pub(crate) fn text_after(line: &str, n: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest.trim_end()
}

pub(crate) fn parse_id(s: &str, usage: &'static str) -> Result<u32, CommandError> {
    s.parse::<u32>().map_err(|_| CommandError::WrongSyntax(usage))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::testing::FailingStore;
    use crate::store::MemoryStore;

    fn now() -> DateTime<Utc> {
        "2024-02-14T12:00:00Z".parse().unwrap()
    }

    fn run(service: &VotingService, sender: &Sender, line: &str) -> Result<String, CommandError> {
        dispatch(service, sender, line, now())
    }

    fn service() -> VotingService {
        VotingService::new(Arc::new(MemoryStore::new()), now())
    }

    #[test]
    fn test_every_command_is_registered() {
        for cmd in COMMANDS {
            assert!(get_handler(cmd.name).is_some(), "{} is not registered", cmd.name);
        }
        assert!(get_handler("check-proposal").is_none());
    }

    #[test]
    fn test_text_after_keeps_inner_spacing() {
        assert_eq!(text_after("  edit 1  title Build a   shop ", 3), "Build a   shop");
        assert_eq!(text_after("edit 1 title", 3), "");
        assert_eq!(text_after("as alice vote 1 2", 2), "vote 1 2");
        assert_eq!(text_after("", 1), "");
    }

    #[test]
    fn test_store_errors_reach_the_sender() {
        let service = VotingService::new(Arc::new(FailingStore), now());

        assert!(matches!(
            run(&service, &Sender::console(), "requirement"),
            Err(CommandError::Voting(VotingError::StoreUnavailable(_)))
        ));
        assert!(matches!(
            run(&service, &Sender::voter("alice".parse().unwrap(), false), "info"),
            Err(CommandError::Voting(VotingError::StoreUnavailable(_)))
        ));
    }

    #[test]
    fn test_unknown_command() {
        let service = service();
        assert!(matches!(run(&service, &Sender::console(), "frobnicate"), Err(CommandError::UnknownCommand(c)) if c == "frobnicate"));
    }

    #[test]
    fn test_empty_line_is_info() {
        let service = service();
        let reply = run(&service, &Sender::console(), "").unwrap();
        assert!(reply.contains("Playtime requirement"));
    }

    #[test]
    fn test_full_voting_round() {
        let service = service();
        let console = Sender::console();
        let alice = Sender::voter("alice".parse().unwrap(), false);

        assert!(run(&service, &console, "proposal add").unwrap().contains("ID 1"));
        run(&service, &console, "proposal edit 1 title Build a   spawn shop").unwrap();
        run(&service, &console, "proposal edit 1 option 1 Yes, build it").unwrap();
        run(&service, &console, "proposal edit 1 option 2 No").unwrap();
        assert!(run(&service, &console, "proposal toggle 1").unwrap().contains("enabled"));

        run(&service, &alice, "opt-in").unwrap();
        assert!(run(&service, &alice, "vote 1 1").unwrap().contains("registered"));
        assert!(run(&service, &alice, "vote 1 2").unwrap().contains("already voted"));

        assert_eq!(service.proposal(1).unwrap().title, "Build a   spawn shop");
        assert!(run(&service, &alice, "proposal check 1 1").unwrap().starts_with("1 "));
        let shown = run(&service, &alice, "proposal show 1").unwrap();
        assert!(shown.contains("Yes, build it"));
    }
}
