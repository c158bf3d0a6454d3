use std::sync::Arc;

use chrono::{DateTime, Utc};
use evlog::meta;

use crate::commands::{self, text_after, Sender};
use crate::runtime::get_logger;
use crate::service::VotingService;
use crate::voter::VoterId;

/// Line-oriented host for the voting core. Stands in for the game server:
///
/// - `join <voter>` / `quit <voter>` are connect and disconnect notifications
/// - `as <voter> <command..>` runs a command as that voter
/// - anything else runs as the console
pub struct ConsoleHandler {
    service: Arc<VotingService>,
}

impl ConsoleHandler {
    pub fn new(service: Arc<VotingService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &VotingService {
        &self.service
    }

    /// Handles one input line and returns the reply to print, if any.
    pub fn handle_line(&self, line: &str, now: DateTime<Utc>) -> Option<String> {
        let words: Vec<&str> = line.split_whitespace().collect();

        match words.as_slice() {
            [] => None,
            ["join", voter] => Some(self.join(voter, now)),
            ["quit", voter] => Some(self.quit(voter, now)),
            ["join", ..] => Some("Usage: join <voter>".to_owned()),
            ["quit", ..] => Some("Usage: quit <voter>".to_owned()),
            ["as", voter, ..] => Some(match voter.parse::<VoterId>() {
                Ok(voter) => self.run(&Sender::voter(voter, false), text_after(line, 2), now),
                Err(e) => e.to_string(),
            }),
            ["as"] => Some("Usage: as <voter> <command..>".to_owned()),
            _ => Some(self.run(&Sender::console(), line, now)),
        }
    }

    fn join(&self, voter: &str, now: DateTime<Utc>) -> String {
        let voter = match voter.parse::<VoterId>() {
            Ok(v) => v,
            Err(e) => return e.to_string(),
        };

        get_logger().info("Voter connected.", meta! {
            "Voter" => voter,
            "At" => now,
        });

        self.service.on_connect(voter.clone(), now);
        format!("{} joined.", voter)
    }

    fn quit(&self, voter: &str, now: DateTime<Utc>) -> String {
        let voter = match voter.parse::<VoterId>() {
            Ok(v) => v,
            Err(e) => return e.to_string(),
        };

        match self.service.on_disconnect(&voter, now) {
            Ok(None) => format!("{} was not connected.", voter),
            Ok(Some(_)) => {
                get_logger().info("Voter disconnected.", meta! {
                    "Voter" => voter,
                    "At" => now,
                });
                format!("{} left.", voter)
            }
            Err(e) => {
                get_logger().error("Failed to log playtime on disconnect.", meta! {
                    "Voter" => voter,
                    "Error" => &e,
                });
                format!("{} left, but their playtime could not be saved yet: {}", voter, e)
            }
        }
    }

    fn run(&self, sender: &Sender, line: &str, now: DateTime<Utc>) -> String {
        let command_name = line.split_whitespace().next().unwrap_or(commands::INFO);

        match commands::dispatch(&self.service, sender, line, now) {
            Ok(reply) => reply,
            Err(e) => {
                let sender_name = sender.voter.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "console".to_owned());

                get_logger().debug("Command failed.", meta! {
                    "Sender" => sender_name,
                    "CommandName" => command_name,
                    "Error" => &e,
                });
                e.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn handler() -> ConsoleHandler {
        let service = VotingService::new(Arc::new(MemoryStore::new()), at("2024-02-14T09:00:00Z"));
        ConsoleHandler::new(Arc::new(service))
    }

    #[test]
    fn test_blank_line_is_ignored() {
        assert_eq!(handler().handle_line("   ", at("2024-02-14T09:00:00Z")), None);
    }

    #[test]
    fn test_join_and_quit() {
        let h = handler();
        let alice: VoterId = "alice".parse().unwrap();

        assert_eq!(h.handle_line("quit alice", at("2024-02-14T09:00:00Z")).unwrap(), "alice was not connected.");
        assert_eq!(h.handle_line("join alice", at("2024-02-14T09:00:00Z")).unwrap(), "alice joined.");
        assert!(h.service().tracker().session(&alice).is_some());
        assert_eq!(h.handle_line("quit alice", at("2024-02-14T10:00:00Z")).unwrap(), "alice left.");
        assert!(h.service().tracker().session(&alice).is_none());
    }

    #[test]
    fn test_invalid_voter_names_are_rejected() {
        let h = handler();
        let reply = h.handle_line("join al/ice", at("2024-02-14T09:00:00Z")).unwrap();

        assert!(reply.contains("al/ice"));
        assert!(h.service().tracker().active_voters().is_empty());
    }

    #[test]
    fn test_commands_run_as_voter_or_console() {
        let h = handler();
        let now = at("2024-02-14T09:00:00Z");

        assert!(h.handle_line("opt-in", now).unwrap().contains("Only players"));
        assert!(h.handle_line("as alice opt-in", now).unwrap().starts_with("You have opted in"));
        assert!(h.handle_line("as alice proposal add", now).unwrap().contains("permission"));
        assert!(h.handle_line("proposal add", now).unwrap().contains("ID 1"));
        assert!(h.handle_line("nonsense", now).unwrap().contains("Unknown command"));
    }

    #[test]
    fn test_edit_text_keeps_spacing() {
        let h = handler();
        let now = at("2024-02-14T09:00:00Z");

        h.handle_line("proposal add", now);
        h.handle_line("proposal  edit 1 description Two  spaces, then   three", now);
        assert_eq!(h.service().proposal(1).unwrap().description, "Two  spaces, then   three");
    }

    #[test]
    fn test_playtime_logged_through_console_counts_toward_eligibility() {
        let h = handler();

        h.handle_line("requirement 30m", at("2024-02-14T09:00:00Z"));
        h.handle_line("proposal add", at("2024-02-14T09:00:00Z"));
        h.handle_line("proposal edit 1 option 1 Yes", at("2024-02-14T09:00:00Z"));
        h.handle_line("proposal toggle 1", at("2024-02-14T09:00:00Z"));
        h.handle_line("as bob opt-in", at("2024-02-14T09:00:00Z"));

        h.handle_line("join bob", at("2024-02-14T09:00:00Z"));
        assert!(h.handle_line("as bob vote 1 1", at("2024-02-14T09:10:00Z")).unwrap().contains("30m"));
        h.handle_line("quit bob", at("2024-02-14T09:45:00Z"));
        assert_eq!(h.handle_line("as bob vote 1 1", at("2024-02-14T09:46:00Z")).unwrap(), "Your vote has been registered.");
    }
}
