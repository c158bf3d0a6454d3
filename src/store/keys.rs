//! Paths of the persisted key space.

use crate::voter::VoterId;
use crate::week::WeekBucket;

pub const PROPOSALS: &str = "proposals";
pub const PLAYTIME_REQUIREMENT: &str = "electorate-requirements.playtime";
pub const LAST_PROPOSAL_ID: &str = "proposal-ids.last";

pub fn opt_in(voter: &VoterId) -> String {
    format!("player.{}.opt-in", voter)
}

pub fn playtime(bucket: &WeekBucket, voter: &VoterId) -> String {
    format!("playtime.{}.{}", bucket, voter)
}

pub fn proposal(id: u32) -> String {
    format!("{}.{}", PROPOSALS, id)
}

pub fn title(id: u32) -> String {
    format!("{}.{}.title", PROPOSALS, id)
}

pub fn description(id: u32) -> String {
    format!("{}.{}.description", PROPOSALS, id)
}

pub fn enabled(id: u32) -> String {
    format!("{}.{}.enabled", PROPOSALS, id)
}

pub fn voters(id: u32) -> String {
    format!("{}.{}.players-voted", PROPOSALS, id)
}

pub fn voted(id: u32, voter: &VoterId) -> String {
    format!("{}.{}.players-voted.{}", PROPOSALS, id, voter)
}

pub fn options(id: u32) -> String {
    format!("{}.{}.options", PROPOSALS, id)
}

pub fn option(id: u32, option: u32) -> String {
    format!("{}.{}.options.{}", PROPOSALS, id, option)
}

pub fn option_description(id: u32, option: u32) -> String {
    format!("{}.{}.options.{}.description", PROPOSALS, id, option)
}

pub fn option_votes(id: u32, option: u32) -> String {
    format!("{}.{}.options.{}.votes", PROPOSALS, id, option)
}
