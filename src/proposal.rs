use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use evlog::meta;
use itertools::Itertools;

use crate::error::VotingError;
use crate::runtime::get_logger;
use crate::store::{keys, Store, Value};
use crate::voter::VoterId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalOption {
    pub id: u32,
    pub description: String,
    pub votes: u64,
}

/// Point-in-time view of a stored proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub enabled: bool,
    pub options: Vec<ProposalOption>,
    pub voters: Vec<VoterId>,
}

impl Proposal {
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.votes).sum()
    }
}

/// What an admin edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalField {
    Title,
    Description,
    Option(u32),
}

impl FromStr for ProposalField {
    type Err = VotingError;

    /// Accepts `title`, `description` and `option:<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(ProposalField::Title),
            "description" => Ok(ProposalField::Description),
            _ => s
                .strip_prefix("option:")
                .and_then(|id| id.parse::<u32>().ok())
                .map(ProposalField::Option)
                .ok_or_else(|| VotingError::InvalidField(s.to_owned())),
        }
    }
}

impl fmt::Display for ProposalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalField::Title => write!(f, "title"),
            ProposalField::Description => write!(f, "description"),
            ProposalField::Option(id) => write!(f, "option:{}", id),
        }
    }
}

fn parse_ids(keys: Vec<String>) -> Vec<u32> {
    keys.iter()
        .filter_map(|k| k.parse::<u32>().ok())
        .sorted()
        .collect()
}

/// Proposal and option lifecycle over the store.
pub struct ProposalStore {
    store: Arc<dyn Store>,
    reservation: Mutex<()>,
    locks: DashMap<u32, Arc<Mutex<()>>>,
}

impl ProposalStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            reservation: Mutex::new(()),
            locks: DashMap::new(),
        }
    }

    /// Runs `f` while holding the lock of proposal `id`. Every mutation of a
    /// proposal, votes included, goes through here.
    ///
    /// Locks exist only for stored proposals. For an unknown ID `f` runs under
    /// the reservation lock instead, so no proposal can appear under it.
    pub(crate) fn with_lock<T>(
        &self,
        id: u32,
        f: impl FnOnce() -> Result<T, VotingError>,
    ) -> Result<T, VotingError> {
        let lock = match self.locks.get(&id).map(|entry| entry.value().clone()) {
            Some(lock) => lock,
            None => {
                let _reservation = self.reservation.lock().unwrap_or_else(|e| e.into_inner());
                if !self.exists(id)? {
                    return f();
                }
                let lock = self.locks.entry(id).or_insert_with(Default::default).value().clone();
                lock
            }
        };

        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        f()
    }

    #[cfg(test)]
    pub(crate) fn lock_count(&self) -> usize {
        self.locks.len()
    }

    pub fn exists(&self, id: u32) -> Result<bool, VotingError> {
        Ok(self.store.contains(&keys::proposal(id))?)
    }

    fn require(&self, id: u32) -> Result<(), VotingError> {
        match self.exists(id)? {
            true => Ok(()),
            false => Err(VotingError::ProposalNotFound(id)),
        }
    }

    pub(crate) fn require_option(&self, id: u32, option: u32) -> Result<(), VotingError> {
        self.require(id)?;
        match self.store.contains(&keys::option(id, option))? {
            true => Ok(()),
            false => Err(VotingError::OptionNotFound { proposal: id, option }),
        }
    }

    /// IDs of stored proposals in ascending order, optionally only those open for voting.
    pub fn ids(&self, only_enabled: bool) -> Result<Vec<u32>, VotingError> {
        let ids = parse_ids(self.store.keys(keys::PROPOSALS)?);
        if !only_enabled {
            return Ok(ids);
        }

        let mut enabled = Vec::new();
        for id in ids {
            if self.is_enabled(id)? {
                enabled.push(id);
            }
        }
        Ok(enabled)
    }

    /// The ID the next `create` will hand out. Deleted IDs stay retired.
    pub fn next_id(&self) -> Result<u32, VotingError> {
        let highest = self.ids(false)?.into_iter().max().unwrap_or(0);
        let last = match self.store.get_int(keys::LAST_PROPOSAL_ID)? {
            None => 0,
            Some(v) => u32::try_from(v).map_err(|_| VotingError::InvalidIdCounter(v))?,
        };
        highest.max(last).checked_add(1).ok_or(VotingError::IdsExhausted)
    }

    /// Reserves a new, empty, disabled proposal and returns its ID.
    pub fn create(&self) -> Result<u32, VotingError> {
        let _guard = self.reservation.lock().unwrap_or_else(|e| e.into_inner());

        let id = self.next_id()?;
        self.store.set(&keys::enabled(id), Value::Bool(false))?;
        self.store.set(&keys::title(id), Value::from(""))?;
        self.store.set(&keys::description(id), Value::from(""))?;
        self.store.set(keys::LAST_PROPOSAL_ID, Value::Int(id as i64))?;

        get_logger().info("Proposal created.", meta! {
            "ProposalID" => id,
        });

        Ok(id)
    }

    /// Sets a text field of an existing proposal. Editing an option that does
    /// not exist yet adds it with no votes.
    pub fn edit(&self, id: u32, field: ProposalField, value: &str) -> Result<(), VotingError> {
        self.with_lock(id, || -> Result<(), VotingError> {
            self.require(id)?;

            match field {
                ProposalField::Title => self.store.set(&keys::title(id), Value::from(value))?,
                ProposalField::Description => self.store.set(&keys::description(id), Value::from(value))?,
                ProposalField::Option(option) => {
                    if self.store.get_int(&keys::option_votes(id, option))?.is_none() {
                        self.store.set(&keys::option_votes(id, option), Value::Int(0))?;
                    }
                    self.store.set(&keys::option_description(id, option), Value::from(value))?;
                }
            }

            get_logger().info("Proposal edited.", meta! {
                "ProposalID" => id,
                "Field" => field,
            });

            Ok(())
        })
    }

    /// Deletes the proposal with its options and vote markers. `false` if it did not exist.
    pub fn remove(&self, id: u32) -> Result<bool, VotingError> {
        self.with_lock(id, || -> Result<bool, VotingError> {
            let removed = self.store.delete(&keys::proposal(id))?;

            if removed {
                self.locks.remove(&id);
                get_logger().info("Proposal removed.", meta! {
                    "ProposalID" => id,
                });
            }

            Ok(removed)
        })
    }

    /// Flips whether voting is open and returns the new state.
    pub fn toggle_enabled(&self, id: u32) -> Result<bool, VotingError> {
        self.with_lock(id, || -> Result<bool, VotingError> {
            self.require(id)?;

            let enabled = !self.is_enabled(id)?;
            self.store.set(&keys::enabled(id), Value::Bool(enabled))?;

            get_logger().info("Proposal voting toggled.", meta! {
                "ProposalID" => id,
                "Enabled" => enabled,
            });

            Ok(enabled)
        })
    }

    pub(crate) fn is_enabled(&self, id: u32) -> Result<bool, VotingError> {
        Ok(self.store.get_bool(&keys::enabled(id))?.unwrap_or(false))
    }

    pub fn get_votes(&self, id: u32, option: u32) -> Result<u64, VotingError> {
        self.require_option(id, option)?;
        let votes = self.store.get_int(&keys::option_votes(id, option))?.unwrap_or(0);
        Ok(votes.max(0) as u64)
    }

    pub fn option_ids(&self, id: u32) -> Result<Vec<u32>, VotingError> {
        self.require(id)?;
        Ok(parse_ids(self.store.keys(&keys::options(id))?))
    }

    /// Every option of the proposal with its count, by option ID.
    pub fn tally(&self, id: u32) -> Result<Vec<(u32, u64)>, VotingError> {
        let mut tally = Vec::new();
        for option in self.option_ids(id)? {
            tally.push((option, self.get_votes(id, option)?));
        }
        Ok(tally)
    }

    pub(crate) fn has_voted(&self, id: u32, voter: &VoterId) -> Result<bool, VotingError> {
        Ok(self.store.get_bool(&keys::voted(id, voter))?.unwrap_or(false))
    }

    pub fn voters(&self, id: u32) -> Result<Vec<VoterId>, VotingError> {
        self.require(id)?;

        let mut voters = Vec::new();
        for key in self.store.keys(&keys::voters(id))?.into_iter().sorted() {
            let voter = match key.parse::<VoterId>() {
                Ok(v) => v,
                Err(_) => continue,
            };
            if self.has_voted(id, &voter)? {
                voters.push(voter);
            }
        }
        Ok(voters)
    }

    pub fn get(&self, id: u32) -> Result<Proposal, VotingError> {
        self.require(id)?;

        let mut options = Vec::new();
        for option in self.option_ids(id)? {
            options.push(ProposalOption {
                id: option,
                description: self.store.get_text(&keys::option_description(id, option))?.unwrap_or_default(),
                votes: self.get_votes(id, option)?,
            });
        }

        Ok(Proposal {
            id,
            title: self.store.get_text(&keys::title(id))?.unwrap_or_default(),
            description: self.store.get_text(&keys::description(id))?.unwrap_or_default(),
            enabled: self.is_enabled(id)?,
            options,
            voters: self.voters(id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::FailingStore;
    use crate::store::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, ProposalStore) {
        let store = Arc::new(MemoryStore::new());
        let proposals = ProposalStore::new(store.clone());
        (store, proposals)
    }

    #[test]
    fn test_ids_are_never_reused() {
        let (_store, proposals) = setup();

        assert_eq!(proposals.create().unwrap(), 1);
        assert_eq!(proposals.create().unwrap(), 2);
        assert!(proposals.remove(1).unwrap());
        assert_eq!(proposals.create().unwrap(), 3);

        // Removing the highest ID must not hand it out again either.
        assert!(proposals.remove(3).unwrap());
        assert_eq!(proposals.create().unwrap(), 4);
        assert_eq!(proposals.ids(false).unwrap(), vec![2, 4]);
    }

    #[test]
    fn test_next_id_is_stable_until_create() {
        let (_store, proposals) = setup();

        assert_eq!(proposals.next_id().unwrap(), 1);
        assert_eq!(proposals.next_id().unwrap(), 1);

        proposals.create().unwrap();
        assert_eq!(proposals.next_id().unwrap(), 2);
        assert_eq!(proposals.next_id().unwrap(), 2);
    }

    #[test]
    fn test_next_id_follows_existing_ids() {
        let (store, proposals) = setup();
        store.set("proposals.7.title", Value::from("imported")).unwrap();
        store.set("proposals.not-a-number.title", Value::from("junk")).unwrap();

        assert_eq!(proposals.next_id().unwrap(), 8);
    }

    #[test]
    fn test_created_proposal_is_empty_and_disabled() {
        let (_store, proposals) = setup();
        let id = proposals.create().unwrap();

        let proposal = proposals.get(id).unwrap();
        assert_eq!(proposal.title, "");
        assert_eq!(proposal.description, "");
        assert!(!proposal.enabled);
        assert!(proposal.options.is_empty());
        assert!(proposal.voters.is_empty());
    }

    #[test]
    fn test_edit_fields_and_options() {
        let (_store, proposals) = setup();
        let id = proposals.create().unwrap();

        proposals.edit(id, ProposalField::Title, "Spawn shop").unwrap();
        proposals.edit(id, ProposalField::Description, "Open a shop at spawn").unwrap();
        proposals.edit(id, ProposalField::Option(2), "No").unwrap();
        proposals.edit(id, ProposalField::Option(1), "Yes").unwrap();
        proposals.edit(id, ProposalField::Option(1), "Yes, please").unwrap();

        let proposal = proposals.get(id).unwrap();
        assert_eq!(proposal.title, "Spawn shop");
        assert_eq!(proposal.description, "Open a shop at spawn");
        assert_eq!(proposal.options, vec![
            ProposalOption { id: 1, description: "Yes, please".to_owned(), votes: 0 },
            ProposalOption { id: 2, description: "No".to_owned(), votes: 0 },
        ]);
    }

    #[test]
    fn test_edit_missing_proposal_fails_without_creating_it() {
        let (_store, proposals) = setup();

        let err = proposals.edit(5, ProposalField::Title, "x").unwrap_err();
        assert!(matches!(err, VotingError::ProposalNotFound(5)));
        assert!(!proposals.exists(5).unwrap());
    }

    #[test]
    fn test_field_parsing() {
        assert_eq!("title".parse::<ProposalField>().unwrap(), ProposalField::Title);
        assert_eq!("option:3".parse::<ProposalField>().unwrap(), ProposalField::Option(3));
        assert!(matches!("colour".parse::<ProposalField>(), Err(VotingError::InvalidField(f)) if f == "colour"));
        assert!("option:x".parse::<ProposalField>().is_err());
    }

    #[test]
    fn test_toggle_returns_new_state() {
        let (_store, proposals) = setup();
        let id = proposals.create().unwrap();

        assert!(proposals.toggle_enabled(id).unwrap());
        assert_eq!(proposals.ids(true).unwrap(), vec![id]);
        assert!(!proposals.toggle_enabled(id).unwrap());
        assert!(proposals.ids(true).unwrap().is_empty());

        assert!(matches!(proposals.toggle_enabled(99), Err(VotingError::ProposalNotFound(99))));
    }

    #[test]
    fn test_remove_cascades() {
        let (store, proposals) = setup();
        let id = proposals.create().unwrap();
        proposals.edit(id, ProposalField::Option(1), "Yes").unwrap();
        store.set("proposals.1.players-voted.alice", Value::Bool(true)).unwrap();

        assert!(proposals.remove(id).unwrap());
        assert!(!store.contains("proposals.1.options.1.votes").unwrap());
        assert!(!store.contains("proposals.1.players-voted.alice").unwrap());
        assert!(proposals.get_votes(id, 1).unwrap_err().is_not_found());

        assert!(!proposals.remove(id).unwrap());
    }

    #[test]
    fn test_get_votes_not_found() {
        let (_store, proposals) = setup();
        let id = proposals.create().unwrap();

        assert!(matches!(proposals.get_votes(id, 1), Err(VotingError::OptionNotFound { proposal: 1, option: 1 })));
        assert!(matches!(proposals.get_votes(42, 1), Err(VotingError::ProposalNotFound(42))));
    }

    #[test]
    fn test_concurrent_creates_get_distinct_ids() {
        let (_store, proposals) = setup();

        let mut ids: Vec<u32> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| proposals.create().unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        ids.sort();

        assert_eq!(ids, (1..=8).collect::<Vec<u32>>());
    }

    #[test]
    fn test_locks_only_for_stored_proposals() {
        let (_store, proposals) = setup();

        for id in 1..=1_000 {
            assert!(proposals.toggle_enabled(id).is_err());
            assert!(!proposals.remove(id).unwrap());
        }
        assert_eq!(proposals.lock_count(), 0);

        let id = proposals.create().unwrap();
        proposals.edit(id, ProposalField::Title, "Spawn shop").unwrap();
        assert_eq!(proposals.lock_count(), 1);

        assert!(proposals.remove(id).unwrap());
        assert_eq!(proposals.lock_count(), 0);
        assert!(matches!(proposals.edit(id, ProposalField::Title, "x"), Err(VotingError::ProposalNotFound(_))));
        assert_eq!(proposals.lock_count(), 0);
    }

    #[test]
    fn test_next_id_rejects_bad_counter() {
        let (store, proposals) = setup();

        store.set(keys::LAST_PROPOSAL_ID, Value::Int(-3)).unwrap();
        assert!(matches!(proposals.next_id(), Err(VotingError::InvalidIdCounter(-3))));

        store.set(keys::LAST_PROPOSAL_ID, Value::Int(i64::from(u32::MAX) + 1)).unwrap();
        assert!(matches!(proposals.next_id(), Err(VotingError::InvalidIdCounter(_))));

        store.set(keys::LAST_PROPOSAL_ID, Value::Int(i64::from(u32::MAX))).unwrap();
        assert!(matches!(proposals.next_id(), Err(VotingError::IdsExhausted)));
        assert!(matches!(proposals.create(), Err(VotingError::IdsExhausted)));
    }

    #[test]
    fn test_store_failure_surfaces() {
        let proposals = ProposalStore::new(Arc::new(FailingStore));

        assert!(matches!(proposals.create(), Err(VotingError::StoreUnavailable(_))));
        assert!(matches!(proposals.remove(1), Err(VotingError::StoreUnavailable(_))));
    }
}
