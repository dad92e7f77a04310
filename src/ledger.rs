//! Insert-once decision ledgers
//!
//! Votes and quest submissions are recorded per seat exactly once. The
//! ledger refuses a second entry for the same seat instead of silently
//! overwriting it, so callers cannot change a recorded decision.

use std::collections::{BTreeMap, btree_map::Entry};

use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A seat tried to record a second decision
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[error("seat {0} already recorded a decision")]
pub struct AlreadyRecorded(pub usize);

/// Decisions keyed by seat, each seat at most once
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive_where(Default)]
pub struct Ledger<V> {
    entries: BTreeMap<usize, V>,
}

impl<V> Ledger<V> {
    /// Records the decision of a seat
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRecorded` if the seat has an entry already; the
    /// existing entry is left untouched.
    pub fn record(&mut self, seat: usize, value: V) -> Result<(), AlreadyRecorded> {
        match self.entries.entry(seat) {
            Entry::Occupied(_) => Err(AlreadyRecorded(seat)),
            Entry::Vacant(v) => {
                v.insert(value);
                Ok(())
            }
        }
    }

    /// The decision of a seat, if recorded
    pub fn get(&self, seat: usize) -> Option<&V> {
        self.entries.get(&seat)
    }

    /// Whether the seat has recorded a decision
    pub fn contains(&self, seat: usize) -> bool {
        self.entries.contains_key(&seat)
    }

    /// Number of recorded decisions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Seats that have recorded a decision, in seat order
    pub fn seats(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    /// Recorded decisions in seat order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &V)> {
        self.entries.iter().map(|(s, v)| (*s, v))
    }

    /// Forgets every decision, used when a vote is re-opened
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Approve/reject counts of a yes-no vote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Number of approving votes
    pub approve: usize,
    /// Number of rejecting votes
    pub reject: usize,
}

impl Tally {
    /// Whether approvals are a strict majority of `electorate`
    pub fn is_majority_of(&self, electorate: usize) -> bool {
        self.approve * 2 > electorate
    }
}

impl Ledger<bool> {
    /// Counts the approving and rejecting entries
    pub fn tally(&self) -> Tally {
        let approve = self.entries.values().filter(|v| **v).count();
        Tally {
            approve,
            reject: self.entries.len() - approve,
        }
    }
}
