//! Seating and player name management
//!
//! This module keeps the ordered list of seated players of a match. The
//! seat order is the leader rotation order. Names are trimmed, filtered
//! for inappropriate content and must be unique within the match.

use std::collections::HashMap;

use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{constants, player::Player};

/// Serialization helper for Roster struct
#[derive(Deserialize)]
struct RosterSerde {
    players: Vec<Player>,
}

/// Ordered seating of a match with name lookup
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(from = "RosterSerde")]
pub struct Roster {
    /// Seated players in seating order
    players: Vec<Player>,

    /// Reverse mapping from name to seat (not serialized)
    #[serde(skip_serializing)]
    seats: HashMap<String, usize>,
}

impl From<RosterSerde> for Roster {
    /// Rebuilds the name index from the seated players
    fn from(serde: RosterSerde) -> Self {
        let RosterSerde { players } = serde;
        let seats = players
            .iter()
            .enumerate()
            .map(|(seat, p)| (p.name().to_owned(), seat))
            .collect();
        Self { players, seats }
    }
}

/// Errors that can occur during name validation
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested name is already seated
    #[error("name already in-use")]
    Used,
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Sinful,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
}

/// Validates and normalizes a requested player name
///
/// # Errors
///
/// * `Error::TooLong` - Name exceeds the maximum length
/// * `Error::Empty` - Name is empty after trimming whitespace
/// * `Error::Sinful` - Name contains inappropriate content
pub fn clean_name(name: &str) -> Result<String, Error> {
    if name.len() > constants::names::MAX_LENGTH {
        return Err(Error::TooLong);
    }
    let name = rustrict::trim_whitespace(name);
    if name.is_empty() {
        return Err(Error::Empty);
    }
    if name.is_inappropriate() {
        return Err(Error::Sinful);
    }
    Ok(name.to_owned())
}

impl Roster {
    /// Seats a new player at the end of the table
    ///
    /// # Returns
    ///
    /// The seat index of the new player
    ///
    /// # Errors
    ///
    /// Any name validation error, or `Error::Used` if the name is taken.
    pub fn seat(&mut self, name: &str, amulets: usize) -> Result<usize, Error> {
        let name = clean_name(name)?;
        if self.seats.contains_key(&name) {
            return Err(Error::Used);
        }
        let seat = self.players.len();
        self.seats.insert(name.clone(), seat);
        self.players.push(Player::new(name, amulets));
        Ok(seat)
    }

    /// Removes a player and closes the gap in the seating
    pub fn unseat(&mut self, name: &str) -> Option<Player> {
        let seat = self.seats.remove(name)?;
        let player = self.players.remove(seat);
        for index in self.seats.values_mut() {
            if *index > seat {
                *index -= 1;
            }
        }
        Some(player)
    }

    /// Finds the seat of a player by name
    pub fn find(&self, name: &str) -> Option<usize> {
        self.seats.get(name).copied()
    }

    /// The player at a seat
    pub fn get(&self, seat: usize) -> Option<&Player> {
        self.players.get(seat)
    }

    /// Mutable access to the player at a seat
    pub fn get_mut(&mut self, seat: usize) -> Option<&mut Player> {
        self.players.get_mut(seat)
    }

    /// Number of seated players
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether nobody is seated
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Iterates over the players in seating order
    pub fn iter(&self) -> std::slice::Iter<'_, Player> {
        self.players.iter()
    }

    /// Mutable iteration in seating order
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Player> {
        self.players.iter_mut()
    }

    /// Name of the player at a seat, or an empty string for unknown seats
    pub fn name(&self, seat: usize) -> &str {
        self.players.get(seat).map_or("", Player::name)
    }

    /// Names of the players at the given seats, in the given order
    pub fn names(&self, seats: &[usize]) -> Vec<String> {
        seats.iter().map(|s| self.name(*s).to_owned()).collect()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_seat_and_find() {
        let mut roster = Roster::default();
        assert_eq!(roster.seat("Alice", 1), Ok(0));
        assert_eq!(roster.seat("Bob", 1), Ok(1));

        assert_eq!(roster.find("Alice"), Some(0));
        assert_eq!(roster.find("Bob"), Some(1));
        assert_eq!(roster.find("Carol"), None);
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.name(1), "Bob");
    }

    #[test]
    fn test_name_too_long() {
        let mut roster = Roster::default();
        let long_name = "a".repeat(constants::names::MAX_LENGTH + 1);
        assert_eq!(roster.seat(&long_name, 1), Err(Error::TooLong));

        let max_name = "a".repeat(constants::names::MAX_LENGTH);
        assert!(roster.seat(&max_name, 1).is_ok());
    }

    #[test]
    fn test_empty_name() {
        let mut roster = Roster::default();
        assert_eq!(roster.seat("", 1), Err(Error::Empty));
        assert_eq!(roster.seat("   ", 1), Err(Error::Empty));
        assert_eq!(roster.seat("\t\n", 1), Err(Error::Empty));
        assert!(roster.is_empty());
    }

    #[test]
    fn test_whitespace_trimming_and_duplicates() {
        let mut roster = Roster::default();
        roster.seat("  Alice  ", 1).unwrap();
        assert_eq!(roster.name(0), "Alice");
        assert_eq!(roster.seat("Alice", 1), Err(Error::Used));
        assert_eq!(roster.seat(" Alice", 1), Err(Error::Used));
    }

    #[test]
    fn test_inappropriate_names() {
        let mut roster = Roster::default();
        for name in ["damn", "fuck", "shit"] {
            assert_eq!(
                roster.seat(name, 1),
                Err(Error::Sinful),
                "Expected '{name}' to be flagged as inappropriate"
            );
        }
    }

    #[test]
    fn test_unseat_shifts_seats() {
        let mut roster = Roster::default();
        for name in ["Alice", "Bob", "Carol"] {
            roster.seat(name, 1).unwrap();
        }

        let removed = roster.unseat("Alice").unwrap();
        assert_eq!(removed.name(), "Alice");
        assert_eq!(roster.find("Bob"), Some(0));
        assert_eq!(roster.find("Carol"), Some(1));
        assert!(roster.unseat("Alice").is_none());

        // The freed name can be taken again
        assert_eq!(roster.seat("Alice", 1), Ok(2));
    }

    #[test]
    fn test_names_in_order() {
        let mut roster = Roster::default();
        for name in ["Alice", "Bob", "Carol"] {
            roster.seat(name, 1).unwrap();
        }
        assert_eq!(roster.names(&[2, 0]), vec!["Carol", "Alice"]);
    }

    #[test]
    fn test_serialization_rebuilds_index() {
        let mut original = Roster::default();
        original.seat("Alice", 1).unwrap();
        original.seat("Bob", 1).unwrap();

        let serialized = serde_json::to_string(&original).unwrap();
        let mut deserialized: Roster = serde_json::from_str(&serialized).unwrap();

        assert_eq!(deserialized.find("Bob"), Some(1));
        assert_eq!(deserialized.seat("Alice", 1), Err(Error::Used));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(Error::Used.to_string(), "name already in-use");
        assert_eq!(Error::Empty.to_string(), "name cannot be empty");
        assert_eq!(Error::Sinful.to_string(), "name is inappropriate");
        assert_eq!(Error::TooLong.to_string(), "name is too long");
    }
}
