//! Seated player state
//!
//! A player is created when they take a seat and lives until the match is
//! dropped. Their role and team are written once by the role assigner;
//! magic tokens and amulets only change through their mechanics.

use serde::{Deserialize, Serialize};

use crate::catalog::{Role, Team};

/// A seated participant of a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    name: String,
    role: Option<Role>,
    magic_tokens: usize,
    amulets: usize,
    /// Seats of the players who checked this player with an amulet
    revealed_by: Vec<usize>,
}

impl Player {
    /// Creates an unassigned player with the given number of amulets
    ///
    /// The name is expected to be validated by the roster already.
    pub fn new(name: String, amulets: usize) -> Self {
        Self {
            name,
            role: None,
            magic_tokens: 0,
            amulets,
            revealed_by: Vec::new(),
        }
    }

    /// The player's unique name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dealt role, if roles were assigned
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// The team derived from the dealt role
    pub fn team(&self) -> Option<Team> {
        self.role.map(Role::team)
    }

    /// Whether the player plays for the given team
    pub fn is_on(&self, team: Team) -> bool {
        self.team() == Some(team)
    }

    pub(crate) fn set_role(&mut self, role: Role) {
        self.role = Some(role);
    }

    /// Remaining magic tokens
    pub fn magic_tokens(&self) -> usize {
        self.magic_tokens
    }

    pub(crate) fn grant_magic_token(&mut self) {
        self.magic_tokens += 1;
    }

    /// Spends one magic token
    ///
    /// # Returns
    ///
    /// `true` if a token was available and has been consumed
    pub fn use_magic_token(&mut self) -> bool {
        if self.magic_tokens > 0 {
            self.magic_tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Remaining amulets
    pub fn amulets(&self) -> usize {
        self.amulets
    }

    /// Spends one amulet
    ///
    /// # Returns
    ///
    /// `true` if an amulet was available and has been consumed
    pub fn use_amulet(&mut self) -> bool {
        if self.amulets > 0 {
            self.amulets -= 1;
            true
        } else {
            false
        }
    }

    /// Seats of players who have checked this player
    pub fn revealed_by(&self) -> &[usize] {
        &self.revealed_by
    }

    /// Whether the player at `seat` has checked this player
    pub fn was_revealed_by(&self, seat: usize) -> bool {
        self.revealed_by.contains(&seat)
    }

    pub(crate) fn add_revealer(&mut self, seat: usize) {
        if !self.was_revealed_by(seat) {
            self.revealed_by.push(seat);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_is_unassigned() {
        let player = Player::new("Alice".to_string(), 1);
        assert_eq!(player.name(), "Alice");
        assert_eq!(player.role(), None);
        assert_eq!(player.team(), None);
        assert_eq!(player.magic_tokens(), 0);
        assert_eq!(player.amulets(), 1);
    }

    #[test]
    fn test_team_follows_role() {
        let mut player = Player::new("Alice".to_string(), 1);
        player.set_role(Role::Shapeshifter);
        assert_eq!(player.team(), Some(Team::Evil));
        assert!(player.is_on(Team::Evil));
        assert!(!player.is_on(Team::Good));
    }

    #[test]
    fn test_magic_token_consumption() {
        let mut player = Player::new("Alice".to_string(), 1);
        assert!(!player.use_magic_token());

        player.grant_magic_token();
        assert_eq!(player.magic_tokens(), 1);
        assert!(player.use_magic_token());
        assert_eq!(player.magic_tokens(), 0);
        assert!(!player.use_magic_token());
    }

    #[test]
    fn test_amulet_consumption() {
        let mut player = Player::new("Alice".to_string(), 1);
        assert!(player.use_amulet());
        assert!(!player.use_amulet());
        assert_eq!(player.amulets(), 0);
    }

    #[test]
    fn test_revealers_are_deduplicated() {
        let mut player = Player::new("Alice".to_string(), 1);
        player.add_revealer(2);
        player.add_revealer(2);
        player.add_revealer(4);
        assert_eq!(player.revealed_by(), &[2, 4]);
        assert!(player.was_revealed_by(4));
        assert!(!player.was_revealed_by(1));
    }
}
