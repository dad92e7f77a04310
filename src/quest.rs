//! One round of the match
//!
//! A quest owns its proposed team, the team vote, the members' secret
//! results and the magic token handed out for it. It resolves itself once
//! every member has submitted: any failing card fails the quest.

use serde::Serialize;

use crate::{
    game::Error,
    ledger::{AlreadyRecorded, Ledger, Tally},
};

/// A submitted quest card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Submission {
    /// The stored outcome after magic coercion
    pub success: bool,
    /// Whether a magic token was spent on this card
    pub used_magic: bool,
}

/// Result of a completed quest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Whether the quest succeeded
    pub success: bool,
    /// Number of failing cards
    pub fail_count: usize,
    /// Whether any member spent a magic token
    pub used_magic: bool,
}

/// Runtime state of an ordinary quest
#[derive(Debug, Clone)]
pub struct Quest {
    number: usize,
    required_players: usize,
    team: Vec<usize>,
    proposer: Option<usize>,
    team_votes: Ledger<bool>,
    rejected_proposals: usize,
    results: Ledger<Submission>,
    magic_target: Option<usize>,
    resolution: Option<Resolution>,
}

impl Quest {
    /// Creates the quest with the given 1-based number and team size
    pub fn new(number: usize, required_players: usize) -> Self {
        Self {
            number,
            required_players,
            team: Vec::new(),
            proposer: None,
            team_votes: Ledger::default(),
            rejected_proposals: 0,
            results: Ledger::default(),
            magic_target: None,
            resolution: None,
        }
    }

    /// The 1-based quest number
    pub fn number(&self) -> usize {
        self.number
    }

    /// Team size the quest needs
    pub fn required_players(&self) -> usize {
        self.required_players
    }

    /// Seats of the current team
    pub fn team(&self) -> &[usize] {
        &self.team
    }

    /// Whether a seat is on the team
    pub fn is_member(&self, seat: usize) -> bool {
        self.team.contains(&seat)
    }

    /// Whether the team has the required size
    pub fn is_team_full(&self) -> bool {
        self.team.len() == self.required_players
    }

    /// The leader who proposed the current team
    pub fn proposer(&self) -> Option<usize> {
        self.proposer
    }

    /// Installs a proposed team
    ///
    /// The caller checks size and membership; this only stores the team.
    pub(crate) fn set_team(&mut self, proposer: usize, team: Vec<usize>) {
        self.proposer = Some(proposer);
        self.team = team;
        self.team_votes.clear();
    }

    /// Records a team vote
    pub(crate) fn record_team_vote(
        &mut self,
        seat: usize,
        approve: bool,
    ) -> Result<Tally, AlreadyRecorded> {
        self.team_votes.record(seat, approve)?;
        Ok(self.team_votes.tally())
    }

    /// The team votes cast so far
    pub fn team_votes(&self) -> &Ledger<bool> {
        &self.team_votes
    }

    /// Drops a rejected team and counts the rejection
    pub(crate) fn reject_team(&mut self) {
        self.team.clear();
        self.proposer = None;
        self.team_votes.clear();
        self.rejected_proposals += 1;
    }

    /// Number of team proposals rejected this round
    pub fn rejected_proposals(&self) -> usize {
        self.rejected_proposals
    }

    /// The seat that received this quest's magic token
    pub fn magic_target(&self) -> Option<usize> {
        self.magic_target
    }

    pub(crate) fn set_magic_target(&mut self, seat: usize) {
        self.magic_target = Some(seat);
    }

    /// Stores a member's card and resolves the quest when it is the last
    ///
    /// # Errors
    ///
    /// * `Error::AlreadySubmitted` - the quest is complete or the seat
    ///   already has a card; the stored results are not touched
    /// * `Error::NotOnTeam` - the seat is not a member
    pub fn submit(
        &mut self,
        seat: usize,
        submission: Submission,
    ) -> Result<Option<Resolution>, Error> {
        if self.is_completed() {
            return Err(Error::AlreadySubmitted);
        }
        if !self.is_member(seat) {
            return Err(Error::NotOnTeam);
        }
        self.results
            .record(seat, submission)
            .map_err(|_| Error::AlreadySubmitted)?;

        if self.results.len() == self.team.len() && self.is_team_full() {
            let fail_count = self.results.iter().filter(|(_, s)| !s.success).count();
            let resolution = Resolution {
                success: fail_count == 0,
                fail_count,
                used_magic: self.results.iter().any(|(_, s)| s.used_magic),
            };
            self.resolution = Some(resolution);
            return Ok(Some(resolution));
        }
        Ok(None)
    }

    /// Whether a seat has already handed in a card
    pub fn has_submitted(&self, seat: usize) -> bool {
        self.results.contains(seat)
    }

    /// Number of cards handed in
    pub fn submitted_count(&self) -> usize {
        self.results.len()
    }

    /// Seats that handed in a card, in seat order
    pub fn submitted_seats(&self) -> Vec<usize> {
        self.results.seats().collect()
    }

    /// Team members still owing a card, in team order
    pub fn pending_members(&self) -> Vec<usize> {
        self.team
            .iter()
            .copied()
            .filter(|s| !self.results.contains(*s))
            .collect()
    }

    /// Whether every member has submitted
    pub fn is_completed(&self) -> bool {
        self.resolution.is_some()
    }

    /// The outcome once completed
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }
}
