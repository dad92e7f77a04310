//! The final quest extension
//!
//! The final quest replaces the ordinary end of a match when enabled. Good
//! players nominate a leader, the whole table votes on the nomination, the
//! approved leader builds a team one member at a time and the team then
//! executes the quest. A single spent magic token makes the final quest
//! succeed; otherwise every card must be a success.

use serde::{Deserialize, Serialize};

use crate::{
    game::Error,
    ledger::{Ledger, Tally},
    quest::Submission,
};

/// Progress of the final quest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalQuestStatus {
    /// Created but not opened yet
    #[default]
    NotStarted,
    /// Waiting for a nomination and the vote on it
    SelectingLeader,
    /// The approved leader is picking members
    SelectingTeam,
    /// Members are handing in their cards
    Executing,
    /// The outcome is known
    Completed,
}

/// Outcome of a finished leader vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeaderVote {
    /// Final counts
    pub tally: Tally,
    /// Whether the nominee became leader
    pub approved: bool,
}

/// Runtime state of the final quest
#[derive(Debug, Clone)]
pub struct FinalQuest {
    required_players: usize,
    status: FinalQuestStatus,
    nominee: Option<usize>,
    votes: Ledger<bool>,
    team: Vec<usize>,
    magic_target: Option<usize>,
    results: Ledger<Submission>,
    outcome: Option<bool>,
}

impl FinalQuest {
    /// Creates an unopened final quest needing `required_players` members
    pub fn new(required_players: usize) -> Self {
        Self {
            required_players,
            status: FinalQuestStatus::NotStarted,
            nominee: None,
            votes: Ledger::default(),
            team: Vec::new(),
            magic_target: None,
            results: Ledger::default(),
            outcome: None,
        }
    }

    /// Current progress
    pub fn status(&self) -> FinalQuestStatus {
        self.status
    }

    /// Team size the final quest needs
    pub fn required_players(&self) -> usize {
        self.required_players
    }

    /// The outstanding or approved nominee
    pub fn nominee(&self) -> Option<usize> {
        self.nominee
    }

    /// Leader votes cast on the current nomination
    pub fn votes(&self) -> &Ledger<bool> {
        &self.votes
    }

    /// Seats picked so far
    pub fn team(&self) -> &[usize] {
        &self.team
    }

    /// The member who received the final quest's magic token
    pub fn magic_target(&self) -> Option<usize> {
        self.magic_target
    }

    /// Cards handed in so far
    pub fn results(&self) -> &Ledger<Submission> {
        &self.results
    }

    /// The outcome once completed
    pub fn outcome(&self) -> Option<bool> {
        self.outcome
    }

    fn expect_status(&self, status: FinalQuestStatus) -> Result<(), Error> {
        if self.status == status {
            Ok(())
        } else {
            Err(Error::InvalidPhase)
        }
    }

    /// Opens the leader nomination
    pub(crate) fn start(&mut self) -> Result<(), Error> {
        self.expect_status(FinalQuestStatus::NotStarted)?;
        self.status = FinalQuestStatus::SelectingLeader;
        Ok(())
    }

    /// Puts a nominee up for the vote
    pub(crate) fn nominate(&mut self, nominee: usize) -> Result<(), Error> {
        self.expect_status(FinalQuestStatus::SelectingLeader)?;
        if self.nominee.is_some() {
            return Err(Error::AlreadyNominated);
        }
        self.nominee = Some(nominee);
        Ok(())
    }

    /// Records a vote on the nomination
    ///
    /// # Returns
    ///
    /// The running tally, plus the vote outcome once all of `electorate`
    /// voted.
    pub(crate) fn vote(
        &mut self,
        voter: usize,
        approve: bool,
        electorate: usize,
    ) -> Result<(Tally, Option<LeaderVote>), Error> {
        self.expect_status(FinalQuestStatus::SelectingLeader)?;
        if self.nominee.is_none() {
            return Err(Error::InvalidPhase);
        }
        self.votes
            .record(voter, approve)
            .map_err(|_| Error::AlreadyVoted)?;
        let tally = self.votes.tally();
        if self.votes.len() == electorate {
            Ok((tally, Some(self.resolve_leader_vote(electorate))))
        } else {
            Ok((tally, None))
        }
    }

    /// Closes the nomination vote with the votes cast so far
    ///
    /// A strict majority of `electorate` approves the nominee; anything
    /// else clears the nomination for a new one.
    pub(crate) fn resolve_leader_vote(&mut self, electorate: usize) -> LeaderVote {
        let tally = self.votes.tally();
        let approved = self.nominee.is_some() && tally.is_majority_of(electorate);
        if approved {
            self.status = FinalQuestStatus::SelectingTeam;
        } else {
            self.nominee = None;
            self.votes.clear();
        }
        LeaderVote { tally, approved }
    }

    /// Installs a leader without a vote, used when nobody was nominated in time
    pub(crate) fn appoint(&mut self, leader: usize) -> Result<(), Error> {
        self.expect_status(FinalQuestStatus::SelectingLeader)?;
        self.nominee = Some(leader);
        self.votes.clear();
        self.status = FinalQuestStatus::SelectingTeam;
        Ok(())
    }

    /// Adds a member picked by the approved leader
    pub(crate) fn add_member(&mut self, leader: usize, member: usize) -> Result<(), Error> {
        self.expect_status(FinalQuestStatus::SelectingTeam)?;
        if self.nominee != Some(leader) {
            return Err(Error::NotLeader);
        }
        if self.team.len() >= self.required_players {
            return Err(Error::InvalidTeamSize);
        }
        if self.team.contains(&member) {
            return Err(Error::InvalidMember);
        }
        self.team.push(member);
        if self.team.len() == self.required_players {
            self.status = FinalQuestStatus::Executing;
        }
        Ok(())
    }

    /// Marks the member the approved leader gives the magic token to
    ///
    /// The caller grants the token itself.
    pub(crate) fn give_magic_token(&mut self, leader: usize, member: usize) -> Result<(), Error> {
        if !matches!(
            self.status,
            FinalQuestStatus::SelectingTeam | FinalQuestStatus::Executing
        ) {
            return Err(Error::InvalidPhase);
        }
        if self.nominee != Some(leader) {
            return Err(Error::NotLeader);
        }
        if !self.team.contains(&member) {
            return Err(Error::NotOnTeam);
        }
        if self.magic_target.is_some() {
            return Err(Error::ResourceUnavailable);
        }
        if self.results.contains(member) {
            return Err(Error::AlreadySubmitted);
        }
        self.magic_target = Some(member);
        Ok(())
    }

    /// Stores a member's card and completes the quest on the last one
    ///
    /// # Returns
    ///
    /// The outcome when this was the last card
    pub(crate) fn submit(&mut self, seat: usize, submission: Submission) -> Result<Option<bool>, Error> {
        if self.status == FinalQuestStatus::Completed {
            return Err(Error::AlreadySubmitted);
        }
        self.expect_status(FinalQuestStatus::Executing)?;
        if !self.team.contains(&seat) {
            return Err(Error::NotOnTeam);
        }
        self.results
            .record(seat, submission)
            .map_err(|_| Error::AlreadySubmitted)?;
        if self.results.len() < self.required_players {
            return Ok(None);
        }

        let magic = self.results.iter().any(|(_, s)| s.used_magic);
        let outcome = magic || self.results.iter().all(|(_, s)| s.success);
        self.outcome = Some(outcome);
        self.status = FinalQuestStatus::Completed;
        Ok(Some(outcome))
    }

    /// Members still owing a card, in team order
    pub fn pending_members(&self) -> Vec<usize> {
        self.team
            .iter()
            .copied()
            .filter(|s| !self.results.contains(*s))
            .collect()
    }
}
