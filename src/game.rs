//! Core game logic and state management
//!
//! This module contains the match struct and the phase state machine:
//! seating, role assignment, team proposals and votes, quest execution with
//! the magic token mechanic, leader succession, the final quest extension,
//! amulet checks and the optional per-phase timer. Every operation checks
//! phase, actor and payload first and only mutates once all checks passed.

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use tracing::{debug, info, warn};
use web_time::Duration;

use crate::{
    amulet::{self, AmuletCheck, AmuletLog},
    catalog::{Role, Setup, Team},
    config::Options,
    constants::quests::QUESTS_TO_WIN,
    final_quest::{FinalQuest, FinalQuestStatus, LeaderVote},
    ledger::Tally,
    player::Player,
    quest::{Quest, Resolution, Submission},
    roster::{self, Roster},
    timer::{AlarmMessage, PhaseKind, PhaseTimer, TimerSnapshot, TimerStatus},
    visibility::{self, PlayerView},
};

/// Represents the current phase of the match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Players are taking their seats
    #[default]
    Setup,
    /// The leader has to propose a team
    LeaderTurn,
    /// Everyone votes on the proposed team
    TeamVote,
    /// Team members hand in their cards
    QuestVote,
    /// The outgoing leader picks a successor
    SelectNextLeader,
    /// The final quest decides the match
    FinalQuest,
    /// The match is decided
    GameOver,
}

/// Errors that can occur when acting on a match
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The action does not belong to the current phase
    #[error("action is not allowed in the current phase")]
    InvalidPhase,
    /// Only the leader may perform the action
    #[error("only the leader may do this")]
    NotLeader,
    /// The player is not a member of the team
    #[error("player is not on the team")]
    NotOnTeam,
    /// The player's team may not perform the action
    #[error("player is not allowed to do this")]
    NotAuthorized,
    /// The team does not have the required size
    #[error("team has the wrong size")]
    InvalidTeamSize,
    /// A named player is unknown, repeated or not allowed as target
    #[error("invalid player")]
    InvalidMember,
    /// The player has voted already
    #[error("player has already voted")]
    AlreadyVoted,
    /// The player has handed in a card already
    #[error("player has already submitted a result")]
    AlreadySubmitted,
    /// A nomination is waiting for its vote
    #[error("a nomination is already outstanding")]
    AlreadyNominated,
    /// No token or amulet is left to spend
    #[error("no such item left")]
    ResourceUnavailable,
    /// Roles were dealt before
    #[error("roles have already been assigned")]
    AlreadyAssigned,
    /// Not every seat is taken yet
    #[error("not every seat is taken")]
    RosterIncomplete,
    /// Every seat is taken
    #[error("every seat is taken")]
    RosterFull,
    /// No setup exists for the requested table size
    #[error("unsupported number of players")]
    UnsupportedPlayerCount,
    /// The match options failed validation
    #[error("invalid match options")]
    InvalidOptions,
    /// The requested player name was refused
    #[error(transparent)]
    Name(#[from] roster::Error),
}

/// Summary of a resolved ordinary quest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestRecord {
    /// 1-based quest number
    pub number: usize,
    /// Leader who proposed the team
    pub leader: String,
    /// Names of the team members in proposal order
    pub team: Vec<String>,
    /// Whether the quest succeeded
    pub success: bool,
    /// Number of failing cards
    pub fail_count: usize,
    /// Whether a magic token was spent
    pub used_magic: bool,
}

/// Actions of an ordinary round
#[derive(Debug, Deserialize, Clone)]
pub enum RoundMessage {
    /// The leader proposes these players
    ProposeTeam(Vec<String>),
    /// Approve or reject the proposed team
    TeamVote(bool),
    /// Hand in a quest card
    QuestResult {
        /// The chosen outcome
        success: bool,
        /// Whether to spend a magic token
        use_magic: bool,
    },
    /// The proposing leader gives a team member the magic token
    AssignMagicToken(String),
    /// The outgoing leader names a successor
    SelectNextLeader(String),
}

/// Actions of the final quest
#[derive(Debug, Deserialize, Clone)]
pub enum FinalQuestMessage {
    /// Open the leader nomination
    Start,
    /// Nominate a final quest leader
    Nominate(String),
    /// Approve or reject the nominee
    Vote(bool),
    /// The approved leader adds a member
    AssignMember(String),
    /// The approved leader gives a member the magic token
    AssignMagicToken(String),
    /// Hand in a final quest card
    Result {
        /// The chosen outcome
        success: bool,
        /// Whether to spend a magic token
        use_magic: bool,
    },
}

/// Actions on consumable items
#[derive(Debug, Deserialize, Clone)]
pub enum ItemMessage {
    /// Check the named player with an amulet
    UseAmulet(String),
}

/// Messages received from seated players
#[derive(Debug, Deserialize, Clone, derive_more::From)]
pub enum IncomingMessage {
    /// Ordinary round actions
    Round(RoundMessage),
    /// Final quest actions
    FinalQuest(FinalQuestMessage),
    /// Item actions
    Item(ItemMessage),
}

/// What a handled message produced for its sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Response {
    /// The action was applied
    Done,
    /// Running tally of a vote
    Tally(Tally),
    /// The quest outcome, once the last card is in
    Quest(Option<Resolution>),
    /// The final quest outcome, once the last card is in
    FinalQuest(Option<bool>),
    /// What the amulet showed
    Amulet {
        /// The checked player
        target: String,
        /// The team the amulet showed
        team: Team,
    },
}

/// A seat as everyone may see it
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicPlayer {
    /// Player name
    pub name: String,
    /// 1-based seat number
    pub number: usize,
    /// Whether the seat currently leads
    pub is_leader: bool,
    /// Remaining magic tokens
    pub magic_tokens: usize,
    /// Remaining amulets
    pub amulets: usize,
    /// Role, only once the match is over
    pub role: Option<Role>,
    /// Team, only once the match is over
    pub team: Option<Team>,
}

/// Public view of the current ordinary quest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestStatus {
    /// 1-based quest number
    pub number: usize,
    /// Team size the quest needs
    pub required_players: usize,
    /// Proposed or approved team
    pub team: Vec<String>,
    /// Players who voted on the team
    pub voted: Vec<String>,
    /// Members who handed in their card
    pub submitted: Vec<String>,
    /// Rejected proposals this round
    pub rejected_proposals: usize,
}

/// Public view of the final quest
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalQuestSnapshot {
    /// Progress of the final quest
    pub status: FinalQuestStatus,
    /// Team size the final quest needs
    pub required_players: usize,
    /// Nominee or approved leader
    pub leader: Option<String>,
    /// Players who voted on the nominee
    pub voted: Vec<String>,
    /// Picked members
    pub team: Vec<String>,
    /// Member who received the magic token
    pub magic_holder: Option<String>,
    /// Members who handed in their card
    pub submitted: Vec<String>,
    /// Outcome once completed
    pub outcome: Option<bool>,
}

/// Everything about a match that may be broadcast
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameStatus {
    /// Current phase
    pub phase: Phase,
    /// Number of the current ordinary quest
    pub quest_number: usize,
    /// Current leader, once roles are dealt
    pub leader: Option<String>,
    /// Every seat in order
    pub players: Vec<PublicPlayer>,
    /// The current ordinary quest
    pub current_quest: QuestStatus,
    /// Outcome of every resolved quest, the final quest included
    pub quest_results: Vec<bool>,
    /// Details of every resolved ordinary quest
    pub history: Vec<QuestRecord>,
    /// Successful ordinary quests
    pub successful_quests: usize,
    /// Failed ordinary quests
    pub failed_quests: usize,
    /// Winning team once decided
    pub winner: Option<Team>,
    /// The final quest, once reached
    pub final_quest: Option<FinalQuestSnapshot>,
}

/// Everything a single player may know
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerInfo {
    /// Player name
    pub name: String,
    /// 1-based seat number
    pub number: usize,
    /// Own role once dealt
    pub role: Option<Role>,
    /// Display name of the own role
    pub role_name: Option<&'static str>,
    /// Rules text of the own role
    pub role_description: Option<&'static str>,
    /// Own team once dealt
    pub team: Option<Team>,
    /// Remaining magic tokens
    pub magic_tokens: usize,
    /// Remaining amulets
    pub amulets: usize,
    /// The table as this player sees it
    pub table: Vec<PlayerView>,
}

/// A single match
#[derive(Debug, Clone)]
pub struct Game {
    setup: Setup,
    options: Options,
    roster: Roster,
    phase: Phase,
    /// Seat of the current leader
    leader: usize,
    quest: Quest,
    final_quest: Option<FinalQuest>,
    successful_quests: usize,
    failed_quests: usize,
    history: Vec<QuestRecord>,
    quest_results: Vec<bool>,
    winner: Option<Team>,
    roles_assigned: bool,
    amulets: AmuletLog,
    timer: PhaseTimer,
    /// Cleared by [`Game::toggle_timer`] to stop arming deadlines
    timer_enabled: bool,
    rng: fastrand::Rng,
}

impl Game {
    /// Creates a match for `player_count` seats
    ///
    /// # Errors
    ///
    /// * `Error::UnsupportedPlayerCount` - no setup for that many players
    /// * `Error::InvalidOptions` - the options failed validation
    pub fn new(player_count: usize, options: Options) -> Result<Self, Error> {
        Self::with_rng(player_count, options, fastrand::Rng::new())
    }

    /// Creates a match drawing all randomness from `rng`
    ///
    /// # Errors
    ///
    /// Same as [`Game::new`].
    pub fn with_rng(
        player_count: usize,
        options: Options,
        rng: fastrand::Rng,
    ) -> Result<Self, Error> {
        let setup = Setup::for_players(player_count).ok_or(Error::UnsupportedPlayerCount)?;
        if let Err(report) = options.validate() {
            warn!(%report, "rejected match options");
            return Err(Error::InvalidOptions);
        }
        let first_quest = Quest::new(1, setup.quest_sizes()[0]);
        Ok(Self {
            setup,
            options,
            roster: Roster::default(),
            phase: Phase::Setup,
            leader: 0,
            quest: first_quest,
            final_quest: None,
            successful_quests: 0,
            failed_quests: 0,
            history: Vec::new(),
            quest_results: Vec::new(),
            winner: None,
            roles_assigned: false,
            amulets: AmuletLog::default(),
            timer: PhaseTimer::default(),
            timer_enabled: true,
            rng,
        })
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The table setup
    pub fn setup(&self) -> &Setup {
        &self.setup
    }

    /// The options the match was created with
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Seated players
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The current ordinary quest
    pub fn quest(&self) -> &Quest {
        &self.quest
    }

    /// The final quest, once reached
    pub fn final_quest(&self) -> Option<&FinalQuest> {
        self.final_quest.as_ref()
    }

    /// Number of the quest being played
    ///
    /// Counts resolved quests, so the final quest follows the last
    /// ordinary one.
    pub fn quest_number(&self) -> usize {
        self.quest_results.len() + 1
    }

    /// Successful ordinary quests
    pub fn successful_quests(&self) -> usize {
        self.successful_quests
    }

    /// Failed ordinary quests
    pub fn failed_quests(&self) -> usize {
        self.failed_quests
    }

    /// Resolved ordinary quests in order
    pub fn history(&self) -> &[QuestRecord] {
        &self.history
    }

    /// Winning team once decided
    pub fn winner(&self) -> Option<Team> {
        self.winner
    }

    fn expect_phase(&self, phase: Phase) -> Result<(), Error> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(Error::InvalidPhase)
        }
    }

    fn expect_final_status(&self, status: FinalQuestStatus) -> Result<(), Error> {
        self.expect_phase(Phase::FinalQuest)?;
        match &self.final_quest {
            Some(final_quest) if final_quest.status() == status => Ok(()),
            _ => Err(Error::InvalidPhase),
        }
    }

    fn seat_of(&self, name: &str) -> Result<usize, Error> {
        self.roster.find(name).ok_or(Error::InvalidMember)
    }

    fn next_seat(&self, seat: usize) -> usize {
        (seat + 1) % self.roster.len().max(1)
    }

    /// Restarts the deadline for `kind`; a switched off timer only drops
    /// the old deadline
    fn arm_timer(&mut self, kind: PhaseKind) {
        match self.options.timer {
            Some(timer) if self.timer_enabled => self.timer.arm(kind, timer.duration(kind)),
            Some(_) => self.timer.disarm(),
            None => {}
        }
    }

    /// The deadline that runs in the current phase and final quest step
    fn current_deadline(&self) -> Option<PhaseKind> {
        match self.phase {
            Phase::LeaderTurn => Some(PhaseKind::LeaderTurn),
            Phase::TeamVote => Some(PhaseKind::TeamVote),
            Phase::QuestVote => Some(PhaseKind::QuestVote),
            Phase::SelectNextLeader => Some(PhaseKind::SelectNextLeader),
            Phase::FinalQuest => match self.final_quest.as_ref().map(FinalQuest::status) {
                Some(FinalQuestStatus::NotStarted | FinalQuestStatus::SelectingLeader) => {
                    Some(PhaseKind::FinalLeaderVote)
                }
                Some(FinalQuestStatus::SelectingTeam | FinalQuestStatus::Executing) => {
                    Some(PhaseKind::FinalQuest)
                }
                Some(FinalQuestStatus::Completed) | None => None,
            },
            Phase::Setup | Phase::GameOver => None,
        }
    }

    /// Moves to `phase` and restarts the matching deadline
    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
        match self.current_deadline() {
            Some(kind) => self.arm_timer(kind),
            None => self.timer.disarm(),
        }
    }

    fn finish(&mut self, winner: Team) {
        info!(
            winner = winner.display_name(),
            successes = self.successful_quests,
            failures = self.failed_quests,
            "match decided"
        );
        self.winner = Some(winner);
        self.enter(Phase::GameOver);
    }

    /// Seats a new player
    ///
    /// # Returns
    ///
    /// The seat index of the new player
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` - roles were dealt already
    /// * `Error::RosterFull` - every seat is taken
    /// * `Error::Name` - the name was refused
    pub fn add_player(&mut self, name: &str) -> Result<usize, Error> {
        self.expect_phase(Phase::Setup)?;
        if self.roster.len() >= self.setup.player_count() {
            return Err(Error::RosterFull);
        }
        let seat = self.roster.seat(name, self.options.starting_amulets)?;
        info!(seat, name = self.roster.name(seat), "player seated");
        Ok(seat)
    }

    /// Removes a player before roles are dealt
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` - roles were dealt already
    /// * `Error::InvalidMember` - nobody with that name is seated
    pub fn remove_player(&mut self, name: &str) -> Result<(), Error> {
        self.expect_phase(Phase::Setup)?;
        let player = self.roster.unseat(name).ok_or(Error::InvalidMember)?;
        info!(name = player.name(), "player left");
        Ok(())
    }

    /// Deals the roles and opens the first quest
    ///
    /// # Errors
    ///
    /// * `Error::AlreadyAssigned` - roles were dealt before
    /// * `Error::RosterIncomplete` - not every seat is taken
    pub fn assign_roles(&mut self) -> Result<(), Error> {
        if self.roles_assigned {
            return Err(Error::AlreadyAssigned);
        }
        if self.roster.len() < self.setup.player_count() {
            return Err(Error::RosterIncomplete);
        }

        let roles = self.setup.deal(&mut self.rng);
        for (player, role) in self.roster.iter_mut().zip(roles) {
            player.set_role(role);
        }
        self.roles_assigned = true;
        self.leader = 0;
        self.quest = Quest::new(1, self.setup.quest_sizes()[0]);
        info!(players = self.roster.len(), "roles dealt");
        self.enter(Phase::LeaderTurn);
        Ok(())
    }

    /// Name of the current leader, once roles are dealt
    pub fn get_current_leader(&self) -> Option<&str> {
        match self.phase {
            Phase::Setup => None,
            _ => self.roster.get(self.leader).map(Player::name),
        }
    }

    /// The leader proposes a team for the current quest
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` - not the leader's turn
    /// * `Error::NotLeader` - `leader` does not lead
    /// * `Error::InvalidTeamSize` - wrong number of members
    /// * `Error::InvalidMember` - unknown or repeated members
    pub fn propose_team(&mut self, leader: &str, members: &[impl AsRef<str>]) -> Result<(), Error> {
        self.expect_phase(Phase::LeaderTurn)?;
        if self.roster.find(leader) != Some(self.leader) {
            return Err(Error::NotLeader);
        }
        if members.len() != self.quest.required_players() {
            return Err(Error::InvalidTeamSize);
        }
        let team = members
            .iter()
            .map(|name| self.seat_of(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if !team.iter().all_unique() {
            return Err(Error::InvalidMember);
        }
        self.install_team(team);
        Ok(())
    }

    fn install_team(&mut self, team: Vec<usize>) {
        info!(
            quest = self.quest.number(),
            leader = self.roster.name(self.leader),
            team = ?self.roster.names(&team),
            "team proposed"
        );
        self.quest.set_team(self.leader, team);
        self.enter(Phase::TeamVote);
    }

    /// Records a vote on the proposed team
    ///
    /// Once every seated player voted, a strict majority of approvals sends
    /// the team on the quest. Otherwise leadership passes to the next seat.
    ///
    /// # Returns
    ///
    /// The running tally
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` - no team vote is running
    /// * `Error::InvalidMember` - the voter is not seated
    /// * `Error::AlreadyVoted` - the voter voted already
    pub fn cast_team_vote(&mut self, voter: &str, approve: bool) -> Result<Tally, Error> {
        self.expect_phase(Phase::TeamVote)?;
        let seat = self.seat_of(voter)?;
        let tally = self
            .quest
            .record_team_vote(seat, approve)
            .map_err(|_| Error::AlreadyVoted)?;
        debug!(voter, approve, "team vote cast");
        if self.quest.team_votes().len() == self.roster.len() {
            self.resolve_team_vote();
        }
        Ok(tally)
    }

    /// Closes the team vote; missing votes count as rejections
    fn resolve_team_vote(&mut self) {
        let tally = self.quest.team_votes().tally();
        if tally.is_majority_of(self.roster.len()) {
            info!(approve = tally.approve, reject = tally.reject, "team approved");
            self.enter(Phase::QuestVote);
            return;
        }

        self.quest.reject_team();
        self.leader = self.next_seat(self.leader);
        info!(
            approve = tally.approve,
            reject = tally.reject,
            rejected = self.quest.rejected_proposals(),
            next_leader = self.roster.name(self.leader),
            "team rejected"
        );
        if self
            .options
            .rejection_limit
            .is_some_and(|limit| self.quest.rejected_proposals() >= limit)
        {
            self.finish(Team::Evil);
        } else {
            self.enter(Phase::LeaderTurn);
        }
    }

    /// The proposing leader hands the quest's magic token to a member
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` - the quest is not running
    /// * `Error::NotLeader` - `leader` did not propose the team
    /// * `Error::InvalidMember` - the target is not seated
    /// * `Error::NotOnTeam` - the target is not a member
    /// * `Error::ResourceUnavailable` - the token was handed out already
    /// * `Error::AlreadySubmitted` - the target handed in a card already
    pub fn assign_magic_token(&mut self, leader: &str, member: &str) -> Result<(), Error> {
        self.expect_phase(Phase::QuestVote)?;
        match self.roster.find(leader) {
            Some(seat) if Some(seat) == self.quest.proposer() => {}
            _ => return Err(Error::NotLeader),
        }
        let seat = self.seat_of(member)?;
        if !self.quest.is_member(seat) {
            return Err(Error::NotOnTeam);
        }
        if self.quest.magic_target().is_some() {
            return Err(Error::ResourceUnavailable);
        }
        if self.quest.has_submitted(seat) {
            return Err(Error::AlreadySubmitted);
        }

        let Some(player) = self.roster.get_mut(seat) else {
            return Err(Error::InvalidMember);
        };
        player.grant_magic_token();
        self.quest.set_magic_target(seat);
        info!(quest = self.quest.number(), member, "magic token assigned");
        Ok(())
    }

    /// A team member hands in their quest card
    ///
    /// A member holding a magic token always spends it. Unless they are
    /// Morgan, the spent token turns their card into a success.
    ///
    /// # Returns
    ///
    /// The quest outcome when this was the last card
    ///
    /// # Errors
    ///
    /// * `Error::AlreadySubmitted` - the member handed in a card for this
    ///   quest, also after the quest completed
    /// * `Error::InvalidPhase` - no quest is running
    /// * `Error::InvalidMember` - the player is not seated
    /// * `Error::NotOnTeam` - the player is not a member
    /// * `Error::ResourceUnavailable` - magic requested without a token
    pub fn submit_quest_result(
        &mut self,
        player: &str,
        success: bool,
        use_magic: bool,
    ) -> Result<Option<Resolution>, Error> {
        let seat = self.seat_of(player)?;
        if self.phase != Phase::QuestVote {
            let submitted_last = self
                .history
                .last()
                .is_some_and(|record| record.team.iter().any(|name| name == player));
            let just_resolved = matches!(
                self.phase,
                Phase::SelectNextLeader | Phase::FinalQuest | Phase::GameOver
            );
            return Err(if submitted_last && just_resolved {
                Error::AlreadySubmitted
            } else {
                Error::InvalidPhase
            });
        }
        if !self.quest.is_member(seat) {
            return Err(Error::NotOnTeam);
        }
        if self.quest.has_submitted(seat) {
            return Err(Error::AlreadySubmitted);
        }
        if use_magic && self.roster.get(seat).map_or(0, Player::magic_tokens) == 0 {
            return Err(Error::ResourceUnavailable);
        }
        self.play_quest_card(seat, success)
    }

    fn play_quest_card(&mut self, seat: usize, success: bool) -> Result<Option<Resolution>, Error> {
        let Some(player) = self.roster.get_mut(seat) else {
            return Err(Error::InvalidMember);
        };
        let used_magic = player.use_magic_token();
        let success = match player.role() {
            Some(role) if used_magic && !role.ignores_magic() => true,
            _ => success,
        };
        if used_magic {
            debug!(seat, stored = success, "magic token spent");
        }

        let resolution = self.quest.submit(seat, Submission { success, used_magic })?;
        if let Some(resolution) = resolution {
            self.resolve_quest(resolution);
        }
        Ok(resolution)
    }

    fn resolve_quest(&mut self, resolution: Resolution) {
        let record = QuestRecord {
            number: self.quest.number(),
            leader: self
                .quest
                .proposer()
                .map(|seat| self.roster.name(seat).to_owned())
                .unwrap_or_default(),
            team: self.roster.names(self.quest.team()),
            success: resolution.success,
            fail_count: resolution.fail_count,
            used_magic: resolution.used_magic,
        };
        info!(
            quest = record.number,
            success = record.success,
            fail_count = record.fail_count,
            used_magic = record.used_magic,
            "quest resolved"
        );
        self.history.push(record);
        self.quest_results.push(resolution.success);
        if resolution.success {
            self.successful_quests += 1;
        } else {
            self.failed_quests += 1;
        }

        if self.failed_quests >= QUESTS_TO_WIN {
            self.finish(Team::Evil);
        } else if self.successful_quests >= QUESTS_TO_WIN {
            if self.options.final_quest {
                info!("final quest reached");
                self.final_quest = Some(FinalQuest::new(self.setup.final_quest_size()));
                self.enter(Phase::FinalQuest);
            } else {
                self.finish(Team::Good);
            }
        } else {
            let number = self.quest.number() + 1;
            match self.setup.quest_size(number) {
                Some(size) => {
                    self.quest = Quest::new(number, size);
                    self.enter(Phase::SelectNextLeader);
                }
                None if self.successful_quests > self.failed_quests => self.finish(Team::Good),
                None => self.finish(Team::Evil),
            }
        }
    }

    /// The outgoing leader names the next leader
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` - no succession is pending
    /// * `Error::NotLeader` - `leader` is not the outgoing leader
    /// * `Error::InvalidMember` - the nominee is not seated
    pub fn select_next_leader(&mut self, leader: &str, nominee: &str) -> Result<(), Error> {
        self.expect_phase(Phase::SelectNextLeader)?;
        if self.roster.find(leader) != Some(self.leader) {
            return Err(Error::NotLeader);
        }
        let seat = self.seat_of(nominee)?;
        self.install_leader(seat);
        Ok(())
    }

    fn install_leader(&mut self, seat: usize) {
        self.leader = seat;
        info!(
            quest = self.quest.number(),
            leader = self.roster.name(seat),
            "leader changed"
        );
        self.enter(Phase::LeaderTurn);
    }

    /// Opens the final quest leader nomination
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` - the final quest is not reached or started
    pub fn start_final_quest(&mut self) -> Result<(), Error> {
        self.expect_final_status(FinalQuestStatus::NotStarted)?;
        if let Some(final_quest) = self.final_quest.as_mut() {
            final_quest.start()?;
        }
        info!("final quest nomination opened");
        self.arm_timer(PhaseKind::FinalLeaderVote);
        Ok(())
    }

    /// A good player nominates the final quest leader
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` - no nomination is open
    /// * `Error::InvalidMember` - a named player is not seated
    /// * `Error::NotAuthorized` - the nominator is not good
    /// * `Error::AlreadyNominated` - a nomination is waiting for its vote
    pub fn nominate_final_leader(&mut self, nominator: &str, nominee: &str) -> Result<(), Error> {
        self.expect_final_status(FinalQuestStatus::SelectingLeader)?;
        let nominator_seat = self.seat_of(nominator)?;
        if !self
            .roster
            .get(nominator_seat)
            .is_some_and(|p| p.is_on(Team::Good))
        {
            return Err(Error::NotAuthorized);
        }
        let nominee_seat = self.seat_of(nominee)?;
        if let Some(final_quest) = self.final_quest.as_mut() {
            final_quest.nominate(nominee_seat)?;
        }
        info!(nominator, nominee, "final quest leader nominated");
        Ok(())
    }

    /// Records a vote on the final quest nominee
    ///
    /// # Returns
    ///
    /// The running tally
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` - no nomination is waiting for votes
    /// * `Error::InvalidMember` - the voter is not seated
    /// * `Error::AlreadyVoted` - the voter voted already
    pub fn vote_for_final_leader(&mut self, voter: &str, approve: bool) -> Result<Tally, Error> {
        self.expect_final_status(FinalQuestStatus::SelectingLeader)?;
        let seat = self.seat_of(voter)?;
        let electorate = self.roster.len();
        let Some(final_quest) = self.final_quest.as_mut() else {
            return Err(Error::InvalidPhase);
        };
        let (tally, outcome) = final_quest.vote(seat, approve, electorate)?;
        if let Some(outcome) = outcome {
            self.after_leader_vote(outcome);
        }
        Ok(tally)
    }

    fn after_leader_vote(&mut self, outcome: LeaderVote) {
        if outcome.approved {
            info!(approve = outcome.tally.approve, "final quest leader approved");
            self.arm_timer(PhaseKind::FinalQuest);
        } else {
            info!(approve = outcome.tally.approve, "final quest leader rejected");
            self.arm_timer(PhaseKind::FinalLeaderVote);
        }
    }

    /// The approved final quest leader adds a member
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` - the team is not being built
    /// * `Error::NotLeader` - `leader` is not the approved leader
    /// * `Error::InvalidMember` - the member is unknown or picked already
    /// * `Error::InvalidTeamSize` - the team is full
    pub fn assign_final_quest_member(&mut self, leader: &str, member: &str) -> Result<(), Error> {
        self.expect_final_status(FinalQuestStatus::SelectingTeam)?;
        let leader_seat = self.roster.find(leader).ok_or(Error::NotLeader)?;
        let member_seat = self.seat_of(member)?;
        let Some(final_quest) = self.final_quest.as_mut() else {
            return Err(Error::InvalidPhase);
        };
        final_quest.add_member(leader_seat, member_seat)?;
        let executing = final_quest.status() == FinalQuestStatus::Executing;
        debug!(leader, member, "final quest member added");
        if executing {
            info!("final quest team complete");
            self.arm_timer(PhaseKind::FinalQuest);
        }
        Ok(())
    }

    /// The approved final quest leader hands a member the magic token
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` - no final quest team exists yet
    /// * `Error::NotLeader` - `leader` is not the approved leader
    /// * `Error::InvalidMember` - the target is not seated
    /// * `Error::NotOnTeam` - the target is not a member
    /// * `Error::ResourceUnavailable` - the token was handed out already
    /// * `Error::AlreadySubmitted` - the target handed in a card already
    pub fn assign_final_magic_token(&mut self, leader: &str, member: &str) -> Result<(), Error> {
        self.expect_phase(Phase::FinalQuest)?;
        let leader_seat = self.roster.find(leader).ok_or(Error::NotLeader)?;
        let member_seat = self.seat_of(member)?;
        let Some(final_quest) = self.final_quest.as_mut() else {
            return Err(Error::InvalidPhase);
        };
        final_quest.give_magic_token(leader_seat, member_seat)?;
        if let Some(player) = self.roster.get_mut(member_seat) {
            player.grant_magic_token();
        }
        info!(member, "final quest magic token assigned");
        Ok(())
    }

    /// A final quest member hands in their card
    ///
    /// A member holding a magic token always spends it, and a single spent
    /// token makes the final quest succeed.
    ///
    /// # Returns
    ///
    /// The final quest outcome when this was the last card
    ///
    /// # Errors
    ///
    /// * `Error::AlreadySubmitted` - the member handed in a card already,
    ///   also after the final quest completed
    /// * `Error::InvalidPhase` - the final quest is not executing
    /// * `Error::InvalidMember` - the player is not seated
    /// * `Error::NotOnTeam` - the player is not a member
    /// * `Error::ResourceUnavailable` - magic requested without a token
    pub fn submit_final_quest_result(
        &mut self,
        player: &str,
        success: bool,
        use_magic: bool,
    ) -> Result<Option<bool>, Error> {
        let Some(final_quest) = &self.final_quest else {
            return Err(Error::InvalidPhase);
        };
        let seat = self.seat_of(player)?;
        match final_quest.status() {
            FinalQuestStatus::Executing => {}
            FinalQuestStatus::Completed if final_quest.team().contains(&seat) => {
                return Err(Error::AlreadySubmitted);
            }
            _ => return Err(Error::InvalidPhase),
        }
        if !final_quest.team().contains(&seat) {
            return Err(Error::NotOnTeam);
        }
        if final_quest.results().contains(seat) {
            return Err(Error::AlreadySubmitted);
        }
        if use_magic && self.roster.get(seat).map_or(0, Player::magic_tokens) == 0 {
            return Err(Error::ResourceUnavailable);
        }
        self.play_final_card(seat, success)
    }

    fn play_final_card(&mut self, seat: usize, success: bool) -> Result<Option<bool>, Error> {
        let used_magic = self.roster.get_mut(seat).is_some_and(Player::use_magic_token);
        if used_magic {
            debug!(seat, "magic token spent on the final quest");
        }
        let Some(final_quest) = self.final_quest.as_mut() else {
            return Err(Error::InvalidPhase);
        };
        let outcome = final_quest.submit(seat, Submission { success, used_magic })?;
        if let Some(outcome) = outcome {
            info!(success = outcome, "final quest resolved");
            self.quest_results.push(outcome);
            self.finish(if outcome { Team::Good } else { Team::Evil });
        }
        Ok(outcome)
    }

    /// Spends an amulet to learn the target's team
    ///
    /// The Shapeshifter always shows as good.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` - roles are not dealt or the match is over
    /// * `Error::InvalidMember` - unknown names or a self-check
    /// * `Error::ResourceUnavailable` - the user has no amulet left
    pub fn use_amulet(&mut self, user: &str, target: &str) -> Result<AmuletCheck, Error> {
        if matches!(self.phase, Phase::Setup | Phase::GameOver) {
            return Err(Error::InvalidPhase);
        }
        let user_seat = self.seat_of(user)?;
        let target_seat = self.seat_of(target)?;
        if user_seat == target_seat {
            return Err(Error::InvalidMember);
        }
        let Some(role) = self.roster.get(target_seat).and_then(Player::role) else {
            return Err(Error::InvalidPhase);
        };
        if !self.roster.get_mut(user_seat).is_some_and(Player::use_amulet) {
            return Err(Error::ResourceUnavailable);
        }
        if let Some(checked) = self.roster.get_mut(target_seat) {
            checked.add_revealer(user_seat);
        }

        let (revealed_team, is_true_team) = amulet::reveal(role);
        let check = AmuletCheck {
            checker: user.to_owned(),
            target: target.to_owned(),
            revealed_team,
            is_true_team,
            quest_number: self.quest_number(),
        };
        info!(user, target, quest = check.quest_number, "amulet used");
        self.amulets.record(check.clone());
        Ok(check)
    }

    /// Amulet checks the named player made or received
    pub fn amulet_history(&self, name: &str) -> Vec<AmuletCheck> {
        self.amulets.involving(name)
    }

    /// Handles a message from a seated player
    ///
    /// # Errors
    ///
    /// Whatever the dispatched operation returns.
    pub fn receive_message(
        &mut self,
        sender: &str,
        message: IncomingMessage,
    ) -> Result<Response, Error> {
        match message {
            IncomingMessage::Round(message) => match message {
                RoundMessage::ProposeTeam(members) => {
                    self.propose_team(sender, &members).map(|()| Response::Done)
                }
                RoundMessage::TeamVote(approve) => {
                    self.cast_team_vote(sender, approve).map(Response::Tally)
                }
                RoundMessage::QuestResult { success, use_magic } => self
                    .submit_quest_result(sender, success, use_magic)
                    .map(Response::Quest),
                RoundMessage::AssignMagicToken(member) => self
                    .assign_magic_token(sender, &member)
                    .map(|()| Response::Done),
                RoundMessage::SelectNextLeader(nominee) => self
                    .select_next_leader(sender, &nominee)
                    .map(|()| Response::Done),
            },
            IncomingMessage::FinalQuest(message) => match message {
                FinalQuestMessage::Start => self.start_final_quest().map(|()| Response::Done),
                FinalQuestMessage::Nominate(nominee) => self
                    .nominate_final_leader(sender, &nominee)
                    .map(|()| Response::Done),
                FinalQuestMessage::Vote(approve) => {
                    self.vote_for_final_leader(sender, approve).map(Response::Tally)
                }
                FinalQuestMessage::AssignMember(member) => self
                    .assign_final_quest_member(sender, &member)
                    .map(|()| Response::Done),
                FinalQuestMessage::AssignMagicToken(member) => self
                    .assign_final_magic_token(sender, &member)
                    .map(|()| Response::Done),
                FinalQuestMessage::Result { success, use_magic } => self
                    .submit_final_quest_result(sender, success, use_magic)
                    .map(Response::FinalQuest),
            },
            IncomingMessage::Item(ItemMessage::UseAmulet(target)) => {
                self.use_amulet(sender, &target).map(|check| Response::Amulet {
                    target: check.target,
                    team: check.revealed_team,
                })
            }
        }
    }

    /// Hands the pending alarm and its delay to the transport
    pub fn take_scheduled_alarm(&mut self) -> Option<(AlarmMessage, Duration)> {
        self.timer.take_scheduled()
    }

    /// Freezes the running deadline
    ///
    /// # Returns
    ///
    /// `false` if no deadline was running
    pub fn pause_timer(&mut self) -> bool {
        let paused = self.timer.pause();
        if paused {
            info!("timer paused");
        }
        paused
    }

    /// Continues a paused deadline
    ///
    /// # Returns
    ///
    /// `false` if the timer was not paused or is switched off
    pub fn resume_timer(&mut self) -> bool {
        let resumed = self.timer_enabled && self.timer.resume();
        if resumed {
            info!("timer resumed");
        }
        resumed
    }

    /// Switches the timer off or back on for the rest of the match
    ///
    /// While off, the running deadline is frozen and later phases arm
    /// none. Switching it on continues the frozen deadline, or starts a
    /// fresh one for the current phase.
    ///
    /// # Returns
    ///
    /// The timer status after the switch
    pub fn toggle_timer(&mut self) -> TimerStatus {
        if self.options.timer.is_none() {
            return self.timer.status();
        }
        self.timer_enabled = !self.timer_enabled;
        if self.timer_enabled {
            if !self.timer.resume() {
                if let Some(kind) = self.current_deadline() {
                    self.arm_timer(kind);
                }
            }
        } else {
            self.timer.pause();
        }
        let status = self.timer.status();
        info!(enabled = self.timer_enabled, ?status, "timer toggled");
        status
    }

    /// Whether the timer is switched on
    pub fn is_timer_enabled(&self) -> bool {
        self.options.timer.is_some() && self.timer_enabled
    }

    /// Handles an expired deadline by acting for the players who did not
    ///
    /// * leader turn: a random team is proposed
    /// * team vote: missing votes count as rejections
    /// * quest vote: good members succeed and evil members fail
    /// * next leader: leadership passes to the next seat
    /// * final quest: the step in progress is completed automatically
    ///
    /// # Returns
    ///
    /// `false` for stale alarms, which are ignored
    pub fn receive_alarm(&mut self, message: AlarmMessage) -> bool {
        let Some(kind) = self.timer.accept(message) else {
            debug!(?message, "stale alarm ignored");
            return false;
        };
        info!(?kind, phase = ?self.phase, "deadline expired");
        match (self.phase, kind) {
            (Phase::LeaderTurn, PhaseKind::LeaderTurn) => self.auto_propose_team(),
            (Phase::TeamVote, PhaseKind::TeamVote) => self.resolve_team_vote(),
            (Phase::QuestVote, PhaseKind::QuestVote) => self.auto_submit_quest(),
            (Phase::SelectNextLeader, PhaseKind::SelectNextLeader) => {
                self.install_leader(self.next_seat(self.leader));
            }
            (Phase::FinalQuest, PhaseKind::FinalLeaderVote | PhaseKind::FinalQuest) => {
                self.auto_advance_final_quest();
            }
            _ => return false,
        }
        true
    }

    fn shuffled_seats(&mut self, filter: impl Fn(usize, &Player) -> bool) -> Vec<usize> {
        let mut seats = self
            .roster
            .iter()
            .enumerate()
            .filter(|(seat, player)| filter(*seat, player))
            .map(|(seat, _)| seat)
            .collect_vec();
        self.rng.shuffle(&mut seats);
        seats
    }

    fn auto_propose_team(&mut self) {
        let mut team = self.shuffled_seats(|_, _| true);
        team.truncate(self.quest.required_players());
        team.sort_unstable();
        self.install_team(team);
    }

    fn auto_submit_quest(&mut self) {
        for seat in self.quest.pending_members() {
            let success = self.roster.get(seat).is_some_and(|p| p.is_on(Team::Good));
            if let Err(error) = self.play_quest_card(seat, success) {
                warn!(seat, %error, "automatic quest card refused");
            }
        }
    }

    fn auto_advance_final_quest(&mut self) {
        let Some(status) = self.final_quest.as_ref().map(FinalQuest::status) else {
            return;
        };
        match status {
            FinalQuestStatus::NotStarted => {
                if let Err(error) = self.start_final_quest() {
                    warn!(%error, "final quest could not be opened");
                }
            }
            FinalQuestStatus::SelectingLeader => {
                let electorate = self.roster.len();
                let nominated = self
                    .final_quest
                    .as_ref()
                    .is_some_and(|q| q.nominee().is_some());
                if nominated {
                    if let Some(final_quest) = self.final_quest.as_mut() {
                        let outcome = final_quest.resolve_leader_vote(electorate);
                        self.after_leader_vote(outcome);
                    }
                } else {
                    let candidates = self.shuffled_seats(|_, p| p.is_on(Team::Good));
                    let appointed = candidates.first().copied().and_then(|seat| {
                        self.final_quest
                            .as_mut()
                            .and_then(|q| q.appoint(seat).ok())
                            .map(|()| seat)
                    });
                    if let Some(seat) = appointed {
                        info!(leader = self.roster.name(seat), "final quest leader appointed");
                        self.arm_timer(PhaseKind::FinalQuest);
                    }
                }
            }
            FinalQuestStatus::SelectingTeam => {
                let Some((leader, picked, needed)) = self.final_quest.as_ref().map(|q| {
                    (
                        q.nominee().unwrap_or_default(),
                        q.team().to_vec(),
                        q.required_players() - q.team().len(),
                    )
                }) else {
                    return;
                };
                let mut candidates = self.shuffled_seats(|seat, _| !picked.contains(&seat));
                candidates.truncate(needed);
                if let Some(final_quest) = self.final_quest.as_mut() {
                    for seat in candidates {
                        if let Err(error) = final_quest.add_member(leader, seat) {
                            warn!(seat, %error, "automatic final quest member refused");
                        }
                    }
                }
                self.arm_timer(PhaseKind::FinalQuest);
            }
            FinalQuestStatus::Executing => {
                let pending = self
                    .final_quest
                    .as_ref()
                    .map(FinalQuest::pending_members)
                    .unwrap_or_default();
                for seat in pending {
                    let success = self.roster.get(seat).is_some_and(|p| p.is_on(Team::Good));
                    if let Err(error) = self.play_final_card(seat, success) {
                        warn!(seat, %error, "automatic final quest card refused");
                    }
                }
            }
            FinalQuestStatus::Completed => {}
        }
    }

    /// Snapshot of everything that may be broadcast
    ///
    /// Roles and teams stay hidden until the match is over.
    pub fn get_game_status(&self) -> GameStatus {
        let revealed = self.phase == Phase::GameOver;
        let leader = self.get_current_leader();
        GameStatus {
            phase: self.phase,
            quest_number: self.quest_number(),
            leader: leader.map(str::to_owned),
            players: self
                .roster
                .iter()
                .enumerate()
                .map(|(seat, player)| PublicPlayer {
                    name: player.name().to_owned(),
                    number: seat + 1,
                    is_leader: leader.is_some() && seat == self.leader,
                    magic_tokens: player.magic_tokens(),
                    amulets: player.amulets(),
                    role: player.role().filter(|_| revealed),
                    team: player.team().filter(|_| revealed),
                })
                .collect(),
            current_quest: QuestStatus {
                number: self.quest.number(),
                required_players: self.quest.required_players(),
                team: self.roster.names(self.quest.team()),
                voted: self
                    .roster
                    .names(&self.quest.team_votes().seats().collect_vec()),
                submitted: self.roster.names(&self.quest.submitted_seats()),
                rejected_proposals: self.quest.rejected_proposals(),
            },
            quest_results: self.quest_results.clone(),
            history: self.history.clone(),
            successful_quests: self.successful_quests,
            failed_quests: self.failed_quests,
            winner: self.winner,
            final_quest: self.get_final_quest_status(),
        }
    }

    /// Snapshot of the final quest, once reached
    pub fn get_final_quest_status(&self) -> Option<FinalQuestSnapshot> {
        self.final_quest.as_ref().map(|quest| FinalQuestSnapshot {
            status: quest.status(),
            required_players: quest.required_players(),
            leader: quest.nominee().map(|seat| self.roster.name(seat).to_owned()),
            voted: self.roster.names(&quest.votes().seats().collect_vec()),
            team: self.roster.names(quest.team()),
            magic_holder: quest
                .magic_target()
                .map(|seat| self.roster.name(seat).to_owned()),
            submitted: self.roster.names(&quest.results().seats().collect_vec()),
            outcome: quest.outcome(),
        })
    }

    /// Everything the named player may know, including their view of the table
    ///
    /// # Errors
    ///
    /// * `Error::InvalidMember` - nobody with that name is seated
    pub fn get_player_info(&self, name: &str) -> Result<PlayerInfo, Error> {
        let seat = self.seat_of(name)?;
        let player = self.roster.get(seat).ok_or(Error::InvalidMember)?;
        let role = player.role();
        let leader = self.get_current_leader().map(|_| self.leader);
        Ok(PlayerInfo {
            name: player.name().to_owned(),
            number: seat + 1,
            role,
            role_name: role.map(Role::name),
            role_description: role.map(Role::description),
            team: player.team(),
            magic_tokens: player.magic_tokens(),
            amulets: player.amulets(),
            table: visibility::visible_info(&self.roster, leader, seat),
        })
    }

    /// Snapshot of the phase timer, when the match runs one
    pub fn get_timer_status(&self) -> Option<TimerSnapshot> {
        self.options.timer.map(|_| self.timer.snapshot())
    }
}
