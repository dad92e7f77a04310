//! Match options
//!
//! Options are chosen by whoever creates the match and are validated with
//! `garde` before the match exists. Durations travel as milliseconds.

use garde::Validate;
use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::{
    constants::{
        items::{DEFAULT_STARTING_AMULETS, MAX_STARTING_AMULETS},
        timer::{
            FINAL_LEADER_VOTE_SECONDS, FINAL_QUEST_SECONDS, LEADER_TURN_SECONDS, MAX_PHASE_SECONDS,
            MIN_PHASE_SECONDS, QUEST_VOTE_SECONDS, SELECT_NEXT_LEADER_SECONDS, TEAM_VOTE_SECONDS,
        },
        votes::{MAX_REJECTION_LIMIT, MIN_REJECTION_LIMIT},
    },
    timer::PhaseKind,
};

/// Validation result type for duration validation
type ValidationResult = garde::Result;

/// Validates that a duration falls within specified bounds.
///
/// # Generics
///
/// * `MIN_SECONDS` - The minimum allowed duration in seconds (inclusive).
/// * `MAX_SECONDS` - The maximum allowed duration in seconds (inclusive).
///
/// # Errors
///
/// Returns a `garde::Error` if the duration is outside the specified bounds.
fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    val: &Duration,
    _ctx: &(),
) -> ValidationResult {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "outside of bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Deadlines for every timed phase
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TimerOptions {
    /// Time the leader has to propose a team
    #[garde(custom(validate_duration::<MIN_PHASE_SECONDS, MAX_PHASE_SECONDS>))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub leader_turn: Duration,
    /// Time everyone has to vote on a team
    #[garde(custom(validate_duration::<MIN_PHASE_SECONDS, MAX_PHASE_SECONDS>))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub team_vote: Duration,
    /// Time the team has to hand in its cards
    #[garde(custom(validate_duration::<MIN_PHASE_SECONDS, MAX_PHASE_SECONDS>))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub quest_vote: Duration,
    /// Time the outgoing leader has to pick a successor
    #[garde(custom(validate_duration::<MIN_PHASE_SECONDS, MAX_PHASE_SECONDS>))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub select_next_leader: Duration,
    /// Time for the final quest nomination and vote
    #[garde(custom(validate_duration::<MIN_PHASE_SECONDS, MAX_PHASE_SECONDS>))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub final_leader_vote: Duration,
    /// Time for final quest team building and execution
    #[garde(custom(validate_duration::<MIN_PHASE_SECONDS, MAX_PHASE_SECONDS>))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub final_quest: Duration,
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self {
            leader_turn: Duration::from_secs(LEADER_TURN_SECONDS),
            team_vote: Duration::from_secs(TEAM_VOTE_SECONDS),
            quest_vote: Duration::from_secs(QUEST_VOTE_SECONDS),
            select_next_leader: Duration::from_secs(SELECT_NEXT_LEADER_SECONDS),
            final_leader_vote: Duration::from_secs(FINAL_LEADER_VOTE_SECONDS),
            final_quest: Duration::from_secs(FINAL_QUEST_SECONDS),
        }
    }
}

impl TimerOptions {
    /// The deadline configured for a phase kind
    pub fn duration(&self, phase: PhaseKind) -> Duration {
        match phase {
            PhaseKind::LeaderTurn => self.leader_turn,
            PhaseKind::TeamVote => self.team_vote,
            PhaseKind::QuestVote => self.quest_vote,
            PhaseKind::SelectNextLeader => self.select_next_leader,
            PhaseKind::FinalLeaderVote => self.final_leader_vote,
            PhaseKind::FinalQuest => self.final_quest,
        }
    }
}

fn default_starting_amulets() -> usize {
    DEFAULT_STARTING_AMULETS
}

/// Settings of a single match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Options {
    /// Whether the third success leads into the final quest
    #[garde(skip)]
    #[serde(default)]
    pub final_quest: bool,
    /// Consecutive rejected teams in one round that hand EVIL the win
    #[garde(range(min = MIN_REJECTION_LIMIT, max = MAX_REJECTION_LIMIT))]
    #[serde(default)]
    pub rejection_limit: Option<usize>,
    /// Amulets every player starts with
    #[garde(range(max = MAX_STARTING_AMULETS))]
    #[serde(default = "default_starting_amulets")]
    pub starting_amulets: usize,
    /// Per-phase deadlines; no timer runs when absent
    #[garde(dive)]
    #[serde(default)]
    pub timer: Option<TimerOptions>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            final_quest: false,
            rejection_limit: None,
            starting_amulets: DEFAULT_STARTING_AMULETS,
            timer: None,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Options::default().validate().is_ok());
        let options = Options {
            timer: Some(TimerOptions::default()),
            ..Options::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_default_durations() {
        let timer = TimerOptions::default();
        assert_eq!(timer.duration(PhaseKind::LeaderTurn), Duration::from_secs(120));
        assert_eq!(timer.duration(PhaseKind::TeamVote), Duration::from_secs(60));
        assert_eq!(timer.duration(PhaseKind::QuestVote), Duration::from_secs(30));
        assert_eq!(timer.duration(PhaseKind::SelectNextLeader), Duration::from_secs(60));
        assert_eq!(timer.duration(PhaseKind::FinalLeaderVote), Duration::from_secs(90));
        assert_eq!(timer.duration(PhaseKind::FinalQuest), Duration::from_secs(45));
    }

    #[test]
    fn test_duration_bounds() {
        assert!(validate_duration::<5, 600>(&Duration::from_secs(5), &()).is_ok());
        assert!(validate_duration::<5, 600>(&Duration::from_secs(600), &()).is_ok());
        assert!(validate_duration::<5, 600>(&Duration::from_secs(4), &()).is_err());
        assert!(validate_duration::<5, 600>(&Duration::from_secs(601), &()).is_err());

        let options = Options {
            timer: Some(TimerOptions {
                quest_vote: Duration::from_secs(1),
                ..TimerOptions::default()
            }),
            ..Options::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_rejection_limit_bounds() {
        for (limit, valid) in [(2, false), (3, true), (10, true), (11, false)] {
            let options = Options {
                rejection_limit: Some(limit),
                ..Options::default()
            };
            assert_eq!(options.validate().is_ok(), valid, "limit {limit}");
        }
    }

    #[test]
    fn test_starting_amulets_bound() {
        let options = Options {
            starting_amulets: 4,
            ..Options::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let options: Options = serde_json::from_str(
            r#"{"final_quest":true,"timer":{"team_vote":15000}}"#,
        )
        .unwrap();
        assert!(options.final_quest);
        assert_eq!(options.starting_amulets, DEFAULT_STARTING_AMULETS);
        assert_eq!(options.rejection_limit, None);

        let timer = options.timer.unwrap();
        assert_eq!(timer.team_vote, Duration::from_secs(15));
        assert_eq!(timer.leader_turn, Duration::from_secs(120));
    }

    #[test]
    fn test_serialize_milliseconds() {
        let json = serde_json::to_value(TimerOptions::default()).unwrap();
        assert_eq!(json["quest_vote"], 30_000);
    }
}
