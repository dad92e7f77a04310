//! Per-phase deadlines
//!
//! The timer never runs anything on its own. Arming it queues an
//! [`AlarmMessage`] together with a delay; the transport schedules the
//! message and later hands it back to [`crate::game::Game::receive_alarm`].
//! Every re-arm bumps a generation stamp, so an alarm scheduled for an
//! earlier phase is recognised as stale and ignored.

use enum_map::Enum;
use serde::{Deserialize, Serialize};
use web_time::{Duration, SystemTime};

/// The kind of deadline currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum, Serialize, Deserialize)]
pub enum PhaseKind {
    /// The leader has to propose a team
    LeaderTurn,
    /// Everyone votes on the proposed team
    TeamVote,
    /// Team members hand in their cards
    QuestVote,
    /// The outgoing leader picks a successor
    SelectNextLeader,
    /// Nomination of and vote on the final quest leader
    FinalLeaderVote,
    /// Final quest team building and execution
    FinalQuest,
}

/// Timer expiry delivered back to the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// The deadline armed with this generation has run out
    PhaseExpired {
        /// Generation the alarm was armed with
        stamp: u64,
    },
}

/// Lifecycle of the phase timer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerStatus {
    /// No deadline is armed
    #[default]
    Idle,
    /// A deadline is counting down
    Running,
    /// The countdown is frozen with time left
    Paused,
    /// The deadline has passed and was handled
    Expired,
}

/// Serializable view of the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    /// Deadline kind, if one was ever armed for the current phase
    pub phase: Option<PhaseKind>,
    /// Current lifecycle state
    pub status: TimerStatus,
    /// Full length of the deadline in milliseconds
    pub duration_ms: u64,
    /// Time left in milliseconds
    pub remaining_ms: u64,
}

/// Deadline bookkeeping for a single match
#[derive(Debug, Clone, Default)]
pub struct PhaseTimer {
    stamp: u64,
    phase: Option<PhaseKind>,
    status: TimerStatus,
    duration: Duration,
    /// Time left when the countdown was last started or frozen
    budget: Duration,
    started_at: Option<SystemTime>,
    scheduled: Option<(AlarmMessage, Duration)>,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl PhaseTimer {
    /// Current generation
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Current lifecycle state
    pub fn status(&self) -> TimerStatus {
        self.status
    }

    /// Deadline kind of the current phase
    pub fn phase(&self) -> Option<PhaseKind> {
        self.phase
    }

    fn schedule(&mut self) {
        self.stamp += 1;
        self.started_at = Some(SystemTime::now());
        self.status = TimerStatus::Running;
        self.scheduled = Some((AlarmMessage::PhaseExpired { stamp: self.stamp }, self.budget));
    }

    /// Starts a fresh deadline, invalidating any earlier alarm
    pub fn arm(&mut self, phase: PhaseKind, duration: Duration) {
        self.phase = Some(phase);
        self.duration = duration;
        self.budget = duration;
        self.schedule();
    }

    /// Stops counting and invalidates any earlier alarm
    pub fn disarm(&mut self) {
        self.stamp += 1;
        self.phase = None;
        self.status = TimerStatus::Idle;
        self.duration = Duration::ZERO;
        self.budget = Duration::ZERO;
        self.started_at = None;
        self.scheduled = None;
    }

    /// Time left before expiry
    pub fn remaining(&self) -> Duration {
        match self.status {
            TimerStatus::Running => {
                let elapsed = self
                    .started_at
                    .and_then(|t| t.elapsed().ok())
                    .unwrap_or_default();
                self.budget.saturating_sub(elapsed)
            }
            TimerStatus::Paused => self.budget,
            TimerStatus::Idle | TimerStatus::Expired => Duration::ZERO,
        }
    }

    /// Freezes a running countdown
    ///
    /// # Returns
    ///
    /// `false` if nothing was running
    pub fn pause(&mut self) -> bool {
        if self.status != TimerStatus::Running {
            return false;
        }
        self.budget = self.remaining();
        self.stamp += 1;
        self.started_at = None;
        self.scheduled = None;
        self.status = TimerStatus::Paused;
        true
    }

    /// Continues a paused countdown with the time it had left
    ///
    /// # Returns
    ///
    /// `false` if the timer was not paused
    pub fn resume(&mut self) -> bool {
        if self.status != TimerStatus::Paused {
            return false;
        }
        self.schedule();
        true
    }

    /// Hands the pending alarm and its delay to the transport
    pub fn take_scheduled(&mut self) -> Option<(AlarmMessage, Duration)> {
        self.scheduled.take()
    }

    /// Consumes an alarm if it belongs to the running deadline
    ///
    /// # Returns
    ///
    /// The expired deadline kind, or `None` for stale alarms
    pub fn accept(&mut self, alarm: AlarmMessage) -> Option<PhaseKind> {
        let AlarmMessage::PhaseExpired { stamp } = alarm;
        if stamp != self.stamp || self.status != TimerStatus::Running {
            return None;
        }
        self.status = TimerStatus::Expired;
        self.budget = Duration::ZERO;
        self.scheduled = None;
        self.phase
    }

    /// Serializable view of the timer
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase,
            status: self.status,
            duration_ms: millis(self.duration),
            remaining_ms: millis(self.remaining()),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_arm_schedules_alarm() {
        let mut timer = PhaseTimer::default();
        timer.arm(PhaseKind::TeamVote, Duration::from_secs(60));

        let (alarm, delay) = timer.take_scheduled().unwrap();
        assert_eq!(alarm, AlarmMessage::PhaseExpired { stamp: timer.stamp() });
        assert_eq!(delay, Duration::from_secs(60));
        assert!(timer.take_scheduled().is_none());
        assert_eq!(timer.status(), TimerStatus::Running);
        assert!(timer.remaining() <= Duration::from_secs(60));
    }

    #[test]
    fn test_current_alarm_expires() {
        let mut timer = PhaseTimer::default();
        timer.arm(PhaseKind::LeaderTurn, Duration::from_secs(120));
        let (alarm, _) = timer.take_scheduled().unwrap();

        assert_eq!(timer.accept(alarm), Some(PhaseKind::LeaderTurn));
        assert_eq!(timer.status(), TimerStatus::Expired);
        assert_eq!(timer.remaining(), Duration::ZERO);

        // Delivered twice, handled once
        assert_eq!(timer.accept(alarm), None);
    }

    #[test]
    fn test_rearm_makes_alarm_stale() {
        let mut timer = PhaseTimer::default();
        timer.arm(PhaseKind::LeaderTurn, Duration::from_secs(120));
        let (old, _) = timer.take_scheduled().unwrap();
        timer.arm(PhaseKind::TeamVote, Duration::from_secs(60));
        let (new, _) = timer.take_scheduled().unwrap();

        assert_ne!(old, new);
        assert_eq!(timer.accept(old), None);
        assert_eq!(timer.status(), TimerStatus::Running);
        assert_eq!(timer.accept(new), Some(PhaseKind::TeamVote));
    }

    #[test]
    fn test_pause_and_resume() {
        let mut timer = PhaseTimer::default();
        timer.arm(PhaseKind::QuestVote, Duration::from_secs(30));
        let (before_pause, _) = timer.take_scheduled().unwrap();

        assert!(timer.pause());
        assert!(!timer.pause());
        assert_eq!(timer.status(), TimerStatus::Paused);
        assert!(timer.take_scheduled().is_none());
        assert_eq!(timer.accept(before_pause), None);

        let frozen = timer.remaining();
        assert!(frozen <= Duration::from_secs(30));

        assert!(timer.resume());
        assert!(!timer.resume());
        let (after_resume, delay) = timer.take_scheduled().unwrap();
        assert_eq!(delay, frozen);
        assert_eq!(timer.accept(after_resume), Some(PhaseKind::QuestVote));
    }

    #[test]
    fn test_disarm() {
        let mut timer = PhaseTimer::default();
        timer.arm(PhaseKind::SelectNextLeader, Duration::from_secs(60));
        let (alarm, _) = timer.take_scheduled().unwrap();
        timer.disarm();

        assert_eq!(timer.accept(alarm), None);
        assert_eq!(timer.phase(), None);
        assert_eq!(
            timer.snapshot(),
            TimerSnapshot {
                phase: None,
                status: TimerStatus::Idle,
                duration_ms: 0,
                remaining_ms: 0,
            }
        );
    }
}
