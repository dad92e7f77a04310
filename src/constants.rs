//! Configuration constants for the Avalon rules engine
//!
//! This module contains the limits and fixed numbers used throughout the
//! engine so that table lookups, validation and win checks agree on the
//! same boundaries.

/// Seating limits for a single match
pub mod seats {
    /// Smallest supported table
    pub const MIN_PLAYER_COUNT: usize = 4;
    /// Largest supported table
    pub const MAX_PLAYER_COUNT: usize = 10;
}

/// Quest progression constants
pub mod quests {
    /// Number of ordinary quests in a match
    pub const QUEST_COUNT: usize = 5;
    /// Successes (or failures) needed to decide the match
    pub const QUESTS_TO_WIN: usize = 3;
}

/// Player name constants
pub mod names {
    /// Maximum length of a player name in bytes
    pub const MAX_LENGTH: usize = 30;
}

/// Consumable item constants
pub mod items {
    /// Amulets every player starts with unless configured otherwise
    pub const DEFAULT_STARTING_AMULETS: usize = 1;
    /// Upper bound for the configurable starting amulets
    pub const MAX_STARTING_AMULETS: usize = 3;
}

/// Team vote constants
pub mod votes {
    /// Smallest accepted consecutive-rejection limit
    pub const MIN_REJECTION_LIMIT: usize = 3;
    /// Largest accepted consecutive-rejection limit
    pub const MAX_REJECTION_LIMIT: usize = 10;
}

/// Phase timer constants, in seconds
pub mod timer {
    /// Shortest configurable phase deadline
    pub const MIN_PHASE_SECONDS: u64 = 5;
    /// Longest configurable phase deadline
    pub const MAX_PHASE_SECONDS: u64 = 600;
    /// Default deadline for the leader to propose a team
    pub const LEADER_TURN_SECONDS: u64 = 120;
    /// Default deadline for the team vote
    pub const TEAM_VOTE_SECONDS: u64 = 60;
    /// Default deadline for quest execution
    pub const QUEST_VOTE_SECONDS: u64 = 30;
    /// Default deadline for choosing the next leader
    pub const SELECT_NEXT_LEADER_SECONDS: u64 = 60;
    /// Default deadline for the final quest leader vote
    pub const FINAL_LEADER_VOTE_SECONDS: u64 = 90;
    /// Default deadline for final quest team building and execution
    pub const FINAL_QUEST_SECONDS: u64 = 45;
}

/// Match code constants
pub mod game_id {
    /// Smallest generated match code
    pub const MIN_VALUE: u16 = 1000;
    /// Largest generated match code (inclusive)
    pub const MAX_VALUE: u16 = 9999;
}
