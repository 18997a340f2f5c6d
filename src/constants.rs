//! Configuration constants for the session engine
//!
//! This module contains the fixed durations, limits, and validation bounds
//! used throughout the engine.

/// Session-level limits and bounds
pub mod session {
    /// Minimum number of players required before a game may start
    pub const MIN_PLAYERS_TO_START: usize = 2;
    /// Maximum number of players allowed in a single session
    pub const MAX_PLAYER_COUNT: usize = 50;
    /// Minimum rounds played per category
    pub const MIN_ROUNDS_PER_CATEGORY: usize = 1;
    /// Maximum rounds played per category
    pub const MAX_ROUNDS_PER_CATEGORY: usize = 20;
    /// Default rounds played per category
    pub const DEFAULT_ROUNDS_PER_CATEGORY: usize = 5;
    /// Minimum time limit in seconds for voting on a round
    pub const MIN_ROUND_SECONDS: u32 = 5;
    /// Maximum time limit in seconds for voting on a round
    pub const MAX_ROUND_SECONDS: u32 = 240;
    /// Default time limit in seconds for voting on a round
    pub const DEFAULT_ROUND_SECONDS: u32 = 30;
}

/// Fixed countdown durations
pub mod countdown {
    /// Length in seconds of the category reveal countdown
    pub const REVEAL_SECONDS: u32 = 5;
    /// Length in seconds of the pause between rounds
    pub const INTER_ROUND_SECONDS: u32 = 5;
}

/// Category plan construction
pub mod plan {
    /// Number of categories sampled when no plan was built before start
    pub const AUTO_SAMPLE_COUNT: usize = 5;
}

/// Question generation
pub mod question {
    /// Number of answer options in a multiple-choice question
    pub const MULTIPLE_CHOICE_OPTIONS: usize = 4;
    /// Attempts against malformed upstream output before a generation
    /// failure becomes fatal to the round
    pub const GENERATION_RETRIES: usize = 3;
}
