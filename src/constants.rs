//! Protocol and display constants for the quiz bowl client
//!
//! This module contains the fixed limits and defaults used throughout the
//! client so that every component agrees on retention counts, display
//! truncation and timing.

/// Wire protocol constants
pub mod protocol {
    /// Seconds allotted to each revealed word, in milliseconds
    pub const SECONDS_PER_WORD_MS: u64 = 300;
    /// Length of the answer countdown shown once a buzz is granted, in seconds
    pub const ANSWER_WINDOW_SECS: u64 = 7;
    /// Resolution of the progress countdown, in milliseconds
    pub const TICK_MS: u64 = 1000;
}

/// Display truncation constants
pub mod display {
    /// Number of ranked guesses shown to the player
    pub const GUESS_DISPLAY_COUNT: usize = 5;
    /// Number of evidence matches shown to the player
    pub const MATCH_DISPLAY_COUNT: usize = 4;
    /// Maximum characters of a guess label shown in the guess table
    pub const GUESS_LABEL_CHARS: usize = 20;
}

/// History log constants
pub mod history {
    /// Number of completed questions retained for review
    pub const HISTORY_LENGTH: usize = 30;
    /// Upper bound accepted for a configured retention count
    pub const MAX_HISTORY_LENGTH: usize = 500;
}

/// Identity persistence constants
pub mod identity {
    /// Days a persisted identity value stays valid
    pub const IDENTITY_TTL_DAYS: u64 = 10;
    /// Maximum length of a player chosen name in characters
    pub const MAX_NAME_LENGTH: usize = 30;
    /// Storage key for the player name
    pub const NAME_KEY: &str = "player_name";
    /// Storage key for the server assigned player id
    pub const ID_KEY: &str = "player_id";
}

/// Bounds for validated configuration values
pub mod config {
    /// Minimum seconds per word, in milliseconds
    pub const MIN_SECONDS_PER_WORD_MS: u64 = 50;
    /// Maximum seconds per word, in milliseconds
    pub const MAX_SECONDS_PER_WORD_MS: u64 = 5000;
    /// Minimum answer window, in seconds
    pub const MIN_ANSWER_WINDOW_SECS: u64 = 1;
    /// Maximum answer window, in seconds
    pub const MAX_ANSWER_WINDOW_SECS: u64 = 60;
    /// Maximum number of displayed guesses or matches
    pub const MAX_DISPLAY_COUNT: usize = 20;
}
