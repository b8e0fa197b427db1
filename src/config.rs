//! Session configuration
//!
//! Runtime options a host may override, typically loaded from a JSON
//! document shipped alongside the client. Every field has a default drawn
//! from [`crate::constants`], and [`garde`] bounds the values a host can set.

use garde::Validate;
use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::{
    assembler::Emphasis,
    codec::Assists,
    constants::{
        config::{
            MAX_ANSWER_WINDOW_SECS, MAX_DISPLAY_COUNT, MAX_SECONDS_PER_WORD_MS,
            MIN_ANSWER_WINDOW_SECS, MIN_SECONDS_PER_WORD_MS,
        },
        display::{GUESS_DISPLAY_COUNT, MATCH_DISPLAY_COUNT},
        history::{HISTORY_LENGTH, MAX_HISTORY_LENGTH},
        protocol::{ANSWER_WINDOW_SECS, SECONDS_PER_WORD_MS},
    },
};

type ValidationResult = garde::Result;

/// Validates that a duration lies within `[MIN_MILLIS, MAX_MILLIS]`
fn validate_duration<const MIN_MILLIS: u64, const MAX_MILLIS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    let millis = u64::try_from(val.as_millis()).unwrap_or(u64::MAX);
    if (MIN_MILLIS..=MAX_MILLIS).contains(&millis) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_MILLIS}ms,{MAX_MILLIS}ms]",
        )))
    }
}

fn validate_seconds_per_word(val: &Duration) -> ValidationResult {
    validate_duration::<MIN_SECONDS_PER_WORD_MS, MAX_SECONDS_PER_WORD_MS>("seconds_per_word", val)
}

fn validate_answer_window(val: &Duration) -> ValidationResult {
    validate_duration::<{ MIN_ANSWER_WINDOW_SECS * 1000 }, { MAX_ANSWER_WINDOW_SECS * 1000 }>(
        "answer_window",
        val,
    )
}

/// Options for a [`crate::session::Session`]
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Countdown time allotted to each word of a question
    #[garde(custom(|v, _| validate_seconds_per_word(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub seconds_per_word: Duration,
    /// Countdown shown once the buzz window is granted
    #[garde(custom(|v, _| validate_answer_window(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub answer_window: Duration,
    /// Completed questions kept for review
    #[garde(range(max = MAX_HISTORY_LENGTH))]
    pub history_length: usize,
    /// Ranked guesses shown to the player
    #[garde(range(min = 1, max = MAX_DISPLAY_COUNT))]
    pub guess_display_count: usize,
    /// Evidence matches shown to the player
    #[garde(range(min = 1, max = MAX_DISPLAY_COUNT))]
    pub match_display_count: usize,
    /// Assists enabled until the server says otherwise
    #[garde(skip)]
    pub assists: Assists,
    /// Markup wrapped around emphasized question fragments
    #[garde(skip)]
    pub emphasis: Emphasis,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seconds_per_word: Duration::from_millis(SECONDS_PER_WORD_MS),
            answer_window: Duration::from_secs(ANSWER_WINDOW_SECS),
            history_length: HISTORY_LENGTH,
            guess_display_count: GUESS_DISPLAY_COUNT,
            match_display_count: MATCH_DISPLAY_COUNT,
            assists: Assists::default(),
            emphasis: Emphasis::default(),
        }
    }
}
