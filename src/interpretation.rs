//! Interpretation aggregation
//!
//! The server pushes its inference about the active question piecemeal: a
//! ranked guess list, evidence matches (plain and highlighted) and a
//! highlighted rendering of the question text. Each category is replaced
//! wholesale by its latest update and categories update independently, so
//! a guess update never touches the matches and vice versa.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    DisplayList,
    constants::display::{GUESS_DISPLAY_COUNT, GUESS_LABEL_CHARS, MATCH_DISPLAY_COUNT},
};

/// A single ranked guess as sent on the wire: `[label, weight]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, f64)", into = "(String, f64)")]
pub struct Guess {
    /// Candidate answer
    pub label: String,
    /// Relative, non-negative score
    pub weight: f64,
}

impl From<(String, f64)> for Guess {
    fn from((label, weight): (String, f64)) -> Self {
        Self { label, weight }
    }
}

impl From<Guess> for (String, f64) {
    fn from(guess: Guess) -> Self {
        (guess.label, guess.weight)
    }
}

impl Guess {
    /// Creates a guess
    pub fn new(label: impl Into<String>, weight: f64) -> Self {
        Self {
            label: label.into(),
            weight,
        }
    }
}

/// A guess together with its share of the total weight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredGuess {
    /// Candidate answer
    pub label: String,
    /// Weight as sent by the server (negatives clamped to zero)
    pub weight: f64,
    /// `weight / Σweights`, or 0 when the weights sum to 0
    pub score: f64,
}

/// Ranked guesses for the current reveal position
#[derive(Debug, Clone, Default)]
pub struct Guesses {
    /// Guesses in server rank order, weights sanitized
    ranked: Vec<Guess>,
    /// Normalized projection, computed on first use
    scored: once_cell_serde::sync::OnceCell<Vec<ScoredGuess>>,
}

impl Guesses {
    /// Builds a guess list, clamping negative or non-finite weights to zero
    pub fn new(list: Vec<Guess>) -> Self {
        let ranked = list
            .into_iter()
            .map(|guess| {
                if guess.weight.is_finite() && guess.weight >= 0. {
                    guess
                } else {
                    tracing::debug!(label = %guess.label, weight = guess.weight, "clamping guess weight");
                    Guess { weight: 0., ..guess }
                }
            })
            .collect();
        Self {
            ranked,
            scored: once_cell_serde::sync::OnceCell::new(),
        }
    }

    /// Guesses in rank order
    pub fn ranked(&self) -> &[Guess] {
        &self.ranked
    }

    /// Guesses with normalized scores
    pub fn scored(&self) -> &[ScoredGuess] {
        self.scored.get_or_init(|| {
            let sum: f64 = self.ranked.iter().map(|guess| guess.weight).sum();
            self.ranked
                .iter()
                .map(|guess| ScoredGuess {
                    label: guess.label.clone(),
                    weight: guess.weight,
                    score: if sum > 0. { guess.weight / sum } else { 0. },
                })
                .collect_vec()
        })
    }

    /// Highest ranked guess, used to prefill an empty answer
    pub fn top(&self) -> Option<&Guess> {
        self.ranked.first()
    }

    /// Guesses shown to the player, labels cut to the table width
    pub fn display(&self, limit: usize) -> DisplayList<ScoredGuess> {
        DisplayList::truncate_from(self.scored().iter().cloned(), limit).map(|guess| ScoredGuess {
            label: guess.label.chars().take(GUESS_LABEL_CHARS).collect(),
            ..guess
        })
    }

    /// Whether there are no guesses
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

/// Evidence matches for the current reveal position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matches {
    plain: DisplayList<String>,
    highlighted: Option<DisplayList<String>>,
}

impl Matches {
    /// Builds a match set bounded to `limit` entries per variant
    pub fn new(plain: Vec<String>, highlighted: Option<Vec<String>>, limit: usize) -> Self {
        Self {
            plain: DisplayList::truncate_from(plain, limit),
            highlighted: highlighted.map(|list| DisplayList::truncate_from(list, limit)),
        }
    }

    /// Plain matches
    pub fn plain(&self) -> &DisplayList<String> {
        &self.plain
    }

    /// Highlighted matches, falling back to the plain ones when the server
    /// sent no highlighted variant
    pub fn highlighted(&self) -> &DisplayList<String> {
        self.highlighted.as_ref().unwrap_or(&self.plain)
    }
}

/// The latest server interpretation of the active question
#[derive(Debug, Clone)]
pub struct Interpretation {
    guesses: Guesses,
    matches: Matches,
    text_highlighted: Option<String>,
    autopilot: bool,
    guess_limit: usize,
    match_limit: usize,
}

impl Default for Interpretation {
    fn default() -> Self {
        Self::with_limits(GUESS_DISPLAY_COUNT, MATCH_DISPLAY_COUNT)
    }
}

impl Interpretation {
    /// Creates an empty interpretation with the given display limits
    pub fn with_limits(guess_limit: usize, match_limit: usize) -> Self {
        Self {
            guesses: Guesses::default(),
            matches: Matches::default(),
            text_highlighted: None,
            autopilot: false,
            guess_limit,
            match_limit,
        }
    }

    /// Forgets everything, keeping the display limits
    pub fn clear(&mut self) {
        *self = Self::with_limits(self.guess_limit, self.match_limit);
    }

    /// Replaces the guess ranking
    pub fn apply_guesses(&mut self, list: Vec<Guess>) {
        self.guesses = Guesses::new(list);
    }

    /// Replaces the evidence set; entries past the display limit are dropped
    pub fn apply_matches(&mut self, list: Vec<String>, highlighted: Option<Vec<String>>) {
        self.matches = Matches::new(list, highlighted, self.match_limit);
    }

    /// Replaces the server's highlighted rendering of the question text
    pub fn apply_text_highlighted(&mut self, text: String) {
        self.text_highlighted = Some(text);
    }

    /// Records whether the server's model would buzz at this position
    pub fn apply_autopilot(&mut self, prediction: bool) {
        self.autopilot = prediction;
    }

    /// Current guesses
    pub fn guesses(&self) -> &Guesses {
        &self.guesses
    }

    /// Current guesses, cut to the display limit
    pub fn displayed_guesses(&self) -> DisplayList<ScoredGuess> {
        self.guesses.display(self.guess_limit)
    }

    /// Current matches
    pub fn matches(&self) -> &Matches {
        &self.matches
    }

    /// Highest ranked guess
    pub fn top_guess(&self) -> Option<&Guess> {
        self.guesses.top()
    }

    /// The server's highlighted question text, if any was sent
    pub fn text_highlighted(&self) -> Option<&str> {
        self.text_highlighted.as_deref()
    }

    /// Whether the server's model would buzz
    pub fn autopilot(&self) -> bool {
        self.autopilot
    }
}
