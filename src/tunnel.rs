//! Collaborator interfaces
//!
//! The session talks to the outside world only through these traits: the
//! socket it writes frames to, the presenter that renders state, the speech
//! engine and the persistent identity store. Hosts implement them over
//! whatever transport and UI they use.

use thiserror::Error;
use web_time::Duration;

use crate::{
    DisplayList,
    arbiter::BuzzState,
    codec::Verdict,
    history::HistoryLog,
    interpretation::ScoredGuess,
    roster::Roster,
};

/// Transport failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The socket is closed; nothing more can be sent
    #[error("tunnel closed")]
    Closed,
}

/// Outbound half of the socket owned by the session
///
/// The session is the only writer; every frame it produces goes through
/// [`Tunnel::send`].
pub trait Tunnel {
    /// Sends one encoded frame
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] once the underlying socket is gone.
    fn send(&self, frame: &str) -> Result<(), Error>;

    /// Closes the socket
    fn close(self);
}

/// Rendering collaborator
pub trait Presenter {
    /// Shows the question text and the commentary under it
    fn show_question(&self, plain: &str, highlighted: &str, info: &str);

    /// Shows the ranked guesses and whether the server's model would buzz
    fn show_guesses(&self, guesses: &DisplayList<ScoredGuess>, autopilot: bool);

    /// Shows the evidence matches
    fn show_matches(&self, matches: &DisplayList<String>);

    /// Shows the countdown
    ///
    /// # Arguments
    ///
    /// * `percentage` - Remaining share of the countdown, in `[0, 100]`
    /// * `label` - Whole seconds remaining
    /// * `urgent` - Whether the countdown belongs to an open buzz window
    fn show_timer(&self, percentage: f64, label: u64, urgent: bool);

    /// Updates the buzz affordance and answer input for `state`
    fn show_buzz_state(&self, state: BuzzState);

    /// Puts `text` into the answer input
    fn prefill_answer(&self, text: &str);

    /// Shows the outcome of an answer; `own` is set for this player's answers
    fn show_verdict(&self, verdict: &Verdict, own: bool);

    /// Shows the review log
    fn show_history(&self, history: &HistoryLog);

    /// Shows the roster and this player's running score
    fn show_roster(&self, roster: &Roster, score: i64);

    /// Tells the player the round is over
    fn show_round_complete(&self);
}

/// Speech synthesis collaborator
pub trait Speech {
    /// Speaks `text`, replacing anything queued
    fn speak(&self, text: &str);

    /// Stops speaking and drops the queue
    fn cancel(&self);

    /// Pauses speaking
    fn pause(&self);

    /// Resumes paused speech
    fn resume(&self);
}

/// Persistent key-value store for the player identity (a cookie jar in a
/// browser)
pub trait IdentityStore {
    /// Value stored under `key`, if any
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key` for `ttl`
    fn set(&self, key: &str, value: &str, ttl: Duration);
}
