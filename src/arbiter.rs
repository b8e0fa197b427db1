//! Buzz arbitration
//!
//! The arbiter is the client half of the protocol that decides who may
//! answer. It records local buzz intent, mirrors the server's grant or
//! denial of the buzz window, and only lets an answer out while the window
//! is open. The server remains the authority: the client never assumes it
//! holds the window until told so, and a decision that does not match the
//! client's own state is dropped as stale.
//!
//! ```text
//!            NEW                 buzz                GRANTED
//!   any ───────────► Watching ─────────► IntentPending ───────► Answering
//!                       ▲  │                   │                    │
//!        can_buzz=true  │  │ can_buzz=false    │ DENIED             │ answer
//!                       │  ▼                   ▼                    ▼
//!                     LockedOut ◄──────────────┴────────────────────┘
//! ```
//!
//! END moves any state to `Idle` until the next NEW.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{Assists, BuzzAnswer, BuzzRequest, Message, Qid, Resume, Reveal};

/// The five states of a session's buzz lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuzzState {
    /// No active question
    #[default]
    Idle,
    /// Question active, window closed, no local intent
    Watching,
    /// Buzz requested, awaiting the server's decision
    IntentPending,
    /// Window granted, an answer may be submitted
    Answering,
    /// Denied, answered, or told not to buzz; waits for a re-open or the next question
    LockedOut,
}

/// A message that is valid but does not apply to the arbiter's state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// No question is active
    #[error("no active question")]
    NoActiveQuestion,
    /// The message refers to a question that is no longer active
    #[error("message for question {received} while {active} is active")]
    StaleQuestion {
        /// Question the arbiter is tracking
        active: Qid,
        /// Question the message referred to
        received: Qid,
    },
    /// A buzz was requested outside of [`BuzzState::Watching`]
    #[error("cannot buzz while {0:?}")]
    NotWatching(BuzzState),
    /// A decision arrived without a pending request
    #[error("no pending buzz request while {0:?}")]
    NoPendingIntent(BuzzState),
    /// An answer was submitted without an open window
    #[error("buzz window not open while {0:?}")]
    NotAnswering(BuzzState),
}

/// Client-side buzz state machine for one session
#[derive(Debug, Clone, Default)]
pub struct Arbiter {
    state: BuzzState,
    qid: Option<Qid>,
}

impl Arbiter {
    /// Current state
    pub fn state(&self) -> BuzzState {
        self.state
    }

    /// Question the arbiter is tracking
    pub fn qid(&self) -> Option<&Qid> {
        self.qid.as_ref()
    }

    /// Whether the buzz affordance should be offered
    pub fn can_buzz(&self) -> bool {
        self.state == BuzzState::Watching
    }

    fn transition(&mut self, to: BuzzState) {
        tracing::debug!(from = ?self.state, ?to, "buzz transition");
        self.state = to;
    }

    fn check_active(&self, qid: &Qid) -> Result<(), Conflict> {
        match &self.qid {
            _ if self.state == BuzzState::Idle => Err(Conflict::NoActiveQuestion),
            None => Err(Conflict::NoActiveQuestion),
            Some(active) if active != qid => Err(Conflict::StaleQuestion {
                active: active.clone(),
                received: qid.clone(),
            }),
            Some(_) => Ok(()),
        }
    }

    /// Hard reset for a new question: any intent or window is discarded
    ///
    /// Returns the state that was left.
    pub fn on_new(&mut self, qid: Qid) -> BuzzState {
        let previous = self.state;
        self.qid = Some(qid);
        self.transition(BuzzState::Watching);
        previous
    }

    /// The question ended; nothing can be buzzed until the next NEW
    ///
    /// # Errors
    ///
    /// Returns a [`Conflict`] if `qid` is not the active question.
    pub fn on_end(&mut self, qid: &Qid) -> Result<(), Conflict> {
        self.check_active(qid)?;
        self.transition(BuzzState::Idle);
        Ok(())
    }

    /// Local request to buzz at the current reveal `position`
    ///
    /// # Errors
    ///
    /// Returns [`Conflict::NotWatching`] if a buzz was already requested,
    /// granted, or consumed for this question.
    pub fn request_buzz(&mut self, position: u32, assists: Assists) -> Result<BuzzRequest, Conflict> {
        if self.state != BuzzState::Watching {
            return Err(Conflict::NotWatching(self.state));
        }
        let qid = self.qid.clone().ok_or(Conflict::NoActiveQuestion)?;
        self.transition(BuzzState::IntentPending);
        Ok(BuzzRequest {
            qid,
            position,
            enabled_tools: Some(assists),
        })
    }

    /// A reveal step arrived; returns the frame to echo back
    ///
    /// The echo is a RESUME carrying the new position, or, while a buzz is
    /// pending, a repeated BUZZ_REQUEST at that position. `can_buzz` from the
    /// server locks a watching player out or re-opens a locked out one.
    ///
    /// # Errors
    ///
    /// Returns a [`Conflict`] if `qid` is not the active question.
    pub fn on_resume(
        &mut self,
        qid: &Qid,
        position: u32,
        can_buzz: Option<bool>,
        assists: Assists,
    ) -> Result<Message, Conflict> {
        self.check_active(qid)?;
        match (self.state, can_buzz) {
            (BuzzState::Watching, Some(false)) => self.transition(BuzzState::LockedOut),
            (BuzzState::LockedOut, Some(true)) => self.transition(BuzzState::Watching),
            _ => (),
        }

        Ok(if self.state == BuzzState::IntentPending {
            Message::BuzzRequest(BuzzRequest {
                qid: qid.clone(),
                position,
                enabled_tools: Some(assists),
            })
        } else {
            Message::Resume(Resume {
                qid: qid.clone(),
                position,
                can_buzz: None,
                reveal: Reveal::default(),
            })
        })
    }

    /// The server opened the buzz window for this session
    ///
    /// # Errors
    ///
    /// Returns a [`Conflict`] if no request is pending for `qid`.
    pub fn on_granted(&mut self, qid: &Qid) -> Result<(), Conflict> {
        self.check_active(qid)?;
        if self.state != BuzzState::IntentPending {
            return Err(Conflict::NoPendingIntent(self.state));
        }
        self.transition(BuzzState::Answering);
        Ok(())
    }

    /// The server refused the buzz window
    ///
    /// # Errors
    ///
    /// Returns a [`Conflict`] if no request is pending for `qid`.
    pub fn on_denied(&mut self, qid: &Qid) -> Result<(), Conflict> {
        self.check_active(qid)?;
        if self.state != BuzzState::IntentPending {
            return Err(Conflict::NoPendingIntent(self.state));
        }
        self.transition(BuzzState::LockedOut);
        Ok(())
    }

    /// Submits an answer, closing the window
    ///
    /// A blank `input` falls back to `fallback` (the best current guess)
    /// when there is one.
    ///
    /// # Errors
    ///
    /// Returns [`Conflict::NotAnswering`] unless the window is open.
    pub fn submit_answer(
        &mut self,
        input: &str,
        fallback: Option<&str>,
        position: u32,
        assists: Assists,
    ) -> Result<BuzzAnswer, Conflict> {
        if self.state != BuzzState::Answering {
            return Err(Conflict::NotAnswering(self.state));
        }
        let qid = self.qid.clone().ok_or(Conflict::NoActiveQuestion)?;
        let input = input.trim();
        let text = match fallback {
            Some(guess) if input.is_empty() => guess,
            _ => input,
        };
        self.transition(BuzzState::LockedOut);
        Ok(BuzzAnswer {
            qid,
            position,
            text: text.to_owned(),
            enabled_tools: Some(assists),
        })
    }
}
