//! # Quiz Bowl Client Library
//!
//! This library implements the client side of a real-time, multi-player quiz
//! bowl buzzer protocol. A server streams a question word by word, arbitrates
//! who may answer, and pushes its own interpretation of the question (ranked
//! guesses, evidence matches, highlighted text). The [`session::Session`]
//! consumes that stream for one player, keeps the buzz state machine honest,
//! and drives an external presenter, speech engine and identity store.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
use derive_where::derive_where;
use serde::{Deserialize, Serialize};

pub mod arbiter;
pub mod assembler;
pub mod clock;
pub mod codec;
pub mod config;
pub mod constants;
pub mod history;
pub mod identity;
pub mod interpretation;
pub mod roster;
pub mod session;
pub mod tunnel;

/// A list cut down to a display limit that remembers how long it was
///
/// The server may push more guesses or matches than the player is shown.
/// `DisplayList` keeps the first `limit` entries in order and the size of
/// the list it was cut from, so callers can tell a short list from a
/// truncated one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derive_where(Default)]
pub struct DisplayList<T> {
    /// Length of the list before truncation
    total: usize,
    /// Retained entries, in their original order
    items: Vec<T>,
}

impl<T> DisplayList<T> {
    /// Keeps at most `limit` entries of `list`, counting every entry seen
    pub fn truncate_from<I: IntoIterator<Item = T>>(list: I, limit: usize) -> Self {
        let mut total = 0;
        let mut items = Vec::new();
        for item in list {
            if total < limit {
                items.push(item);
            }
            total += 1;
        }
        Self { total, items }
    }

    /// Retained entries
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Length of the list before truncation
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of entries dropped by the display limit
    pub fn dropped(&self) -> usize {
        self.total - self.items.len()
    }

    /// Whether nothing is retained
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Transforms every retained entry, preserving the original total
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> DisplayList<U> {
        DisplayList {
            total: self.total,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}
