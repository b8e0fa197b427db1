//! Review log of completed questions
//!
//! Entries are immutable snapshots taken when a question ends. The log is a
//! bounded ring: once it holds its retention count, recording a new entry
//! silently drops the oldest one.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{constants::history::HISTORY_LENGTH, interpretation::Guess};

/// Snapshot of a completed question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Heading shown for the entry, usually the correct answer
    pub header: String,
    /// Question text as it was displayed
    pub question_text: String,
    /// Commentary text (buzzes, verdicts, answer)
    #[serde(default)]
    pub info_text: String,
    /// Ranked guesses at the end of the question
    #[serde(default)]
    pub guesses: Vec<Guess>,
    /// Evidence matches at the end of the question
    #[serde(default)]
    pub matches: Vec<String>,
}

/// Bounded, append-only log of [`HistoryEntry`] values, oldest first
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::with_capacity(HISTORY_LENGTH)
    }
}

impl HistoryLog {
    /// Creates an empty log retaining at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an entry, dropping the oldest ones beyond the retention count
    pub fn record(&mut self, entry: HistoryEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Replaces the log with the server's record, keeping only the most recent
    /// entries
    pub fn replace_with(&mut self, entries: Vec<HistoryEntry>) {
        self.entries.clear();
        let skip = entries.len().saturating_sub(self.capacity);
        self.entries.extend(entries.into_iter().skip(skip));
    }

    /// Entries, oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Most recently recorded entry
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retention count
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
