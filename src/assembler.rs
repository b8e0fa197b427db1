//! Question stream assembly
//!
//! Accumulates the revealed text of the active question. Two accumulators
//! are kept side by side, one plain and one with emphasis markers, and every
//! append touches both so they always hold the same number of fragments.
//! The reveal cursor is only moved by the server; it is never inferred from
//! the number of fragments received.

use serde::{Deserialize, Serialize};

use crate::codec::Qid;

/// Markup wrapped around an emphasized fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emphasis {
    /// Inserted before the fragment
    pub prefix: String,
    /// Inserted after the fragment
    pub suffix: String,
}

impl Emphasis {
    /// Creates a marker
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Wraps `text` in this marker
    pub fn wrap(&self, text: &str) -> String {
        format!("{}{text}{}", self.prefix, self.suffix)
    }
}

impl Default for Emphasis {
    /// A yellow background highlight
    fn default() -> Self {
        Self::new(r#"<span style="background-color: #ecff6d">"#, "</span>")
    }
}

/// Accumulated state of the active question
#[derive(Debug, Clone, Default)]
pub struct QuestionStream {
    qid: Option<Qid>,
    plain: Vec<String>,
    highlighted: Vec<String>,
    info: String,
    position: u32,
    terminal: bool,
}

impl QuestionStream {
    /// Starts accumulating a new question, discarding everything held
    pub fn on_new_question(&mut self, qid: Qid) {
        *self = Self {
            qid: Some(qid),
            ..Self::default()
        };
    }

    /// Appends a revealed fragment to both accumulators
    ///
    /// The fragment is preceded by a space; the highlighted copy is wrapped
    /// in `emphasis` when one is given. Returns `false`, appending nothing,
    /// if no question is active or the question has ended.
    pub fn on_fragment(&mut self, text: &str, emphasis: Option<&Emphasis>) -> bool {
        if !self.accepts_fragments() {
            return false;
        }
        self.plain.push(format!(" {text}"));
        self.highlighted.push(match emphasis {
            Some(emphasis) => format!(" {}", emphasis.wrap(text)),
            None => format!(" {text}"),
        });
        true
    }

    /// Appends the same raw marker (such as a buzz bell) to both accumulators
    pub fn on_marker(&mut self, marker: &str) -> bool {
        if !self.accepts_fragments() {
            return false;
        }
        self.plain.push(marker.to_owned());
        self.highlighted.push(marker.to_owned());
        true
    }

    /// Moves the reveal cursor to a server-supplied position
    ///
    /// Positions behind the current cursor are ignored, returning `false`.
    pub fn advance_to(&mut self, position: u32) -> bool {
        if position < self.position {
            tracing::debug!(current = self.position, position, "ignoring reveal regression");
            return false;
        }
        self.position = position;
        true
    }

    /// Replaces the commentary shown under the question
    pub fn set_info(&mut self, info: String) {
        self.info = info;
    }

    /// Marks the question as ended
    ///
    /// When the server sends the complete text, both accumulators are
    /// replaced by it as a single aligned fragment.
    pub fn conclude(&mut self, full_text: Option<(String, String)>) {
        if let Some((plain, highlighted)) = full_text {
            self.plain = vec![plain];
            self.highlighted = vec![highlighted];
        }
        self.terminal = true;
    }

    fn accepts_fragments(&self) -> bool {
        self.qid.is_some() && !self.terminal
    }

    /// Id of the active question
    pub fn qid(&self) -> Option<&Qid> {
        self.qid.as_ref()
    }

    /// Reveal cursor
    pub fn current_position(&self) -> u32 {
        self.position
    }

    /// Plain question text
    pub fn plain_text(&self) -> String {
        self.plain.concat()
    }

    /// Question text with emphasis markers
    pub fn highlighted_text(&self) -> String {
        self.highlighted.concat()
    }

    /// Commentary text
    pub fn info(&self) -> &str {
        &self.info
    }

    /// Number of fragments in the plain and highlighted accumulators
    pub fn fragment_counts(&self) -> (usize, usize) {
        (self.plain.len(), self.highlighted.len())
    }

    /// Whether the question has ended
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Whether no text has been revealed
    pub fn is_empty(&self) -> bool {
        self.plain.is_empty()
    }
}
