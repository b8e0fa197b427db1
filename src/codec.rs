//! Wire protocol encoding and decoding
//!
//! Frames are flat JSON objects whose integer `type` field selects one of
//! the protocol messages. Type-specific fields live next to auxiliary fields
//! (roster, history, timing) that may accompany any message. Decoding reads
//! the discriminant first and then lifts the same object into both the typed
//! [`Message`] and its [`Auxiliary`] fields.

use std::fmt::Display;

use enum_map::{Enum, EnumMap};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use thiserror::Error;

use crate::{history::HistoryEntry, interpretation::Guess, roster::Standing};

/// Identifier of a question, echoed back to the server verbatim
///
/// Servers use either numeric or string ids, so the client never interprets
/// it beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Qid {
    /// Numeric question id
    Number(u64),
    /// Opaque string question id
    Text(String),
}

impl Display for Qid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => n.fmt(f),
            Self::Text(s) => s.fmt(f),
        }
    }
}

impl From<u64> for Qid {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Qid {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Discriminant carried in the `type` field of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    /// A new question begins
    New = 0,
    /// Incremental reveal of the active question
    Resume = 1,
    /// The active question concludes
    End = 2,
    /// Client claims the right to answer
    BuzzRequest = 3,
    /// Client submits an answer
    BuzzAnswer = 4,
    /// Server grants the buzz window
    BuzzGranted = 5,
    /// Server denies the buzz window
    BuzzDenied = 6,
    /// Outcome of this player's answer
    ResultSelf = 7,
    /// Outcome of another player's answer
    ResultOther = 8,
    /// Every question of the round has been played
    Complete = 9,
    /// A new round is starting
    NewRound = 10,
}

impl Kind {
    const ALL: [Kind; 11] = [
        Kind::New,
        Kind::Resume,
        Kind::End,
        Kind::BuzzRequest,
        Kind::BuzzAnswer,
        Kind::BuzzGranted,
        Kind::BuzzDenied,
        Kind::ResultSelf,
        Kind::ResultOther,
        Kind::Complete,
        Kind::NewRound,
    ];

    /// Numeric wire id of this kind
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Looks up a kind by its wire id
    pub fn from_id(id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| u64::from(kind.id()) == id)
    }
}

/// Player assistance features that can be switched on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
pub enum Assist {
    /// Ranked guess list
    Guesses,
    /// Highlighted question text and evidence
    Highlight,
    /// Evidence matches
    Matches,
    /// Spoken question text
    Voice,
    /// The server model's buzz recommendation
    Autopilot,
}

/// Serialization helper for [`Assists`], every flag defaults to off
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
struct AssistsSerde {
    guesses: bool,
    highlight: bool,
    matches: bool,
    voice: bool,
    autopilot: bool,
}

/// Snapshot of the enabled assistance features
///
/// Forwarded verbatim to the server with buzz frames; the client never
/// validates the combination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AssistsSerde", into = "AssistsSerde")]
pub struct Assists(EnumMap<Assist, bool>);

impl From<AssistsSerde> for Assists {
    fn from(serde: AssistsSerde) -> Self {
        Self(EnumMap::from_array([
            serde.guesses,
            serde.highlight,
            serde.matches,
            serde.voice,
            serde.autopilot,
        ]))
    }
}

impl From<Assists> for AssistsSerde {
    fn from(assists: Assists) -> Self {
        Self {
            guesses: assists.0[Assist::Guesses],
            highlight: assists.0[Assist::Highlight],
            matches: assists.0[Assist::Matches],
            voice: assists.0[Assist::Voice],
            autopilot: assists.0[Assist::Autopilot],
        }
    }
}

impl Assists {
    /// Every assist switched on
    pub fn all() -> Self {
        Self(EnumMap::from_fn(|_| true))
    }

    /// Whether `assist` is on
    pub fn enabled(&self, assist: Assist) -> bool {
        self.0[assist]
    }

    /// Switches `assist` on or off
    pub fn set(&mut self, assist: Assist, on: bool) {
        self.0[assist] = on;
    }
}

/// Assist configuration pushed by the server
///
/// Flags missing from the frame count as off. While `allow_player_choice` is
/// set the flags are not imposed and the player toggles assists freely;
/// otherwise the flags are applied and the toggles are locked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationConfig {
    /// Ranked guess list
    #[serde(rename = "Alternatives")]
    pub alternatives: bool,
    /// Evidence matches
    #[serde(rename = "Evidence")]
    pub evidence: bool,
    /// Highlighted question text
    #[serde(rename = "Highlights_Question")]
    pub highlights_question: bool,
    /// Highlighted evidence
    #[serde(rename = "Highlights_Evidence")]
    pub highlights_evidence: bool,
    /// Autopilot recommendation
    #[serde(rename = "Autopilot")]
    pub autopilot: bool,
    /// Whether the player may toggle assists
    pub allow_player_choice: bool,
}

impl ExplanationConfig {
    /// Overlays the server's flags on `assists`; voice is left untouched
    pub fn apply_to(&self, mut assists: Assists) -> Assists {
        assists.set(Assist::Guesses, self.alternatives);
        assists.set(Assist::Matches, self.evidence);
        assists.set(
            Assist::Highlight,
            self.highlights_question || self.highlights_evidence,
        );
        assists.set(Assist::Autopilot, self.autopilot);
        assists
    }
}

/// Accepts `true`/`false` as well as the `0`/`1` some servers send
fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flexible::deserialize(deserializer)? {
        Flexible::Bool(b) => b,
        Flexible::Int(i) => i != 0,
    })
}

/// Question text and interpretation data attached to a reveal step
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reveal {
    /// Newly revealed question fragment
    pub text: Option<String>,
    /// Whether the fragment is emphasized
    pub highlight: Option<bool>,
    /// Server rendering of the question text with highlights
    pub text_highlighted: Option<String>,
    /// Ranked guesses for the current position
    pub guesses: Option<Vec<Guess>>,
    /// Evidence matches for the current position
    pub matches: Option<Vec<String>>,
    /// Evidence matches with highlights
    pub matches_highlighted: Option<Vec<String>>,
    /// Whether the server's model would buzz now
    pub autopilot_prediction: Option<bool>,
}

/// Start of a question, also used as the client's acknowledgement
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct New {
    /// Question id
    pub qid: Qid,
    /// Client asks the server to begin a new round
    pub start_new_round: Option<bool>,
    /// Server reports that the round is over for this player
    pub task_completed: Option<bool>,
}

/// Incremental reveal, also used as the client's position echo
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resume {
    /// Question id
    pub qid: Qid,
    /// Reveal cursor, in words
    pub position: u32,
    /// Server says whether this player may currently buzz
    pub can_buzz: Option<bool>,
    /// Text and interpretation for this step
    #[serde(flatten)]
    pub reveal: Reveal,
}

/// End of a question
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct End {
    /// Question id
    pub qid: Qid,
    /// Final reveal cursor
    pub position: Option<u32>,
    /// Correct answer
    pub answer: Option<String>,
    /// Full question text and final interpretation
    #[serde(flatten)]
    pub reveal: Reveal,
}

/// Client claim on the buzz window
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuzzRequest {
    /// Question id
    pub qid: Qid,
    /// Reveal cursor at the time of the buzz
    pub position: u32,
    /// Assistance features enabled when buzzing
    pub enabled_tools: Option<Assists>,
}

/// Client answer inside a granted buzz window
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuzzAnswer {
    /// Question id
    pub qid: Qid,
    /// Reveal cursor at the time of the answer
    pub position: u32,
    /// Submitted answer
    pub text: String,
    /// Assistance features enabled when answering
    pub enabled_tools: Option<Assists>,
}

/// Server decision on a buzz window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuzzDecision {
    /// Question id the decision applies to
    pub qid: Qid,
}

/// Outcome of an answer
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Question id
    pub qid: Option<Qid>,
    /// Answer that was judged
    pub guess: String,
    /// Whether the answer was correct
    #[serde(deserialize_with = "flexible_bool")]
    pub result: bool,
    /// Points awarded for the answer
    pub score: Option<i64>,
    /// Player who answered
    pub player_id: Option<String>,
}

/// Every protocol message, one variant per wire discriminant
#[derive(Debug, Clone, PartialEq, derive_more::From)]
pub enum Message {
    /// See [`Kind::New`]
    New(New),
    /// See [`Kind::Resume`]
    Resume(Resume),
    /// See [`Kind::End`]
    End(End),
    /// See [`Kind::BuzzRequest`]
    BuzzRequest(BuzzRequest),
    /// See [`Kind::BuzzAnswer`]
    BuzzAnswer(BuzzAnswer),
    /// See [`Kind::BuzzGranted`]
    #[from(skip)]
    BuzzGranted(BuzzDecision),
    /// See [`Kind::BuzzDenied`]
    #[from(skip)]
    BuzzDenied(BuzzDecision),
    /// See [`Kind::ResultSelf`]
    #[from(skip)]
    ResultSelf(Verdict),
    /// See [`Kind::ResultOther`]
    #[from(skip)]
    ResultOther(Verdict),
    /// See [`Kind::Complete`]
    #[from(skip)]
    Complete,
    /// See [`Kind::NewRound`]
    #[from(skip)]
    NewRound,
}

impl Message {
    /// Wire discriminant of this message
    pub fn kind(&self) -> Kind {
        match self {
            Self::New(_) => Kind::New,
            Self::Resume(_) => Kind::Resume,
            Self::End(_) => Kind::End,
            Self::BuzzRequest(_) => Kind::BuzzRequest,
            Self::BuzzAnswer(_) => Kind::BuzzAnswer,
            Self::BuzzGranted(_) => Kind::BuzzGranted,
            Self::BuzzDenied(_) => Kind::BuzzDenied,
            Self::ResultSelf(_) => Kind::ResultSelf,
            Self::ResultOther(_) => Kind::ResultOther,
            Self::Complete => Kind::Complete,
            Self::NewRound => Kind::NewRound,
        }
    }

    fn payload(&self) -> Value {
        let value = match self {
            Self::New(m) => serde_json::to_value(m),
            Self::Resume(m) => serde_json::to_value(m),
            Self::End(m) => serde_json::to_value(m),
            Self::BuzzRequest(m) => serde_json::to_value(m),
            Self::BuzzAnswer(m) => serde_json::to_value(m),
            Self::BuzzGranted(m) | Self::BuzzDenied(m) => serde_json::to_value(m),
            Self::ResultSelf(m) | Self::ResultOther(m) => serde_json::to_value(m),
            Self::Complete | Self::NewRound => Ok(Value::Object(Map::new())),
        };
        value.expect("protocol payloads always serialize to JSON")
    }
}

/// Fields that may accompany any message regardless of its type
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Auxiliary {
    /// Player name, assigned by the server or sent by the client
    pub player_name: Option<String>,
    /// Player id, assigned by the server or sent by the client
    pub player_id: Option<String>,
    /// Roster with scores and activity
    pub player_list: Option<Vec<Standing>>,
    /// Server-side record of completed questions
    pub history_entries: Option<Vec<HistoryEntry>>,
    /// Running commentary under the question (buzzes, verdicts, answer)
    pub info_text: Option<String>,
    /// Total reveal length, in words, used to initialize the countdown
    pub length: Option<u32>,
    /// Text to be spoken from the current position onwards
    pub speech_text: Option<String>,
    /// Assistance features the server wants enabled
    pub enabled_tools: Option<Assists>,
    /// Assist configuration and whether the player may change it
    pub explanation_config: Option<ExplanationConfig>,
}

/// A decoded or to-be-encoded frame
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// The typed message
    pub message: Message,
    /// Auxiliary fields sent alongside it
    pub aux: Auxiliary,
}

impl From<Message> for Envelope {
    fn from(message: Message) -> Self {
        Self {
            message,
            aux: Auxiliary::default(),
        }
    }
}

/// Errors produced while decoding a frame
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The frame is not a JSON object
    #[error("frame is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame has no integer `type` field
    #[error("frame has no integer type")]
    MissingType,
    /// The `type` field names a message this client does not know
    #[error("unknown message type {0}")]
    UnknownType(u64),
    /// A field required by the message type is missing or malformed
    #[error("malformed {kind:?} payload: {source}")]
    Payload {
        /// Kind being decoded
        kind: Kind,
        /// Underlying error
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Whether the frame was well formed but of an unknown type
    ///
    /// Such frames come from newer servers and are dropped without a warning.
    pub fn is_unknown_type(&self) -> bool {
        matches!(self, Self::UnknownType(_))
    }
}

fn lift<T: DeserializeOwned>(kind: Kind, object: &Value) -> Result<T, DecodeError> {
    T::deserialize(object).map_err(|source| DecodeError::Payload { kind, source })
}

/// Decodes a raw frame
///
/// # Errors
///
/// Returns a [`DecodeError`] if the frame is not a JSON object, lacks an
/// integer `type`, names an unknown type, or misses a required field.
pub fn decode(raw: &str) -> Result<Envelope, DecodeError> {
    let mut object: Map<String, Value> = serde_json::from_str(raw)?;
    let id = object
        .remove("type")
        .and_then(|t| t.as_u64())
        .ok_or(DecodeError::MissingType)?;
    let kind = Kind::from_id(id).ok_or(DecodeError::UnknownType(id))?;
    let object = Value::Object(object);

    let message = match kind {
        Kind::New => Message::New(lift(kind, &object)?),
        Kind::Resume => Message::Resume(lift(kind, &object)?),
        Kind::End => Message::End(lift(kind, &object)?),
        Kind::BuzzRequest => Message::BuzzRequest(lift(kind, &object)?),
        Kind::BuzzAnswer => Message::BuzzAnswer(lift(kind, &object)?),
        Kind::BuzzGranted => Message::BuzzGranted(lift(kind, &object)?),
        Kind::BuzzDenied => Message::BuzzDenied(lift(kind, &object)?),
        Kind::ResultSelf => Message::ResultSelf(lift(kind, &object)?),
        Kind::ResultOther => Message::ResultOther(lift(kind, &object)?),
        Kind::Complete => Message::Complete,
        Kind::NewRound => Message::NewRound,
    };

    Ok(Envelope {
        message,
        aux: lift(kind, &object)?,
    })
}

/// Encodes a frame for transmission
///
/// # Panics
///
/// This function panics if serialization fails, which cannot happen for the
/// string-keyed payloads of this protocol.
pub fn encode(envelope: &Envelope) -> String {
    let mut object = match envelope.message.payload() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Ok(Value::Object(aux)) = serde_json::to_value(&envelope.aux) {
        for (key, value) in aux {
            object.entry(key).or_insert(value);
        }
    }
    object.insert("type".to_owned(), Value::from(envelope.message.kind().id()));
    serde_json::to_string(&object).expect("default serializer cannot fail")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_kind_ids_are_stable() {
        assert_eq!(Kind::New.id(), 0);
        assert_eq!(Kind::BuzzGranted.id(), 5);
        assert_eq!(Kind::ResultOther.id(), 8);
        assert_eq!(Kind::NewRound.id(), 10);
        assert_eq!(Kind::from_id(6), Some(Kind::BuzzDenied));
        assert_eq!(Kind::from_id(11), None);
    }

    #[test]
    fn test_decode_resume_with_interpretation() {
        let raw = r#"{"type":1,"qid":7,"position":3,"text":"first",
            "guesses":[["Napoleon",0.6],["Wellington",0.4]],
            "matches":["a","b"],"length":40,"can_buzz":true}"#;
        let envelope = decode(raw).unwrap();

        assert_matches!(&envelope.message, Message::Resume(resume) => {
            assert_eq!(resume.qid, Qid::Number(7));
            assert_eq!(resume.position, 3);
            assert_eq!(resume.can_buzz, Some(true));
            assert_eq!(resume.reveal.text.as_deref(), Some("first"));
            assert_eq!(resume.reveal.guesses.as_ref().map(Vec::len), Some(2));
        });
        assert_eq!(envelope.aux.length, Some(40));
    }

    #[test]
    fn test_decode_string_qid() {
        let envelope = decode(r#"{"type":5,"qid":"q-12"}"#).unwrap();
        assert_eq!(
            envelope.message,
            Message::BuzzGranted(BuzzDecision {
                qid: Qid::from("q-12")
            })
        );
    }

    #[test]
    fn test_decode_result_accepts_integer_bool() {
        let envelope = decode(r#"{"type":7,"guess":"Paris","result":1,"score":10}"#).unwrap();
        assert_matches!(envelope.message, Message::ResultSelf(Verdict { result: true, score: Some(10), .. }));
    }

    #[test]
    fn test_decode_unknown_type() {
        let err = decode(r#"{"type":42,"qid":1}"#).unwrap_err();
        assert!(err.is_unknown_type());
        assert_matches!(err, DecodeError::UnknownType(42));
    }

    #[test]
    fn test_decode_missing_type() {
        assert_matches!(decode(r#"{"qid":1}"#), Err(DecodeError::MissingType));
        assert_matches!(decode(r#"{"type":"new"}"#), Err(DecodeError::MissingType));
    }

    #[test]
    fn test_decode_not_an_object() {
        assert_matches!(decode("[1,2,3]"), Err(DecodeError::Json(_)));
        assert_matches!(decode("not json"), Err(DecodeError::Json(_)));
    }

    #[test]
    fn test_decode_missing_required_field() {
        let err = decode(r#"{"type":1,"qid":1}"#).unwrap_err();
        assert_matches!(err, DecodeError::Payload { kind: Kind::Resume, .. });
        assert!(!err.is_unknown_type());
    }

    #[test]
    fn test_decode_complete_and_new_round() {
        assert_eq!(decode(r#"{"type":9}"#).unwrap().message, Message::Complete);
        assert_eq!(decode(r#"{"type":10}"#).unwrap().message, Message::NewRound);
    }

    #[test]
    fn test_encode_buzz_request_carries_assists() {
        let mut assists = Assists::default();
        assists.set(Assist::Guesses, true);
        let frame = encode(
            &Message::from(BuzzRequest {
                qid: Qid::Number(3),
                position: 5,
                enabled_tools: Some(assists),
            })
            .into(),
        );
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["type"], 3);
        assert_eq!(value["qid"], 3);
        assert_eq!(value["position"], 5);
        assert_eq!(value["enabled_tools"]["guesses"], true);
        assert_eq!(value["enabled_tools"]["voice"], false);
    }

    #[test]
    fn test_encode_new_ack_with_identity() {
        let frame = encode(&Envelope {
            message: Message::New(New {
                qid: Qid::Number(1),
                start_new_round: None,
                task_completed: None,
            }),
            aux: Auxiliary {
                player_name: Some("Ada".to_string()),
                player_id: Some("player_1".to_string()),
                ..Auxiliary::default()
            },
        });
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["type"], 0);
        assert_eq!(value["player_name"], "Ada");
        assert!(value.get("start_new_round").is_none());
    }

    #[test]
    fn test_encode_resume_echo_omits_reveal() {
        let frame = encode(
            &Message::from(Resume {
                qid: Qid::Number(1),
                position: 2,
                can_buzz: None,
                reveal: Reveal::default(),
            })
            .into(),
        );
        let value: Value = serde_json::from_str(&frame).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 3);
        assert_eq!(value["position"], 2);
    }

    #[test]
    fn test_decode_explanation_config() {
        let raw = r#"{"type":0,"qid":1,"explanation_config":{"Alternatives":true,
            "Evidence":false,"Highlights_Question":false,"Highlights_Evidence":true,
            "Autopilot":true,"allow_player_choice":false}}"#;
        let config = decode(raw).unwrap().aux.explanation_config.unwrap();
        assert!(!config.allow_player_choice);

        let mut voice = Assists::default();
        voice.set(Assist::Voice, true);
        voice.set(Assist::Matches, true);
        let assists = config.apply_to(voice);
        assert!(assists.enabled(Assist::Guesses));
        assert!(!assists.enabled(Assist::Matches));
        assert!(assists.enabled(Assist::Highlight));
        assert!(assists.enabled(Assist::Autopilot));
        assert!(assists.enabled(Assist::Voice));
    }

    #[test]
    fn test_assists_tolerate_missing_flags() {
        let assists: Assists = serde_json::from_str(r#"{"guesses":true,"matches":true}"#).unwrap();
        assert!(assists.enabled(Assist::Guesses));
        assert!(assists.enabled(Assist::Matches));
        assert!(!assists.enabled(Assist::Voice));
    }
}
