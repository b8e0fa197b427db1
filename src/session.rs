//! One player's session
//!
//! A [`Session`] is created when the socket opens and consumed when it
//! closes. It owns every piece of per-session state (the buzz arbiter, the
//! question stream, the server's interpretation, the countdown, the history
//! and the roster) and is the only writer to the socket. Inbound frames and
//! countdown ticks are processed one at a time on the host's event loop;
//! nothing here blocks or spawns.

use std::{fmt::Display, str::FromStr};

use garde::Validate;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;
use web_time::Duration;

use crate::{
    DisplayList,
    arbiter::{Arbiter, BuzzState},
    assembler::QuestionStream,
    clock::{Alarm, Progress, ProgressTimer},
    codec::{
        self, Assist, Assists, Auxiliary, BuzzDecision, End, Envelope, Message, New, Resume,
        Reveal, Verdict,
    },
    config::Config,
    history::{HistoryEntry, HistoryLog},
    identity::{self, Identity},
    interpretation::Interpretation,
    roster::Roster,
    tunnel::{IdentityStore, Presenter, Speech, Tunnel},
};

/// Marker appended to the question text where a buzz was granted
pub const BELL: &str = " \u{1f514} ";

/// A unique identifier for a session, attached to every log event
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The client runtime for one player's connection
///
/// # Type Parameters
///
/// * `T` - Outbound socket
/// * `P` - Presenter receiving render calls
/// * `V` - Speech engine
/// * `S` - Persistent identity store
pub struct Session<T: Tunnel, P: Presenter, V: Speech, S: IdentityStore> {
    id: SessionId,
    config: Config,

    tunnel: T,
    presenter: P,
    speech: V,
    store: S,

    identity: Identity,
    arbiter: Arbiter,
    stream: QuestionStream,
    interpretation: Interpretation,
    timer: ProgressTimer,
    history: HistoryLog,
    roster: Roster,
    assists: Assists,
    score: i64,
    /// The server fixed the assists and the player may not toggle them
    choice_locked: bool,

    /// Whether the active question already has a history entry
    recorded: bool,
    /// Ask for a new round in the next NEW acknowledgement
    start_new_round: bool,
    round_complete: bool,
    closed: bool,
}

impl<T: Tunnel, P: Presenter, V: Speech, S: IdentityStore> Session<T, P, V, S> {
    /// Opens a session over an already connected socket
    ///
    /// The persisted identity is read from `store`.
    ///
    /// # Errors
    ///
    /// Returns the validation report if `config` is out of bounds.
    pub fn new(
        config: Config,
        tunnel: T,
        presenter: P,
        speech: V,
        store: S,
    ) -> Result<Self, garde::Report> {
        config.validate()?;
        let id = SessionId::new();
        let identity = Identity::load(&store);
        tracing::info!(session = %id, name = ?identity.name(), "session opened");
        Ok(Self {
            id,
            interpretation: Interpretation::with_limits(
                config.guess_display_count,
                config.match_display_count,
            ),
            history: HistoryLog::with_capacity(config.history_length),
            assists: config.assists,
            config,
            tunnel,
            presenter,
            speech,
            store,
            identity,
            arbiter: Arbiter::default(),
            stream: QuestionStream::default(),
            timer: ProgressTimer::default(),
            roster: Roster::default(),
            score: 0,
            choice_locked: false,
            recorded: false,
            start_new_round: false,
            round_complete: false,
            closed: false,
        })
    }

    /// Processes one inbound frame
    ///
    /// Malformed frames are logged and dropped, frames of an unknown type are
    /// dropped silently. Messages that do not apply to the current state are
    /// ignored.
    ///
    /// # Arguments
    ///
    /// * `raw` - The frame as received from the socket
    /// * `schedule` - Callback that delivers an [`Alarm`] back to
    ///   [`Session::receive_alarm`] after a delay
    pub fn receive_frame<F: FnMut(Alarm, Duration)>(&mut self, raw: &str, schedule: &mut F) {
        if self.closed {
            return;
        }
        match codec::decode(raw) {
            Ok(envelope) => self.receive_envelope(envelope, schedule),
            Err(e) if e.is_unknown_type() => {
                tracing::debug!(session = %self.id, "dropping frame: {e}");
            }
            Err(e) => {
                tracing::warn!(session = %self.id, "dropping malformed frame: {e}");
            }
        }
    }

    /// Processes one decoded frame
    pub fn receive_envelope<F: FnMut(Alarm, Duration)>(
        &mut self,
        envelope: Envelope,
        schedule: &mut F,
    ) {
        if self.closed {
            return;
        }
        let Envelope { message, mut aux } = envelope;

        if self.identity.adopt(
            aux.player_name.as_deref(),
            aux.player_id.as_deref(),
            &self.store,
        ) {
            tracing::info!(session = %self.id, name = ?self.identity.name(), uid = ?self.identity.uid(), "identity assigned");
        }
        if let Some(assists) = aux.enabled_tools {
            self.apply_assists(assists);
        }
        if let Some(explanations) = aux.explanation_config.take() {
            self.choice_locked = !explanations.allow_player_choice;
            if self.choice_locked {
                self.apply_assists(explanations.apply_to(self.assists));
            }
        }

        // Whether the message reached the active question; question-scoped
        // fields of a rejected message are dropped with it.
        let applied = match message {
            Message::New(new) => {
                self.on_new(new);
                true
            }
            Message::Resume(resume) => self.on_resume(resume),
            Message::End(end) => {
                let info = aux.info_text.take();
                self.on_end(end, info)
            }
            Message::BuzzGranted(decision) => self.on_granted(&decision, schedule),
            Message::BuzzDenied(decision) => self.on_denied(&decision, schedule),
            Message::ResultSelf(verdict) => self.on_verdict(&verdict, true),
            Message::ResultOther(verdict) => self.on_verdict(&verdict, false),
            Message::Complete => {
                self.on_complete();
                true
            }
            Message::NewRound => {
                tracing::info!(session = %self.id, "new round announced");
                self.start_new_round = true;
                self.round_complete = false;
                true
            }
            Message::BuzzRequest(_) | Message::BuzzAnswer(_) => {
                tracing::debug!(session = %self.id, "ignoring client-bound message");
                false
            }
        };

        self.apply_auxiliary(aux, applied, schedule);
    }

    /// Delivers a countdown tick scheduled earlier
    pub fn receive_alarm<F: FnMut(Alarm, Duration)>(&mut self, alarm: Alarm, schedule: &mut F) {
        if self.closed {
            return;
        }
        if let Some(progress) = self.timer.receive_alarm(alarm, schedule) {
            self.show_progress(progress);
        }
    }

    /// Requests the buzz window at the current reveal position
    ///
    /// Returns `true` if a BUZZ_REQUEST was sent.
    pub fn buzz(&mut self) -> bool {
        if self.closed {
            return false;
        }
        let position = self.stream.current_position();
        match self.arbiter.request_buzz(position, self.assists) {
            Ok(request) => {
                tracing::info!(session = %self.id, position, "buzzing");
                self.send(Message::BuzzRequest(request).into());
                self.presenter.show_buzz_state(self.arbiter.state());
                true
            }
            Err(conflict) => {
                tracing::debug!(session = %self.id, "buzz ignored: {conflict}");
                false
            }
        }
    }

    /// Submits the answer typed by the player
    ///
    /// Blank input falls back to the top guess. Returns `true` if a
    /// BUZZ_ANSWER was sent.
    pub fn submit_answer(&mut self, input: &str) -> bool {
        if self.closed {
            return false;
        }
        let fallback = self.interpretation.top_guess().map(|guess| guess.label.as_str());
        let position = self.stream.current_position();
        match self
            .arbiter
            .submit_answer(input, fallback, position, self.assists)
        {
            Ok(answer) => {
                tracing::info!(session = %self.id, answer = %answer.text, "answering");
                self.timer.cancel();
                self.send(Message::BuzzAnswer(answer).into());
                self.presenter.show_buzz_state(self.arbiter.state());
                true
            }
            Err(conflict) => {
                tracing::debug!(session = %self.id, "answer ignored: {conflict}");
                false
            }
        }
    }

    /// Puts the `index`-th displayed guess into the answer input and buzzes
    ///
    /// Returns `true` if a BUZZ_REQUEST was sent.
    pub fn pick_guess(&mut self, index: usize) -> bool {
        if index >= self.config.guess_display_count {
            return false;
        }
        let Some(guess) = self.interpretation.guesses().ranked().get(index) else {
            return false;
        };
        self.presenter.prefill_answer(&guess.label);
        self.buzz()
    }

    /// Switches an assist on or off
    ///
    /// Returns `false` without changing anything while the server has
    /// fixed the assists.
    pub fn set_assist(&mut self, assist: Assist, on: bool) -> bool {
        if self.choice_locked {
            tracing::debug!(session = %self.id, ?assist, "assists are fixed by the server");
            return false;
        }
        let mut assists = self.assists;
        assists.set(assist, on);
        self.apply_assists(assists);
        true
    }

    /// Asks for a new round with the next NEW acknowledgement
    pub fn request_new_round(&mut self) {
        tracing::info!(session = %self.id, "new round requested");
        self.start_new_round = true;
        self.round_complete = false;
    }

    /// Replaces the player's name
    ///
    /// # Errors
    ///
    /// Returns an [`identity::Error`] if the name is rejected.
    pub fn choose_name(&mut self, name: &str) -> Result<String, identity::Error> {
        self.identity.choose_name(name, &self.store)
    }

    /// Ends the session and closes the socket
    pub fn close(mut self) {
        tracing::info!(session = %self.id, "session closed");
        self.timer.cancel();
        self.speech.cancel();
        self.tunnel.close();
    }

    fn on_new(&mut self, new: New) {
        tracing::info!(session = %self.id, qid = %new.qid, "new question");
        self.record_history(None);
        self.timer.cancel();
        self.speech.cancel();

        let previous = self.arbiter.on_new(new.qid.clone());
        tracing::debug!(session = %self.id, ?previous, "buzz state reset");
        self.stream.on_new_question(new.qid.clone());
        self.interpretation.clear();
        self.recorded = false;

        if new.task_completed == Some(true) {
            self.on_complete();
        }

        let ack = Envelope {
            message: Message::New(New {
                qid: new.qid,
                start_new_round: std::mem::take(&mut self.start_new_round).then_some(true),
                task_completed: None,
            }),
            aux: Auxiliary {
                player_name: self.identity.name().map(ToOwned::to_owned),
                player_id: self.identity.uid().map(ToOwned::to_owned),
                ..Auxiliary::default()
            },
        };
        self.send(ack);

        self.show_question();
        self.show_interpretation();
        self.presenter.show_buzz_state(self.arbiter.state());
    }

    fn on_resume(&mut self, resume: Resume) -> bool {
        let Resume {
            qid,
            position,
            can_buzz,
            reveal,
        } = resume;
        let echo = match self.arbiter.on_resume(&qid, position, can_buzz, self.assists) {
            Ok(echo) => echo,
            Err(conflict) => {
                tracing::debug!(session = %self.id, "resume ignored: {conflict}");
                return false;
            }
        };

        self.stream.advance_to(position);
        if let Some(text) = &reveal.text {
            let emphasis = (reveal.highlight == Some(true))
                .then_some(&self.config.emphasis);
            self.stream.on_fragment(text, emphasis);
        }
        self.apply_reveal(reveal);
        if self.assists.enabled(Assist::Voice) {
            self.speech.resume();
        }

        self.send(echo.into());

        self.show_question();
        self.show_interpretation();
        self.presenter.show_buzz_state(self.arbiter.state());
        true
    }

    /// Concludes the active question; `info` is commentary sent with END and
    /// goes into the history entry
    fn on_end(&mut self, end: End, info: Option<String>) -> bool {
        let End {
            qid,
            position,
            answer,
            reveal,
        } = end;
        if let Err(conflict) = self.arbiter.on_end(&qid) {
            tracing::debug!(session = %self.id, "end ignored: {conflict}");
            return false;
        }
        tracing::info!(session = %self.id, %qid, answer = ?answer, "question ended");
        self.timer.cancel();

        if let Some(position) = position {
            self.stream.advance_to(position);
        }
        let full_text = reveal.text.clone().map(|plain| {
            let highlighted = reveal.text_highlighted.clone().unwrap_or_else(|| plain.clone());
            (plain, highlighted)
        });
        self.stream.conclude(full_text);
        if let Some(info) = info {
            self.stream.set_info(info);
        }
        self.apply_reveal(reveal);
        self.record_history(answer);

        self.show_question();
        self.show_interpretation();
        self.presenter.show_buzz_state(self.arbiter.state());
        true
    }

    fn on_granted<F: FnMut(Alarm, Duration)>(
        &mut self,
        decision: &BuzzDecision,
        schedule: &mut F,
    ) -> bool {
        if let Err(conflict) = self.arbiter.on_granted(&decision.qid) {
            tracing::debug!(session = %self.id, "grant ignored: {conflict}");
            return false;
        }
        tracing::info!(session = %self.id, qid = %decision.qid, "buzz granted");
        self.mark_buzz(schedule);
        true
    }

    /// A denied buzz is marked and timed like a granted one; only the
    /// resulting state differs
    fn on_denied<F: FnMut(Alarm, Duration)>(
        &mut self,
        decision: &BuzzDecision,
        schedule: &mut F,
    ) -> bool {
        if let Err(conflict) = self.arbiter.on_denied(&decision.qid) {
            tracing::debug!(session = %self.id, "denial ignored: {conflict}");
            return false;
        }
        tracing::info!(session = %self.id, qid = %decision.qid, "buzz denied");
        self.mark_buzz(schedule);
        true
    }

    /// Pauses reading, drops the bell into the text and starts the answer
    /// countdown
    fn mark_buzz<F: FnMut(Alarm, Duration)>(&mut self, schedule: &mut F) {
        self.speech.pause();
        self.stream.on_marker(BELL);
        let window = self.config.answer_window;
        let progress = self.timer.start(window, window, true, schedule);
        self.show_progress(progress);
        self.show_question();
        self.presenter.show_buzz_state(self.arbiter.state());
    }

    fn on_verdict(&mut self, verdict: &Verdict, own: bool) -> bool {
        if let Some(qid) = &verdict.qid
            && self.stream.qid() != Some(qid)
        {
            tracing::debug!(session = %self.id, %qid, "verdict for another question ignored");
            return false;
        }
        tracing::info!(
            session = %self.id,
            own,
            guess = %verdict.guess,
            correct = verdict.result,
            "answer judged"
        );
        self.timer.cancel();
        if own {
            self.score += verdict.score.unwrap_or_default();
            self.presenter.show_roster(&self.roster, self.score);
        }
        self.presenter.show_verdict(verdict, own);
        true
    }

    fn on_complete(&mut self) {
        tracing::info!(session = %self.id, "round complete");
        self.timer.cancel();
        self.round_complete = true;
        self.presenter.show_round_complete();
    }

    fn apply_reveal(&mut self, reveal: Reveal) {
        if let Some(guesses) = reveal.guesses {
            self.interpretation.apply_guesses(guesses);
        }
        if let Some(matches) = reveal.matches {
            self.interpretation
                .apply_matches(matches, reveal.matches_highlighted);
        }
        if let Some(text) = reveal.text_highlighted {
            self.interpretation.apply_text_highlighted(text);
        }
        if let Some(prediction) = reveal.autopilot_prediction {
            self.interpretation.apply_autopilot(prediction);
        }
    }

    /// Applies the auxiliary fields of a frame
    ///
    /// Roster and history are session-wide. Commentary, reading length and
    /// speech belong to the question the message was about and are skipped
    /// unless it `applied`.
    fn apply_auxiliary<F: FnMut(Alarm, Duration)>(
        &mut self,
        aux: Auxiliary,
        applied: bool,
        schedule: &mut F,
    ) {
        if let Some(list) = aux.player_list {
            self.roster.replace(list);
            if let Some(standing) = self.identity.uid().and_then(|uid| self.roster.standing(uid)) {
                self.score = standing.score;
            }
            self.presenter.show_roster(&self.roster, self.score);
        }
        if let Some(entries) = aux.history_entries {
            self.history.replace_with(entries);
            self.presenter.show_history(&self.history);
        }
        if !applied {
            return;
        }
        if let Some(info) = aux.info_text {
            self.stream.set_info(info);
            self.show_question();
        }
        if let Some(length) = aux.length {
            self.start_reading_timer(length, schedule);
        }
        if let Some(text) = aux
            .speech_text
            .filter(|_| self.assists.enabled(Assist::Voice))
        {
            self.speech.speak(&text);
        }
    }

    /// Starts the reading countdown unless one is already running
    fn start_reading_timer<F: FnMut(Alarm, Duration)>(&mut self, length: u32, schedule: &mut F) {
        if self.timer.is_running() || self.stream.qid().is_none() || self.stream.is_terminal() {
            return;
        }
        let remaining = length.saturating_sub(self.stream.current_position());
        let progress = self.timer.start(
            self.config.seconds_per_word * remaining,
            self.config.seconds_per_word * length,
            false,
            schedule,
        );
        self.show_progress(progress);
    }

    fn apply_assists(&mut self, assists: Assists) {
        if assists == self.assists {
            return;
        }
        tracing::debug!(session = %self.id, ?assists, "assists changed");
        if self.assists.enabled(Assist::Voice) && !assists.enabled(Assist::Voice) {
            self.speech.cancel();
        }
        self.assists = assists;
        self.show_interpretation();
    }

    /// Snapshots the active question into the history log, once
    fn record_history(&mut self, answer: Option<String>) {
        if self.recorded || self.stream.is_empty() {
            return;
        }
        let header = answer
            .or_else(|| self.interpretation.top_guess().map(|guess| guess.label.clone()))
            .unwrap_or_default();
        self.history.record(HistoryEntry {
            header,
            question_text: self.stream.plain_text(),
            info_text: self.stream.info().to_owned(),
            guesses: self
                .interpretation
                .guesses()
                .ranked()
                .iter()
                .take(self.config.guess_display_count)
                .cloned()
                .collect(),
            matches: self.interpretation.matches().plain().items().to_vec(),
        });
        self.recorded = true;
        self.presenter.show_history(&self.history);
    }

    fn send(&mut self, envelope: Envelope) {
        if self.closed {
            return;
        }
        if let Err(e) = self.tunnel.send(&codec::encode(&envelope)) {
            tracing::warn!(session = %self.id, "transport lost: {e}");
            self.closed = true;
            self.timer.cancel();
            self.speech.cancel();
        }
    }

    fn show_question(&self) {
        let highlighted = self
            .interpretation
            .text_highlighted()
            .map_or_else(|| self.stream.highlighted_text(), str::to_owned);
        self.presenter
            .show_question(&self.stream.plain_text(), &highlighted, self.stream.info());
    }

    fn show_interpretation(&self) {
        if self.assists.enabled(Assist::Guesses) {
            self.presenter.show_guesses(
                &self.interpretation.displayed_guesses(),
                self.interpretation.autopilot() && self.assists.enabled(Assist::Autopilot),
            );
        } else {
            self.presenter.show_guesses(&DisplayList::default(), false);
        }

        let matches = self.interpretation.matches();
        match (
            self.assists.enabled(Assist::Matches),
            self.assists.enabled(Assist::Highlight),
        ) {
            (false, _) => self.presenter.show_matches(&DisplayList::default()),
            (true, true) => self.presenter.show_matches(matches.highlighted()),
            (true, false) => self.presenter.show_matches(matches.plain()),
        }
    }

    fn show_progress(&self, progress: Progress) {
        self.presenter
            .show_timer(progress.percentage(), progress.label(), progress.urgent);
    }

    /// Id attached to this session's log events
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current buzz state
    pub fn state(&self) -> BuzzState {
        self.arbiter.state()
    }

    /// Running score
    pub fn score(&self) -> i64 {
        self.score
    }

    /// The local player's identity
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The active question
    pub fn stream(&self) -> &QuestionStream {
        &self.stream
    }

    /// The server's interpretation of the active question
    pub fn interpretation(&self) -> &Interpretation {
        &self.interpretation
    }

    /// Review log
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Latest roster
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Enabled assists
    pub fn assists(&self) -> Assists {
        self.assists
    }

    /// Progress of the running countdown
    pub fn progress(&self) -> Option<Progress> {
        self.timer.progress()
    }

    /// Whether the server reported the round as finished
    pub fn is_round_complete(&self) -> bool {
        self.round_complete
    }

    /// Whether the socket was lost
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
