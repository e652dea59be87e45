use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::api::{ApiError, CaseContext, ConversationSnapshot};
use crate::engine::reference_day::{ReferenceClock, format_day_key};
use crate::engine::streak::{self, CompletionSummary};
use crate::session::state::{ChatMessage, Outcome, Phase, Role, SessionState, TransitionError};
use crate::session::stream::StreamParser;
use crate::session::timer::Timer;
use crate::store::json_store::{self, JsonStore};
use crate::store::schema::{SessionRecord, UserStats};

const UNKNOWN_ROLE: &str = "unknown";

/// Both clocks a transition may need: wall time for day keys and message
/// stamps, monotonic time for the timer.
#[derive(Clone, Copy, Debug)]
pub struct Moment {
    pub utc: DateTime<Utc>,
    pub instant: Instant,
}

impl Moment {
    pub fn now() -> Self {
        Self {
            utc: Utc::now(),
            instant: Instant::now(),
        }
    }
}

/// Tags one question so its reply can be told apart from a reply to a
/// session that has since been replaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// Work the controller wants done outside the event loop.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    FetchCase { custom: Option<CaseContext> },
    FetchRandomCase { previous_disease: Option<String> },
    Ask {
        request: RequestId,
        question: String,
        context: SessionRecord,
    },
    SaveConversation(ConversationSnapshot),
    Notify(Notice),
}

/// Things the player should be told about.
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    Solved(CompletionSummary),
    Failed { disease: Option<String> },
    Error(String),
}

/// Owns one session plus the profile data it feeds, and turns user actions and
/// server responses into transitions.
pub struct SessionController {
    state: SessionState,
    timer: Timer,
    stats: UserStats,
    player_role: Option<String>,
    clock: ReferenceClock,
    store: Option<JsonStore>,
    stream: Option<StreamParser>,
    /// The question whose reply is being accepted, if any.
    request: Option<RequestId>,
    next_request: u64,
    custom_case: Option<CaseContext>,
    start_when_loaded: bool,
    last_error: Option<String>,
}

impl SessionController {
    pub fn new(
        store: Option<JsonStore>,
        clock: ReferenceClock,
        custom_case: Option<CaseContext>,
    ) -> Self {
        let stats = store
            .as_ref()
            .map(JsonStore::load_user_stats)
            .unwrap_or_default();
        let player_role = store.as_ref().and_then(JsonStore::load_player_role);
        Self {
            state: SessionState::new(custom_case.is_some()),
            timer: Timer::default(),
            stats,
            player_role,
            clock,
            store,
            stream: None,
            request: None,
            next_request: 0,
            custom_case,
            start_when_loaded: false,
            last_error: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn stats(&self) -> &UserStats {
        &self.stats
    }

    pub fn clock(&self) -> &ReferenceClock {
        &self.clock
    }

    pub fn player_role(&self) -> Option<&str> {
        self.player_role.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The reply currently streaming in, as far as it has been released.
    pub fn streaming_reply(&self) -> Option<&str> {
        self.stream.as_ref().map(StreamParser::display)
    }

    pub fn streaming_is_wide(&self) -> bool {
        self.stream.as_ref().is_some_and(StreamParser::is_wide)
    }

    /// The question currently awaiting its reply.
    pub fn pending_request(&self) -> Option<RequestId> {
        self.request
    }

    /// Replies to a question from a discarded session are dropped.
    fn accepts_reply(&self, request: RequestId) -> bool {
        if self.request == Some(request) {
            return true;
        }
        tracing::debug!(?request, current = ?self.request, "dropping stale reply event");
        false
    }

    /// Decide between resuming today's session and fetching a new case.
    pub fn boot(&mut self, now: Moment) -> Vec<Effect> {
        let today = self.clock.today(now.utc);
        if streak::ensure_streak_freshness(&mut self.stats, today) {
            tracing::info!("consecutive streak lapsed");
            self.persist_stats();
        }

        if let Some(custom) = self.custom_case.clone() {
            tracing::info!(disease = %custom.disease, "starting custom case");
            self.persist("clear stored session", |store| {
                store.remove(json_store::CHAT_HISTORY)?;
                store.remove(json_store::PATIENT_CONTEXT)
            });
            return self.preload(Some(custom));
        }

        if let Some(restored) = self.restore_today(now) {
            return restored;
        }

        self.persist("clear stale session", JsonStore::clear_session);
        self.preload(None)
    }

    fn restore_today(&mut self, now: Moment) -> Option<Vec<Effect>> {
        let store = self.store.as_ref()?;
        let stored = store.load_chat_history();
        let stored_len = stored.len();
        let todays: Vec<ChatMessage> = stored
            .into_iter()
            .filter(|m| self.clock.same_day(m.timestamp, now.utc))
            .collect();
        if !todays.iter().any(|m| m.role == Role::Patient) {
            return None;
        }
        let record = store.load_session_record()?;

        if todays.len() != stored_len {
            if let Err(e) = store.save_chat_history(&todays) {
                tracing::warn!(error = %e, "failed to prune chat history");
            }
        }
        let elapsed = store.load_elapsed_time().unwrap_or(0);

        tracing::info!(
            messages = todays.len(),
            completed = record.completed,
            elapsed,
            "restoring today's session"
        );
        self.state = SessionState::restore(&record, todays);
        self.timer = Timer::new(elapsed);
        if self.state.phase() == Phase::Active {
            self.timer.start(now.instant);
        }
        Some(Vec::new())
    }

    fn preload(&mut self, custom: Option<CaseContext>) -> Vec<Effect> {
        self.state = SessionState::new(self.custom_case.is_some());
        self.timer = Timer::default();
        self.stream = None;
        self.request = None;
        if let Err(e) = self.state.begin_preload() {
            tracing::error!(error = %e, "fresh session refused to preload");
            return Vec::new();
        }
        vec![Effect::FetchCase { custom }]
    }

    pub fn on_case_loaded(
        &mut self,
        result: Result<CaseContext, ApiError>,
        now: Moment,
    ) -> Vec<Effect> {
        match result {
            Ok(case) => {
                tracing::info!(disease = %case.disease, "case loaded");
                let case_text = case.case.clone();
                if let Err(e) = self.state.case_loaded(case) {
                    tracing::warn!(error = %e, "dropping late case");
                    return Vec::new();
                }
                self.last_error = None;
                if !self.state.is_custom_case() {
                    self.persist("cache case", |store| store.save_case(&case_text));
                }
                if std::mem::take(&mut self.start_when_loaded) {
                    return self.start_game(now).unwrap_or_default();
                }
                Vec::new()
            }
            Err(err) => {
                tracing::error!(error = %err, "case fetch failed");
                self.start_when_loaded = false;
                if let Err(e) = self.state.case_failed() {
                    tracing::warn!(error = %e, "ignoring late case failure");
                    return Vec::new();
                }
                let message = format!("Could not load a case: {err}");
                self.last_error = Some(message.clone());
                vec![Effect::Notify(Notice::Error(message))]
            }
        }
    }

    /// `ReadyToStart -> Active`. Pressed during preload, the start is
    /// deferred until the case arrives.
    pub fn start_game(&mut self, now: Moment) -> Result<Vec<Effect>, TransitionError> {
        if self.state.phase() == Phase::Preloading {
            self.start_when_loaded = true;
            return Ok(Vec::new());
        }
        self.state.start()?;
        self.timer.start(now.instant);
        tracing::info!(custom = self.state.is_custom_case(), "session started");
        self.persist_session();
        self.persist_elapsed();
        Ok(Vec::new())
    }

    pub fn submit_message(
        &mut self,
        text: &str,
        now: Moment,
    ) -> Result<Vec<Effect>, TransitionError> {
        let question = text.trim();
        if question.is_empty() {
            return Ok(Vec::new());
        }
        self.state.push_user_message(question, now.utc)?;
        if !self.timer.is_running() {
            self.timer.start(now.instant);
        }
        self.persist_chat();
        self.stream = Some(StreamParser::new());
        let request = RequestId(self.next_request);
        self.next_request += 1;
        self.request = Some(request);
        tracing::debug!(?request, len = question.len(), "question sent");
        Ok(vec![Effect::Ask {
            request,
            question: question.to_string(),
            context: self.state.to_record(),
        }])
    }

    pub fn on_stream_chunk(
        &mut self,
        request: RequestId,
        chunk: &str,
        now: Moment,
    ) -> Vec<Effect> {
        if !self.accepts_reply(request) {
            return Vec::new();
        }
        let completed = self.state.is_completed();
        let parser = self.stream.get_or_insert_with(StreamParser::new);
        let update = parser.push_chunk(chunk, completed);
        match update.verdict {
            Some(outcome) => self.finish_case(outcome, now),
            None => Vec::new(),
        }
    }

    fn finish_case(&mut self, outcome: Outcome, now: Moment) -> Vec<Effect> {
        self.timer.poll(now.instant);
        if !self.state.complete(outcome) {
            return Vec::new();
        }
        self.timer.stop();
        let final_time = self.timer.elapsed();
        tracing::info!(?outcome, final_time, "case finished");

        let notice = match outcome {
            Outcome::Solved => {
                let summary = streak::record_completion(
                    &mut self.stats,
                    &self.clock,
                    now.utc,
                    final_time,
                    self.state.disease(),
                );
                self.persist_stats();
                Notice::Solved(summary)
            }
            Outcome::Failed => Notice::Failed {
                disease: self.state.disease().map(str::to_string),
            },
        };
        self.persist_session();
        self.persist_elapsed();
        vec![Effect::Notify(notice)]
    }

    pub fn on_stream_finished(&mut self, request: RequestId, now: Moment) -> Vec<Effect> {
        if !self.accepts_reply(request) {
            return Vec::new();
        }
        self.request = None;
        let Some(parser) = self.stream.take() else {
            tracing::warn!("stream finished with no reply in progress");
            return Vec::new();
        };
        let (text, wide) = parser.finish();
        self.state.finish_reply(text, wide, now.utc);
        self.persist_chat();
        self.persist_session();
        vec![Effect::SaveConversation(self.snapshot(now))]
    }

    /// The reply broke off mid-stream. Whatever arrived is kept.
    pub fn on_stream_failed(
        &mut self,
        request: RequestId,
        err: ApiError,
        now: Moment,
    ) -> Vec<Effect> {
        if !self.accepts_reply(request) {
            return Vec::new();
        }
        self.request = None;
        tracing::error!(error = %err, "reply stream failed");
        let partial = self.stream.take().map(StreamParser::finish);
        match partial {
            Some((text, wide)) if !text.is_empty() => {
                self.state.finish_reply(text, wide, now.utc);
                self.persist_chat();
                self.persist_session();
            }
            _ => self.state.abort_request(),
        }
        let message = format!("The reply was cut off: {err}");
        self.last_error = Some(message.clone());
        vec![Effect::Notify(Notice::Error(message))]
    }

    /// The question never got a reply. Input reopens for a manual retry.
    pub fn on_request_failed(&mut self, request: RequestId, err: ApiError) -> Vec<Effect> {
        if !self.accepts_reply(request) {
            return Vec::new();
        }
        tracing::error!(error = %err, "question request failed");
        self.request = None;
        self.stream = None;
        self.state.abort_request();
        let message = format!("Could not reach the patient: {err}");
        self.last_error = Some(message.clone());
        vec![Effect::Notify(Notice::Error(message))]
    }

    /// `Completed -> Preloading` with a fresh session. Also retries a case
    /// fetch that failed.
    pub fn new_random_case(&mut self) -> Result<Vec<Effect>, TransitionError> {
        let retry = self.state.phase() == Phase::Idle && self.state.has_error();
        if !retry && self.state.phase() != Phase::Completed {
            return Err(TransitionError::Illegal {
                from: self.state.phase(),
                action: "request a new case",
            });
        }
        let previous_disease = self.state.disease().map(str::to_string);
        if !self.state.is_custom_case() {
            self.persist("clear finished session", JsonStore::clear_session);
        }
        if let Some(request) = self.request {
            tracing::info!(?request, "abandoning the reply still streaming");
        }
        self.last_error = None;

        if retry {
            let custom = self.custom_case.clone();
            return Ok(self.preload(custom));
        }

        self.preload(None);
        self.start_when_loaded = true;
        tracing::info!(previous = ?previous_disease, "requesting a new random case");
        Ok(vec![Effect::FetchRandomCase { previous_disease }])
    }

    /// Drive the timer from the event loop's tick.
    pub fn tick(&mut self, now: Instant) {
        if self.timer.poll(now) > 0 {
            self.persist_elapsed();
        }
    }

    pub fn set_focused(&mut self, now: Instant, focused: bool) {
        if self.timer.set_focused(now, focused) > 0 {
            self.persist_elapsed();
        }
    }

    pub fn set_player_role(&mut self, role: &str) {
        let role = role.trim();
        if role.is_empty() {
            return;
        }
        self.player_role = Some(role.to_string());
        self.persist("save player role", |store| store.save_player_role(role));
    }

    pub fn snapshot(&self, now: Moment) -> ConversationSnapshot {
        let today = format_day_key(self.clock.today(now.utc));
        let conversation = self
            .state
            .messages()
            .iter()
            .map(|m| {
                let who = match m.role {
                    Role::User => "User",
                    Role::Patient => "AI",
                };
                format!("{who}: {}", m.text).trim().to_string()
            })
            .collect::<Vec<_>>()
            .join("\n");
        ConversationSnapshot {
            training_level: self
                .player_role
                .clone()
                .unwrap_or_else(|| UNKNOWN_ROLE.to_string()),
            date: today.clone(),
            disease: self.state.disease().map(str::to_string),
            daily_streak: self.stats.consecutive_play_streak,
            games_played: self.stats.game_history.len(),
            games_completed: self.stats.games_completed,
            last_played: self.stats.last_played.map(format_day_key).unwrap_or(today),
            elapsed_time: self.timer.elapsed(),
            conversation,
        }
    }

    fn persist<F>(&self, what: &'static str, write: F)
    where
        F: FnOnce(&JsonStore) -> Result<()>,
    {
        if let Some(store) = self.store.as_ref()
            && let Err(e) = write(store)
        {
            tracing::warn!(error = %e, "failed to {what}");
        }
    }

    fn persist_stats(&self) {
        self.persist("save stats", |store| store.save_user_stats(&self.stats));
    }

    fn persist_chat(&self) {
        if self.state.is_custom_case() {
            return;
        }
        self.persist("save chat history", |store| {
            store.save_chat_history(self.state.messages())
        });
    }

    fn persist_session(&self) {
        if self.state.is_custom_case() {
            return;
        }
        let record = self.state.to_record();
        self.persist("save session", |store| store.save_session_record(&record));
    }

    fn persist_elapsed(&self) {
        if self.state.is_custom_case() {
            return;
        }
        let elapsed = self.timer.elapsed();
        self.persist("save elapsed time", |store| store.save_elapsed_time(elapsed));
    }
}
