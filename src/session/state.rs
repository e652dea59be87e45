use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::CaseContext;
use crate::store::schema::SessionRecord;

pub const STARTING_ATTEMPTS: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Preloading,
    ReadyToStart,
    Active,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Solved,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "llm", alias = "patient")]
    Patient,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    #[serde(rename = "type")]
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    /// Verdicts and lab reports render full width. Absent in older histories.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub wide: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} while the session is {from:?}")]
    Illegal { from: Phase, action: &'static str },
    #[error("the case failed to load; request a new case to try again")]
    CaseUnavailable,
    #[error("still waiting on the previous reply")]
    Busy,
}

/// One diagnostic case from preload through completion.
#[derive(Clone, Debug)]
pub struct SessionState {
    phase: Phase,
    outcome: Option<Outcome>,
    attempts_remaining: u32,
    case: Option<CaseContext>,
    messages: Vec<ChatMessage>,
    /// `"User: ..."` / `"Patient: ..."` lines the server reads as context.
    transcript: Vec<String>,
    pending_question: Option<String>,
    is_custom_case: bool,
    error_flag: bool,
    in_flight: bool,
}

impl SessionState {
    pub fn new(is_custom_case: bool) -> Self {
        Self {
            phase: Phase::Idle,
            outcome: None,
            attempts_remaining: STARTING_ATTEMPTS,
            case: None,
            messages: Vec::new(),
            transcript: Vec::new(),
            pending_question: None,
            is_custom_case,
            error_flag: false,
            in_flight: false,
        }
    }

    /// Rebuild a same-day session straight into `Active` or `Completed`.
    pub fn restore(record: &SessionRecord, messages: Vec<ChatMessage>) -> Self {
        let completed = record.completed;
        Self {
            phase: if completed { Phase::Completed } else { Phase::Active },
            outcome: if completed {
                Some(record.outcome.unwrap_or(Outcome::Solved))
            } else {
                None
            },
            attempts_remaining: record.attempts,
            case: Some(record.case_context()),
            messages,
            transcript: record.history.clone(),
            pending_question: None,
            is_custom_case: record.custom,
            error_flag: false,
            in_flight: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.attempts_remaining
    }

    pub fn case(&self) -> Option<&CaseContext> {
        self.case.as_ref()
    }

    pub fn disease(&self) -> Option<&str> {
        self.case.as_ref().map(|c| c.disease.as_str())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_custom_case(&self) -> bool {
        self.is_custom_case
    }

    pub fn has_error(&self) -> bool {
        self.error_flag
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    /// Whether a new user message would be accepted right now.
    pub fn accepts_input(&self) -> bool {
        self.phase == Phase::Active && !self.in_flight
    }

    pub fn begin_preload(&mut self) -> Result<(), TransitionError> {
        self.expect_phase(Phase::Idle, "load a case")?;
        self.error_flag = false;
        self.phase = Phase::Preloading;
        Ok(())
    }

    pub fn case_loaded(&mut self, case: CaseContext) -> Result<(), TransitionError> {
        self.expect_phase(Phase::Preloading, "accept a case")?;
        self.case = Some(case);
        self.phase = Phase::ReadyToStart;
        Ok(())
    }

    pub fn case_failed(&mut self) -> Result<(), TransitionError> {
        self.expect_phase(Phase::Preloading, "fail a case load")?;
        self.error_flag = true;
        self.phase = Phase::Idle;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        if self.phase == Phase::Idle && self.error_flag {
            return Err(TransitionError::CaseUnavailable);
        }
        self.expect_phase(Phase::ReadyToStart, "start")?;
        self.phase = Phase::Active;
        Ok(())
    }

    /// Record the player's message and mark a request in flight.
    pub fn push_user_message(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.expect_phase(Phase::Active, "send a message")?;
        if self.in_flight {
            return Err(TransitionError::Busy);
        }
        self.messages.push(ChatMessage {
            text: text.to_string(),
            role: Role::User,
            timestamp: now,
            wide: false,
        });
        self.pending_question = Some(text.to_string());
        self.in_flight = true;
        Ok(())
    }

    /// Close out the in-flight request with the patient's reply. Allowed after
    /// completion because the reply that ends the case is still streaming then.
    pub fn finish_reply(&mut self, text: String, wide: bool, now: DateTime<Utc>) {
        if let Some(question) = self.pending_question.take() {
            self.transcript.push(format!("User: {question}"));
        }
        self.transcript.push(format!("Patient: {text}"));
        self.messages.push(ChatMessage {
            text,
            role: Role::Patient,
            timestamp: now,
            wide,
        });
        self.in_flight = false;
    }

    /// The request failed before any reply arrived.
    pub fn abort_request(&mut self) {
        self.pending_question = None;
        self.in_flight = false;
    }

    /// `Active -> Completed`. Returns false, changing nothing, unless the
    /// session is active, so a second terminal marker cannot fire twice.
    pub fn complete(&mut self, outcome: Outcome) -> bool {
        if self.phase != Phase::Active {
            return false;
        }
        if outcome == Outcome::Failed {
            self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
        }
        self.outcome = Some(outcome);
        self.phase = Phase::Completed;
        true
    }

    pub fn to_record(&self) -> SessionRecord {
        let case = self.case.clone().unwrap_or_default();
        SessionRecord {
            disease: case.disease,
            case: case.case,
            placeholder_snippet: case.placeholder_snippet,
            attempts: self.attempts_remaining,
            completed: self.is_completed(),
            outcome: self.outcome,
            history: self.transcript.clone(),
            custom: self.is_custom_case,
        }
    }

    fn expect_phase(&self, expected: Phase, action: &'static str) -> Result<(), TransitionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(TransitionError::Illegal {
                from: self.phase,
                action,
            })
        }
    }
}
