//! Request/response contracts of the game server and the transport seam.

pub mod decoder;
#[cfg(feature = "network")]
pub mod http;

use std::io::Read;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::schema::SessionRecord;

#[derive(Debug, Error)]
pub enum ApiError {
    #[cfg(feature = "network")]
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered with HTTP {0}")]
    Status(u16),
    #[error("server reported an error: {0}")]
    Server(String),
    #[error("response carried no {0}")]
    Missing(&'static str),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("stream read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The scenario the server picked: opaque to the client apart from display.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseContext {
    pub disease: String,
    pub case: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder_snippet: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartGameRequest<'a> {
    pub custom_patient_context: Option<&'a CaseContext>,
}

#[derive(Debug, Serialize)]
pub struct NewRandomCaseRequest<'a> {
    pub previous_disease: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct CaseResponse {
    #[serde(default)]
    pub patient_context: Option<CaseContext>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CaseResponse {
    pub fn into_case(self) -> Result<CaseContext, ApiError> {
        if let Some(error) = self.error {
            return Err(ApiError::Server(error));
        }
        self.patient_context.ok_or(ApiError::Missing("patient_context"))
    }
}

#[derive(Debug, Serialize)]
pub struct AskRequest<'a> {
    pub question: &'a str,
    pub patient_context: &'a SessionRecord,
}

/// Best-effort telemetry sent after each reply.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationSnapshot {
    pub training_level: String,
    pub date: String,
    pub disease: Option<String>,
    pub daily_streak: u32,
    pub games_played: usize,
    pub games_completed: u32,
    pub last_played: String,
    pub elapsed_time: u64,
    pub conversation: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitCaseRequest<'a> {
    pub disease: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Serialize)]
pub struct GenerateCaseRequest<'a> {
    pub chief_complaint: &'a str,
    pub specialty: &'a str,
}

/// Reply of both case-authoring endpoints.
#[derive(Debug, Deserialize)]
pub struct ShareableCase {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

impl ShareableCase {
    pub fn into_url(self) -> Result<String, ApiError> {
        match (self.success, self.url) {
            (Some(false), _) | (_, None) => Err(ApiError::Server(
                self.message
                    .unwrap_or_else(|| "case could not be created".to_string()),
            )),
            (_, Some(url)) => Ok(url),
        }
    }
}

/// Streamed reply body. Read until EOF; chunk boundaries are arbitrary.
pub type ReplyStream = Box<dyn Read + Send>;

pub trait CaseApi: Send + Sync {
    /// `/start_game`, or `/start_custom_game` when a custom context is given.
    fn start_game(&self, custom: Option<&CaseContext>) -> Result<CaseContext, ApiError>;
    fn new_random_case(&self, previous_disease: Option<&str>) -> Result<CaseContext, ApiError>;
    fn ask(&self, request: &AskRequest<'_>) -> Result<ReplyStream, ApiError>;
    fn save_conversation(&self, snapshot: &ConversationSnapshot) -> Result<(), ApiError>;
    fn submit_case(&self, request: &SubmitCaseRequest<'_>) -> Result<String, ApiError>;
    fn generate_case_by_criteria(&self, request: &GenerateCaseRequest<'_>)
    -> Result<String, ApiError>;
}
