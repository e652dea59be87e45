use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::{
    ApiError, AskRequest, CaseApi, CaseContext, CaseResponse, ConversationSnapshot,
    GenerateCaseRequest, NewRandomCaseRequest, ReplyStream, ShareableCase, StartGameRequest,
    SubmitCaseRequest,
};

/// Blocking HTTP transport. Callers run it off the UI thread.
pub struct HttpCaseApi {
    client: Client,
    base_url: String,
}

impl HttpCaseApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        // The reply stream can legitimately run long; only connecting is bounded.
        let client = Client::builder().connect_timeout(timeout).timeout(None::<Duration>).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, ApiError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "POST");
        let response = self.client.post(&url).json(body).send()?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "request rejected");
            return Err(ApiError::Status(status.as_u16()));
        }
        Ok(response)
    }

    fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let text = self.post(path, body)?.text()?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl CaseApi for HttpCaseApi {
    fn start_game(&self, custom: Option<&CaseContext>) -> Result<CaseContext, ApiError> {
        let path = if custom.is_some() {
            "/start_custom_game"
        } else {
            "/start_game"
        };
        let body = StartGameRequest {
            custom_patient_context: custom,
        };
        self.post_json::<_, CaseResponse>(path, &body)?.into_case()
    }

    fn new_random_case(&self, previous_disease: Option<&str>) -> Result<CaseContext, ApiError> {
        let body = NewRandomCaseRequest { previous_disease };
        self.post_json::<_, CaseResponse>("/new_random_case", &body)?
            .into_case()
    }

    fn ask(&self, request: &AskRequest<'_>) -> Result<ReplyStream, ApiError> {
        let response = self.post("/ask_llm", request)?;
        Ok(Box::new(response))
    }

    fn save_conversation(&self, snapshot: &ConversationSnapshot) -> Result<(), ApiError> {
        self.post("/save_conversation", snapshot)?;
        Ok(())
    }

    fn submit_case(&self, request: &SubmitCaseRequest<'_>) -> Result<String, ApiError> {
        self.post_json::<_, ShareableCase>("/submit_case", request)?
            .into_url()
    }

    fn generate_case_by_criteria(
        &self,
        request: &GenerateCaseRequest<'_>,
    ) -> Result<String, ApiError> {
        self.post_json::<_, ShareableCase>("/generate_case_by_criteria", request)?
            .into_url()
    }
}
