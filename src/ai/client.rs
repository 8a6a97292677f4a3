use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::prompts;
use super::service::{CompletionService, SuggestedCode};
use super::AiError;
use crate::models::CodingSystem;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "medgemma:latest";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// HTTP client for an Ollama-style local inference endpoint.
pub struct HttpCompletionClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpCompletionClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AiError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    /// Endpoint and model from `CODALIS_AI_URL` / `CODALIS_AI_MODEL`,
    /// falling back to the local defaults.
    pub fn from_env() -> Result<Self, AiError> {
        let base_url =
            std::env::var("CODALIS_AI_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model =
            std::env::var("CODALIS_AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(&base_url, &model, DEFAULT_TIMEOUT_SECS)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn generate(
        &self,
        prompt: &str,
        system: &str,
        images: Option<Vec<String>>,
    ) -> Result<String, AiError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            images,
        };

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_connect() {
                AiError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                AiError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                AiError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AiError::MalformedResponse(e.to_string()))?;

        Ok(parsed.response)
    }
}

/// Request body for /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

/// Response body from /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn extract_concepts(&self, document_text: &str) -> Result<Vec<String>, AiError> {
        let response = self
            .generate(&prompts::concepts_prompt(document_text), prompts::CONCEPTS_SYSTEM, None)
            .await?;
        parse_concepts(&response)
    }

    async fn suggest_diagnoses(
        &self,
        clinical_text: &str,
        coding_system: CodingSystem,
    ) -> Result<Vec<SuggestedCode>, AiError> {
        let response = self
            .generate(
                &prompts::diagnoses_prompt(clinical_text, coding_system),
                prompts::DIAGNOSES_SYSTEM,
                None,
            )
            .await?;
        parse_suggested_codes(&response)
    }

    async fn extract_text_from_document(
        &self,
        data_uri: &str,
        mime_type: &str,
    ) -> Result<String, AiError> {
        let image = data_uri_payload(data_uri)?.to_string();
        let response = self
            .generate(
                &prompts::extract_text_prompt(mime_type),
                prompts::DOCUMENT_SYSTEM,
                Some(vec![image]),
            )
            .await?;
        Ok(response.trim().to_string())
    }

    async fn condense_extensive_document(
        &self,
        data_uri: &str,
        mime_type: &str,
    ) -> Result<String, AiError> {
        let image = data_uri_payload(data_uri)?.to_string();
        let response = self
            .generate(
                &prompts::condense_prompt(mime_type),
                prompts::DOCUMENT_SYSTEM,
                Some(vec![image]),
            )
            .await?;
        Ok(response.trim().to_string())
    }

    async fn summarize_clinical_notes(&self, clinical_text: &str) -> Result<String, AiError> {
        let response = self
            .generate(&prompts::summary_prompt(clinical_text), prompts::SUMMARY_SYSTEM, None)
            .await?;
        Ok(response.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

fn parse_concepts(response: &str) -> Result<Vec<String>, AiError> {
    let json = extract_json_array(response)?;
    serde_json::from_str::<Vec<String>>(json)
        .map_err(|e| AiError::MalformedResponse(format!("concept list: {e}")))
}

fn parse_suggested_codes(response: &str) -> Result<Vec<SuggestedCode>, AiError> {
    let json = extract_json_array(response)?;
    serde_json::from_str::<Vec<SuggestedCode>>(json)
        .map_err(|e| AiError::MalformedResponse(format!("diagnosis list: {e}")))
}

/// Locate the JSON array in a model response.
///
/// Accepts a bare array, a ```json fenced block, or an array embedded in
/// surrounding prose (first `[` to last `]`).
fn extract_json_array(response: &str) -> Result<&str, AiError> {
    let trimmed = response.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        return Ok(trimmed);
    }

    let body = match trimmed.find("```json") {
        Some(fence_start) => {
            let content_start = fence_start + 7;
            let content_end = trimmed[content_start..]
                .find("```")
                .ok_or_else(|| AiError::MalformedResponse("Unclosed JSON block".into()))?;
            trimmed[content_start..content_start + content_end].trim()
        }
        None => trimmed,
    };

    let start = body
        .find('[')
        .ok_or_else(|| AiError::MalformedResponse("No JSON array found".into()))?;
    let end = body
        .rfind(']')
        .ok_or_else(|| AiError::MalformedResponse("Unterminated JSON array".into()))?;
    if end < start {
        return Err(AiError::MalformedResponse("No JSON array found".into()));
    }
    Ok(&body[start..=end])
}

/// Strip the `data:<mime>;base64,` prefix from a data URI.
fn data_uri_payload(data_uri: &str) -> Result<&str, AiError> {
    data_uri
        .split_once("base64,")
        .map(|(_, payload)| payload)
        .ok_or_else(|| AiError::MalformedResponse("Not a base64 data URI".into()))
}
