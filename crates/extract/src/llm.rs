use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse failure category reported by an LLM backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Throttled or out of quota; worth retrying after a cooldown.
    RateLimited,
    Transport,
    Http,
    EmptyResponse,
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LlmErrorKind::RateLimited => "rate limited",
            LlmErrorKind::Transport => "transport error",
            LlmErrorKind::Http => "http error",
            LlmErrorKind::EmptyResponse => "empty response",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::RateLimited, message)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind == LlmErrorKind::RateLimited
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(LlmErrorKind::Transport, err.to_string())
    }
}

/// Text-in, text-out language model.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    system_instruction: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str, // force JSON output
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    status: Option<String>,
    message: Option<String>,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model,
            api_key,
            temperature: 0.2,
            system_instruction: None,
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction.filter(|s| !s.trim().is_empty());
        self
    }

    fn classify_failure(status: reqwest::StatusCode, body: &str) -> LlmError {
        let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
        let api_status = envelope.as_ref().and_then(|e| e.error.status.as_deref());
        let message = envelope
            .as_ref()
            .and_then(|e| e.error.message.clone())
            .unwrap_or_else(|| body.chars().take(300).collect());

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || api_status == Some("RESOURCE_EXHAUSTED")
        {
            LlmError::rate_limited(format!("{}: {}", status, message))
        } else {
            LlmError::new(LlmErrorKind::Http, format!("{}: {}", status, message))
        }
    }
}

#[async_trait]
impl LlmBackend for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: self.system_instruction.as_deref().map(|text| Content {
                parts: vec![Part { text }],
            }),
            generation_config: GenerationConfig {
                temperature: self.temperature,
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_failure(status, &body));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(LlmError::new(
                LlmErrorKind::EmptyResponse,
                "Gemini returned no text",
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(
            reqwest::Client::new(),
            "test-key".to_string(),
            "gemini-1.5-flash".to_string(),
        )
        .with_base_url(&server.uri())
    }

    #[tokio::test]
    async fn generate_returns_candidate_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"parts": [{"text": "hello"}]}],
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "{\"score\": 9}"}]}}]
            })))
            .mount(&server)
            .await;

        let text = client(&server).generate("hello").await.unwrap();
        assert_eq!(text, "{\"score\": 9}");
    }

    #[tokio::test]
    async fn system_instruction_is_sent_when_set() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "systemInstruction": {"parts": [{"text": "You are a Research Scout."}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "{}"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .with_system_instruction(Some("You are a Research Scout.".to_string()))
            .generate("x")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn status_429_is_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"code": 429, "status": "RESOURCE_EXHAUSTED", "message": "Quota exceeded"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).generate("x").await.unwrap_err();
        assert!(err.is_rate_limited());
        assert!(err.message.contains("Quota exceeded"));
    }

    #[tokio::test]
    async fn resource_exhausted_body_is_rate_limited_regardless_of_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"code": 403, "status": "RESOURCE_EXHAUSTED", "message": "daily quota"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).generate("x").await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn other_failures_are_permanent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": 400, "status": "INVALID_ARGUMENT", "message": "bad model"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).generate("x").await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Http);
    }

    #[tokio::test]
    async fn empty_candidates_are_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})))
            .mount(&server)
            .await;

        let err = client(&server).generate("x").await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::EmptyResponse);
    }
}
