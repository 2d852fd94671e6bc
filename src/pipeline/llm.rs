//! Structured-output LLM client.
//!
//! The gateway talks to an OpenAI-compatible chat completions endpoint
//! and constrains the response with a JSON schema. Everything that can go
//! wrong on the wire (network, HTTP status, rate limits, upstream auth)
//! collapses into `LlmError::CallFailed`; only the deadline is its own
//! variant because it maps to a different HTTP status. No retries happen
//! here; the coordinator decides.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM call failed: {0}")]
    CallFailed(String),

    #[error("LLM call timed out after {0}s")]
    Timeout(u64),
}

/// One structured-output chat invocation.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub seed: i64,
    pub schema_name: String,
    pub schema: Value,
}

/// Parsed-out result: the raw JSON content plus usage accounting.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub content: String,
    pub tokens_used: i64,
    pub elapsed_ms: i64,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatOutcome, LlmError>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout_secs,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.openai_base_url,
            &settings.openai_api_key,
            settings.llm_timeout_secs,
        )
    }

    fn build_body(request: &ChatRequest) -> Value {
        json!({
            "model": request.model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt},
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "seed": request.seed,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "strict": true,
                    "schema": request.schema,
                },
            },
        })
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChatOutcome, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(request);

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::CallFailed(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let reason = match status.as_u16() {
                401 | 403 => format!("upstream authentication rejected ({status})"),
                429 => format!("rate limited by upstream ({detail})"),
                _ => format!("HTTP {status}: {detail}"),
            };
            return Err(LlmError::CallFailed(reason));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::CallFailed(format!("unparseable response: {e}")))?;
        let elapsed_ms = started.elapsed().as_millis() as i64;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::CallFailed("response carried no content".into()))?;

        Ok(ChatOutcome {
            content,
            tokens_used: parsed.usage.map(|u| u.total_tokens).unwrap_or(0),
            elapsed_ms,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatOutcome, LlmError> {
        let deadline = Duration::from_secs(self.timeout_secs);
        match tokio::time::timeout(deadline, self.send(&request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout_secs)),
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: i64,
}

// ── Mock client for tests ───────────────────────────────────

enum MockBehavior {
    Respond(String),
    Fail(String),
    TimeOut(u64),
}

/// Mock LLM client: returns a configured response (or failure) and
/// records every request so tests can assert on prompts and seeds.
pub struct MockLlmClient {
    behavior: MockBehavior,
    calls: Mutex<Vec<ChatRequest>>,
}

impl MockLlmClient {
    pub fn new(content: &str) -> Self {
        Self {
            behavior: MockBehavior::Respond(content.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            behavior: MockBehavior::Fail(reason.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn timing_out(secs: u64) -> Self {
        Self {
            behavior: MockBehavior::TimeOut(secs),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn seeds_seen(&self) -> Vec<i64> {
        self.requests().iter().map(|r| r.seed).collect()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatOutcome, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request);
        }
        match &self.behavior {
            MockBehavior::Respond(content) => Ok(ChatOutcome {
                content: content.clone(),
                tokens_used: 128,
                elapsed_ms: 7,
            }),
            MockBehavior::Fail(reason) => Err(LlmError::CallFailed(reason.clone())),
            MockBehavior::TimeOut(secs) => Err(LlmError::Timeout(*secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(seed: i64) -> ChatRequest {
        ChatRequest {
            system_prompt: "system".into(),
            user_prompt: "user".into(),
            model: "gpt-4o".into(),
            temperature: 0.7,
            max_tokens: 2000,
            seed,
            schema_name: "treatment_summary_output".into(),
            schema: json!({"type": "object"}),
        }
    }

    #[test]
    fn body_carries_schema_and_seed() {
        let body = OpenAiClient::build_body(&request(42));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["seed"], 42);
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(
            body["response_format"]["json_schema"]["name"],
            "treatment_summary_output"
        );
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user");
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = OpenAiClient::new("https://api.openai.com/v1/", "key", 30);
        assert_eq!(client.base_url, "https://api.openai.com/v1");
    }

    #[tokio::test]
    async fn mock_returns_configured_content() {
        let mock = MockLlmClient::new(r#"{"title": "t", "summary": "s"}"#);
        let outcome = mock.complete(request(42)).await.unwrap();
        assert_eq!(outcome.content, r#"{"title": "t", "summary": "s"}"#);
        assert_eq!(outcome.tokens_used, 128);
    }

    #[tokio::test]
    async fn mock_records_seeds() {
        let mock = MockLlmClient::new("{}");
        mock.complete(request(42)).await.unwrap();
        mock.complete(request(43)).await.unwrap();
        assert_eq!(mock.seeds_seen(), vec![42, 43]);
    }

    #[tokio::test]
    async fn mock_failure_modes() {
        let failing = MockLlmClient::failing("boom");
        let err = failing.complete(request(42)).await.unwrap_err();
        assert!(matches!(err, LlmError::CallFailed(reason) if reason == "boom"));

        let slow = MockLlmClient::timing_out(30);
        let err = slow.complete(request(42)).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(30)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_surfaces_call_failed() {
        // Nothing listens on this port; connection is refused immediately.
        let client = OpenAiClient::new("http://127.0.0.1:9", "key", 5);
        let err = client.complete(request(42)).await.unwrap_err();
        assert!(matches!(err, LlmError::CallFailed(_)));
    }
}
