//! GeminiGenerator - Google Generative Language API
//!
//! `POST /v1beta/models/<model>:generateContent` を 1 回呼ぶだけの薄い実装。
//! API キーは URL ではなく `x-goog-api-key` ヘッダで渡します（エラー文に URL が載るため）。
//! リトライはしません（失敗は呼び出し側がタスク状態として扱う）。

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::ports::{GenerationError, Generator};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiGenerator {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, GenerationError> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, timeout)
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [
            { "role": "user", "parts": [ { "text": prompt } ] }
        ]
    })
}

/// `candidates[0].content.parts[*].text` を連結して返す
fn extract_text(response: &Value) -> Result<String, GenerationError> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown Gemini API error");
        return Err(GenerationError::Rejected {
            status: error.get("code").and_then(Value::as_u64).unwrap_or(0) as u16,
            body: message.to_string(),
        });
    }

    let candidate = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .ok_or_else(|| GenerationError::Empty("no candidates".to_string()))?;

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("no text parts");
        return Err(GenerationError::Empty(reason.to_string()));
    }
    Ok(text)
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        debug!(model, prompt_len = prompt.len(), "gemini generateContent");

        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.timeout)
                } else {
                    GenerationError::Unavailable(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Unavailable(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(GenerationError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| GenerationError::Empty(format!("unparseable response: {e}")))?;
        extract_text(&parsed)
    }
}
