pub mod types;

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::cleaner::CleanedText;
use crate::prompts;
use crate::retry::{self, Policy};

pub use types::{
    Content, GenerateRequest, GenerateResponse, GenerationConfig, GeminiError, DEFAULT_MODEL,
    GEMINI_API_URL,
};

/// Terminal artifact of the pipeline, one per summarized page.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryResult {
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub summary: String,
    pub model: String,
    pub latency_ms: i64,
    pub generated_at: DateTime<Utc>,
}

/// Client for the Gemini generateContent API, authenticated by API key.
/// Constructed explicitly and passed down; there is no global instance.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    temperature: f32,
    policy: Policy,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            policy: Policy::exponential(3, Duration::from_millis(2_000)),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_retry(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Summarize one cleaned page. Transient API failures are retried with
    /// exponential backoff; terminal errors surface immediately.
    pub async fn summarize(&self, cleaned: &CleanedText) -> Result<SummaryResult, GeminiError> {
        let prompt =
            prompts::summary_prompt(cleaned.title.as_deref(), &cleaned.source_url, &cleaned.text);
        let request = GenerateRequest {
            contents: vec![Content::user(&prompt)],
            system_instruction: Some(Content::system(prompts::SYSTEM_INSTRUCTION)),
            generation_config: Some(GenerationConfig {
                temperature: Some(self.temperature),
                max_output_tokens: None,
            }),
        };

        let started = Instant::now();
        let response = retry::run(self.policy, "generateContent", || {
            self.generate(&request)
        })
        .await?;
        let latency_ms = started.elapsed().as_millis() as i64;

        let summary = response
            .text()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| GeminiError::Parse("no text candidate in response".into()))?
            .to_string();

        if let Some(usage) = &response.usage_metadata {
            debug!(
                "Summarized {} in {}ms ({} tokens)",
                cleaned.source_url, latency_ms, usage.total_token_count
            );
        }

        Ok(SummaryResult {
            source_url: cleaned.source_url.clone(),
            title: cleaned.title.clone(),
            summary,
            model: self.model.clone(),
            latency_ms,
            generated_at: Utc::now(),
        })
    }

    /// One round trip to `models/<model>:generateContent`, no retries.
    pub async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, GeminiError> {
        let url = format!("{}/{}:generateContent", GEMINI_API_URL, self.model);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| GeminiError::Parse(e.to_string()))
    }

    /// Cheap credential check: one token in, at most a few tokens out.
    pub async fn verify(&self) -> Result<(), GeminiError> {
        let request = GenerateRequest {
            contents: vec![Content::user("Hello")],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                temperature: Some(0.0),
                max_output_tokens: Some(10),
            }),
        };
        self.generate(&request).await?;
        info!("Gemini credentials verified for model {}", self.model);
        Ok(())
    }
}

/// Pull the human-readable message out of the API error envelope
/// `{"error": {"message": ...}}`, falling back to the raw body.
fn extract_error_message(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")?
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });
    match message {
        Some(m) => m,
        None => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no error body".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_uses_default_model() {
        let client = GeminiClient::new("test-key".into());
        assert_eq!(client.model(), DEFAULT_MODEL);
    }

    #[test]
    fn with_model_overrides_default() {
        let client = GeminiClient::new("test-key".into()).with_model("gemini-2.5-pro");
        assert_eq!(client.model(), "gemini-2.5-pro");
    }

    #[test]
    fn extracts_message_from_error_envelope() {
        let body = r#"{"error": {"code": 401, "message": "API key not valid", "status": "UNAUTHENTICATED"}}"#;
        assert_eq!(extract_error_message(body), "API key not valid");
    }

    #[test]
    fn falls_back_to_raw_body() {
        assert_eq!(extract_error_message("Service Unavailable"), "Service Unavailable");
        assert_eq!(extract_error_message("  "), "no error body");
    }

    #[test]
    fn summary_result_serializes_without_empty_title() {
        let result = SummaryResult {
            source_url: "https://example.com".into(),
            title: None,
            summary: "A summary.".into(),
            model: DEFAULT_MODEL.into(),
            latency_ms: 1200,
            generated_at: Utc::now(),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("title"));
        assert!(json.contains(r#""latency_ms":1200"#));
    }
}
