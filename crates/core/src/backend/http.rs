use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    backend::GenerationBackend,
    config::{Config, GenerationProfile},
    error::GenerationError,
    provider::{Provider, ProviderError},
    types::ProfileKind,
};

const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Delay before retry number `attempt` (1-based).
fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_BASE.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

/// Chat-completions backend for any OpenAI-compatible provider.
pub struct HttpGenerationBackend {
    client: reqwest::Client,
    provider: Provider,
    api_key: String,
    model: String,
    kind: ProfileKind,
    profile: GenerationProfile,
}

impl HttpGenerationBackend {
    pub fn new(
        provider: Provider,
        api_key: String,
        model: impl Into<String>,
        kind: ProfileKind,
        profile: GenerationProfile,
        request_timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GenerationError::Backend {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            provider,
            api_key,
            model: model.into(),
            kind,
            profile,
        })
    }

    /// Build the backend for `kind` from config, reading the API key from the environment.
    pub fn from_config(cfg: &Config, kind: ProfileKind) -> Result<Self, BackendSetupError> {
        let provider = cfg.generation.provider;
        let api_key = provider.api_key_from_env()?;
        let profile = match kind {
            ProfileKind::Standard => cfg.generation.standard.clone(),
            ProfileKind::Conservative => cfg.generation.conservative.clone(),
        };
        Ok(Self::new(
            provider,
            api_key,
            cfg.generation.model(),
            kind,
            profile,
            cfg.job.generation_timeout(),
        )?)
    }

    fn request_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt,
                },
            ],
            "temperature": self.profile.temperature,
            "max_tokens": self.profile.max_output_tokens,
        });

        if self.provider.supports_safety_settings() {
            let settings: Vec<Value> = self
                .profile
                .safety
                .categories()
                .iter()
                .map(|(category, threshold)| {
                    json!({ "category": category, "threshold": threshold.as_api_str() })
                })
                .collect();
            body["extra_body"] = json!({ "google": { "safety_settings": settings } });
        }

        body
    }

    async fn send_once(&self, body: &Value) -> Attempt {
        let response = self
            .client
            .post(self.provider.config().api_url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Attempt::Done(Err(GenerationError::Timeout)),
            Err(e) => return Attempt::Retry(format!("request failed: {e}")),
        };

        let status = response.status();
        match response.text().await {
            Ok(text) => interpret(status, &text),
            Err(e) if e.is_timeout() => Attempt::Done(Err(GenerationError::Timeout)),
            Err(e) => Attempt::Retry(format!("failed to read response: {e}")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendSetupError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    fn profile(&self) -> ProfileKind {
        self.kind
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = self.request_body(prompt);
        let mut attempt = 0u32;

        loop {
            match self.send_once(&body).await {
                Attempt::Done(result) => return result,
                Attempt::Retry(message) if attempt < self.profile.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(attempt);
                    warn!(
                        provider = self.provider.name(),
                        profile = self.kind.name(),
                        attempt,
                        ?delay,
                        "transient generation failure, retrying: {message}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Attempt::Retry(message) => {
                    return Err(GenerationError::Backend { message });
                }
            }
        }
    }
}

#[derive(Debug)]
enum Attempt {
    Done(Result<String, GenerationError>),
    Retry(String),
}

/// Map a provider response onto the tagged generation outcome.
fn interpret(status: StatusCode, body: &str) -> Attempt {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Attempt::Retry(format!("{status}: {}", error_message(parsed.as_ref(), body)));
    }

    if !status.is_success() {
        let message = error_message(parsed.as_ref(), body);
        if is_safety_message(&message) {
            return Attempt::Done(Err(GenerationError::ContentSafetyRejected { reason: message }));
        }
        return Attempt::Done(Err(GenerationError::Backend {
            message: format!("{status}: {message}"),
        }));
    }

    let Some(response) = parsed else {
        return Attempt::Done(Err(GenerationError::Backend {
            message: format!("malformed response: {}", truncate(body, 200)),
        }));
    };

    let block_reason = response
        .pointer("/prompt_feedback/block_reason")
        .or_else(|| response.pointer("/promptFeedback/blockReason"))
        .and_then(Value::as_str);
    if let Some(reason) = block_reason {
        return Attempt::Done(Err(GenerationError::ContentSafetyRejected {
            reason: format!("prompt blocked: {reason}"),
        }));
    }

    let choice = &response["choices"][0];
    if let Some(finish) = choice["finish_reason"].as_str() {
        let finish = finish.to_ascii_lowercase();
        if finish == "content_filter" || finish == "safety" {
            return Attempt::Done(Err(GenerationError::ContentSafetyRejected {
                reason: format!("finish_reason={finish}"),
            }));
        }
    }

    match choice["message"]["content"].as_str().map(str::trim) {
        Some(text) if !text.is_empty() => {
            debug!(chars = text.len(), "generation succeeded");
            Attempt::Done(Ok(text.to_string()))
        }
        _ => Attempt::Done(Err(GenerationError::Backend {
            message: format!("response has no text: {}", truncate(body, 200)),
        })),
    }
}

fn error_message(parsed: Option<&Value>, raw: &str) -> String {
    let from_json = parsed.and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.pointer("/0/error/message"))
            .and_then(Value::as_str)
    });
    from_json
        .map(str::to_string)
        .unwrap_or_else(|| truncate(raw, 300))
}

fn is_safety_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content policy")
        || lower.contains("content_filter")
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_delay(1), Duration::from_millis(500));
        assert_eq!(backoff_delay(3), Duration::from_secs(2));
        assert!(backoff_delay(40) >= backoff_delay(10));
    }

    fn done(a: Attempt) -> Result<String, GenerationError> {
        match a {
            Attempt::Done(r) => r,
            Attempt::Retry(m) => panic!("unexpected retry: {m}"),
        }
    }

    #[test]
    fn extracts_message_content() {
        let body = r#"{"choices":[{"message":{"content":"  A summary. "},"finish_reason":"stop"}]}"#;
        assert_eq!(done(interpret(StatusCode::OK, body)).unwrap(), "A summary.");
    }

    #[test]
    fn content_filter_finish_is_safety_rejection() {
        let body = r#"{"choices":[{"message":{"content":null},"finish_reason":"content_filter"}]}"#;
        let err = done(interpret(StatusCode::OK, body)).unwrap_err();
        assert!(err.is_safety_rejection());
    }

    #[test]
    fn prompt_block_reason_is_safety_rejection() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert!(done(interpret(StatusCode::OK, body)).unwrap_err().is_safety_rejection());
    }

    #[test]
    fn error_body_mentioning_safety_is_classified() {
        let body = r#"{"error":{"message":"Response was blocked due to SAFETY","code":400}}"#;
        let err = done(interpret(StatusCode::BAD_REQUEST, body)).unwrap_err();
        assert!(matches!(err, GenerationError::ContentSafetyRejected { .. }));
    }

    #[test]
    fn other_client_errors_are_backend_errors() {
        let body = r#"{"error":{"message":"API key not valid"}}"#;
        let err = done(interpret(StatusCode::UNAUTHORIZED, body)).unwrap_err();
        assert!(matches!(err, GenerationError::Backend { message } if message.contains("API key")));
    }

    #[test]
    fn rate_limits_and_server_errors_retry() {
        assert!(matches!(
            interpret(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            Attempt::Retry(_)
        ));
        assert!(matches!(
            interpret(StatusCode::BAD_GATEWAY, "{}"),
            Attempt::Retry(_)
        ));
    }

    #[test]
    fn empty_or_malformed_responses_are_backend_errors() {
        let err = done(interpret(StatusCode::OK, "not json")).unwrap_err();
        assert!(matches!(err, GenerationError::Backend { .. }));

        let body = r#"{"choices":[{"message":{"content":""},"finish_reason":"stop"}]}"#;
        let err = done(interpret(StatusCode::OK, body)).unwrap_err();
        assert!(matches!(err, GenerationError::Backend { .. }));
    }

    #[test]
    fn gemini_body_carries_safety_settings() {
        let backend = HttpGenerationBackend::new(
            Provider::Gemini,
            "key".into(),
            "gemini-2.0-flash",
            ProfileKind::Conservative,
            GenerationProfile::conservative(),
            Duration::from_secs(5),
        )
        .unwrap();
        let body = backend.request_body("hi");

        assert_eq!(body["max_tokens"], 1024);
        let settings = body["extra_body"]["google"]["safety_settings"]
            .as_array()
            .unwrap();
        assert_eq!(settings.len(), 4);
        assert_eq!(settings[0]["threshold"], "BLOCK_LOW_AND_ABOVE");
    }

    #[test]
    fn non_gemini_body_has_no_safety_settings() {
        let backend = HttpGenerationBackend::new(
            Provider::Openai,
            "key".into(),
            "gpt-4o-mini",
            ProfileKind::Standard,
            GenerationProfile::standard(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(backend.request_body("hi").get("extra_body").is_none());
    }
}
