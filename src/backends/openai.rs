use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::backend::{CompletionBackend, CompletionRequest};
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for an OpenAI-compatible chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,

    /// API root, without the trailing `/chat/completions`.
    pub base_url: String,

    /// Whole-request timeout, applied to every call.
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Built-in backend for hosted chat-completion APIs.
pub struct OpenAiBackend {
    http: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::invalid_input("completion API key must be provided"));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| Error::Other(Box::new(err)))?;

        Ok(Self {
            http,
            endpoint: chat_endpoint(&config.base_url),
            api_key: config.api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Pull the provider's own error message out of a failed response body.
fn provider_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
}

/// Extract the first choice's content from a successful response body.
fn first_choice_content(body: &str) -> Result<Option<String>> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|err| {
        Error::call_failed(
            format!("unreadable completion response: {err}"),
            Some(body.to_owned()),
        )
    })?;

    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.is_empty()))
}

impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<Option<String>> {
        debug!(endpoint = %self.endpoint, model = %request.model, "completion request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| Error::call_failed(err.to_string(), None))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| Error::call_failed(err.to_string(), None))?;

        if !status.is_success() {
            return Err(Error::call_failed(
                format!("completion API returned {status}"),
                provider_error_message(&body),
            ));
        }

        first_choice_content(&body)
    }
}
