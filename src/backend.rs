use std::future::Future;

use serde::Serialize;

use crate::Result;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One chat-completion request: a model name and the conversation to complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// Pluggable completion backend used by [`crate::Lyricist`].
///
/// A backend turns a [`CompletionRequest`] into the assistant's reply text. It must not
/// interpret the reply; JSON recovery and validation happen in the pipeline stages.
///
/// Returning `Ok(None)` means the provider answered without any content. Network and
/// provider failures are reported as [`crate::Error::TranslationCallFailed`].
pub trait CompletionBackend: Send + Sync {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<Option<String>>> + Send;
}

impl<B: CompletionBackend> CompletionBackend for std::sync::Arc<B> {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<Option<String>>> + Send {
        (**self).complete(request)
    }
}
