/// Hosted chat-completion backend (OpenAI-compatible HTTP API).
#[cfg(feature = "openai")]
pub mod openai;

/// Canned-reply backend for tests and offline runs.
pub mod scripted;
