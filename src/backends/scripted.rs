use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::backend::{CompletionBackend, CompletionRequest};
use crate::{Error, Result};

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Empty,
    Fail(String),
}

/// In-process backend that replays canned replies instead of calling a provider.
///
/// Replies are matched in two ways:
/// - rules added with [`ScriptedBackend::on_prompt`] answer any request whose last message
///   contains the given text, as many times as asked;
/// - otherwise the next queued reply is consumed, in push order.
///
/// A request with no matching rule and an empty queue fails as a call failure.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    queue: Mutex<VecDeque<Scripted>>,
    rules: Mutex<Vec<(String, Scripted)>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking test thread must not wedge the others.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a backend that answers with `replies`, in order.
    pub fn from_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new();
        for reply in replies {
            backend.push_reply(reply);
        }
        backend
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        lock(&self.queue).push_back(Scripted::Reply(reply.into()));
    }

    /// Queue a reply with no content.
    pub fn push_empty(&self) {
        lock(&self.queue).push_back(Scripted::Empty);
    }

    /// Queue a provider failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.queue).push_back(Scripted::Fail(message.into()));
    }

    /// Answer every request whose last message contains `needle` with `reply`.
    pub fn on_prompt(&self, needle: impl Into<String>, reply: impl Into<String>) {
        lock(&self.rules).push((needle.into(), Scripted::Reply(reply.into())));
    }

    /// Fail every request whose last message contains `needle`.
    pub fn fail_on_prompt(&self, needle: impl Into<String>, message: impl Into<String>) {
        lock(&self.rules).push((needle.into(), Scripted::Fail(message.into())));
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    fn next_for(&self, request: &CompletionRequest) -> Option<Scripted> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let matched = lock(&self.rules)
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, scripted)| scripted.clone());

        matched.or_else(|| lock(&self.queue).pop_front())
    }
}

impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<Option<String>> {
        let next = self.next_for(&request);
        lock(&self.requests).push(request);

        match next {
            Some(Scripted::Reply(reply)) => Ok(Some(reply)),
            Some(Scripted::Empty) => Ok(None),
            Some(Scripted::Fail(message)) => Err(Error::call_failed(message, None)),
            None => Err(Error::call_failed("no scripted reply left", None)),
        }
    }
}
