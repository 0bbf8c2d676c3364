//! `lyricist` — section-by-section lyrics translation backed by a hosted completion model.
//!
//! This crate provides:
//! - Line indexing over raw lyrics text
//! - A segmentation stage that asks a model for section boundaries and repairs its answer
//! - A translation/analysis stage run concurrently per section
//! - Per-user persistence of saved translations behind a store trait
//!
//! The library is designed to be used by both CLI tools and long-running services. It never
//! reads environment state itself; credentials and options are passed in explicitly.

// High-level API (most consumers should start here).
pub mod lyricist;
pub mod opts;

// Completion backends.
pub mod backend;
pub mod backends;

// Pipeline stages.
pub mod extraction;
pub mod lines;
pub mod model_json;
pub mod segmentation;
pub mod translation;

// Records and persistence.
pub mod record;
pub mod store;

// Logging configuration.
#[cfg(feature = "logging")]
pub mod logging;

mod error;

pub use backend::{ChatMessage, CompletionBackend, CompletionRequest, Role};
pub use backends::scripted::ScriptedBackend;
#[cfg(feature = "openai")]
pub use backends::openai::{OpenAiBackend, OpenAiConfig};
pub use error::{Error, Result};
pub use lyricist::Lyricist;
pub use opts::Opts;
pub use record::{NewTranslation, SavedTranslation, Section, TranslationUpdate, ValidationError};
pub use store::{MemoryStore, TranslationStore};

#[cfg(feature = "logging")]
pub use logging::{LogTarget, init as init_logging};
