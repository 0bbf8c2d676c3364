//! High-level API for translating lyrics with Lyricist.
//!
//! We expose a single entry point (`Lyricist`) that wires segmentation → extraction →
//! per-section translation, while keeping each stage testable in its own module.
//!
//! The intent is:
//! - We build the completion backend once (HTTP client, credentials).
//! - We reuse it for many translations, possibly concurrently (`translate` takes `&self`).
//! - Callers choose the model, target language, and concurrency via `Opts`.

use futures_util::{StreamExt, TryStreamExt, stream};
use tracing::{info, instrument};

use crate::backend::CompletionBackend;
use crate::extraction::extract_sections;
use crate::lines::LineIndex;
use crate::opts::Opts;
use crate::record::Section;
use crate::segmentation::segment;
use crate::translation::translate_section;
use crate::{Error, Result};

/// The main high-level translation entry point.
pub struct Lyricist<B: CompletionBackend> {
    backend: B,
    opts: Opts,
}

impl<B: CompletionBackend> Lyricist<B> {
    pub fn new(backend: B, opts: Opts) -> Self {
        Self { backend, opts }
    }

    /// Segment, extract, and translate `lyrics`, returning sections in boundary order.
    ///
    /// Segmentation completes before any translation call is issued. Section calls then
    /// run concurrently, at most `opts.max_concurrent_sections` at a time. The first
    /// failing section aborts the whole call as soon as it fails: in-flight siblings are
    /// dropped without being awaited and no partial list is returned.
    #[instrument(skip_all, fields(chars = lyrics.chars().count()))]
    pub async fn translate(&self, lyrics: &str) -> Result<Vec<Section>> {
        self.check_input(lyrics)?;

        let lines = LineIndex::new(lyrics);
        let boundaries = segment(&self.backend, &self.opts, &lines).await?;
        let drafts = extract_sections(&lines, &boundaries)?;

        // Sections complete in any order. The index restores boundary order.
        let limit = self.opts.max_concurrent_sections.max(1);
        let mut indexed: Vec<(usize, Section)> = stream::iter(drafts.into_iter().enumerate())
            .map(|(index, draft)| async move {
                let section = translate_section(&self.backend, &self.opts, draft).await?;
                Ok::<_, Error>((index, section))
            })
            .buffer_unordered(limit)
            .try_collect()
            .await?;
        indexed.sort_unstable_by_key(|(index, _)| *index);
        let sections: Vec<Section> = indexed.into_iter().map(|(_, section)| section).collect();

        info!(
            total_lines = lines.len(),
            sections = sections.len(),
            "translated lyrics"
        );
        Ok(sections)
    }

    fn check_input(&self, lyrics: &str) -> Result<()> {
        if lyrics.trim().is_empty() {
            return Err(Error::invalid_input("No lyrics provided"));
        }

        let chars = lyrics.chars().count();
        if chars > self.opts.max_lyrics_chars {
            return Err(Error::invalid_input(format!(
                "lyrics are {chars} characters long; the limit is {}",
                self.opts.max_lyrics_chars
            )));
        }

        Ok(())
    }

    /// Access the configured backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }
}
