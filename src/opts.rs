/// Options that control how a lyrics translation is performed.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The binaries are responsible for mapping user input into this type so that:
/// - the library never reads process-wide environment state
/// - other frontends (APIs, tests, batch jobs) can construct options programmatically
#[derive(Debug, Clone)]
pub struct Opts {
    /// Chat-completion model used for both stages.
    pub model: String,

    /// Language the sections are translated into.
    pub target_language: String,

    /// Upper bound on section translation calls in flight at once.
    ///
    /// Values below 1 are treated as 1.
    pub max_concurrent_sections: usize,

    /// Maximum accepted lyrics length, in characters.
    pub max_lyrics_chars: usize,
}

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TARGET_LANGUAGE: &str = "English";
pub const DEFAULT_MAX_CONCURRENT_SECTIONS: usize = 4;

impl Default for Opts {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            target_language: DEFAULT_TARGET_LANGUAGE.to_owned(),
            max_concurrent_sections: DEFAULT_MAX_CONCURRENT_SECTIONS,
            max_lyrics_chars: crate::record::MAX_LYRICS_CHARS,
        }
    }
}
