use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding `EnvFilter` directives, e.g. `LYRICIST_LOG=lyricist=debug`
/// to see raw model replies.
pub const LOG_ENV_VAR: &str = "LYRICIST_LOG";

/// Stream that receives log lines.
///
/// The CLI prints its translation as JSON on stdout, so it logs to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogTarget {
    #[default]
    Stdout,
    Stderr,
}

/// Initialize structured JSON logging on stdout at `error` level unless overridden by
/// [`LOG_ENV_VAR`].
pub fn init() {
    init_with(LevelFilter::ERROR, LogTarget::Stdout);
}

/// Initialize structured JSON logging with a caller-chosen default level and stream.
///
/// Directives in [`LOG_ENV_VAR`] take precedence over `default_level`. Later calls are
/// no-ops once a global subscriber is installed.
pub fn init_with(default_level: LevelFilter, target: LogTarget) {
    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true);
    let registry = tracing_subscriber::registry().with(env_filter(default_level));

    let _ = match target {
        LogTarget::Stdout => registry.with(layer).try_init(),
        LogTarget::Stderr => registry.with(layer.with_writer(std::io::stderr)).try_init(),
    };
}

/// Map a `-v` count onto a default level: none is `error`, then `warn`, `info`, `debug`, `trace`.
pub fn verbosity_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::WARN,
        2 => LevelFilter::INFO,
        3 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn env_filter(default_level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_env_var(LOG_ENV_VAR)
        .with_default_directive(default_level.into())
        .from_env_lossy()
}
