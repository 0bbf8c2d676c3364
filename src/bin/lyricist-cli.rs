use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::io::AsyncReadExt;

use lyricist::logging::{self, LogTarget};
use lyricist::opts::{DEFAULT_MAX_CONCURRENT_SECTIONS, DEFAULT_MODEL, DEFAULT_TARGET_LANGUAGE};
use lyricist::{
    CompletionBackend, Lyricist, OpenAiBackend, OpenAiConfig, Opts, ScriptedBackend, Section,
};

#[derive(Parser, Debug)]
#[command(name = "lyricist")]
#[command(about = "Translate song lyrics section by section")]
struct Params {
    /// Lyrics file to translate. Reads stdin when omitted.
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Replay canned model replies from a file (one JSON document per line)
    /// instead of calling the completion API.
    #[arg(long = "replay")]
    replay: Option<PathBuf>,

    /// API key for the chat-completion provider.
    #[arg(long = "api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chat-completion API root.
    #[arg(
        long = "base-url",
        env = "OPENAI_BASE_URL",
        default_value = lyricist::backends::openai::DEFAULT_BASE_URL
    )]
    base_url: String,

    #[arg(short = 'm', long = "model", default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(short = 't', long = "target-language", default_value = DEFAULT_TARGET_LANGUAGE)]
    target_language: String,

    #[arg(long = "max-concurrent-sections", default_value_t = DEFAULT_MAX_CONCURRENT_SECTIONS)]
    max_concurrent_sections: usize,

    /// Timeout for each completion call (seconds).
    #[arg(long = "request-timeout-secs", default_value_t = 60)]
    request_timeout_secs: u64,

    /// Log more on stderr (repeat for more detail). `LYRICIST_LOG` overrides this.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct Output {
    sections: Vec<Section>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let params = Params::parse();
    logging::init_with(logging::verbosity_level(params.verbose), LogTarget::Stderr);

    let lyrics = read_lyrics(params.input.as_ref()).await?;
    let opts = Opts {
        model: params.model.clone(),
        target_language: params.target_language.clone(),
        max_concurrent_sections: params.max_concurrent_sections,
        ..Opts::default()
    };

    let sections = match &params.replay {
        Some(path) => {
            let replies = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read replay file '{}'", path.display()))?;
            let backend = ScriptedBackend::from_replies(
                replies.lines().filter(|line| !line.trim().is_empty()),
            );
            run(backend, opts, &lyrics).await?
        }
        None => {
            let api_key = params
                .api_key
                .context("an API key is required (--api-key or OPENAI_API_KEY)")?;
            let backend = OpenAiBackend::new(OpenAiConfig {
                api_key,
                base_url: params.base_url,
                timeout: Duration::from_secs(params.request_timeout_secs),
            })?;
            run(backend, opts, &lyrics).await?
        }
    };

    let json = serde_json::to_string_pretty(&Output { sections })?;
    println!("{json}");
    Ok(())
}

async fn run<B: CompletionBackend>(backend: B, opts: Opts, lyrics: &str) -> Result<Vec<Section>> {
    let lyricist = Lyricist::new(backend, opts);
    lyricist.translate(lyrics).await.map_err(|err| {
        let raw = err.raw_response().map(str::to_owned);
        let err = anyhow::Error::new(err).context("failed to translate lyrics");
        match raw {
            Some(raw) => err.context(format!("raw model response: {raw}")),
            None => err,
        }
    })
}

async fn read_lyrics(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read lyrics from '{}'", path.display())),
        None => {
            let mut lyrics = String::new();
            tokio::io::stdin()
                .read_to_string(&mut lyrics)
                .await
                .context("failed to read lyrics from stdin")?;
            Ok(lyrics)
        }
    }
}
