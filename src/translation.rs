//! Translation/analysis stage: translate one section line for line and comment on it.

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::Result;
use crate::backend::{ChatMessage, CompletionBackend, CompletionRequest};
use crate::extraction::SectionDraft;
use crate::model_json::parse_model_json;
use crate::opts::Opts;
use crate::record::Section;

/// Reply used when the provider answers without content. It fails decoding on purpose.
const EMPTY_REPLY: &str = "{}";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TranslationReply {
    pub translation: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub analysis: String,
}

/// Accept any JSON value as commentary text: strings as-is, `null` as empty, and anything
/// else rendered as compact JSON.
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

fn system_prompt(target_language: &str) -> String {
    format!(
        "You are a skilled translator and lyrics analyst. Translate the given lyrics section to \
         {target_language}, preserving meaning and cultural context. Return ONLY valid JSON in this \
         format: {{\"translation\": \"translated text\", \"analysis\": \"analysis text\"}}. \
         CRITICAL: Preserve ALL existing line breaks from the original text, and DO NOT add any new \
         ones. Each line in the original should correspond to exactly one line in the translation. \
         The number and position of line breaks must match the original EXACTLY."
    )
}

pub fn translation_request(opts: &Opts, draft: &SectionDraft) -> CompletionRequest {
    let user = format!(
        "Translate each line, maintaining EXACT line structure:\n{}\n\n\
         IMPORTANT: Return one translated line for each original line, \
         keeping all line breaks in the same places.",
        draft.original_text
    );

    CompletionRequest {
        model: opts.model.clone(),
        messages: vec![
            ChatMessage::system(system_prompt(&opts.target_language)),
            ChatMessage::user(user),
        ],
    }
}

/// Collapse every line-break encoding a model may produce into `\n`.
///
/// Broader patterns go first: a literal `\\n`, then a literal `\n`, then any stray
/// backslash, then `\r\n`, then a lone `\r`. The output contains no backslash and no
/// `\r`, so applying this again changes nothing.
pub fn normalize_line_breaks(text: &str) -> String {
    text.replace("\\\\n", "\n")
        .replace("\\n", "\n")
        .replace('\\', "\n")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Decode a translation reply into the finished section for `draft`.
pub fn parse_translation(raw: &str, draft: SectionDraft) -> Result<Section> {
    let reply: TranslationReply = parse_model_json(raw)?;

    Ok(Section {
        kind: draft.kind,
        original_text: draft.original_text,
        translation_text: normalize_line_breaks(&reply.translation),
        analysis_text: reply.analysis,
    })
}

/// Run the translation stage for one section against `backend`.
pub async fn translate_section<B: CompletionBackend>(
    backend: &B,
    opts: &Opts,
    draft: SectionDraft,
) -> Result<Section> {
    let reply = backend
        .complete(translation_request(opts, &draft))
        .await?
        .unwrap_or_else(|| EMPTY_REPLY.to_owned());

    debug!(kind = %draft.kind, raw = %reply, "section response");
    parse_translation(&reply, draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(text: &str) -> SectionDraft {
        SectionDraft {
            kind: "verse".into(),
            original_text: text.into(),
        }
    }

    #[test]
    fn normalizes_each_break_encoding() {
        assert_eq!(normalize_line_breaks("Hola\\nMundo"), "Hola\nMundo");
        assert_eq!(normalize_line_breaks("Hola\\\\nMundo"), "Hola\nMundo");
        assert_eq!(normalize_line_breaks("Hola\\Mundo"), "Hola\nMundo");
        assert_eq!(normalize_line_breaks("Hola\r\nMundo"), "Hola\nMundo");
        assert_eq!(normalize_line_breaks("Hola\rMundo"), "Hola\nMundo");
        assert_eq!(normalize_line_breaks("Hola\nMundo"), "Hola\nMundo");
    }

    #[test]
    fn normalization_is_idempotent() {
        for text in [
            "plain",
            "a\\nb\\\\nc\\d\r\ne\rf",
            "\\\\\\n\r\r\n",
            "trailing\\",
            "ya\nnormal",
        ] {
            let once = normalize_line_breaks(text);
            assert_eq!(normalize_line_breaks(&once), once, "text: {text:?}");
        }
    }

    #[test]
    fn escaped_break_in_json_reply_becomes_two_lines() -> anyhow::Result<()> {
        // The model double-escaped its newline, so after JSON decoding the string still
        // holds a literal backslash-n.
        let raw = r#"{"translation": "Hola\\nMundo", "analysis": "A greeting."}"#;
        let section = parse_translation(raw, draft("Hello\nWorld"))?;
        assert_eq!(section.translation_text, "Hola\nMundo");
        assert_eq!(section.analysis_text, "A greeting.");
        assert_eq!(section.original_text, "Hello\nWorld");
        Ok(())
    }

    #[test]
    fn missing_analysis_defaults_to_empty() -> anyhow::Result<()> {
        let section = parse_translation(r#"{"translation":"hi"}"#, draft("hola"))?;
        assert_eq!(section.analysis_text, "");
        Ok(())
    }

    #[test]
    fn non_string_analysis_is_kept_as_text() -> anyhow::Result<()> {
        let section = parse_translation(r#"{"translation":"hi","analysis":null}"#, draft("hola"))?;
        assert_eq!(section.analysis_text, "");

        let section = parse_translation(r#"{"translation":"hi","analysis":42}"#, draft("hola"))?;
        assert_eq!(section.analysis_text, "42");

        let raw = r#"{"translation":"hi","analysis":{"tone":"warm"}}"#;
        let section = parse_translation(raw, draft("hola"))?;
        assert_eq!(section.translation_text, "hi");
        assert_eq!(section.analysis_text, r#"{"tone":"warm"}"#);
        Ok(())
    }

    #[test]
    fn empty_reply_is_malformed() {
        let err = parse_translation(EMPTY_REPLY, draft("hola")).unwrap_err();
        assert_eq!(err.code(), "model-response-malformed");
    }

    #[test]
    fn request_names_target_language() {
        let opts = Opts {
            target_language: "French".into(),
            ..Opts::default()
        };
        let req = translation_request(&opts, &draft("hola"));
        assert!(req.messages[0].content.contains("to French,"));
        assert!(req.messages[1].content.contains("hola"));
    }
}
