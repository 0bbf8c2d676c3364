//! Segmentation stage: ask the model where each song section starts and ends.

use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::Result;
use crate::backend::{ChatMessage, CompletionBackend, CompletionRequest};
use crate::lines::LineIndex;
use crate::model_json::parse_model_json;
use crate::opts::Opts;

const SYSTEM_PROMPT: &str = "You are a lyrics analyzer. Your task is to identify the different sections of a song \
(verse 1, verse 2, chorus, bridge, etc.) and return their line ranges. Return ONLY valid JSON in this format: \
{\"sections\": [{\"type\": \"verse\", \"startLine\": 1, \"endLine\": 4}, ...]}. Line numbers are 1-indexed. \
Each section should be continuous and not overlap with others.";

/// Reply used when the provider answers without content.
const EMPTY_REPLY: &str = "{\"sections\": []}";

/// Validated line range of one song section.
///
/// Invariant: `1 <= start_line <= end_line <= total_lines` of the lyrics it was validated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBoundary {
    pub kind: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// A boundary exactly as the model described it, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawBoundary {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    /// `None` when the model sent no usable line number.
    #[serde(rename = "startLine", default, deserialize_with = "lenient_line")]
    pub start_line: Option<i64>,
    #[serde(rename = "endLine", default, deserialize_with = "lenient_line")]
    pub end_line: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawSegmentation {
    sections: Vec<RawBoundary>,
}

fn default_kind() -> String {
    "section".to_owned()
}

/// Accept line numbers as integers, floats, or numeric strings. Anything else decodes to `None`.
fn lenient_line<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match &value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f as i64),
        _ => None,
    })
}

/// Build the segmentation request for `lines`.
pub fn segmentation_request(opts: &Opts, lines: &LineIndex<'_>) -> CompletionRequest {
    let user = format!(
        "Identify the sections in these numbered lyrics:\n{}\n\n\
         Return the sections with their line number ranges. \
         Make sure line numbers correspond to the numbers shown above.",
        lines.numbered()
    );

    CompletionRequest {
        model: opts.model.clone(),
        messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)],
    }
}

/// Decode a segmentation reply and validate it against `total_lines`.
pub fn parse_segmentation(raw: &str, total_lines: usize) -> Result<Vec<SectionBoundary>> {
    let parsed: RawSegmentation = parse_model_json(raw)?;
    Ok(validate_boundaries(parsed.sections, total_lines))
}

/// Clamp each boundary into `[1, total_lines]` and drop the ones left inverted or missing a
/// line number.
///
/// Surviving boundaries keep the model's order. Overlap and coverage are not checked.
pub fn validate_boundaries(raw: Vec<RawBoundary>, total_lines: usize) -> Vec<SectionBoundary> {
    let max = i64::try_from(total_lines.max(1)).unwrap_or(i64::MAX);

    raw.into_iter()
        .filter_map(|b| {
            let (Some(start_line), Some(end_line)) = (b.start_line, b.end_line) else {
                warn!(
                    kind = %b.kind,
                    start_line = ?b.start_line,
                    end_line = ?b.end_line,
                    "discarding section boundary without line numbers"
                );
                return None;
            };

            let start = start_line.clamp(1, max);
            let end = end_line.clamp(1, max);
            if start > end {
                warn!(
                    kind = %b.kind,
                    start_line,
                    end_line,
                    "discarding inverted section boundary"
                );
                return None;
            }
            if start != start_line || end != end_line {
                debug!(
                    kind = %b.kind,
                    from = ?(start_line, end_line),
                    to = ?(start, end),
                    "clamped section boundary"
                );
            }
            Some(SectionBoundary {
                kind: b.kind,
                start_line: start as usize,
                end_line: end as usize,
            })
        })
        .collect()
}

/// Run the segmentation stage against `backend`.
pub async fn segment<B: CompletionBackend>(
    backend: &B,
    opts: &Opts,
    lines: &LineIndex<'_>,
) -> Result<Vec<SectionBoundary>> {
    let reply = backend
        .complete(segmentation_request(opts, lines))
        .await?
        .unwrap_or_else(|| EMPTY_REPLY.to_owned());

    debug!(raw = %reply, total_lines = lines.len(), "segmentation response");
    parse_segmentation(&reply, lines.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: &str, start: i64, end: i64) -> RawBoundary {
        RawBoundary {
            kind: kind.to_owned(),
            start_line: Some(start),
            end_line: Some(end),
        }
    }

    #[test]
    fn clamps_out_of_range_lines() {
        let got = validate_boundaries(vec![raw("verse", -3, 2), raw("chorus", 3, 99)], 4);
        assert_eq!(
            got,
            vec![
                SectionBoundary {
                    kind: "verse".into(),
                    start_line: 1,
                    end_line: 2
                },
                SectionBoundary {
                    kind: "chorus".into(),
                    start_line: 3,
                    end_line: 4
                },
            ]
        );
    }

    #[test]
    fn discards_inverted_ranges_and_keeps_order() {
        let got = validate_boundaries(
            vec![
                raw("bridge", 4, 4),
                raw("bad", 3, 1),
                raw("verse", 1, 2),
                raw("past-end", 10, 12),
            ],
            4,
        );
        let kinds: Vec<_> = got.iter().map(|b| b.kind.as_str()).collect();
        // "past-end" clamps to [4, 4] and survives.
        assert_eq!(kinds, ["bridge", "verse", "past-end"]);
    }

    #[test]
    fn every_validated_boundary_is_in_range() {
        let total = 5;
        let mut input = Vec::new();
        for start in -2..=8 {
            for end in -2..=8 {
                input.push(raw("x", start, end));
            }
        }
        for b in validate_boundaries(input, total) {
            assert!(1 <= b.start_line && b.start_line <= b.end_line && b.end_line <= total);
        }
    }

    #[test]
    fn parses_lenient_numbers_and_missing_kind() -> anyhow::Result<()> {
        let reply = r#"{"sections":[{"startLine":"1","endLine":2.0},{"type":"chorus","startLine":3,"endLine":4}]}"#;
        let got = parse_segmentation(reply, 4)?;
        assert_eq!(got[0].kind, "section");
        assert_eq!((got[0].start_line, got[0].end_line), (1, 2));
        assert_eq!(got[1].kind, "chorus");
        Ok(())
    }

    #[test]
    fn drops_boundaries_with_unusable_line_numbers() -> anyhow::Result<()> {
        let reply = r#"{"sections":[
            {"type":"verse","startLine":1,"endLine":2},
            {"type":"junk","startLine":null,"endLine":"end"},
            {"type":"intro","endLine":1},
            {"type":"outro","startLine":"first","endLine":2}
        ]}"#;
        let got = parse_segmentation(reply, 2)?;
        assert_eq!(
            got,
            vec![SectionBoundary {
                kind: "verse".into(),
                start_line: 1,
                end_line: 2
            }]
        );
        Ok(())
    }

    #[test]
    fn request_numbers_lines() {
        let lines = LineIndex::new("a\nb");
        let req = segmentation_request(&Opts::default(), &lines);
        assert_eq!(req.messages.len(), 2);
        assert!(req.messages[1].content.contains("[Line 1] a\n[Line 2] b"));
    }
}
