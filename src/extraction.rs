use crate::Result;
use crate::lines::LineIndex;
use crate::segmentation::SectionBoundary;

/// One section's original text, ready to be translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionDraft {
    pub kind: String,
    pub original_text: String,
}

/// Slice the lyrics into one draft per validated boundary, in boundary order.
pub fn extract_sections(
    lines: &LineIndex<'_>,
    boundaries: &[SectionBoundary],
) -> Result<Vec<SectionDraft>> {
    boundaries
        .iter()
        .map(|b| {
            Ok(SectionDraft {
                kind: b.kind.clone(),
                original_text: lines.slice(b.start_line, b.end_line)?,
            })
        })
        .collect()
}
