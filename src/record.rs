//! Section and saved-translation records, plus the field limits enforced before any write.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_LYRICS_CHARS: usize = 3000;
pub const MAX_SECTIONS: usize = 50;

/// One translated and analysed song section.
///
/// Serialized with the field names the web front end reads (`type`, `original`,
/// `translation`, `analysis`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    #[serde(rename = "original", alias = "originalText")]
    pub original_text: String,
    #[serde(rename = "translation", alias = "translationText")]
    pub translation_text: String,
    #[serde(rename = "analysis", alias = "analysisText", default)]
    pub analysis_text: String,
}

/// A translation persisted for one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTranslation {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub lyrics_text: String,
    pub sections: Vec<Section>,
    pub saved_at_millis: i64,
}

/// Fields supplied by an explicit save action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTranslation {
    pub title: String,
    #[serde(alias = "lyrics")]
    pub lyrics_text: String,
    pub sections: Vec<Section>,
}

/// Partial overwrite of a saved translation. Absent fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "lyrics")]
    pub lyrics_text: Option<String>,
    #[serde(default)]
    pub sections: Option<Vec<Section>>,
}

/// A field limit was violated; nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title must be between 1 and {} characters", MAX_TITLE_CHARS)]
    InvalidTitle,

    #[error("lyrics must be between 1 and {} characters", MAX_LYRICS_CHARS)]
    InvalidLyrics,

    #[error("a translation may hold at most {} sections", MAX_SECTIONS)]
    TooManySections,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTitle => "invalid-title",
            Self::InvalidLyrics => "invalid-lyrics",
            Self::TooManySections => "too-many-sections",
        }
    }
}

/// Trim `title` and check its length.
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let title = title.trim();
    let chars = title.chars().count();
    if chars == 0 || chars > MAX_TITLE_CHARS {
        return Err(ValidationError::InvalidTitle);
    }
    Ok(title.to_owned())
}

pub fn validate_lyrics(lyrics: &str) -> Result<(), ValidationError> {
    let chars = lyrics.chars().count();
    if lyrics.trim().is_empty() || chars > MAX_LYRICS_CHARS {
        return Err(ValidationError::InvalidLyrics);
    }
    Ok(())
}

pub fn validate_sections(sections: &[Section]) -> Result<(), ValidationError> {
    if sections.len() > MAX_SECTIONS {
        return Err(ValidationError::TooManySections);
    }
    Ok(())
}

impl NewTranslation {
    /// Validate every field, returning the record with its title trimmed.
    pub fn validated(self) -> Result<Self, ValidationError> {
        let title = validate_title(&self.title)?;
        validate_lyrics(&self.lyrics_text)?;
        validate_sections(&self.sections)?;
        Ok(Self { title, ..self })
    }
}

impl TranslationUpdate {
    /// Validate the fields that are present, returning the update with its title trimmed.
    pub fn validated(self) -> Result<Self, ValidationError> {
        let title = self.title.as_deref().map(validate_title).transpose()?;
        if let Some(lyrics) = &self.lyrics_text {
            validate_lyrics(lyrics)?;
        }
        if let Some(sections) = &self.sections {
            validate_sections(sections)?;
        }
        Ok(Self { title, ..self })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(kind: &str) -> Section {
        Section {
            kind: kind.to_owned(),
            original_text: "la".into(),
            translation_text: "the".into(),
            analysis_text: String::new(),
        }
    }

    #[test]
    fn title_limits_count_characters() {
        assert_eq!(validate_title("  My song  "), Ok("My song".to_owned()));
        assert_eq!(validate_title("   "), Err(ValidationError::InvalidTitle));
        assert!(validate_title(&"é".repeat(MAX_TITLE_CHARS)).is_ok());
        assert_eq!(
            validate_title(&"a".repeat(MAX_TITLE_CHARS + 1)),
            Err(ValidationError::InvalidTitle)
        );
    }

    #[test]
    fn lyrics_and_section_limits() {
        assert!(validate_lyrics("la la").is_ok());
        assert_eq!(validate_lyrics(""), Err(ValidationError::InvalidLyrics));
        assert_eq!(
            validate_lyrics(&"a".repeat(MAX_LYRICS_CHARS + 1)),
            Err(ValidationError::InvalidLyrics)
        );
        let sections = vec![section("verse"); MAX_SECTIONS + 1];
        assert_eq!(
            validate_sections(&sections),
            Err(ValidationError::TooManySections)
        );
    }

    #[test]
    fn update_validates_only_present_fields() {
        let update = TranslationUpdate {
            title: Some(" renamed ".into()),
            ..Default::default()
        };
        assert_eq!(update.validated().unwrap().title.as_deref(), Some("renamed"));

        let update = TranslationUpdate {
            lyrics_text: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(update.validated(), Err(ValidationError::InvalidLyrics));
    }

    #[test]
    fn section_uses_front_end_field_names() -> anyhow::Result<()> {
        let json = serde_json::to_value(section("chorus"))?;
        assert_eq!(json["type"], "chorus");
        assert_eq!(json["original"], "la");
        assert_eq!(json["translation"], "the");
        assert_eq!(json["analysis"], "");

        let back: Section = serde_json::from_value(json)?;
        assert_eq!(back, section("chorus"));
        Ok(())
    }
}
