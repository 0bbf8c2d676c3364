//! Recovery of JSON objects from completion model replies.
//!
//! Models are asked to reply with nothing but a JSON object, and routinely don't: replies
//! arrive wrapped in markdown code fences, preceded by a sentence of explanation, or
//! followed by a note. Everything here treats the reply as untrusted text.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{Error, Result};

/// Remove a leading ```` ``` ```` / ```` ```json ```` fence and a trailing ```` ``` ```` fence.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();

    if let Some(rest) = s.strip_prefix("```") {
        let rest = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
        s = rest.trim_start();
    }

    if let Some(rest) = s.strip_suffix("```") {
        s = rest.trim_end();
    }

    s
}

/// Slice from the first `{` to the last `}`, inclusive.
///
/// Returns the input unchanged when there is no such span.
pub fn extract_json_object(s: &str) -> &str {
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if start < end => &s[start..=end],
        _ => s,
    }
}

/// Clean a model reply and decode it as `T`.
///
/// The first/last brace slice is tried first. If that span doesn't decode (for example
/// because the surrounding prose itself contains braces), each `{` is tried in turn as the
/// start of a standalone JSON value.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let cleaned = extract_json_object(strip_code_fences(raw));
    debug!(cleaned, "cleaned model response");

    let first_err = match serde_json::from_str::<T>(cleaned) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    for (start, _) in raw.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<T>();
        if let Some(Ok(value)) = values.next() {
            return Ok(value);
        }
    }

    Err(Error::ModelResponseMalformed {
        message: first_err.to_string(),
        raw_response: raw.to_owned(),
    })
}
