//! Safe decoding of untrusted completion-service output.
//!
//! This is the single point where external text becomes structured data.
//! Decoding never fails: callers supply the default they can live with and
//! get it back unchanged when the text is not a valid record.

use serde::de::DeserializeOwned;

/// Decode `text` as `T`; on any failure return `default` unchanged.
///
/// The service frequently wraps its JSON in prose or code fences, so the
/// text is first narrowed to the segment starting at the first `{` or `[`
/// before deserializing.
pub fn safe_decode<T: DeserializeOwned>(text: &str, default: T) -> T {
    match extract_json(text) {
        Some(segment) => match first_json_value(segment) {
            Some(value) => serde_json::from_value(value).unwrap_or(default),
            None => default,
        },
        None => default,
    }
}

/// Narrow `text` to the suffix starting at the first JSON opener, if any.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    Some(&text[start..])
}

/// Pull the first complete JSON value out of `segment`, tolerating trailing
/// garbage (closing fences, commentary after the object).
fn first_json_value(segment: &str) -> Option<serde_json::Value> {
    serde_json::Deserializer::from_str(segment)
        .into_iter::<serde_json::Value>()
        .next()?
        .ok()
}
