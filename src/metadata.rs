//! Metadata normalization
//!
//! Token metadata documents were authored independently over years of schema
//! drift: some carry `name`, some `title`; covers appear as `cover` or
//! `image`; media as `media` or `animation_url`. Normalization maps whatever
//! arrives onto one canonical record through an explicit alias table -
//! first-present-wins, unknown fields ignored, optional fields defaulting to
//! absent. The only hard requirement is a display title.

use serde_json::Value;

use crate::types::NormalizationError;

// Alias tables, in precedence order
const TITLE_FIELDS: &[&str] = &["name", "title"];
const DESCRIPTION_FIELDS: &[&str] = &["description"];
const COVER_FIELDS: &[&str] = &["cover", "image"];
const MEDIA_FIELDS: &[&str] = &["media", "animation_url"];
const AUTHOR_FIELDS: &[&str] = &["artist", "author"];

/// Canonical per-token metadata record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedMetadata {
    /// Display title (required)
    pub title: String,
    /// Free-form description, empty if absent
    pub description: String,
    /// Author/artist display name, empty if absent
    pub author: String,
    /// Pointer to the cover image, if any
    pub cover: Option<String>,
    /// Pointer to the primary media resource, if any
    pub media: Option<String>,
}

/// Map a raw metadata document onto the canonical record.
///
/// Fails only on unparseable JSON, a non-object document, or a title absent
/// under every accepted name. Everything else degrades to defaults.
pub fn normalize(raw: &[u8]) -> Result<NormalizedMetadata, NormalizationError> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| NormalizationError::MalformedJson(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| NormalizationError::MalformedJson("document is not an object".into()))?;

    let title = first_string(object, TITLE_FIELDS)
        .ok_or(NormalizationError::MissingRequiredField("title"))?;

    Ok(NormalizedMetadata {
        title,
        description: first_string(object, DESCRIPTION_FIELDS).unwrap_or_default(),
        author: first_string(object, AUTHOR_FIELDS).unwrap_or_default(),
        cover: first_string(object, COVER_FIELDS),
        media: first_string(object, MEDIA_FIELDS),
    })
}

/// First non-empty string value under any of the aliased field names.
///
/// Non-string values are skipped, not errors: a numeric `name` next to a
/// string `title` should still normalize.
fn first_string(object: &serde_json::Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|name| object.get(*name))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_standard_document() {
        let doc = br#"{
            "name": "Celestial Echoes",
            "description": "Ambient drone recorded at dusk",
            "artist": "halcyon",
            "image": "ipfs://QmCover/cover.png",
            "animation_url": "ipfs://QmMedia/track.mp3"
        }"#;
        let meta = normalize(doc).unwrap();
        assert_eq!(meta.title, "Celestial Echoes");
        assert_eq!(meta.description, "Ambient drone recorded at dusk");
        assert_eq!(meta.author, "halcyon");
        assert_eq!(meta.cover.as_deref(), Some("ipfs://QmCover/cover.png"));
        assert_eq!(meta.media.as_deref(), Some("ipfs://QmMedia/track.mp3"));
    }

    #[test]
    fn first_present_title_alias_wins() {
        let doc = br#"{"name": "from-name", "title": "from-title"}"#;
        assert_eq!(normalize(doc).unwrap().title, "from-name");

        let doc = br#"{"title": "from-title"}"#;
        assert_eq!(normalize(doc).unwrap().title, "from-title");
    }

    #[test]
    fn missing_title_under_both_names_is_required_field_error() {
        let doc = br#"{"description": "no title anywhere"}"#;
        assert!(matches!(
            normalize(doc),
            Err(NormalizationError::MissingRequiredField("title"))
        ));
    }

    #[test]
    fn blank_title_does_not_count_as_present() {
        let doc = br#"{"name": "   ", "title": "real"}"#;
        assert_eq!(normalize(doc).unwrap().title, "real");

        let doc = br#"{"name": ""}"#;
        assert!(normalize(doc).is_err());
    }

    #[test]
    fn non_string_alias_values_are_skipped() {
        let doc = br#"{"name": 42, "title": "fallback"}"#;
        assert_eq!(normalize(doc).unwrap().title, "fallback");
    }

    #[test]
    fn optional_fields_default_to_absent() {
        let doc = br#"{"name": "minimal"}"#;
        let meta = normalize(doc).unwrap();
        assert_eq!(meta.description, "");
        assert_eq!(meta.author, "");
        assert!(meta.cover.is_none());
        assert!(meta.media.is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let doc = br#"{"name": "x", "attributes": [{"trait_type": "bpm", "value": 120}], "external_url": "https://example.com"}"#;
        assert!(normalize(doc).is_ok());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            normalize(b"{not json"),
            Err(NormalizationError::MalformedJson(_))
        ));
        assert!(matches!(
            normalize(br#"["an", "array"]"#),
            Err(NormalizationError::MalformedJson(_))
        ));
    }
}
