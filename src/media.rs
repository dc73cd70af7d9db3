//! Media kind classification
//!
//! A resolved media locator is classified as audio, video, image, or
//! unknown. Probing the gateway (HEAD) is authoritative - it handles
//! arbitrary filenames - but costs a round trip and can fail for network
//! reasons unrelated to the content, so extension matching backs it up.
//! First match wins:
//!
//! 1. image extension allow-list (no network call)
//! 2. content-type probe: `audio/*` or `video/*`
//! 3. extension fallback against the audio/video allow-lists
//! 4. `Unknown`
//!
//! A failed probe never becomes an entry failure; it just falls through.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::gateway::GatewayResolver;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "aac"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

/// What kind of media a locator points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaKind {
    Audio,
    Video,
    Image,
    Unknown,
}

/// Classifies media locators via probe-with-extension-fallback
pub struct MediaClassifier {
    gateway: Arc<GatewayResolver>,
}

impl MediaClassifier {
    pub fn new(gateway: Arc<GatewayResolver>) -> Self {
        Self { gateway }
    }

    /// Classify an already-rewritten HTTP media locator
    pub async fn classify(&self, locator: &str) -> MediaKind {
        let ext = extension_of(locator);

        if let Some(ref ext) = ext {
            if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                return MediaKind::Image;
            }
        }

        match self.gateway.probe(locator).await {
            Ok(content_type) => {
                if content_type.starts_with("audio/") {
                    return MediaKind::Audio;
                }
                if content_type.starts_with("video/") {
                    return MediaKind::Video;
                }
                // Uninformative type (application/octet-stream and friends)
                debug!(locator, content_type, "probe uninformative, using extension");
            }
            Err(e) => {
                debug!(locator, error = %e, "probe failed, using extension");
            }
        }

        match ext {
            Some(ext) if AUDIO_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Audio,
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Video,
            _ => MediaKind::Unknown,
        }
    }
}

/// Lowercased extension of the locator's final path segment, if any.
///
/// Query and fragment are stripped first so `track.mp3?token=x` classifies.
fn extension_of(locator: &str) -> Option<String> {
    let path = locator
        .split(['?', '#'])
        .next()
        .unwrap_or(locator);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::StorageGateway;
    use crate::types::ResolutionError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::time::Duration;

    /// Probe stub: answers with a fixed content type or a fixed error
    struct FixedProbe(Result<String, ResolutionError>);

    #[async_trait]
    impl StorageGateway for FixedProbe {
        async fn fetch(&self, _url: &str, _t: Duration) -> Result<Bytes, ResolutionError> {
            unreachable!("classification never fetches bodies")
        }

        async fn probe_content_type(
            &self,
            _url: &str,
            _t: Duration,
        ) -> Result<String, ResolutionError> {
            self.0.clone()
        }
    }

    fn classifier(probe: Result<&str, ResolutionError>) -> MediaClassifier {
        let resolver = GatewayResolver::new(
            Arc::new(FixedProbe(probe.map(str::to_string))),
            "https://gateway.example/ipfs/".to_string(),
            Duration::from_secs(1),
        );
        MediaClassifier::new(Arc::new(resolver))
    }

    #[test]
    fn extracts_extensions() {
        assert_eq!(extension_of("https://g/x/track.MP3"), Some("mp3".into()));
        assert_eq!(extension_of("https://g/x/track.mp3?sig=abc"), Some("mp3".into()));
        assert_eq!(extension_of("https://g/x/bafybeigdyr"), None);
        assert_eq!(extension_of("https://g/x/.hidden"), None);
    }

    #[tokio::test]
    async fn image_extension_skips_the_probe() {
        // FixedProbe would panic on fetch and return an error on probe;
        // neither may be consulted for a known image extension.
        let c = classifier(Err(ResolutionError::Timeout));
        assert_eq!(c.classify("https://g/ipfs/QmX/cover.png").await, MediaKind::Image);
    }

    #[tokio::test]
    async fn probe_decides_for_extensionless_locators() {
        let c = classifier(Ok("audio/mpeg"));
        assert_eq!(c.classify("https://g/ipfs/bafybeigdyr").await, MediaKind::Audio);

        let c = classifier(Ok("video/mp4"));
        assert_eq!(c.classify("https://g/ipfs/bafybeigdyr").await, MediaKind::Video);
    }

    #[tokio::test]
    async fn probe_timeout_without_extension_is_unknown() {
        let c = classifier(Err(ResolutionError::Timeout));
        assert_eq!(c.classify("https://g/ipfs/bafybeigdyr").await, MediaKind::Unknown);
    }

    #[tokio::test]
    async fn probe_failure_falls_back_to_extension() {
        let c = classifier(Err(ResolutionError::Unreachable("refused".into())));
        assert_eq!(c.classify("https://g/ipfs/QmX/track.wav").await, MediaKind::Audio);
        assert_eq!(c.classify("https://g/ipfs/QmX/clip.webm").await, MediaKind::Video);
    }

    #[tokio::test]
    async fn uninformative_content_type_falls_back_to_extension() {
        let c = classifier(Ok("application/octet-stream"));
        assert_eq!(c.classify("https://g/ipfs/QmX/track.m4a").await, MediaKind::Audio);
    }
}
