//! Per-item resolution pipeline
//!
//! One token in, one entry out: read the metadata pointer from the ledger,
//! fetch the document through the gateway, normalize it, classify the media
//! locator. Shared verbatim by backfill pages and the live bridge so retry
//! and placeholder behavior cannot drift between the two paths.
//!
//! The pipeline is infallible by construction - any per-item failure is
//! folded into a `Failed` entry and never aborts the page or subscription
//! that asked for it.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::{EntryStatus, ResolvedEntry, TokenRef};
use crate::gateway::GatewayResolver;
use crate::ledger::{Ledger, MetadataPointer};
use crate::media::{MediaClassifier, MediaKind};
use crate::metadata;

/// Resolves a discovered token into a catalog entry
pub struct ResolutionPipeline {
    ledger: Arc<dyn Ledger>,
    gateway: Arc<GatewayResolver>,
    classifier: MediaClassifier,
}

impl ResolutionPipeline {
    pub fn new(ledger: Arc<dyn Ledger>, gateway: Arc<GatewayResolver>) -> Self {
        let classifier = MediaClassifier::new(Arc::clone(&gateway));
        Self {
            ledger,
            gateway,
            classifier,
        }
    }

    /// Run the full pipeline for one token. Never fails; failures become
    /// degraded entries carrying the reason.
    pub async fn resolve(&self, token_ref: TokenRef) -> ResolvedEntry {
        match self.try_resolve(token_ref).await {
            Ok(entry) => entry,
            Err(reason) => {
                warn!(token_id = token_ref.id, reason = %reason, "resolution failed");
                ResolvedEntry::failed(token_ref, reason)
            }
        }
    }

    async fn try_resolve(&self, token_ref: TokenRef) -> Result<ResolvedEntry, String> {
        let pointer = self
            .ledger
            .metadata_pointer(token_ref.id)
            .await
            .map_err(|e| e.to_string())?;

        let raw = self
            .gateway
            .resolve(&pointer)
            .await
            .map_err(|e| e.to_string())?;

        let meta = metadata::normalize(&raw).map_err(|e| e.to_string())?;

        // Media/cover pointers go through the same rewrite as the document
        // pointer; one that cannot be rewritten degrades to absent rather
        // than failing the entry.
        let cover_locator = meta.cover.and_then(|p| self.rewrite_locator(token_ref.id, &p));
        let media_locator = meta.media.and_then(|p| self.rewrite_locator(token_ref.id, &p));

        // Classification is a second round trip against the media resource,
        // not the metadata document; probe failures degrade to Unknown.
        let media_kind = match media_locator.as_deref() {
            Some(locator) => self.classifier.classify(locator).await,
            None => MediaKind::Unknown,
        };

        debug!(
            token_id = token_ref.id,
            title = %meta.title,
            kind = ?media_kind,
            "token resolved"
        );

        Ok(ResolvedEntry {
            token_ref,
            title: meta.title,
            author: meta.author,
            description: meta.description,
            cover_locator,
            media_locator,
            media_kind,
            status: EntryStatus::Ready,
        })
    }

    fn rewrite_locator(&self, token_id: u64, pointer: &str) -> Option<String> {
        match self.gateway.rewrite(&MetadataPointer::new(pointer)) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!(token_id, pointer, error = %e, "unusable media pointer dropped");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::StorageGateway;
    use crate::catalog::DiscoveryMethod;
    use crate::ledger::MintNotice;
    use crate::types::{EnumerationError, ResolutionError};
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream::{self, BoxStream};
    use std::time::Duration;

    struct OneTokenLedger {
        pointer: String,
    }

    #[async_trait]
    impl Ledger for OneTokenLedger {
        async fn total_supply(&self) -> Result<u64, EnumerationError> {
            Ok(1)
        }
        async fn identifier_at_index(&self, index: u64) -> Result<u64, EnumerationError> {
            Ok(index)
        }
        async fn metadata_pointer(&self, _: u64) -> Result<MetadataPointer, EnumerationError> {
            Ok(MetadataPointer::new(self.pointer.clone()))
        }
        async fn mint_logs(&self, _: u64, _: u64) -> Result<Vec<MintNotice>, EnumerationError> {
            Ok(Vec::new())
        }
        async fn chain_head(&self) -> Result<u64, EnumerationError> {
            Ok(0)
        }
        fn subscribe_mints(&self) -> BoxStream<'static, MintNotice> {
            Box::pin(stream::empty())
        }
    }

    struct OneDocGateway {
        doc: Result<Vec<u8>, ResolutionError>,
    }

    #[async_trait]
    impl StorageGateway for OneDocGateway {
        async fn fetch(&self, _: &str, _: Duration) -> Result<Bytes, ResolutionError> {
            self.doc.clone().map(Bytes::from)
        }
        async fn probe_content_type(&self, _: &str, _: Duration) -> Result<String, ResolutionError> {
            Err(ResolutionError::Timeout)
        }
    }

    fn pipeline(doc: Result<&[u8], ResolutionError>) -> ResolutionPipeline {
        let gateway = GatewayResolver::new(
            Arc::new(OneDocGateway {
                doc: doc.map(<[u8]>::to_vec),
            }),
            "https://g/ipfs/".to_string(),
            Duration::from_secs(1),
        );
        ResolutionPipeline::new(
            Arc::new(OneTokenLedger {
                pointer: "ipfs://QmMeta/1.json".to_string(),
            }),
            Arc::new(gateway),
        )
    }

    fn token() -> TokenRef {
        TokenRef {
            id: 1,
            discovered_via: DiscoveryMethod::Index,
            discovery_order: 0,
        }
    }

    #[tokio::test]
    async fn resolves_a_complete_document() {
        let doc = br#"{
            "name": "Midnight Sonnet",
            "artist": "orpheus",
            "image": "ipfs://QmCover/c.png",
            "media": "ipfs://QmMedia/m.mp3"
        }"#;
        let entry = pipeline(Ok(doc)).resolve(token()).await;

        assert!(entry.is_ready());
        assert_eq!(entry.title, "Midnight Sonnet");
        assert_eq!(entry.author, "orpheus");
        assert_eq!(entry.cover_locator.as_deref(), Some("https://g/ipfs/QmCover/c.png"));
        assert_eq!(entry.media_locator.as_deref(), Some("https://g/ipfs/QmMedia/m.mp3"));
        // Probe times out in this fixture; the .mp3 extension decides
        assert_eq!(entry.media_kind, MediaKind::Audio);
    }

    #[tokio::test]
    async fn missing_title_degrades_to_failed_not_blank() {
        let doc = br#"{"description": "titleless"}"#;
        let entry = pipeline(Ok(doc)).resolve(token()).await;
        match entry.status {
            EntryStatus::Failed { ref reason } => {
                assert!(reason.contains("missing required field"), "reason: {reason}")
            }
            EntryStatus::Ready => panic!("blank title must not resolve Ready"),
        }
        assert!(entry.title.is_empty());
    }

    #[tokio::test]
    async fn gateway_not_found_degrades_to_failed() {
        let entry = pipeline(Err(ResolutionError::NotFound)).resolve(token()).await;
        assert!(!entry.is_ready());
    }

    #[tokio::test]
    async fn unusable_media_pointer_is_dropped_not_fatal() {
        let doc = br#"{"name": "x", "media": "ar://weird"}"#;
        let entry = pipeline(Ok(doc)).resolve(token()).await;
        assert!(entry.is_ready());
        assert!(entry.media_locator.is_none());
        assert_eq!(entry.media_kind, MediaKind::Unknown);
    }
}
