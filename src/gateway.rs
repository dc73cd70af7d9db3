//! Gateway resolution - content-addressed pointers to fetchable documents
//!
//! A metadata pointer arrives in one of two shapes: a decentralized
//! `ipfs://<cid>[/path]` reference or a plain HTTP(S) URL. The
//! [`GatewayResolver`] rewrites the former onto a configured HTTP gateway
//! base, fetches the document with a bounded timeout, and classifies
//! failures so the pipeline can degrade one item without touching the rest.
//!
//! The transport lives behind the [`StorageGateway`] trait so tests can
//! substitute an in-memory fake. No retries happen here; retry policy is
//! owned by the caller.

use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::ledger::MetadataPointer;
use crate::types::ResolutionError;

/// Scheme prefix of decentralized pointers
const IPFS_SCHEME: &str = "ipfs://";

/// Storage-gateway collaborator: raw HTTP fetch and content-type probe
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Fetch the full document body at an HTTP locator
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Bytes, ResolutionError>;

    /// HEAD-probe the content type at an HTTP locator (lowercased mime string)
    async fn probe_content_type(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<String, ResolutionError>;
}

/// reqwest-backed production transport
pub struct HttpGateway {
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageGateway for HttpGateway {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Bytes, ResolutionError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(ResolutionError::NotFound);
        }
        if !status.is_success() {
            return Err(ResolutionError::InvalidContent(format!("status {status}")));
        }

        response
            .bytes()
            .await
            .map_err(|e| ResolutionError::InvalidContent(format!("body read failed: {e}")))
    }

    async fn probe_content_type(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<String, ResolutionError> {
        let response = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(ResolutionError::NotFound);
        }
        if !status.is_success() {
            return Err(ResolutionError::InvalidContent(format!("status {status}")));
        }

        response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase())
            .ok_or_else(|| ResolutionError::InvalidContent("no content-type header".into()))
    }
}

fn classify_transport_error(e: reqwest::Error) -> ResolutionError {
    if e.is_timeout() {
        ResolutionError::Timeout
    } else if e.is_connect() {
        ResolutionError::Unreachable(e.to_string())
    } else {
        ResolutionError::InvalidContent(e.to_string())
    }
}

/// Rewrites decentralized pointers onto an HTTP gateway and fetches them
pub struct GatewayResolver {
    transport: Arc<dyn StorageGateway>,
    /// Gateway base URL, trailing slash included
    base: String,
    timeout: Duration,
}

impl GatewayResolver {
    pub fn new(transport: Arc<dyn StorageGateway>, base: String, timeout: Duration) -> Self {
        debug_assert!(base.ends_with('/'));
        Self {
            transport,
            base,
            timeout,
        }
    }

    /// Rewrite a pointer into a fetchable HTTP locator.
    ///
    /// HTTP(S) pointers pass through unmodified. `ipfs://` pointers have the
    /// scheme replaced by the gateway base, path preserved. Anything else is
    /// rejected without a network call.
    pub fn rewrite(&self, pointer: &MetadataPointer) -> Result<String, ResolutionError> {
        let raw = pointer.raw.trim();

        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Ok(raw.to_string());
        }

        if let Some(rest) = raw.strip_prefix(IPFS_SCHEME) {
            if rest.is_empty() {
                return Err(ResolutionError::InvalidContent("empty ipfs pointer".into()));
            }
            // The gateway is authoritative; a non-parsing identifier is worth
            // a warning but still gets forwarded.
            let identifier = rest.split('/').next().unwrap_or(rest);
            if Cid::try_from(identifier).is_err() {
                warn!(pointer = raw, "ipfs pointer is not a parseable CID");
            }
            return Ok(format!("{}{}", self.base, rest));
        }

        Err(ResolutionError::InvalidContent(format!(
            "unsupported pointer scheme: '{raw}'"
        )))
    }

    /// Resolve a pointer to its raw document bytes
    pub async fn resolve(&self, pointer: &MetadataPointer) -> Result<Bytes, ResolutionError> {
        let url = self.rewrite(pointer)?;
        debug!(url = %url, "fetching metadata document");
        self.transport.fetch(&url, self.timeout).await
    }

    /// Probe the content type at an already-rewritten HTTP locator.
    ///
    /// Separate from [`resolve`](Self::resolve): classification targets the
    /// media resource, not the metadata document.
    pub async fn probe(&self, locator: &str) -> Result<String, ResolutionError> {
        self.transport.probe_content_type(locator, self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> GatewayResolver {
        GatewayResolver::new(
            Arc::new(HttpGateway::new()),
            "https://gateway.pinata.cloud/ipfs/".to_string(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn http_pointer_passes_through() {
        let url = resolver()
            .rewrite(&MetadataPointer::new("https://example.com/meta.json"))
            .unwrap();
        assert_eq!(url, "https://example.com/meta.json");
    }

    #[test]
    fn ipfs_pointer_is_rewritten_onto_gateway() {
        let url = resolver()
            .rewrite(&MetadataPointer::new(
                "ipfs://QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG/meta.json",
            ))
            .unwrap();
        assert_eq!(
            url,
            "https://gateway.pinata.cloud/ipfs/QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG/meta.json"
        );
    }

    #[test]
    fn non_cid_identifier_still_forwards() {
        // Older collections store pointers like ipfs://hash/file.mp3;
        // the gateway decides whether they exist.
        let url = resolver()
            .rewrite(&MetadataPointer::new("ipfs://not-a-cid/file.mp3"))
            .unwrap();
        assert_eq!(
            url,
            "https://gateway.pinata.cloud/ipfs/not-a-cid/file.mp3"
        );
    }

    #[test]
    fn empty_ipfs_pointer_is_invalid() {
        let err = resolver()
            .rewrite(&MetadataPointer::new("ipfs://"))
            .unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidContent(_)));
    }

    #[test]
    fn unknown_scheme_is_invalid_without_network() {
        let err = resolver()
            .rewrite(&MetadataPointer::new("ar://abc123"))
            .unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidContent(_)));
    }
}
