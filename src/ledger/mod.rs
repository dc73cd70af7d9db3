//! Ledger collaborator boundary
//!
//! The ledger is the authoritative, append-only source of mint events and
//! metadata pointers. Vitrine only ever reads from it; the [`Ledger`] trait
//! is the full extent of the contract. The production implementation
//! ([`RpcLedger`]) speaks Ethereum JSON-RPC; tests substitute in-memory
//! fakes.

pub mod rpc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::types::EnumerationError;

pub use rpc::{RpcLedger, RpcLedgerConfig};

/// A mint event observed on the ledger.
///
/// Only transfers whose origin is the zero address count as mints; a later
/// transfer of the same token is ownership movement, not issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintNotice {
    /// Ledger-assigned token identifier
    pub token_id: u64,
    /// Block the mint landed in (descending = more recent)
    pub block_order: u64,
    /// Position within the block, for tie-breaking
    pub log_index: u64,
}

/// A reference to a per-token metadata document.
///
/// Either a content-addressed `ipfs://<cid>[/path]` form or plain HTTP(S).
/// Never mutated; resolved on demand by the gateway layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataPointer {
    pub raw: String,
}

impl MetadataPointer {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// Read-side ledger interface.
///
/// Every method is a suspension point; implementations own their transport
/// timeouts. Failures here are [`EnumerationError`]s: fatal to the in-flight
/// load operation, never quietly absorbed per item.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Authoritative count of minted tokens
    async fn total_supply(&self) -> Result<u64, EnumerationError>;

    /// Token identifier at a collection index (index strategy)
    async fn identifier_at_index(&self, index: u64) -> Result<u64, EnumerationError>;

    /// Metadata pointer for a token
    async fn metadata_pointer(&self, token_id: u64) -> Result<MetadataPointer, EnumerationError>;

    /// All mint notices in the inclusive block range (event-log strategy)
    async fn mint_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<MintNotice>, EnumerationError>;

    /// Most recent block the ledger knows about
    async fn chain_head(&self) -> Result<u64, EnumerationError>;

    /// Stream of mint notices as they occur.
    ///
    /// Delivered on an arbitrary task; consumers must hand off to the
    /// catalog's serialized entry point rather than mutate state directly.
    fn subscribe_mints(&self) -> BoxStream<'static, MintNotice>;
}
