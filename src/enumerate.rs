//! Token enumeration strategies
//!
//! Two interchangeable ways of discovering which token identifiers exist,
//! selectable per deployment:
//!
//! - [`IndexEnumerator`] - bounded random access via `totalSupply` +
//!   `tokenByIndex`. The ledger yields ascending index order; presentation
//!   is newest-first, so pages walk indexes descending from a supply anchor
//!   taken at the first page. Supply is re-read before every page and the
//!   window clamped to the latest value - staleness is never assumed safe.
//! - [`EventLogEnumerator`] - one historical sweep of mint notifications
//!   (origin = zero address only), sorted by descending block order and
//!   tie-broken by log position, then paged from the cached sweep.
//!
//! Both report consumption as an absolute offset so a retried page can never
//! double-count, and both fail the whole page on a ledger error - partial
//! pages are never returned.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::{DiscoveryMethod, TokenRef};
use crate::ledger::Ledger;
use crate::types::EnumerationError;

/// A paged source of token references, newest first
#[async_trait]
pub trait Enumerator: Send {
    /// Discover the next page of identifiers.
    ///
    /// Returns fewer than `page_size` at the tail of the collection and an
    /// empty vec once exhausted. On error nothing is consumed; re-invoking
    /// the same page is safe.
    async fn next_page(&mut self, page_size: usize) -> Result<Vec<TokenRef>, EnumerationError>;

    /// Total identifiers this strategy knows about (0 before the first page)
    fn total_known(&self) -> u64;

    /// Absolute count of identifiers consumed so far
    fn consumed(&self) -> u64;
}

/// Index-based enumeration over `totalSupply` + `tokenByIndex`
pub struct IndexEnumerator {
    ledger: Arc<dyn Ledger>,
    /// Supply observed at the first page; newer tokens are live-bridge territory
    anchor: Option<u64>,
    /// Effective window after clamping the anchor to the latest supply
    window: u64,
    /// Identifiers consumed, counted from the newest end
    next_offset: u64,
}

impl IndexEnumerator {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            anchor: None,
            window: 0,
            next_offset: 0,
        }
    }
}

#[async_trait]
impl Enumerator for IndexEnumerator {
    async fn next_page(&mut self, page_size: usize) -> Result<Vec<TokenRef>, EnumerationError> {
        let latest = self.ledger.total_supply().await?;
        let anchor = *self.anchor.get_or_insert(latest);
        // Supply can only legitimately shrink under reorg; clamp rather than
        // trust the stale anchor.
        self.window = anchor.min(latest);

        if self.next_offset >= self.window {
            return Ok(Vec::new());
        }

        let remaining = self.window - self.next_offset;
        let count = remaining.min(page_size as u64);

        let mut refs = Vec::with_capacity(count as usize);
        for k in 0..count {
            let index = self.window - 1 - self.next_offset - k;
            let id = self.ledger.identifier_at_index(index).await?;
            refs.push(TokenRef {
                id,
                discovered_via: DiscoveryMethod::Index,
                discovery_order: self.next_offset + k,
            });
        }

        // Consumed only once the whole page resolved; a mid-page ledger
        // failure leaves the offset where it was.
        self.next_offset += count;
        debug!(
            window = self.window,
            consumed = self.next_offset,
            page = refs.len(),
            "index page enumerated"
        );
        Ok(refs)
    }

    fn total_known(&self) -> u64 {
        self.window
    }

    fn consumed(&self) -> u64 {
        self.next_offset
    }
}

/// Event-log enumeration over a cached historical mint sweep
pub struct EventLogEnumerator {
    ledger: Arc<dyn Ledger>,
    from_block: u64,
    sweep: Option<Vec<TokenRef>>,
    cursor: u64,
}

impl EventLogEnumerator {
    pub fn new(ledger: Arc<dyn Ledger>, from_block: u64) -> Self {
        Self {
            ledger,
            from_block,
            sweep: None,
            cursor: 0,
        }
    }

    /// Fetch and order the full historical sweep once, lazily
    async fn sweep(&mut self) -> Result<&[TokenRef], EnumerationError> {
        if self.sweep.is_none() {
            let head = self.ledger.chain_head().await?;
            let mut notices = self.ledger.mint_logs(self.from_block, head).await?;

            // Newest first: descending block order, descending log position
            notices.sort_by(|a, b| {
                b.block_order
                    .cmp(&a.block_order)
                    .then(b.log_index.cmp(&a.log_index))
            });

            let mut seen = HashSet::new();
            let refs: Vec<TokenRef> = notices
                .into_iter()
                .filter(|n| seen.insert(n.token_id))
                .enumerate()
                .map(|(order, n)| TokenRef {
                    id: n.token_id,
                    discovered_via: DiscoveryMethod::EventLog,
                    discovery_order: order as u64,
                })
                .collect();

            info!(head, mints = refs.len(), "historical mint sweep complete");
            self.sweep = Some(refs);
        }
        Ok(self.sweep.as_deref().unwrap_or(&[]))
    }
}

#[async_trait]
impl Enumerator for EventLogEnumerator {
    async fn next_page(&mut self, page_size: usize) -> Result<Vec<TokenRef>, EnumerationError> {
        let cursor = self.cursor as usize;
        let sweep = self.sweep().await?;
        let end = (cursor + page_size).min(sweep.len());
        if cursor >= end {
            return Ok(Vec::new());
        }
        let page = sweep[cursor..end].to_vec();
        self.cursor = end as u64;
        Ok(page)
    }

    fn total_known(&self) -> u64 {
        self.sweep.as_ref().map(|s| s.len() as u64).unwrap_or(0)
    }

    fn consumed(&self) -> u64 {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MetadataPointer, MintNotice};
    use futures::stream::{self, BoxStream};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Ledger fake: identifier_at_index is the identity, supply is mutable
    struct FakeLedger {
        supply: AtomicU64,
        mints: Vec<MintNotice>,
        fail_supply: bool,
    }

    impl FakeLedger {
        fn with_supply(supply: u64) -> Self {
            Self {
                supply: AtomicU64::new(supply),
                mints: Vec::new(),
                fail_supply: false,
            }
        }

        fn with_mints(mints: Vec<MintNotice>) -> Self {
            Self {
                supply: AtomicU64::new(0),
                mints,
                fail_supply: false,
            }
        }
    }

    #[async_trait]
    impl Ledger for FakeLedger {
        async fn total_supply(&self) -> Result<u64, EnumerationError> {
            if self.fail_supply {
                return Err(EnumerationError::LedgerUnreachable("down".into()));
            }
            Ok(self.supply.load(Ordering::Relaxed))
        }

        async fn identifier_at_index(&self, index: u64) -> Result<u64, EnumerationError> {
            Ok(index)
        }

        async fn metadata_pointer(&self, id: u64) -> Result<MetadataPointer, EnumerationError> {
            Ok(MetadataPointer::new(format!("ipfs://QmFake/{id}.json")))
        }

        async fn mint_logs(&self, _: u64, _: u64) -> Result<Vec<MintNotice>, EnumerationError> {
            Ok(self.mints.clone())
        }

        async fn chain_head(&self) -> Result<u64, EnumerationError> {
            Ok(100)
        }

        fn subscribe_mints(&self) -> BoxStream<'static, MintNotice> {
            Box::pin(stream::empty())
        }
    }

    fn ids(refs: &[TokenRef]) -> Vec<u64> {
        refs.iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn index_pages_walk_newest_first() {
        let mut en = IndexEnumerator::new(Arc::new(FakeLedger::with_supply(5)));
        assert_eq!(ids(&en.next_page(2).await.unwrap()), vec![4, 3]);
        assert_eq!(ids(&en.next_page(2).await.unwrap()), vec![2, 1]);
        assert_eq!(ids(&en.next_page(2).await.unwrap()), vec![0]);
        assert!(en.next_page(2).await.unwrap().is_empty());
        assert_eq!(en.total_known(), 5);
        assert_eq!(en.consumed(), 5);
    }

    #[tokio::test]
    async fn index_anchor_ignores_supply_growth() {
        let ledger = Arc::new(FakeLedger::with_supply(3));
        let mut en = IndexEnumerator::new(Arc::clone(&ledger) as Arc<dyn Ledger>);
        assert_eq!(ids(&en.next_page(2).await.unwrap()), vec![2, 1]);

        // New mints arrive mid-backfill; they belong to the live bridge
        ledger.supply.store(10, Ordering::Relaxed);
        assert_eq!(ids(&en.next_page(2).await.unwrap()), vec![0]);
        assert_eq!(en.total_known(), 3);
    }

    #[tokio::test]
    async fn index_window_clamps_to_shrunken_supply() {
        let ledger = Arc::new(FakeLedger::with_supply(5));
        let mut en = IndexEnumerator::new(Arc::clone(&ledger) as Arc<dyn Ledger>);
        assert_eq!(ids(&en.next_page(2).await.unwrap()), vec![4, 3]);

        ledger.supply.store(2, Ordering::Relaxed);
        // Offset 2 already past the clamped window of 2
        assert!(en.next_page(2).await.unwrap().is_empty());
        assert_eq!(en.total_known(), 2);
    }

    #[tokio::test]
    async fn index_failure_consumes_nothing() {
        let mut ledger = FakeLedger::with_supply(5);
        ledger.fail_supply = true;
        let mut en = IndexEnumerator::new(Arc::new(ledger));
        assert!(en.next_page(2).await.is_err());
        assert_eq!(en.consumed(), 0);
    }

    #[tokio::test]
    async fn event_log_sweep_sorts_newest_first_and_dedups() {
        let mints = vec![
            MintNotice { token_id: 1, block_order: 10, log_index: 0 },
            MintNotice { token_id: 3, block_order: 30, log_index: 1 },
            MintNotice { token_id: 2, block_order: 30, log_index: 0 },
            // Duplicate notice for an already-seen token
            MintNotice { token_id: 1, block_order: 10, log_index: 0 },
        ];
        let mut en = EventLogEnumerator::new(Arc::new(FakeLedger::with_mints(mints)), 0);

        assert_eq!(ids(&en.next_page(2).await.unwrap()), vec![3, 2]);
        assert_eq!(en.total_known(), 3);
        assert_eq!(ids(&en.next_page(2).await.unwrap()), vec![1]);
        assert!(en.next_page(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn event_log_discovery_orders_are_sequential() {
        let mints = vec![
            MintNotice { token_id: 8, block_order: 2, log_index: 0 },
            MintNotice { token_id: 9, block_order: 1, log_index: 0 },
        ];
        let mut en = EventLogEnumerator::new(Arc::new(FakeLedger::with_mints(mints)), 0);
        let page = en.next_page(10).await.unwrap();
        assert_eq!(page[0].discovery_order, 0);
        assert_eq!(page[1].discovery_order, 1);
        assert!(page.iter().all(|r| r.discovered_via == DiscoveryMethod::EventLog));
    }
}
