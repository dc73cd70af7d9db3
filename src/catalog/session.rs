//! Catalog session - the surface exposed to the presentation layer
//!
//! A session owns one catalog for its lifetime: it wires the chosen
//! enumeration strategy, the shared resolution pipeline, and the live
//! bridge together, and serializes all backfill through one entry point.
//!
//! Per-item resolution within a page runs with bounded concurrency, but
//! entries are inserted in the page's logical order regardless of fetch
//! completion order. Live insertions are the one path allowed to race
//! ahead of backfill.

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::catalog::{FailurePolicy, IncrementalCatalog, ResolvedEntry};
use crate::config::DiscoveryStrategy;
use crate::enumerate::{Enumerator, EventLogEnumerator, IndexEnumerator};
use crate::gateway::GatewayResolver;
use crate::ledger::Ledger;
use crate::live::LiveUpdateBridge;
use crate::pipeline::ResolutionPipeline;
use crate::types::Result;

/// Session tuning knobs
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub strategy: DiscoveryStrategy,
    pub failure_policy: FailurePolicy,
    /// Entries requested per backfill page
    pub page_size: usize,
    /// Bounded concurrency for per-item resolution within a page
    pub worker_count: usize,
    /// Earliest block for the historical sweep (event-log strategy)
    pub from_block: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            strategy: DiscoveryStrategy::EventLog,
            failure_policy: FailurePolicy::RetainPlaceholder,
            page_size: 12,
            worker_count: 4,
            from_block: 0,
        }
    }
}

/// Result of one `load_next_page` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    /// Entries newly materialized by this call (duplicates and omitted
    /// failures advance the backfill cursor but are not counted here)
    pub items_added: usize,
    pub has_more: bool,
}

/// A live catalog over one collection
pub struct CatalogSession {
    catalog: Arc<IncrementalCatalog>,
    enumerator: Mutex<Box<dyn Enumerator>>,
    pipeline: Arc<ResolutionPipeline>,
    page_size: usize,
    worker_count: usize,
    live: StdMutex<Option<LiveUpdateBridge>>,
    /// Tokens with a manual retry currently in flight
    retrying: DashMap<u64, ()>,
}

impl CatalogSession {
    /// Build a session: load the first backfill page, then start the live
    /// subscription.
    ///
    /// If the first page fails no catalog state is published at all - the
    /// caller gets the enumeration error and no handle.
    pub async fn initialize(
        ledger: Arc<dyn Ledger>,
        gateway: Arc<GatewayResolver>,
        config: SessionConfig,
    ) -> Result<Arc<Self>> {
        let catalog = Arc::new(IncrementalCatalog::new(config.failure_policy));
        let pipeline = Arc::new(ResolutionPipeline::new(Arc::clone(&ledger), gateway));

        let enumerator: Box<dyn Enumerator> = match config.strategy {
            DiscoveryStrategy::Index => Box::new(IndexEnumerator::new(Arc::clone(&ledger))),
            DiscoveryStrategy::EventLog => Box::new(EventLogEnumerator::new(
                Arc::clone(&ledger),
                config.from_block,
            )),
        };

        let session = Arc::new(Self {
            catalog,
            enumerator: Mutex::new(enumerator),
            pipeline,
            page_size: config.page_size,
            worker_count: config.worker_count,
            live: StdMutex::new(None),
            retrying: DashMap::new(),
        });

        let first = session.load_next_page().await?;
        info!(
            items = first.items_added,
            has_more = first.has_more,
            strategy = ?config.strategy,
            "catalog session initialized"
        );

        let bridge = LiveUpdateBridge::start(
            ledger,
            Arc::clone(&session.pipeline),
            Arc::clone(&session.catalog),
        );
        *session.live.lock().unwrap_or_else(|e| e.into_inner()) = Some(bridge);

        Ok(session)
    }

    /// Load the next backfill page.
    ///
    /// Idempotent at exhaustion: once `has_more` is false this adds nothing
    /// and leaves presentation order untouched. After `dispose` it is a
    /// no-op reporting no more items.
    pub async fn load_next_page(&self) -> Result<PageOutcome> {
        if self.catalog.is_detached() {
            debug!("load_next_page on disposed session ignored");
            return Ok(PageOutcome {
                items_added: 0,
                has_more: false,
            });
        }

        // Holding the enumerator lock across resolution keeps backfill pages
        // strictly ordered relative to each other.
        let mut enumerator = self.enumerator.lock().await;
        let refs = enumerator.next_page(self.page_size).await?;
        self.catalog.set_known_supply(enumerator.total_known());

        // Bounded concurrency, logical-order insertion: `buffered` polls up
        // to worker_count resolutions at once but yields in input order.
        let entries: Vec<ResolvedEntry> = stream::iter(refs)
            .map(|token_ref| {
                let pipeline = Arc::clone(&self.pipeline);
                async move { pipeline.resolve(token_ref).await }
            })
            .buffered(self.worker_count.max(1))
            .collect()
            .await;

        let items_added = self.catalog.append_backfill_page(entries);
        self.catalog.note_backfill_consumed(enumerator.consumed());

        Ok(PageOutcome {
            items_added,
            has_more: self.catalog.has_more(),
        })
    }

    /// Read-only copy of the presentation order, newest first
    pub fn snapshot(&self) -> Vec<ResolvedEntry> {
        self.catalog.snapshot()
    }

    pub fn has_more(&self) -> bool {
        self.catalog.has_more()
    }

    /// Re-run the resolution pipeline for one materialized token (manual
    /// "try again" for a degraded placeholder).
    ///
    /// The entry keeps its presentation position; a concurrent retry of the
    /// same token is skipped, and a stale completion can never clobber a
    /// newer one. Returns whether a fresh result landed.
    pub async fn retry(&self, token_id: u64) -> bool {
        if self.catalog.is_detached() {
            return false;
        }
        let Some(existing) = self.catalog.get(token_id) else {
            debug!(token_id, "retry for unknown token ignored");
            return false;
        };
        if self.retrying.insert(token_id, ()).is_some() {
            debug!(token_id, "retry already in flight");
            return false;
        }

        let generation = self.catalog.begin_resolution(token_id);
        let entry = self.pipeline.resolve(existing.token_ref).await;
        let landed = self.catalog.replace_entry(entry, generation);

        self.retrying.remove(&token_id);
        landed
    }

    /// Detach the subscription and make every further write a no-op.
    ///
    /// In-flight page loads or live resolutions that complete afterwards
    /// land in the detached catalog harmlessly. `snapshot` stays valid.
    pub fn dispose(&self) {
        self.catalog.detach();
        if let Some(bridge) = self
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            bridge.shutdown();
        }
        info!("catalog session disposed");
    }
}
