//! Live update bridge
//!
//! Consumes the ledger's mint notification stream on a spawned task and
//! merges each new token into the catalog head through the shared
//! resolution pipeline. Notifications may arrive before backfill has
//! enumerated their identifier; the catalog's dedup-by-id is what keeps the
//! eventual backfill duplicate from landing twice.
//!
//! The bridge's only write path is `prepend_live` - it never touches the
//! entry list directly.

use futures_util::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::catalog::{DiscoveryMethod, IncrementalCatalog, TokenRef};
use crate::ledger::Ledger;
use crate::pipeline::ResolutionPipeline;

/// Handle to the running subscription task
pub struct LiveUpdateBridge {
    task: JoinHandle<()>,
}

impl LiveUpdateBridge {
    /// Subscribe and start merging new mints into the catalog head
    pub fn start(
        ledger: Arc<dyn Ledger>,
        pipeline: Arc<ResolutionPipeline>,
        catalog: Arc<IncrementalCatalog>,
    ) -> Self {
        let mut notices = ledger.subscribe_mints();

        let task = tokio::spawn(async move {
            while let Some(notice) = notices.next().await {
                if catalog.is_detached() {
                    break;
                }

                if catalog.contains(notice.token_id) {
                    // Backfill got there first
                    debug!(token_id = notice.token_id, "live notice for known token skipped");
                    continue;
                }

                let token_ref = TokenRef {
                    id: notice.token_id,
                    discovered_via: DiscoveryMethod::EventLog,
                    discovery_order: notice.block_order,
                };

                let entry = pipeline.resolve(token_ref).await;
                if catalog.prepend_live(entry) {
                    info!(
                        token_id = notice.token_id,
                        block = notice.block_order,
                        "live mint added to catalog head"
                    );
                }
            }
            debug!("mint notification stream ended");
        });

        Self { task }
    }

    /// Stop consuming notifications. Safe to call more than once.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for LiveUpdateBridge {
    fn drop(&mut self) {
        self.task.abort();
    }
}
