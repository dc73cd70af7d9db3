//! Incremental catalog - the single owner of presentation order
//!
//! All mutation of the ordered entry list funnels through
//! [`IncrementalCatalog`]: backfill appends at the tail, the live bridge
//! prepends at the head, and every insert deduplicates by token id. The
//! catalog also owns the "more available" signal and the per-token
//! resolution generation guard that keeps a stale re-resolution from
//! clobbering a newer one.
//!
//! Invariants:
//!
//! - no two entries share a token id
//! - live-prepended entries precede all previously known entries
//! - failed entries are uniformly retained or omitted per one configured
//!   [`FailurePolicy`], never mixed ad hoc
//! - `has_more` is recomputed from how far backfill has actually consumed
//!   the collection, never from supply minus omitted count, so the omit
//!   policy cannot wedge the catalog
//! - once detached, every mutating operation is a no-op

pub mod session;

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::media::MediaKind;

/// How a token identifier was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiscoveryMethod {
    /// Random access through totalSupply + tokenByIndex
    Index,
    /// Mint event log (historical sweep or live notification)
    EventLog,
}

/// A discovered token identifier. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenRef {
    /// Ledger-assigned identifier, unique within the collection
    pub id: u64,
    pub discovered_via: DiscoveryMethod,
    /// Presentation recency: lower = newer within its discovery batch
    pub discovery_order: u64,
}

/// Outcome of resolving one token's metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EntryStatus {
    Ready,
    Failed { reason: String },
}

/// One catalog entry: a token plus whatever metadata resolution produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEntry {
    pub token_ref: TokenRef,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Rewritten (fetchable) cover locator, if the document had one
    pub cover_locator: Option<String>,
    /// Rewritten (fetchable) media locator, if the document had one
    pub media_locator: Option<String>,
    pub media_kind: MediaKind,
    pub status: EntryStatus,
}

impl ResolvedEntry {
    /// Degraded placeholder for a token whose resolution failed
    pub fn failed(token_ref: TokenRef, reason: impl Into<String>) -> Self {
        Self {
            token_ref,
            title: String::new(),
            author: String::new(),
            description: String::new(),
            cover_locator: None,
            media_locator: None,
            media_kind: MediaKind::Unknown,
            status: EntryStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status, EntryStatus::Ready)
    }
}

/// What to do with entries whose resolution failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep them as degraded placeholders (stable identifier, no media)
    RetainPlaceholder,
    /// Exclude them from the catalog entirely
    Omit,
}

#[derive(Default)]
struct CatalogState {
    /// Presentation order, head first (index 0 = newest)
    entries: Vec<ResolvedEntry>,
    /// Every token id ever inserted or deliberately omitted
    seen: HashSet<u64>,
    /// Latest ledger-reported collection size
    known_supply: u64,
    /// How many identifiers backfill has fully processed (monotonic)
    backfill_consumed: u64,
    /// Resolution generations handed out per token id
    started_gen: HashMap<u64, u64>,
    /// Generation of the completion that currently occupies each id
    landed_gen: HashMap<u64, u64>,
}

/// Ordered, deduplicated, append/prepend-capable entry collection
pub struct IncrementalCatalog {
    policy: FailurePolicy,
    detached: AtomicBool,
    state: Mutex<CatalogState>,
}

impl IncrementalCatalog {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            detached: AtomicBool::new(false),
            state: Mutex::new(CatalogState::default()),
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Record the latest ledger-reported collection size
    pub fn set_known_supply(&self, supply: u64) {
        if self.detached.load(Ordering::Relaxed) {
            return;
        }
        self.lock().known_supply = supply;
    }

    pub fn known_supply(&self) -> u64 {
        self.lock().known_supply
    }

    /// Append one backfill page at the tail, in the page's logical order.
    ///
    /// Duplicates (typically a live-prepended entry whose identifier backfill
    /// has now reached) are collapsed by id: the existing entry wins and
    /// keeps its position. Returns how many entries were newly materialized.
    pub fn append_backfill_page(&self, page: Vec<ResolvedEntry>) -> usize {
        if self.detached.load(Ordering::Relaxed) {
            debug!("append on detached catalog ignored");
            return 0;
        }

        let mut state = self.lock();
        let mut added = 0;
        for entry in page {
            let id = entry.token_ref.id;
            if state.seen.contains(&id) {
                debug!(token_id = id, "backfill duplicate collapsed");
                continue;
            }
            state.seen.insert(id);
            Self::land_current(&mut state, id);
            if !entry.is_ready() && self.policy == FailurePolicy::Omit {
                continue;
            }
            state.entries.push(entry);
            added += 1;
        }
        added
    }

    /// Insert one live-discovered entry at the head.
    ///
    /// A duplicate is a no-op, not an update. Returns whether the entry
    /// was actually inserted.
    pub fn prepend_live(&self, entry: ResolvedEntry) -> bool {
        if self.detached.load(Ordering::Relaxed) {
            debug!("prepend on detached catalog ignored");
            return false;
        }

        let mut state = self.lock();
        let id = entry.token_ref.id;
        if state.seen.contains(&id) {
            debug!(token_id = id, "live duplicate collapsed");
            return false;
        }
        state.seen.insert(id);
        Self::land_current(&mut state, id);
        if !entry.is_ready() && self.policy == FailurePolicy::Omit {
            return false;
        }
        state.entries.insert(0, entry);
        true
    }

    /// Record a degraded placeholder for a token.
    ///
    /// Never demotes an entry that is already `Ready`; updates the reason of
    /// an existing placeholder; otherwise appends a new placeholder at the
    /// tail (or, under the omit policy, just remembers the id).
    pub fn mark_failed(&self, token_ref: TokenRef, reason: impl Into<String>) {
        if self.detached.load(Ordering::Relaxed) {
            return;
        }

        let reason = reason.into();
        let mut state = self.lock();
        if let Some(existing) = state
            .entries
            .iter_mut()
            .find(|e| e.token_ref.id == token_ref.id)
        {
            if existing.is_ready() {
                return;
            }
            existing.status = EntryStatus::Failed { reason };
            return;
        }

        state.seen.insert(token_ref.id);
        Self::land_current(&mut state, token_ref.id);
        if self.policy == FailurePolicy::RetainPlaceholder {
            state.entries.push(ResolvedEntry::failed(token_ref, reason));
        }
    }

    /// Advance the backfill consumed-counter to an absolute offset.
    ///
    /// Monotonic: retrying a page can only re-report an offset already
    /// reached, never rewind it.
    pub fn note_backfill_consumed(&self, consumed: u64) {
        if self.detached.load(Ordering::Relaxed) {
            return;
        }
        let mut state = self.lock();
        state.backfill_consumed = state.backfill_consumed.max(consumed);
    }

    /// True while backfill has not consumed the whole known collection.
    ///
    /// Live-prepended entries are additional to backfill's range and do not
    /// count against this.
    pub fn has_more(&self) -> bool {
        let state = self.lock();
        state.backfill_consumed < state.known_supply
    }

    /// Read-only copy of the presentation order, head first
    pub fn snapshot(&self) -> Vec<ResolvedEntry> {
        self.lock().entries.clone()
    }

    /// Count of materialized entries
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn contains(&self, token_id: u64) -> bool {
        self.lock().seen.contains(&token_id)
    }

    /// Copy of one entry, if currently materialized
    pub fn get(&self, token_id: u64) -> Option<ResolvedEntry> {
        self.lock()
            .entries
            .iter()
            .find(|e| e.token_ref.id == token_id)
            .cloned()
    }

    /// Hand out the next resolution generation for a token.
    ///
    /// Completions are ordered by start time per id: a completion is
    /// discarded if a newer one has already landed.
    pub fn begin_resolution(&self, token_id: u64) -> u64 {
        let mut state = self.lock();
        let gen = state.started_gen.entry(token_id).or_insert(0);
        *gen += 1;
        *gen
    }

    /// Replace a token's entry in place with a re-resolution result.
    ///
    /// The entry keeps its presentation position. A stale completion (an
    /// older generation than what already landed) is discarded. Returns
    /// whether the replacement landed.
    pub fn replace_entry(&self, entry: ResolvedEntry, generation: u64) -> bool {
        if self.detached.load(Ordering::Relaxed) {
            return false;
        }

        let mut state = self.lock();
        let id = entry.token_ref.id;
        let landed = state.landed_gen.get(&id).copied().unwrap_or(0);
        if landed >= generation {
            warn!(
                token_id = id,
                generation,
                landed,
                "stale resolution completion discarded"
            );
            return false;
        }
        state.landed_gen.insert(id, generation);

        if let Some(position) = state.entries.iter().position(|e| e.token_ref.id == id) {
            state.entries[position] = entry;
            return true;
        }

        // Previously omitted or never materialized
        state.seen.insert(id);
        if !entry.is_ready() && self.policy == FailurePolicy::Omit {
            return false;
        }
        state.entries.push(entry);
        true
    }

    /// Detach the catalog: every further write becomes a no-op.
    ///
    /// In-flight fetches that complete after teardown land here harmlessly.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::Relaxed);
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Relaxed)
    }

    /// Mark the current generation as landed for an id being inserted
    fn land_current(state: &mut CatalogState, id: u64) {
        let started = state.started_gen.get(&id).copied().unwrap_or(0);
        state.landed_gen.insert(id, started);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogState> {
        // A poisoned catalog lock means a panic mid-mutation; the entry list
        // is still structurally valid, so keep serving it.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
