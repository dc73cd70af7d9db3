//! Vitrine - read-side catalog engine for on-chain minted media
//!
//! Turns an append-only ledger of mint events plus content-addressed
//! metadata documents into a consistent, incrementally loadable,
//! newest-first catalog.
//!
//! ## Components
//!
//! - **Ledger**: JSON-RPC read surface over the collection contract
//!   (supply, index lookups, metadata pointers, mint events)
//! - **Gateway**: `ipfs://` pointer rewriting and document fetching over
//!   an HTTP gateway
//! - **Enumeration**: index-based or event-log token discovery, paged
//!   newest first
//! - **Pipeline**: per-token metadata resolution, normalization, and
//!   media classification
//! - **Catalog**: deduplicated presentation order with live head inserts,
//!   placeholder policy, and idempotent pagination

pub mod catalog;
pub mod config;
pub mod enumerate;
pub mod gateway;
pub mod ledger;
pub mod live;
pub mod media;
pub mod metadata;
pub mod pipeline;
pub mod types;

pub use catalog::session::{CatalogSession, PageOutcome, SessionConfig};
pub use config::Args;
pub use types::{Result, VitrineError};
