//! Configuration for Vitrine
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::catalog::FailurePolicy;

/// Vitrine - read-side catalog engine for on-chain minted media
///
/// Discovers tokens from a ledger, resolves their content-addressed
/// metadata through an HTTP gateway, and maintains a newest-first catalog.
#[derive(Parser, Debug, Clone)]
#[command(name = "vitrine")]
#[command(about = "Collection discovery and metadata resolution engine")]
pub struct Args {
    /// Ledger JSON-RPC endpoint
    #[arg(long, env = "RPC_URL", default_value = "http://localhost:8545")]
    pub rpc_url: String,

    /// Collection contract address (0x-prefixed, 20 bytes)
    #[arg(long, env = "CONTRACT_ADDRESS")]
    pub contract_address: String,

    /// HTTP gateway base for content-addressed (ipfs://) pointers
    #[arg(
        long,
        env = "GATEWAY_BASE",
        default_value = "https://gateway.pinata.cloud/ipfs/"
    )]
    pub gateway_base: String,

    /// Token discovery strategy
    #[arg(long, env = "DISCOVERY_STRATEGY", value_enum, default_value = "event-log")]
    pub strategy: DiscoveryStrategy,

    /// What to do with entries whose metadata cannot be resolved
    #[arg(long, env = "FAILURE_POLICY", value_enum, default_value = "placeholder")]
    pub failure_policy: FailurePolicyArg,

    /// Number of entries per backfill page
    #[arg(long, env = "PAGE_SIZE", default_value = "12")]
    pub page_size: usize,

    /// Bounded concurrency for per-item metadata resolution
    #[arg(long, env = "WORKER_COUNT", default_value = "4")]
    pub worker_count: usize,

    /// Timeout for each gateway fetch and probe, in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    /// Interval between live mint polls, in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS", default_value = "4000")]
    pub poll_interval_ms: u64,

    /// Earliest block for the historical mint sweep (event-log strategy)
    #[arg(long, env = "FROM_BLOCK", default_value = "0")]
    pub from_block: u64,

    /// Keep running after backfill and follow live mints
    #[arg(long, env = "FOLLOW", default_value = "false")]
    pub follow: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Which ledger interface drives token discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiscoveryStrategy {
    /// Bounded random access via totalSupply + tokenByIndex
    Index,
    /// Historical sweep of mint events + live subscription
    EventLog,
}

/// CLI-facing mirror of [`FailurePolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailurePolicyArg {
    /// Keep failed items as degraded placeholders
    Placeholder,
    /// Silently exclude failed items from the catalog
    Omit,
}

impl Args {
    /// Gateway base with a guaranteed trailing slash
    pub fn gateway_base(&self) -> String {
        if self.gateway_base.ends_with('/') {
            self.gateway_base.clone()
        } else {
            format!("{}/", self.gateway_base)
        }
    }

    /// Per-request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Live poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Domain-level failure policy
    pub fn failure_policy(&self) -> FailurePolicy {
        match self.failure_policy {
            FailurePolicyArg::Placeholder => FailurePolicy::RetainPlaceholder,
            FailurePolicyArg::Omit => FailurePolicy::Omit,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !is_hex_address(&self.contract_address) {
            return Err(format!(
                "CONTRACT_ADDRESS must be a 0x-prefixed 20-byte hex address, got '{}'",
                self.contract_address
            ));
        }

        if self.page_size == 0 {
            return Err("PAGE_SIZE must be at least 1".to_string());
        }

        if self.worker_count == 0 {
            return Err("WORKER_COUNT must be at least 1".to_string());
        }

        if !self.gateway_base.starts_with("http://") && !self.gateway_base.starts_with("https://") {
            return Err("GATEWAY_BASE must be an http(s) URL".to_string());
        }

        Ok(())
    }
}

fn is_hex_address(s: &str) -> bool {
    s.len() == 42 && s.starts_with("0x") && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}
