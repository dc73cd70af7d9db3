//! Vitrine - read-side catalog engine for on-chain minted media

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vitrine::{
    config::Args,
    gateway::{GatewayResolver, HttpGateway},
    ledger::{RpcLedger, RpcLedgerConfig},
    CatalogSession, SessionConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vitrine={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Vitrine - on-chain media catalog");
    info!("======================================");
    info!("Build: {} ({})", env!("GIT_COMMIT_SHORT"), env!("BUILD_TIMESTAMP"));
    info!("Ledger RPC: {}", args.rpc_url);
    info!("Contract: {}", args.contract_address);
    info!("Gateway: {}", args.gateway_base());
    info!("Strategy: {:?}", args.strategy);
    info!("Failure policy: {:?}", args.failure_policy());
    info!("Page size: {}", args.page_size);
    info!("Workers: {}", args.worker_count);
    info!("======================================");

    let ledger = Arc::new(RpcLedger::new(RpcLedgerConfig {
        endpoint: args.rpc_url.clone(),
        contract_address: args.contract_address.clone(),
        request_timeout: args.request_timeout(),
        poll_interval: args.poll_interval(),
    }));

    let resolver = Arc::new(GatewayResolver::new(
        Arc::new(HttpGateway::new()),
        args.gateway_base(),
        args.request_timeout(),
    ));

    let session_config = SessionConfig {
        strategy: args.strategy,
        failure_policy: args.failure_policy(),
        page_size: args.page_size,
        worker_count: args.worker_count,
        from_block: args.from_block,
    };

    let session = match CatalogSession::initialize(ledger, resolver, session_config).await {
        Ok(session) => session,
        Err(e) => {
            error!("Catalog initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    // Backfill until the enumeration strategy is exhausted
    let mut pages_loaded = 1u64;
    while session.has_more() {
        match session.load_next_page().await {
            Ok(outcome) => {
                pages_loaded += 1;
                info!(
                    page = pages_loaded,
                    added = outcome.items_added,
                    total = session.snapshot().len(),
                    has_more = outcome.has_more,
                    "backfill page loaded"
                );
            }
            Err(e) => {
                error!("Backfill page failed: {}", e);
                break;
            }
        }
    }

    let entries = session.snapshot();
    let ready = entries.iter().filter(|e| e.is_ready()).count();
    info!(
        total = entries.len(),
        ready,
        degraded = entries.len() - ready,
        "backfill complete"
    );

    if args.follow {
        info!("Following live mints (Ctrl-C to stop)");
        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");
    }

    session.dispose();
    Ok(())
}
