//! Contains the indexer CLI.

use crate::{
    flags::{FetchArgs, GlobalArgs, IngestArgs},
    telemetry::{init_prometheus_server, init_tracing_subscriber},
};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use l2scan_service::{IndexerConfig, IndexerService};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

/// l2scan rollup indexer.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global arguments for the CLI.
    #[command(flatten)]
    pub global: GlobalArgs,
    /// JSON-RPC endpoint of the L1 execution client.
    #[arg(long, env = "L1_RPC")]
    pub l1_rpc: Url,
    /// JSON-RPC endpoint of the L2 node.
    #[arg(long, env = "L2_NODE_RPC")]
    pub l2_node_rpc: Url,
    /// Address of the rollup contract on L1.
    #[arg(long, env = "ROLLUP_ADDRESS")]
    pub rollup_address: Address,
    /// SQLite database file. An in-memory database is used when unset.
    #[arg(long, env = "DATABASE_PATH")]
    pub database_path: Option<PathBuf>,
    /// Retry and circuit breaker arguments.
    #[command(flatten)]
    pub fetch: FetchArgs,
    /// Poller, verifier and scheduling arguments.
    #[command(flatten)]
    pub ingest: IngestArgs,
}

impl Cli {
    /// Runs the CLI.
    pub fn run(self) -> Result<()> {
        init_tracing_subscriber(self.global.v)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime")?;
        runtime.block_on(self.start())
    }

    /// Returns the service configuration described by the flags.
    pub fn config(&self) -> IndexerConfig {
        IndexerConfig {
            l1_rpc: self.l1_rpc.clone(),
            l2_node_rpc: self.l2_node_rpc.clone(),
            rollup_address: self.rollup_address,
            database_path: self.database_path.clone(),
            fetch: self.fetch.config(),
            dropped_tx: self.ingest.dropped_tx(),
            poller: self.ingest.poller(),
            intervals: self.ingest.intervals(),
            bus_capacity: self.ingest.bus_capacity,
        }
    }

    /// Starts the indexer and runs it until ctrl-c is pressed.
    pub async fn start(self) -> Result<()> {
        if self.global.metrics.enabled {
            init_prometheus_server(self.global.metrics.socket_addr())
                .context("failed to start metrics server")?;
        }

        let cancel = CancellationToken::new();
        let service = IndexerService::builder(self.config()).build();
        let handle = tokio::spawn(service.run(cancel.clone()));

        let shutdown = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!(target: "indexer", "Received ctrl-c, shutting down");
            }
            shutdown.cancel();
        });

        handle.await.context("indexer task panicked")??;
        Ok(())
    }
}
