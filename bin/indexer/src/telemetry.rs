//! Tracing and Prometheus setup.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

/// Maps the `-v` count to a default log level.
pub const fn verbosity_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` directives override the verbosity level.
pub fn init_tracing_subscriber(verbosity: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level(verbosity).into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
}

/// Starts the Prometheus metrics server on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_prometheus_server(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    info!(target: "prometheus", "Serving metrics at: http://{addr}");
    Ok(())
}
