//! Global arguments for the CLI.

use clap::{ArgAction, Args};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Global arguments for the CLI.
#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Log verbosity: info by default, `-v` for debug, `-vv` for trace. `RUST_LOG` takes
    /// precedence when set.
    #[arg(short, long = "verbose", action = ArgAction::Count, global = true)]
    pub v: u8,
    /// Prometheus CLI arguments.
    #[command(flatten)]
    pub metrics: MetricsArgs,
}

/// Prometheus exporter arguments.
#[derive(Args, Clone, Debug)]
pub struct MetricsArgs {
    /// Serve Prometheus metrics.
    #[arg(long = "metrics.enabled", env = "METRICS_ENABLED", default_value_t = false)]
    pub enabled: bool,
    /// Address the metrics server listens on.
    #[arg(long = "metrics.addr", env = "METRICS_ADDR", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub addr: IpAddr,
    /// Port the metrics server listens on.
    #[arg(long = "metrics.port", env = "METRICS_PORT", default_value_t = 9090)]
    pub port: u16,
}

impl MetricsArgs {
    /// Socket address of the metrics server.
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}
