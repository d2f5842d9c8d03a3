use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::num::NonZeroUsize;
use orderinfo_core::types::DEFAULT_BATCH_SIZE;

const DEFAULT_STREAM_BUFFER_SIZE: usize = 16;

/// How `ProcessOrders` groups order identifiers into combined shipments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ShipmentGrouping {
    /// One combined shipment per batch window.
    #[default]
    Single,
    /// One combined shipment per stored order destination. Identifiers that
    /// are not in the store share the empty destination.
    Destination,
}

/// Runtime configuration for the `orderinfo-server` binary.
///
/// All values are parsed from CLI arguments or environment variables, with
/// defaults suitable for local use.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "orderinfo-server",
    version,
    about = "A gRPC service for products, orders and combined shipments"
)]
pub struct CliArgs {
    /// Number of order identifiers accumulated by `ProcessOrders` before the
    /// combined shipments are flushed to the caller.
    ///
    /// Environment variable: `ORDER_BATCH_SIZE`
    #[arg(long, env = "ORDER_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Grouping key for combined shipments.
    ///
    /// Environment variable: `SHIPMENT_GROUPING`
    #[arg(long, env = "SHIPMENT_GROUPING", value_enum, default_value_t = ShipmentGrouping::Single)]
    pub grouping: ShipmentGrouping,

    /// Capacity of the channel between a streaming handler and the gRPC
    /// response stream.
    ///
    /// Lower values increase backpressure responsiveness; higher values let a
    /// handler run further ahead of a slow reader.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = DEFAULT_STREAM_BUFFER_SIZE)]
    pub stream_buffer_size: usize,

    /// Seconds to wait for in-flight streams to finish during shutdown before
    /// they are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/orderinfo.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,
}

/// Validated server configuration.
///
/// Sizes are non-zero by construction, so a hand-built value is as safe to
/// use as one parsed from [`CliArgs`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub batch_size: NonZeroUsize,
    pub grouping: ShipmentGrouping,
    pub stream_buffer_size: NonZeroUsize,
    pub shutdown_timeout: u64,
    pub server_addr: String,
    pub uds: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            batch_size: NonZeroUsize::new(DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN),
            grouping: ShipmentGrouping::Single,
            stream_buffer_size: NonZeroUsize::new(DEFAULT_STREAM_BUFFER_SIZE)
                .unwrap_or(NonZeroUsize::MIN),
            shutdown_timeout: 3,
            server_addr: String::from("0.0.0.0:50051"),
            uds: false,
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let Some(batch_size) = NonZeroUsize::new(args.batch_size) else {
            bail!("ORDER_BATCH_SIZE must be greater than 0");
        };

        let Some(stream_buffer_size) = NonZeroUsize::new(args.stream_buffer_size) else {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        };

        Ok(Self {
            batch_size,
            grouping: args.grouping,
            stream_buffer_size,
            shutdown_timeout: args.shutdown_timeout,
            server_addr: args.server_addr,
            uds: args.uds,
        })
    }
}
