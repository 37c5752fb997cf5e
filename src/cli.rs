//! Command line interface for the `repframe` demo server.
//!
//! Provides the server settings as flags with environment fallbacks, and is
//! reused by the build script for man page generation.

use clap::Parser;

/// Command line arguments for the `repframe` binary.
#[derive(Debug, Parser)]
#[command(name = "repframe", version, about = "Single-endpoint request/reply server")]
pub struct Cli {
    /// Endpoint to bind, as `tcp://host:port`.
    #[arg(long, env = "REPFRAME_ADDRESS", default_value = "tcp://*:5555")]
    pub address: String,

    /// Milliseconds between polls of the endpoint.
    #[arg(long, env = "REPFRAME_POLL_INTERVAL_MS", default_value_t = 500)]
    pub poll_interval_ms: u64,

    /// Counted consecutive receive failures before the endpoint is recreated.
    #[arg(long, env = "REPFRAME_ERROR_THRESHOLD", default_value_t = 3)]
    pub error_threshold: u32,

    /// Maximum milliseconds a request may take to handle.
    #[arg(long, env = "REPFRAME_HANDLER_TIMEOUT_MS")]
    pub handler_timeout_ms: Option<u64>,

    /// Maximum milliseconds a reply write may stall before the peer is dropped.
    #[arg(long, env = "REPFRAME_SEND_TIMEOUT_MS", default_value_t = 5_000)]
    pub send_timeout_ms: u64,

    /// Reply sent for every well-formed request.
    #[arg(long, default_value = "pong")]
    pub reply: String,
}
