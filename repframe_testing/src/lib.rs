//! Utilities for exercising a `repframe` server over real sockets in tests.
//!
//! ```rust,no_run
//! use repframe::codec::Request;
//! use repframe_testing::ReqClient;
//!
//! # async fn example(addr: std::net::SocketAddr) -> std::io::Result<()> {
//! let mut client = ReqClient::connect(addr).await?;
//! let reply = client.request(&Request::new("svc", "ping")).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod net;

pub use client::ReqClient;
pub use net::{free_addr, unused_endpoint};
