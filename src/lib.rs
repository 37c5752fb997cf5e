#![doc(html_root_url = "https://docs.rs/repframe/latest")]
//! Public API for the `repframe` library.
//!
//! This crate provides a resilient single-endpoint request/reply server: a
//! bound endpoint polled on a fixed cadence, a pluggable request handler,
//! endpoint recreation after sustained receive failures, and a clean
//! shutdown barrier. A license reader for feature enablement ships alongside.

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod license;
pub mod server;
pub mod session;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use codec::{BincodeCodec, Request, WireCodec};
pub use endpoint::{Bind, Endpoint, EndpointAddress, RepEndpoint, TcpBinder};
pub use handler::RequestHandler;
pub use server::{RepServer, ServerConfig, ServerHandle, WorkerState};
