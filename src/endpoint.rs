//! Request/reply endpoints.
//!
//! An [`Endpoint`] is the bound network resource the server polls. It is
//! created through a [`Bind`] implementation so the transport can be swapped;
//! [`TcpBinder`] produces the stock [`RepEndpoint`].
//!
//! Endpoints enforce strict alternation: after [`Endpoint::try_recv`] yields
//! a frame, the next receive fails with
//! [`ReceiveError::ReplyPending`](crate::error::ReceiveError::ReplyPending)
//! until [`Endpoint::send`] has been called.

mod address;
mod rep;
#[cfg(test)]
mod tests;

use std::{io, net::SocketAddr};

pub use address::EndpointAddress;
use async_trait::async_trait;
use bytes::Bytes;
pub use rep::{DEFAULT_MAX_FRAME_LENGTH, DEFAULT_SEND_TIMEOUT, RepEndpoint, TcpBinder};

use crate::error::{BindError, ReceiveError, SendError};

/// A bound request/reply endpoint.
#[async_trait]
pub trait Endpoint: Send + 'static {
    /// Attempt to receive one request frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError::WouldBlock`] when nothing is pending, and any
    /// other variant when the endpoint cannot receive.
    fn try_recv(&mut self) -> Result<Bytes, ReceiveError>;

    /// Send the reply to the most recently received request.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] if no request is pending or the transport fails.
    async fn send(&mut self, reply: Bytes) -> Result<(), SendError>;

    /// Close the endpoint, releasing its connections.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error raised while shutting connections down.
    async fn close(&mut self) -> io::Result<()>;

    /// Address the endpoint is bound to, when the transport has one.
    fn local_addr(&self) -> Option<SocketAddr> { None }
}

/// Factory for endpoints bound at a given address.
#[async_trait]
pub trait Bind: Send + Sync + 'static {
    /// Endpoint type produced by this binder.
    type Endpoint: Endpoint;

    /// Bind a fresh endpoint at `address`.
    ///
    /// # Errors
    ///
    /// Returns a [`BindError`] if the address cannot be bound.
    async fn bind(&self, address: &EndpointAddress) -> Result<Self::Endpoint, BindError>;
}
