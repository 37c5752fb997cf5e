//! Socket session: the single owner of the server's endpoint.
//!
//! The session keeps the endpoint in a slot. [`SocketSession::recreate`]
//! replaces the slot's contents in place, so every later poll and send uses
//! the new endpoint. The session also tracks consecutive receive failures and
//! decides when recreation is due.


use std::net::SocketAddr;

use bytes::Bytes;
use log::{info, warn};

use crate::{
    endpoint::{Bind, Endpoint, EndpointAddress},
    error::{BindError, ReceiveError, SendError},
};

/// Consecutive-failure bookkeeping for the receive path.
///
/// `consecutive_errors` only increments once `persistent_error` is already
/// set, so the first failure of a run is not counted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorState {
    /// Failures counted since the last success or recreation.
    pub consecutive_errors: u32,
    /// Whether the previous receive attempt failed.
    pub persistent_error: bool,
}

/// Result of one non-blocking poll.
#[derive(Debug)]
pub enum ReceiveOutcome {
    /// Nothing was pending.
    NoMessageAvailable,
    /// A request frame arrived.
    Received(Bytes),
    /// The receive failed for a reason other than "nothing pending".
    ReceiveFailed(ReceiveError),
}

/// Owns the bound endpoint and its recovery policy.
pub struct SocketSession<B: Bind> {
    binder: B,
    address: EndpointAddress,
    endpoint: Option<B::Endpoint>,
    errors: ErrorState,
    threshold: u32,
}

impl<B: Bind> SocketSession<B> {
    /// Bind the initial endpoint.
    ///
    /// `threshold` is the counted failure total at which
    /// [`record_failure`](Self::record_failure) requests recreation; values
    /// below 1 are raised to 1.
    ///
    /// # Errors
    ///
    /// Returns a [`BindError`] if the address cannot be bound.
    pub async fn bind(binder: B, address: EndpointAddress, threshold: u32) -> Result<Self, BindError> {
        let endpoint = binder.bind(&address).await?;
        Ok(Self::from_parts(binder, address, endpoint, threshold))
    }

    /// Assemble a session around an endpoint that is already bound.
    pub fn from_parts(binder: B, address: EndpointAddress, endpoint: B::Endpoint, threshold: u32) -> Self {
        Self {
            binder,
            address,
            endpoint: Some(endpoint),
            errors: ErrorState::default(),
            threshold: threshold.max(1),
        }
    }

    /// Poll the endpoint once without waiting.
    pub fn poll_once(&mut self) -> ReceiveOutcome {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return ReceiveOutcome::ReceiveFailed(ReceiveError::Unbound);
        };
        match endpoint.try_recv() {
            Ok(frame) => ReceiveOutcome::Received(frame),
            Err(e) if e.is_transient() => ReceiveOutcome::NoMessageAvailable,
            Err(e) => ReceiveOutcome::ReceiveFailed(e),
        }
    }

    /// Record a persistent receive failure.
    ///
    /// Returns `true` when the counted failures have reached the threshold
    /// and the endpoint should be recreated.
    pub fn record_failure(&mut self) -> bool {
        if self.errors.persistent_error {
            self.errors.consecutive_errors += 1;
        }
        self.errors.persistent_error = true;
        self.errors.consecutive_errors >= self.threshold
    }

    /// Record a successful receive, clearing all failure state.
    pub fn record_success(&mut self) { self.errors = ErrorState::default(); }

    /// Close the current endpoint and bind a replacement at the same address.
    ///
    /// The failure counter is reset whether or not the new bind succeeds. On
    /// bind failure the slot stays empty and later polls report
    /// [`ReceiveError::Unbound`], so recovery is attempted again once the
    /// threshold is reached.
    ///
    /// # Errors
    ///
    /// Returns a [`BindError`] if the replacement cannot be bound.
    pub async fn recreate(&mut self) -> Result<(), BindError> {
        info!("recreating endpoint: address={}", self.address);
        self.errors.consecutive_errors = 0;
        self.close().await;
        let endpoint = self.binder.bind(&self.address).await?;
        self.endpoint = Some(endpoint);
        Ok(())
    }

    /// Send a reply on the current endpoint.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] if the slot is empty or the endpoint rejects
    /// the reply.
    pub async fn send(&mut self, reply: Bytes) -> Result<(), SendError> {
        match self.endpoint.as_mut() {
            Some(endpoint) => endpoint.send(reply).await,
            None => Err(SendError::Unbound),
        }
    }

    /// Close and release the endpoint. Later calls do nothing.
    pub async fn close(&mut self) {
        if let Some(mut endpoint) = self.endpoint.take()
            && let Err(e) = endpoint.close().await
        {
            warn!("failed to close endpoint: address={}, error={e}", self.address);
        }
    }

    /// Current failure bookkeeping.
    #[must_use]
    pub const fn error_state(&self) -> ErrorState { self.errors }

    /// Whether an endpoint is currently bound.
    #[must_use]
    pub const fn is_bound(&self) -> bool { self.endpoint.is_some() }

    /// Address the session binds to.
    #[must_use]
    pub const fn address(&self) -> &EndpointAddress { &self.address }

    /// Address reported by the current endpoint, if any.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.endpoint.as_ref().and_then(Endpoint::local_addr)
    }
}
