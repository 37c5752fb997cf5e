//! Tokio-based request/reply server.
//!
//! [`RepServer`] carries a typestate `S` recording whether its endpoint is
//! bound. New servers start [`Unbound`]; [`RepServer::bind`] (or
//! [`RepServer::bind_with`] for a custom transport) produces a
//! [`Bound`] server, and only a bound server can [`start`](RepServer::start).
//! Starting consumes the server, so a server instance runs at most once.

use std::{future::Future, net::SocketAddr, time::Duration};

use log::info;
use tokio::{signal, sync::watch};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    codec::WireCodec,
    endpoint::{Bind, EndpointAddress, TcpBinder},
    error::BindError,
    handler::RequestHandler,
    session::SocketSession,
};

mod config;
mod handle;
#[cfg(test)]
mod tests;
mod worker;

pub use config::{DEFAULT_ADDRESS, ServerConfig};
pub use handle::ServerHandle;
pub use worker::{DropReason, TickOutcome, WorkerState};
use worker::Worker;

/// Single-endpoint request/reply server.
///
/// `C` decodes requests and encodes replies, `H` turns requests into reply
/// bytes, and `S` is the binding typestate.
///
/// # Examples
///
/// ```no_run
/// use bytes::Bytes;
/// use repframe::{
///     codec::{BincodeCodec, Request},
///     error::HandlerError,
///     server::RepServer,
/// };
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), repframe::error::BindError> {
/// let handler = |_: Request| -> Result<Bytes, HandlerError> { Ok(Bytes::from_static(b"pong")) };
/// let handle = RepServer::new(BincodeCodec::<Request>::new(), handler)
///     .bind()
///     .await?
///     .start();
/// // ... serve until it is time to stop ...
/// handle.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct RepServer<C, H, S = Unbound>
where
    C: WireCodec,
    H: RequestHandler<C::Request>,
    S: ServerState,
{
    codec: C,
    handler: H,
    config: ServerConfig,
    state: S,
}

/// Marker indicating the server has no endpoint yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker holding the bound session.
pub struct Bound<B: Bind> {
    session: SocketSession<B>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl<B: super::Bind> Sealed for super::Bound<B> {}
}

impl ServerState for Unbound {}
impl<B: Bind> ServerState for Bound<B> {}

impl<C, H> RepServer<C, H, Unbound>
where
    C: WireCodec,
    H: RequestHandler<C::Request>,
{
    /// Create an unbound server with the default [`ServerConfig`].
    #[must_use]
    pub fn new(codec: C, handler: H) -> Self {
        Self {
            codec,
            handler,
            config: ServerConfig::default(),
            state: Unbound,
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the address to bind.
    #[must_use]
    pub fn address(mut self, address: EndpointAddress) -> Self {
        self.config.address = address;
        self
    }

    /// Set the counted failure total that triggers endpoint recreation.
    #[must_use]
    pub fn error_threshold(mut self, threshold: u32) -> Self {
        self.config.error_threshold = threshold;
        self
    }

    /// Bind a [`TcpBinder`] endpoint at the configured address, with reply
    /// writes bounded by the configured send timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`BindError`] if the address cannot be bound. The server
    /// must not run unbound, so this is fatal to startup.
    pub async fn bind(self) -> Result<RepServer<C, H, Bound<TcpBinder>>, BindError> {
        let limit = self.config.send_timeout.max(Duration::from_millis(1));
        let binder = TcpBinder::default().with_send_timeout(limit);
        self.bind_with(binder).await
    }

    /// Bind an endpoint produced by `binder` at the configured address.
    ///
    /// # Errors
    ///
    /// Returns a [`BindError`] if the address cannot be bound.
    pub async fn bind_with<B: Bind>(self, binder: B) -> Result<RepServer<C, H, Bound<B>>, BindError> {
        let RepServer {
            codec,
            handler,
            config,
            ..
        } = self;
        let config = config.normalized();
        let session = SocketSession::bind(binder, config.address.clone(), config.error_threshold).await?;
        info!(
            "bound endpoint: address={}, local_addr={:?}",
            config.address,
            session.local_addr()
        );
        Ok(RepServer {
            codec,
            handler,
            config,
            state: Bound { session },
        })
    }
}

impl<C, H, S> RepServer<C, H, S>
where
    C: WireCodec,
    H: RequestHandler<C::Request>,
    S: ServerState,
{
    /// Set the interval between polls of the endpoint.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Bound every handler call by `limit`. Requests exceeding it are dropped.
    #[must_use]
    pub fn handler_timeout(mut self, limit: Duration) -> Self {
        self.config.handler_timeout = Some(limit);
        self
    }

    /// Bound every reply write made by [`bind`](RepServer::bind) endpoints.
    ///
    /// Custom binders passed to [`bind_with`](RepServer::bind_with) apply
    /// their own limit.
    #[must_use]
    pub fn send_timeout(mut self, limit: Duration) -> Self {
        self.config.send_timeout = limit.max(Duration::from_millis(1));
        self
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig { &self.config }
}

impl<C, H, B> RepServer<C, H, Bound<B>>
where
    C: WireCodec,
    H: RequestHandler<C::Request>,
    B: Bind,
{
    /// Address reported by the bound endpoint.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.session.local_addr() }

    /// Launch the worker loop in the background and return immediately.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use = "dropping the handle stops the server without waiting for it"]
    pub fn start(self) -> ServerHandle {
        let RepServer {
            codec,
            handler,
            config,
            state: Bound { session },
        } = self;
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let (state_tx, state_rx) = watch::channel(WorkerState::Idle);
        let local_addr = session.local_addr();

        info!("starting request/reply server: address={}", config.address);
        let worker = Worker {
            session,
            codec,
            handler,
            handler_timeout: config.handler_timeout,
            state: state_tx,
        };
        tracker.spawn(worker.run(shutdown.clone(), config.poll_interval));
        tracker.close();

        ServerHandle::new(shutdown, tracker, state_rx, local_addr)
    }

    /// Run until the `shutdown` future resolves, then stop and wait for the
    /// worker to exit.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let handle = self.start();
        shutdown.await;
        handle.shutdown().await;
    }

    /// Run until Ctrl+C is received.
    pub async fn run(self) {
        self.run_until(async {
            let _ = signal::ctrl_c().await;
        })
        .await;
    }
}
