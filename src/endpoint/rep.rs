//! TCP reply endpoint speaking length-delimited frames.

use std::{
    io,
    net::SocketAddr,
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt, task::noop_waker_ref};
use log::debug;
use tokio::{
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use super::{Bind, Endpoint, EndpointAddress};
use crate::error::{BindError, ReceiveError, SendError};

/// Largest frame accepted by default (16 MiB).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Longest a reply write may stall before the peer is dropped.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Binds [`RepEndpoint`]s on TCP listeners.
#[derive(Clone, Copy, Debug)]
pub struct TcpBinder {
    max_frame_length: usize,
    send_timeout: Duration,
}

impl TcpBinder {
    /// Create a binder whose endpoints reject frames above `max_frame_length`.
    #[must_use]
    pub const fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Bound every reply write by `limit`.
    ///
    /// A peer that does not drain its replies within `limit` is
    /// disconnected.
    #[must_use]
    pub const fn with_send_timeout(mut self, limit: Duration) -> Self {
        self.send_timeout = limit;
        self
    }
}

impl Default for TcpBinder {
    fn default() -> Self { Self::new(DEFAULT_MAX_FRAME_LENGTH) }
}

#[async_trait]
impl Bind for TcpBinder {
    type Endpoint = RepEndpoint;

    async fn bind(&self, address: &EndpointAddress) -> Result<RepEndpoint, BindError> {
        let listener = TcpListener::bind(address.socket_addr())
            .await
            .map_err(|source| BindError::Io {
                address: address.to_string(),
                source,
            })?;
        Ok(RepEndpoint::new(listener, self.max_frame_length).with_send_timeout(self.send_timeout))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RepState {
    AwaitingRequest,
    ReadyToReply { peer: u64 },
}

#[derive(Debug)]
struct Peer {
    id: u64,
    addr: SocketAddr,
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

/// Reply endpoint over a TCP listener.
///
/// Any number of peers may connect. Each poll accepts pending connections
/// and then checks peers round-robin for one complete frame. The reply to a
/// frame goes back to the peer that sent it.
#[derive(Debug)]
pub struct RepEndpoint {
    listener: TcpListener,
    peers: Vec<Peer>,
    next_id: u64,
    cursor: usize,
    state: RepState,
    max_frame_length: usize,
    send_timeout: Duration,
}

impl RepEndpoint {
    /// Wrap a bound listener.
    #[must_use]
    pub fn new(listener: TcpListener, max_frame_length: usize) -> Self {
        Self {
            listener,
            peers: Vec::new(),
            next_id: 0,
            cursor: 0,
            state: RepState::AwaitingRequest,
            max_frame_length,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Bound every reply write by `limit`.
    #[must_use]
    pub const fn with_send_timeout(mut self, limit: Duration) -> Self {
        self.send_timeout = limit;
        self
    }

    /// Number of currently connected peers.
    #[must_use]
    pub fn peer_count(&self) -> usize { self.peers.len() }

    fn accept_pending(&mut self, cx: &mut Context<'_>) -> io::Result<()> {
        loop {
            match self.listener.poll_accept(cx) {
                Poll::Ready(Ok((stream, addr))) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("failed to set TCP_NODELAY: peer_addr={addr}, error={e}");
                    }
                    let codec = LengthDelimitedCodec::builder()
                        .max_frame_length(self.max_frame_length)
                        .new_codec();
                    let id = self.next_id;
                    self.next_id += 1;
                    debug!("accepted peer: id={id}, peer_addr={addr}");
                    self.peers.push(Peer {
                        id,
                        addr,
                        framed: Framed::new(stream, codec),
                    });
                }
                Poll::Ready(Err(e)) => return Err(e),
                Poll::Pending => return Ok(()),
            }
        }
    }

    fn poll_peers(&mut self, cx: &mut Context<'_>) -> Option<(u64, Bytes)> {
        let count = self.peers.len();
        let mut found = None;
        let mut dead = Vec::new();
        for offset in 0..count {
            let idx = (self.cursor + offset) % count;
            let peer = &mut self.peers[idx];
            match peer.framed.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(frame))) => {
                    found = Some((idx, peer.id, frame.freeze()));
                    break;
                }
                Poll::Ready(Some(Err(e))) => {
                    debug!(
                        "dropping peer after read error: id={}, peer_addr={}, error={e}",
                        peer.id, peer.addr
                    );
                    dead.push(peer.id);
                }
                Poll::Ready(None) => {
                    debug!("peer disconnected: id={}, peer_addr={}", peer.id, peer.addr);
                    dead.push(peer.id);
                }
                Poll::Pending => {}
            }
        }
        if !dead.is_empty() {
            self.peers.retain(|p| !dead.contains(&p.id));
        }
        found.map(|(idx, id, frame)| {
            self.cursor = idx + 1;
            (id, frame)
        })
    }
}

#[async_trait]
impl Endpoint for RepEndpoint {
    fn try_recv(&mut self) -> Result<Bytes, ReceiveError> {
        if self.state != RepState::AwaitingRequest {
            return Err(ReceiveError::ReplyPending);
        }
        let mut cx = Context::from_waker(noop_waker_ref());
        self.accept_pending(&mut cx)?;
        let (peer, frame) = self.poll_peers(&mut cx).ok_or(ReceiveError::WouldBlock)?;
        self.state = RepState::ReadyToReply { peer };
        Ok(frame)
    }

    async fn send(&mut self, reply: Bytes) -> Result<(), SendError> {
        let RepState::ReadyToReply { peer } =
            std::mem::replace(&mut self.state, RepState::AwaitingRequest)
        else {
            return Err(SendError::NoRequest);
        };
        let pos = self
            .peers
            .iter()
            .position(|p| p.id == peer)
            .ok_or(SendError::PeerGone)?;
        let limit = self.send_timeout;
        let error = match timeout(limit, SinkExt::<Bytes>::send(&mut self.peers[pos].framed, reply)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => SendError::Io(e),
            // A partially written frame cannot be resumed, so the peer goes.
            Err(_) => SendError::TimedOut(limit),
        };
        let gone = self.peers.remove(pos);
        debug!(
            "dropping peer after failed write: id={}, peer_addr={}, error={error}",
            gone.id, gone.addr
        );
        Err(error)
    }

    async fn close(&mut self) -> io::Result<()> {
        let mut first_error = None;
        for mut peer in self.peers.drain(..) {
            if let Err(e) = SinkExt::<Bytes>::close(&mut peer.framed).await {
                first_error.get_or_insert(e);
            }
        }
        self.state = RepState::AwaitingRequest;
        self.cursor = 0;
        first_error.map_or(Ok(()), Err)
    }

    fn local_addr(&self) -> Option<SocketAddr> { self.listener.local_addr().ok() }
}
