//! Minimal request client speaking the server's length-delimited framing.

use std::{io, net::SocketAddr, time::Duration};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use repframe::codec::Request;
use tokio::{net::TcpStream, time::timeout};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Client that sends one request and waits for its reply.
#[derive(Debug)]
pub struct ReqClient {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl ReqClient {
    /// Connect to a server at `addr`.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while connecting.
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
        })
    }

    /// Connect, retrying every 10ms until `deadline` elapses.
    ///
    /// Useful while a server is rebinding its endpoint.
    ///
    /// # Errors
    ///
    /// Returns the last connect error once the deadline passes.
    pub async fn connect_within(addr: SocketAddr, deadline: Duration) -> io::Result<Self> {
        let started = tokio::time::Instant::now();
        loop {
            match Self::connect(addr).await {
                Ok(client) => return Ok(client),
                Err(e) if started.elapsed() >= deadline => return Err(e),
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
    }

    /// Send a raw frame without waiting for a reply.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while writing.
    pub async fn send_frame(&mut self, frame: Bytes) -> io::Result<()> { self.framed.send(frame).await }

    /// Wait up to `limit` for the next reply frame.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] if the server closed the
    /// connection, or any I/O error raised while reading.
    pub async fn recv_within(&mut self, limit: Duration) -> io::Result<Option<Bytes>> {
        match timeout(limit, self.framed.next()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(Some(frame)) => frame.map(|f| Some(f.freeze())),
        }
    }

    /// Encode `request`, send it, and wait up to five seconds for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::TimedOut`] if no reply arrives, or any error
    /// raised while encoding or transmitting.
    pub async fn request(&mut self, request: &Request) -> io::Result<Bytes> {
        let frame = request.to_frame().map_err(io::Error::other)?;
        self.send_frame(frame).await?;
        self.recv_within(Duration::from_secs(5))
            .await?
            .ok_or_else(|| io::ErrorKind::TimedOut.into())
    }
}
