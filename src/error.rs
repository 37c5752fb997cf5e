//! Error types shared by the endpoint, codec and worker layers.
//!
//! Only [`BindError`] ever leaves the server at startup. Every other error is
//! handled inside a single tick of the worker loop and logged.

use std::{error::Error, io};

use thiserror::Error;

/// Boxed error returned by request handlers.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Parsing an endpoint address failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The address did not start with a supported `scheme://` prefix.
    #[error("unsupported endpoint scheme in {0:?}; expected tcp://host:port")]
    UnsupportedScheme(String),
    /// No `:port` suffix was present.
    #[error("endpoint {0:?} has no port")]
    MissingPort(String),
    /// The port was not a valid `u16`.
    #[error("invalid port {0:?}")]
    InvalidPort(String),
    /// The host was neither `*` nor an IP literal.
    #[error("invalid host {0:?}; expected `*` or an IP address")]
    InvalidHost(String),
}

/// Binding an endpoint failed.
#[derive(Debug, Error)]
pub enum BindError {
    /// The operating system refused the bind.
    #[error("failed to bind {address}: {source}")]
    Io {
        /// Address that was being bound.
        address: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// A non-blocking receive did not produce a frame.
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// Nothing is pending. This is the benign outcome of a zero-wait poll.
    #[error("no message pending")]
    WouldBlock,
    /// A request was received but never answered; the endpoint refuses to
    /// receive again until a reply is sent.
    #[error("cannot receive while a reply is pending")]
    ReplyPending,
    /// The session holds no endpoint because an earlier recreation failed.
    #[error("no endpoint is bound")]
    Unbound,
    /// The transport failed.
    #[error("receive failed: {0}")]
    Io(#[from] io::Error),
}

impl ReceiveError {
    /// Returns `true` for the expected "nothing pending" condition.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::WouldBlock => true,
            Self::Io(e) => e.kind() == io::ErrorKind::WouldBlock,
            Self::ReplyPending | Self::Unbound => false,
        }
    }
}

/// Transmitting a reply failed. The request is consumed either way.
#[derive(Debug, Error)]
pub enum SendError {
    /// `send` was called without a preceding successful receive.
    #[error("no request is awaiting a reply")]
    NoRequest,
    /// The peer that sent the request disconnected before the reply.
    #[error("requesting peer disconnected")]
    PeerGone,
    /// The session holds no endpoint.
    #[error("no endpoint is bound")]
    Unbound,
    /// The peer did not accept the reply in time and was disconnected.
    #[error("reply not accepted within {0:?}")]
    TimedOut(std::time::Duration),
    /// The transport failed while writing.
    #[error("send failed: {0}")]
    Io(#[from] io::Error),
}

/// Decoding a request or encoding a reply failed.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame is not a valid request.
    #[error("malformed request: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    /// The request decoded but left unread bytes behind.
    #[error("request decoded from {consumed} of {len} bytes")]
    TrailingBytes {
        /// Bytes consumed by the decoder.
        consumed: usize,
        /// Total frame length.
        len: usize,
    },
    /// The reply could not be encoded.
    #[error("failed to encode reply: {0}")]
    Encode(String),
}

/// The handler did not produce a reply.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The handler returned an error.
    #[error("handler failed: {0}")]
    Handler(#[source] HandlerError),
    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
    /// The handler exceeded the configured timeout.
    #[error("handler timed out after {0:?}")]
    TimedOut(std::time::Duration),
}
