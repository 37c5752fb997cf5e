//! Wire codec for request and reply frames.
//!
//! The server treats frames as opaque bytes until they cross the
//! [`WireCodec`] boundary. [`BincodeCodec`] is the stock implementation: it
//! decodes requests with bincode's standard configuration and passes reply
//! bytes through untouched.

use core::marker::PhantomData;
use std::fmt;

use bincode::{Decode, Encode, config, decode_from_slice, encode_to_vec};
use bytes::Bytes;

use crate::error::CodecError;

/// Converts raw frames into requests and handler output into reply frames.
pub trait WireCodec: Send + Sync + 'static {
    /// Structured request produced by [`decode_request`](Self::decode_request).
    type Request: fmt::Debug + Send + 'static;

    /// Decode a request frame.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the frame is malformed.
    fn decode_request(&self, frame: &[u8]) -> Result<Self::Request, CodecError>;

    /// Encode handler output into a reply frame.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the reply cannot be encoded.
    fn encode_reply(&self, reply: Bytes) -> Result<Bytes, CodecError>;
}

/// Codec decoding bincode requests of type `R`.
///
/// Frames must be consumed completely; trailing bytes are treated as a
/// malformed request.
pub struct BincodeCodec<R = Request> {
    _request: PhantomData<fn() -> R>,
}

impl<R> BincodeCodec<R> {
    /// Create a codec for requests of type `R`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _request: PhantomData,
        }
    }
}

impl<R> Default for BincodeCodec<R> {
    fn default() -> Self { Self::new() }
}

impl<R> Clone for BincodeCodec<R> {
    fn clone(&self) -> Self { Self::new() }
}

impl<R> fmt::Debug for BincodeCodec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BincodeCodec")
            .field("request", &std::any::type_name::<R>())
            .finish()
    }
}

impl<R> WireCodec for BincodeCodec<R>
where
    R: Decode<()> + fmt::Debug + Send + 'static,
{
    type Request = R;

    fn decode_request(&self, frame: &[u8]) -> Result<R, CodecError> {
        let (request, consumed) = decode_from_slice(frame, config::standard())?;
        if consumed != frame.len() {
            return Err(CodecError::TrailingBytes {
                consumed,
                len: frame.len(),
            });
        }
        Ok(request)
    }

    fn encode_reply(&self, reply: Bytes) -> Result<Bytes, CodecError> { Ok(reply) }
}

/// Default structured request.
///
/// `service` names the subsystem being addressed, `op` the operation, and
/// `payload` carries operation-specific bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct Request {
    /// Addressed subsystem.
    pub service: String,
    /// Operation name.
    pub op: String,
    /// Operation arguments.
    pub payload: Vec<u8>,
}

impl Request {
    /// Build a request for `op` on `service` with an empty payload.
    #[must_use]
    pub fn new(service: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            op: op.into(),
            payload: Vec::new(),
        }
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Encode the request as a frame suitable for [`BincodeCodec`].
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if bincode rejects the value.
    pub fn to_frame(&self) -> Result<Bytes, CodecError> {
        encode_to_vec(self, config::standard())
            .map(Bytes::from)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rstest::rstest;

    use super::{BincodeCodec, Request, WireCodec};
    use crate::error::CodecError;

    #[test]
    fn decodes_encoded_request() {
        let request = Request::new("settings", "ping").with_payload(*b"{}");
        let frame = request.to_frame().expect("encode request");
        let decoded = BincodeCodec::<Request>::new()
            .decode_request(&frame)
            .expect("decode request");
        assert_eq!(decoded, request);
    }

    #[rstest]
    #[case::empty(&[])]
    #[case::truncated_string(&[10, b'a'])]
    #[case::invalid_utf8(&[1, 0xff, 0, 0])]
    fn rejects_malformed_frames(#[case] frame: &[u8]) {
        let err = BincodeCodec::<Request>::new()
            .decode_request(frame)
            .expect_err("frame is malformed");
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut frame = Request::new("s", "op")
            .to_frame()
            .expect("encode request")
            .to_vec();
        frame.extend_from_slice(b"junk");
        let err = BincodeCodec::<Request>::new()
            .decode_request(&frame)
            .expect_err("trailing bytes");
        assert!(matches!(err, CodecError::TrailingBytes { len, .. } if len == frame.len()));
    }

    #[test]
    fn reply_bytes_pass_through() {
        let reply = Bytes::from_static(b"\x00raw\xff");
        let encoded = BincodeCodec::<Request>::new()
            .encode_reply(reply.clone())
            .expect("encode reply");
        assert_eq!(encoded, reply);
    }
}
