//! Request handler capability.
//!
//! The embedding application supplies one [`RequestHandler`]. Plain closures
//! of type `Fn(R) -> Result<Bytes, HandlerError>` qualify automatically.

use std::{any::Any, panic::AssertUnwindSafe, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;

use crate::error::{DispatchError, HandlerError};

/// Processes one decoded request into reply bytes.
///
/// Implementations should return promptly; the server processes one request
/// at a time and does not poll the endpoint while a handler runs.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use bytes::Bytes;
/// use repframe::{codec::Request, error::HandlerError, handler::RequestHandler};
///
/// struct Pong;
///
/// #[async_trait]
/// impl RequestHandler<Request> for Pong {
///     async fn process(&self, request: Request) -> Result<Bytes, HandlerError> {
///         match request.op.as_str() {
///             "ping" => Ok(Bytes::from_static(b"pong")),
///             other => Err(format!("unknown op {other}").into()),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait RequestHandler<R>: Send + Sync + 'static {
    /// Produce the reply for `request`.
    ///
    /// # Errors
    ///
    /// Returning an error drops the request without a reply.
    async fn process(&self, request: R) -> Result<Bytes, HandlerError>;
}

#[async_trait]
impl<R, F> RequestHandler<R> for F
where
    R: Send + 'static,
    F: Fn(R) -> Result<Bytes, HandlerError> + Send + Sync + 'static,
{
    async fn process(&self, request: R) -> Result<Bytes, HandlerError> { self(request) }
}

/// Run `handler` on `request`, converting errors, panics and timeouts into a
/// [`DispatchError`].
pub(crate) async fn dispatch<R, H>(
    handler: &H,
    request: R,
    limit: Option<Duration>,
) -> Result<Bytes, DispatchError>
where
    R: Send + 'static,
    H: RequestHandler<R>,
{
    let guarded = AssertUnwindSafe(handler.process(request)).catch_unwind();
    let outcome = match limit {
        Some(limit) => tokio::time::timeout(limit, guarded)
            .await
            .map_err(|_| DispatchError::TimedOut(limit))?,
        None => guarded.await,
    };
    match outcome {
        Ok(result) => result.map_err(DispatchError::Handler),
        Err(panic) => Err(DispatchError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string panic>".to_owned())
}
