//! Worker loop driving a [`SocketSession`] on a fixed cadence.


use std::time::Duration;

use bytes::Bytes;
use log::{debug, error, info, warn};
use tokio::{
    select,
    sync::watch,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;

use crate::{
    codec::WireCodec,
    endpoint::Bind,
    error::DispatchError,
    handler::{RequestHandler, dispatch},
    session::{ReceiveOutcome, SocketSession},
};

/// Observable state of the worker loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Started but not yet polling.
    Idle,
    /// Polling the endpoint between ticks.
    Listening,
    /// Decoding, handling and replying to a request.
    Dispatching,
    /// Recreating the endpoint after sustained failure.
    Recovering,
    /// Stopped; the endpoint is closed.
    Terminated,
}

/// Why a received request produced no reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The frame was malformed.
    Decode,
    /// The handler failed, panicked or timed out.
    Dispatch,
    /// The reply could not be encoded.
    Encode,
    /// The reply could not be transmitted.
    Send,
}

/// What a single tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was pending.
    Idle,
    /// A request was answered.
    Replied,
    /// A request was received but not answered.
    Dropped(DropReason),
    /// The receive failed; recovery is not yet due.
    Failed,
    /// The receive failed and the endpoint was recreated.
    Recovered,
    /// The receive failed and recreating the endpoint failed too.
    RecoveryFailed,
}

pub(crate) struct Worker<C, H, B>
where
    C: WireCodec,
    H: RequestHandler<C::Request>,
    B: Bind,
{
    pub(crate) session: SocketSession<B>,
    pub(crate) codec: C,
    pub(crate) handler: H,
    pub(crate) handler_timeout: Option<Duration>,
    pub(crate) state: watch::Sender<WorkerState>,
}

impl<C, H, B> Worker<C, H, B>
where
    C: WireCodec,
    H: RequestHandler<C::Request>,
    B: Bind,
{
    /// Tick every `period` until `shutdown` is cancelled, then close the
    /// endpoint.
    pub(crate) async fn run(mut self, shutdown: CancellationToken, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.publish(WorkerState::Listening);
        loop {
            select! {
                biased;

                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if shutdown.is_cancelled() {
                break;
            }
            debug!("listening for requests: address={}", self.session.address());
            self.tick().await;
        }
        info!("shutdown observed: address={}", self.session.address());
        self.session.close().await;
        self.publish(WorkerState::Terminated);
    }

    /// Run one poll-decide-act cycle.
    pub(crate) async fn tick(&mut self) -> TickOutcome {
        match self.session.poll_once() {
            ReceiveOutcome::NoMessageAvailable => TickOutcome::Idle,
            ReceiveOutcome::ReceiveFailed(e) => {
                warn!("error on receive: address={}, error={e}", self.session.address());
                if !self.session.record_failure() {
                    return TickOutcome::Failed;
                }
                self.publish(WorkerState::Recovering);
                let outcome = match self.session.recreate().await {
                    Ok(()) => TickOutcome::Recovered,
                    Err(e) => {
                        warn!("failed to recreate endpoint: error={e}");
                        TickOutcome::RecoveryFailed
                    }
                };
                self.publish(WorkerState::Listening);
                outcome
            }
            ReceiveOutcome::Received(frame) => {
                self.session.record_success();
                self.publish(WorkerState::Dispatching);
                let outcome = self.respond(frame).await;
                self.publish(WorkerState::Listening);
                outcome
            }
        }
    }

    async fn respond(&mut self, frame: Bytes) -> TickOutcome {
        let request = match self.codec.decode_request(&frame) {
            Ok(request) => request,
            Err(e) => {
                warn!("dropping malformed request: len={}, error={e}", frame.len());
                return TickOutcome::Dropped(DropReason::Decode);
            }
        };
        tracing::info!(?request, "received request");

        let reply = match dispatch(&self.handler, request, self.handler_timeout).await {
            Ok(reply) => reply,
            Err(DispatchError::Panicked(panic)) => {
                tracing::error!(panic = %panic, "request handler panicked");
                return TickOutcome::Dropped(DropReason::Dispatch);
            }
            Err(e) => {
                warn!("error on processing request: error={e}");
                return TickOutcome::Dropped(DropReason::Dispatch);
            }
        };

        let reply = match self.codec.encode_reply(reply) {
            Ok(reply) => reply,
            Err(e) => {
                error!("failed to encode reply: error={e}");
                return TickOutcome::Dropped(DropReason::Encode);
            }
        };

        let len = reply.len();
        match self.session.send(reply).await {
            Ok(()) => {
                info!("sent reply: len={len}");
                TickOutcome::Replied
            }
            Err(e) => {
                warn!("failed to send reply: error={e}");
                TickOutcome::Dropped(DropReason::Send)
            }
        }
    }

    fn publish(&self, state: WorkerState) { self.state.send_replace(state); }
}
