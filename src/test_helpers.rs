#![cfg(any(test, feature = "test-helpers"))]
//! Scripted endpoints for exercising sessions and workers without sockets.
//!
//! A [`Probe`] holds a shared script of receive outcomes and records every
//! interaction. All endpoints bound by a [`ScriptedBinder`] draw from the same
//! script, so a recreated endpoint continues where the old one stopped.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    endpoint::{Bind, Endpoint, EndpointAddress},
    error::{BindError, ReceiveError, SendError},
};

/// One scripted receive outcome.
#[derive(Clone, Debug)]
pub enum Step {
    /// Nothing pending.
    Idle,
    /// Deliver this frame.
    Frame(Bytes),
    /// Fail with a connection reset.
    Fail,
}

#[derive(Debug, Default)]
struct Shared {
    script: VecDeque<Step>,
    receive_attempts: Vec<usize>,
    sent: Vec<(usize, Bytes)>,
    binds: usize,
    closes: usize,
    failing_binds: usize,
}

/// Shared script and interaction log.
#[derive(Clone, Debug, Default)]
pub struct Probe(Arc<Mutex<Shared>>);

impl Probe {
    /// Create an empty probe. An exhausted script reports [`Step::Idle`].
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append steps to the script.
    pub fn push(&self, steps: impl IntoIterator<Item = Step>) { self.lock().script.extend(steps); }

    /// Make the next `count` binds fail with `AddrInUse`.
    pub fn fail_next_binds(&self, count: usize) { self.lock().failing_binds = count; }

    /// Total receive attempts across all endpoints.
    #[must_use]
    pub fn receive_attempts(&self) -> usize { self.lock().receive_attempts.len() }

    /// Generation of the endpoint that served each receive attempt.
    #[must_use]
    pub fn receive_generations(&self) -> Vec<usize> { self.lock().receive_attempts.clone() }

    /// Replies sent, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<Bytes> { self.lock().sent.iter().map(|(_, b)| b.clone()).collect() }

    /// Successful binds so far. The first endpoint is generation 1.
    #[must_use]
    pub fn binds(&self) -> usize { self.lock().binds }

    /// Endpoint closes so far.
    #[must_use]
    pub fn closes(&self) -> usize { self.lock().closes }

    /// Steps not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize { self.lock().script.len() }

    fn lock(&self) -> MutexGuard<'_, Shared> { self.0.lock().unwrap_or_else(PoisonError::into_inner) }
}

/// Binder producing [`ScriptedEndpoint`]s that share one [`Probe`].
#[derive(Clone, Debug)]
pub struct ScriptedBinder {
    probe: Probe,
}

impl ScriptedBinder {
    /// Bind endpoints driven by `probe`.
    #[must_use]
    pub fn new(probe: Probe) -> Self { Self { probe } }
}

#[async_trait]
impl Bind for ScriptedBinder {
    type Endpoint = ScriptedEndpoint;

    async fn bind(&self, address: &EndpointAddress) -> Result<ScriptedEndpoint, BindError> {
        let mut shared = self.probe.lock();
        if shared.failing_binds > 0 {
            shared.failing_binds -= 1;
            return Err(BindError::Io {
                address: address.to_string(),
                source: io::ErrorKind::AddrInUse.into(),
            });
        }
        shared.binds += 1;
        Ok(ScriptedEndpoint {
            probe: self.probe.clone(),
            generation: shared.binds,
            awaiting_reply: false,
        })
    }
}

/// Endpoint replaying the probe's script.
#[derive(Debug)]
pub struct ScriptedEndpoint {
    probe: Probe,
    generation: usize,
    awaiting_reply: bool,
}

#[async_trait]
impl Endpoint for ScriptedEndpoint {
    fn try_recv(&mut self) -> Result<Bytes, ReceiveError> {
        let mut shared = self.probe.lock();
        shared.receive_attempts.push(self.generation);
        if self.awaiting_reply {
            return Err(ReceiveError::ReplyPending);
        }
        match shared.script.pop_front() {
            None | Some(Step::Idle) => Err(ReceiveError::WouldBlock),
            Some(Step::Frame(frame)) => {
                self.awaiting_reply = true;
                Ok(frame)
            }
            Some(Step::Fail) => Err(ReceiveError::Io(io::ErrorKind::ConnectionReset.into())),
        }
    }

    async fn send(&mut self, reply: Bytes) -> Result<(), SendError> {
        if !self.awaiting_reply {
            return Err(SendError::NoRequest);
        }
        self.awaiting_reply = false;
        self.probe.lock().sent.push((self.generation, reply));
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.probe.lock().closes += 1;
        Ok(())
    }
}
