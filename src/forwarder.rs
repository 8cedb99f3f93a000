// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Accumulate-and-flush control loop.
//!
//! A single task owns the queue and the client state. Ticks, inbound
//! messages, and control commands are serialized through one
//! `tokio::select!`, so no locking is needed anywhere in the pipeline.
//!
//! State machine: `Stopped` (initial) -> `Started` (on `run`) -> `Stopped`
//! (on [`Command::Stop`]). A tick observed while stopped terminates the
//! loop; a stopped forwarder cannot be restarted. Messages are appended
//! in any state, subject to the queue's oldest-eviction policy.

use crate::buffer::{BoundedQueue, Message};
use crate::mapping::SeriesEncoder;
use crate::writer::PointWriter;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::mpsc;

/// Maximum points per write request.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Terminal loop conditions.
#[derive(Debug, Error)]
pub enum ForwarderError {
    /// A tick found the forwarder stopped; the loop is done.
    #[error("stopped by state")]
    Stopped,

    /// A delivery channel closed while the loop was still running.
    #[error("event channel closed")]
    ChannelClosed,
}

/// Control commands accepted by the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Stop flushing. Buffered messages are discarded when the loop ends.
    Stop,
}

/// Forwarder lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Stopped,
    Started,
}

/// Bus-to-InfluxDB forwarder.
///
/// Buffers inbound messages and flushes them as one batched write per
/// tick while started.
pub struct Forwarder {
    state: ClientState,
    queue: BoundedQueue,
    encoder: SeriesEncoder,
    writer: Arc<dyn PointWriter>,
    tick: Duration,
    max_batch: usize,
}

impl Forwarder {
    /// Create a forwarder with the default batch bound.
    pub fn new(encoder: SeriesEncoder, writer: Arc<dyn PointWriter>, tick: Duration) -> Self {
        Self::with_batch_size(encoder, writer, tick, MAX_BATCH_SIZE)
    }

    /// Create a forwarder with an explicit batch bound. The queue holds
    /// twice the batch bound.
    pub fn with_batch_size(
        encoder: SeriesEncoder,
        writer: Arc<dyn PointWriter>,
        tick: Duration,
        max_batch: usize,
    ) -> Self {
        assert!(max_batch > 0, "batch bound must be non-zero");
        Self {
            state: ClientState::Stopped,
            queue: BoundedQueue::with_capacity(max_batch * 2),
            encoder,
            writer,
            tick,
            max_batch,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Number of buffered, unflushed messages.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Append an inbound message. Allowed in any state so nothing is lost
    /// on bus delivery after a stop request, only by eviction.
    pub fn handle_message(&mut self, msg: Message) {
        tracing::debug!("add: {}", msg.topic);
        if let Some(dropped) = self.queue.append(msg) {
            tracing::warn!("queue full, dropped oldest message: {}", dropped.topic);
        }
    }

    /// Apply a control command.
    pub fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Stop => {
                // Stop does not drain the queue; whatever is buffered is
                // lost when the loop terminates at the next tick.
                self.state = ClientState::Stopped;
                tracing::info!("stop requested, {} messages buffered", self.queue.len());
            }
        }
    }

    /// React to a timer tick: flush while started, terminate once stopped.
    pub async fn handle_tick(&mut self) -> Result<(), ForwarderError> {
        if self.state == ClientState::Stopped {
            tracing::info!("stopped by state");
            return Err(ForwarderError::Stopped);
        }
        self.flush().await;
        Ok(())
    }

    /// Drain up to one batch from the queue and write it.
    ///
    /// No-op on an empty queue. Draining stops early when the queue is
    /// exhausted or a zero-value end marker is popped. A write failure is
    /// logged and the batch is discarded without requeueing.
    pub async fn flush(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        tracing::debug!("flush: queued={}", self.queue.len());

        let mut batch = Vec::with_capacity(self.max_batch);
        for _ in 0..self.max_batch {
            let msg = match self.queue.pop_front() {
                Some(msg) => msg,
                None => break,
            };
            if msg.is_end_marker() {
                break;
            }
            batch.push(msg);
        }
        if batch.is_empty() {
            return;
        }

        let points = self.encoder.encode_batch(&batch, unix_now_ns());
        if let Err(err) = self.writer.write(&points).await {
            tracing::error!("influxdb write failed: {}", err);
        }
    }

    /// Run the control loop until a terminal condition.
    ///
    /// Transitions to `Started` and then waits on the three event sources
    /// with no fixed priority. The write inside a flush is awaited inline:
    /// no ticks, messages, or commands are processed while it is
    /// outstanding.
    pub async fn run(
        mut self,
        mut messages: mpsc::UnboundedReceiver<Message>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) -> Result<(), ForwarderError> {
        self.state = ClientState::Started;
        tracing::info!(
            "forwarder started: tick={:?} batch={} queue_capacity={}",
            self.tick,
            self.max_batch,
            self.queue.capacity()
        );

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first interval tick completes immediately; consume it so the
        // first flush happens one full period after start.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.handle_tick().await?;
                }
                msg = messages.recv() => match msg {
                    Some(msg) => self.handle_message(msg),
                    None => return Err(ForwarderError::ChannelClosed),
                },
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => return Err(ForwarderError::ChannelClosed),
                },
            }
        }
    }
}

fn unix_now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
