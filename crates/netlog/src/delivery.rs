// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The single consumer of the relay queue.
//!
//! ```text
//! CONNECTING ──> READY ⇄ SENDING
//!                  │
//!                  └──> CLOSED   (cancel token fired, or every producer gone)
//! ```
//!
//! Delivery is at-most-once and best effort: a failed send is logged and the
//! message dropped, there is no retry. A failed wait on the queue is replaced
//! by [`SENTINEL_MESSAGE`] so the collector sees that something went missing.
//! An empty queue is not a failure: idle ticks send nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use crate::config::TransportConfig;
use crate::constants::SENTINEL_MESSAGE;
use crate::errors::{ReceiveError, TransportError};
use crate::formatter::FormattedMessage;
use crate::queue::{Dequeued, MessageSource, RelayReceiver};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Connecting,
    Ready,
    Sending,
    Closed,
}

/// Counters shared between the delivery loop and whoever wants to report on
/// it.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    sentinels: AtomicU64,
    bytes_sent: AtomicU64,
}

impl DeliveryStats {
    /// Messages handed to the transport successfully.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Messages, sentinels included, the transport failed to send.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Sentinels sent in place of a failed queue wait.
    pub fn sentinels(&self) -> u64 {
        self.sentinels.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    fn record_sent(&self, bytes: usize) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent
            .fetch_add(u64::try_from(bytes).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_sentinel(&self) {
        self.sentinels.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct DeliveryLoop<T: Transport, S: MessageSource = RelayReceiver> {
    transport: T,
    receiver: S,
    state: DeliveryState,
    stats: Arc<DeliveryStats>,
}

impl<T: Transport, S: MessageSource> DeliveryLoop<T, S> {
    /// Establishes the transport and returns a loop ready to run.
    pub async fn connect(config: &TransportConfig, receiver: S) -> Result<Self, TransportError> {
        debug!(state = ?DeliveryState::Connecting, "Connecting {} transport", T::PROTOCOL);
        let transport = T::connect(config).await?;
        info!("{} transport connected", T::PROTOCOL);
        Ok(Self::new(transport, receiver))
    }

    /// Wraps an already connected transport.
    #[must_use]
    pub fn new(transport: T, receiver: S) -> Self {
        Self {
            transport,
            receiver,
            state: DeliveryState::Ready,
            stats: Arc::new(DeliveryStats::default()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> Arc<DeliveryStats> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn state(&self) -> DeliveryState {
        self.state
    }

    /// Drains the queue until cancelled or until every producer is gone, then
    /// closes the transport.
    ///
    /// On cancellation, messages already waiting in the queue are still sent.
    pub async fn run(mut self) -> Arc<DeliveryStats> {
        debug!("Delivery loop started");

        loop {
            match self.receiver.dequeue().await {
                Ok(Dequeued::Message(message)) => self.deliver(message).await,
                Ok(Dequeued::Idle) => trace!("Delivery loop idle"),
                Ok(Dequeued::Cancelled) => {
                    debug!("Delivery loop cancelled, flushing queued messages");
                    while let Some(message) = self.receiver.try_dequeue() {
                        self.deliver(message).await;
                    }
                    break;
                }
                Err(ReceiveError::Closed) => {
                    debug!("All producers dropped, stopping delivery loop");
                    break;
                }
                Err(e @ ReceiveError::WaitFailed(_)) => {
                    warn!("Data not received from queue: {e}");
                    self.deliver_sentinel().await;
                }
            }
        }

        self.state = DeliveryState::Closed;
        let Self {
            transport, stats, ..
        } = self;
        if let Err(e) = transport.close().await {
            warn!("Failed to close {} transport: {e}", T::PROTOCOL);
        }
        debug!(
            delivered = stats.delivered(),
            failed = stats.failed(),
            sentinels = stats.sentinels(),
            "Delivery loop stopped"
        );
        stats
    }

    async fn deliver(&mut self, message: FormattedMessage) {
        self.state = DeliveryState::Sending;
        match self.transport.send(message.as_bytes()).await {
            Ok(len) if len < message.len() => {
                error!(
                    "Failed to send log message: short write of {len} of {} bytes",
                    message.len()
                );
                self.stats.record_failure();
            }
            Ok(len) => {
                debug!("{len} bytes of data sent");
                self.stats.record_sent(len);
            }
            Err(e) => {
                error!("Failed to send log message: {e}");
                self.stats.record_failure();
            }
        }
        drop(message);
        self.state = DeliveryState::Ready;
    }

    async fn deliver_sentinel(&mut self) {
        self.state = DeliveryState::Sending;
        self.stats.record_sentinel();
        match self.transport.send(SENTINEL_MESSAGE.as_bytes()).await {
            Ok(len) if len < SENTINEL_MESSAGE.len() => {
                error!(
                    "Failed to send sentinel message: short write of {len} of {} bytes",
                    SENTINEL_MESSAGE.len()
                );
                self.stats.record_failure();
            }
            Ok(len) => {
                error!("{len} bytes sent, unknown error receiving log message");
                self.stats.record_sent(len);
            }
            Err(e) => {
                error!("Failed to send sentinel message: {e}");
                self.stats.record_failure();
            }
        }
        self.state = DeliveryState::Ready;
    }
}
