// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded hand-off between log producers and the delivery loop.
//!
//! [`relay_queue`] returns a cloneable [`RelaySender`] for producers and a
//! single [`RelayReceiver`] for the delivery loop. Enqueueing never waits: once
//! the queue holds its capacity of messages, further messages are rejected with
//! [`RelayError::QueueFull`] and dropped. Dequeueing waits until a message is
//! available, an optional timeout elapses, or the cancel token fires. An
//! elapsed timeout is an idle tick, not a failure.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::errors::{ReceiveError, RelayError};
use crate::formatter::FormattedMessage;

/// Creates a relay queue holding at most `capacity` messages. A capacity of
/// zero is raised to one.
#[must_use]
pub fn relay_queue(capacity: usize) -> (RelaySender, RelayReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        RelaySender { tx },
        RelayReceiver {
            rx,
            wait_timeout: None,
            cancel_token: CancellationToken::new(),
        },
    )
}

/// Producer side of the relay queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct RelaySender {
    tx: mpsc::Sender<FormattedMessage>,
}

impl RelaySender {
    /// Places `message` at the back of the queue without waiting. On failure
    /// the message is dropped.
    pub fn enqueue(&self, message: FormattedMessage) -> Result<(), RelayError> {
        match self.tx.try_send(message) {
            Ok(()) => {
                debug!("Data sent to queue");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                error!("Data not sent to queue, queue full");
                Err(RelayError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                error!("Data not sent to queue, delivery loop stopped");
                Err(RelayError::Closed)
            }
        }
    }

    /// Fixed number of messages the queue can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Messages currently waiting for the delivery loop.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Outcome of a successful wait on the queue.
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued {
    Message(FormattedMessage),
    /// The wait timeout elapsed with the queue still empty.
    Idle,
    /// The cancel token fired before a message arrived.
    Cancelled,
}

/// Where the delivery loop takes its messages from. [`RelayReceiver`] is the
/// only production source.
#[async_trait]
pub trait MessageSource: Send {
    /// Waits for the next message, an idle tick or cancellation.
    async fn dequeue(&mut self) -> Result<Dequeued, ReceiveError>;

    /// Takes the next message if one is already waiting.
    fn try_dequeue(&mut self) -> Option<FormattedMessage>;
}

/// Consumer side of the relay queue, owned by the delivery loop.
#[derive(Debug)]
pub struct RelayReceiver {
    rx: mpsc::Receiver<FormattedMessage>,
    wait_timeout: Option<Duration>,
    cancel_token: CancellationToken,
}

impl RelayReceiver {
    /// Bounds each [`dequeue`](Self::dequeue) wait. `None` waits forever.
    #[must_use]
    pub fn with_wait_timeout(mut self, wait_timeout: Option<Duration>) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Waits for the next message in FIFO order.
    ///
    /// Returns [`Dequeued::Idle`] when a wait timeout is configured and
    /// elapses, and [`ReceiveError::Closed`] once every sender is gone and the
    /// queue is drained.
    pub async fn dequeue(&mut self) -> Result<Dequeued, ReceiveError> {
        let Self {
            rx,
            wait_timeout,
            cancel_token,
        } = self;
        let wait_timeout = *wait_timeout;

        let received = async move {
            match wait_timeout {
                Some(limit) => tokio::time::timeout(limit, rx.recv()).await.ok(),
                None => Some(rx.recv().await),
            }
        };

        tokio::select! {
            biased;
            () = cancel_token.cancelled() => Ok(Dequeued::Cancelled),
            received = received => match received {
                Some(Some(message)) => {
                    debug!("Data received from queue");
                    Ok(Dequeued::Message(message))
                }
                Some(None) => Err(ReceiveError::Closed),
                None => {
                    trace!("No data received from queue within {wait_timeout:?}");
                    Ok(Dequeued::Idle)
                }
            },
        }
    }

    /// Takes the next message if one is already waiting.
    pub fn try_dequeue(&mut self) -> Option<FormattedMessage> {
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

#[async_trait]
impl MessageSource for RelayReceiver {
    async fn dequeue(&mut self) -> Result<Dequeued, ReceiveError> {
        RelayReceiver::dequeue(self).await
    }

    fn try_dequeue(&mut self) -> Option<FormattedMessage> {
        RelayReceiver::try_dequeue(self)
    }
}
