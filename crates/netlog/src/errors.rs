// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Reasons a message could not be placed on the relay queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("relay queue full")]
    QueueFull,

    #[error("relay queue closed")]
    Closed,
}

/// Reasons the delivery loop could not take a message off the relay queue.
///
/// An empty queue is not an error: a wait that times out yields
/// [`Dequeued::Idle`](crate::queue::Dequeued::Idle).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReceiveError {
    #[error("wait on relay queue failed: {0}")]
    WaitFailed(String),

    #[error("every producer handle was dropped")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("short write: sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("could not resolve collector address {0}")]
    Unresolved(String),

    #[error("connection unusable after an earlier failed send")]
    Broken,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}")]
    InvalidValue { var: &'static str, value: String },

    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

/// Bring-up failures. These are fatal: the relay never started.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to establish transport: {0}")]
    Connect(#[source] TransportError),

    #[error("failed to start delivery thread: {0}")]
    Runtime(#[source] std::io::Error),
}
