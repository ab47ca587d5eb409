// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Network transports for relayed messages.
//!
//! Each transport owns its connection for the lifetime of the delivery loop.
//! One relayed message is one [`Transport::send`] call; how messages are
//! delimited on the wire is up to the transport. Exactly one implementation is
//! selected per build through cargo features, see [`SelectedTransport`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::TransportConfig;
use crate::errors::TransportError;

pub mod tcp;
pub mod udp;
#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Udp,
    Tcp,
    WebSocket,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => write!(f, "udp"),
            Self::Tcp => write!(f, "tcp"),
            Self::WebSocket => write!(f, "websocket"),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sized {
    const PROTOCOL: Protocol;

    /// Opens the connection to the collector.
    async fn connect(config: &TransportConfig) -> Result<Self, TransportError>;

    /// Sends one message and returns the number of bytes put on the wire.
    /// Never waits longer than the configured send timeout.
    async fn send(&mut self, payload: &[u8]) -> Result<usize, TransportError>;

    async fn close(self) -> Result<(), TransportError>;
}

#[cfg(feature = "transport-websocket")]
pub type SelectedTransport = websocket::WebSocketTransport;

#[cfg(all(feature = "transport-tcp", not(feature = "transport-websocket")))]
pub type SelectedTransport = tcp::TcpTransport;

#[cfg(not(any(feature = "transport-tcp", feature = "transport-websocket")))]
pub type SelectedTransport = udp::UdpTransport;

/// Protocol of the transport this build ships logs with.
pub const SELECTED_PROTOCOL: Protocol = <SelectedTransport as Transport>::PROTOCOL;

/// Runs `fut`, failing with [`TransportError::Timeout`] after `limit`.
pub(crate) async fn within<T, F>(limit: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| TransportError::Timeout(limit))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_display() {
        assert_eq!(Protocol::Udp.to_string(), "udp");
        assert_eq!(Protocol::Tcp.to_string(), "tcp");
        assert_eq!(Protocol::WebSocket.to_string(), "websocket");
    }

    #[tokio::test]
    async fn test_within_times_out() {
        let result: Result<(), _> = within(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), TransportError>(())
        })
        .await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_within_passes_through_errors() {
        let result: Result<(), _> = within(Duration::from_secs(1), async {
            Err(TransportError::Unresolved("nowhere:1".to_string()))
        })
        .await;
        assert!(matches!(result, Err(TransportError::Unresolved(_))));
    }
}
