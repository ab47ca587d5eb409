// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! One datagram per message.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use super::{within, Protocol, Transport};
use crate::config::TransportConfig;
use crate::errors::TransportError;

#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
    send_timeout: Duration,
}

impl UdpTransport {
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

/// Resolves `address` to its first socket address.
pub(crate) async fn resolve(address: &str) -> Result<SocketAddr, TransportError> {
    tokio::net::lookup_host(address)
        .await
        .map_err(|source| TransportError::Connect {
            addr: address.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| TransportError::Unresolved(address.to_string()))
}

#[async_trait]
impl Transport for UdpTransport {
    const PROTOCOL: Protocol = Protocol::Udp;

    async fn connect(config: &TransportConfig) -> Result<Self, TransportError> {
        let address = config.address();
        let peer = within(config.connect_timeout, resolve(&address)).await?;
        let local = if peer.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };

        let socket = UdpSocket::bind(local).await?;
        socket
            .connect(peer)
            .await
            .map_err(|source| TransportError::Connect {
                addr: address.clone(),
                source,
            })?;
        debug!("UDP socket connected to {peer}");

        Ok(Self {
            socket,
            peer,
            send_timeout: config.send_timeout,
        })
    }

    async fn send(&mut self, payload: &[u8]) -> Result<usize, TransportError> {
        let sent = within(self.send_timeout, async {
            Ok::<_, TransportError>(self.socket.send(payload).await?)
        })
        .await?;
        if sent < payload.len() {
            return Err(TransportError::ShortWrite {
                sent,
                expected: payload.len(),
            });
        }
        Ok(sent)
    }

    async fn close(self) -> Result<(), TransportError> {
        debug!("Closing UDP socket to {}", self.peer);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config_for(addr: SocketAddr) -> TransportConfig {
        TransportConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            ..TransportConfig::default()
        }
    }

    #[tokio::test]
    async fn test_each_send_is_one_datagram() {
        let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut transport = UdpTransport::connect(&config_for(collector.local_addr().unwrap()))
            .await
            .unwrap();

        assert_eq!(transport.send(b"first").await.unwrap(), 5);
        assert_eq!(transport.send(b"second").await.unwrap(), 6);

        let mut buf = [0u8; 64];
        let (n, _) = collector.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"first");
        let (n, _) = collector.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"second");

        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unresolvable_host_fails() {
        let config = TransportConfig {
            host: "collector.invalid".to_string(),
            ..TransportConfig::default()
        };
        assert!(UdpTransport::connect(&config).await.is_err());
    }
}
