// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Newline-delimited messages over a single TCP stream.
//!
//! A send that fails part way may leave a message without its delimiter on
//! the wire. The stream is then shut down and every later send fails with
//! [`TransportError::Broken`], so the collector never sees two messages joined
//! on one line.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::{within, Protocol, Transport};
use crate::config::TransportConfig;
use crate::errors::TransportError;

const DELIMITER: &[u8] = b"\n";

#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
    send_timeout: Duration,
    broken: bool,
}

#[async_trait]
impl Transport for TcpTransport {
    const PROTOCOL: Protocol = Protocol::Tcp;

    async fn connect(config: &TransportConfig) -> Result<Self, TransportError> {
        let address = config.address();
        let stream = within(config.connect_timeout, async {
            TcpStream::connect(&address)
                .await
                .map_err(|source| TransportError::Connect {
                    addr: address.clone(),
                    source,
                })
        })
        .await?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to disable Nagle on log stream: {e}");
        }
        let peer = stream.peer_addr()?;
        debug!("TCP stream connected to {peer}");

        Ok(Self {
            stream,
            peer,
            send_timeout: config.send_timeout,
            broken: false,
        })
    }

    /// Writes the payload followed by a newline. The returned count includes
    /// the delimiter.
    async fn send(&mut self, payload: &[u8]) -> Result<usize, TransportError> {
        if self.broken {
            return Err(TransportError::Broken);
        }

        let stream = &mut self.stream;
        let result = within(self.send_timeout, async move {
            stream.write_all(payload).await?;
            stream.write_all(DELIMITER).await?;
            Ok::<_, TransportError>(payload.len() + DELIMITER.len())
        })
        .await;

        if result.is_err() {
            self.broken = true;
            warn!("Send to {} failed, shutting the log stream down", self.peer);
            let stream = &mut self.stream;
            if let Err(e) = within(self.send_timeout, async move {
                stream.shutdown().await.map_err(TransportError::from)
            })
            .await
            {
                debug!("Failed to shut down broken log stream: {e}");
            }
        }
        result
    }

    async fn close(mut self) -> Result<(), TransportError> {
        debug!("Closing TCP stream to {}", self.peer);
        if self.broken {
            return Ok(());
        }
        self.stream.shutdown().await?;
        Ok(())
    }
}
