// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! One text frame per message over a WebSocket session.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use super::{within, Protocol, Transport};
use crate::config::TransportConfig;
use crate::errors::TransportError;

pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
    send_timeout: Duration,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    const PROTOCOL: Protocol = Protocol::WebSocket;

    async fn connect(config: &TransportConfig) -> Result<Self, TransportError> {
        let url = config.url.clone();
        let (stream, response) = within(config.connect_timeout, async {
            connect_async(url.as_str())
                .await
                .map_err(|err| TransportError::WebSocket(err.to_string()))
        })
        .await?;
        debug!(
            "WebSocket session open to {url} (status {})",
            response.status()
        );

        Ok(Self {
            stream,
            url,
            send_timeout: config.send_timeout,
        })
    }

    async fn send(&mut self, payload: &[u8]) -> Result<usize, TransportError> {
        let text = String::from_utf8_lossy(payload).into_owned();
        let stream = &mut self.stream;
        within(self.send_timeout, async move {
            stream
                .send(WsMessage::Text(text.into()))
                .await
                .map_err(|err| TransportError::WebSocket(err.to_string()))
        })
        .await?;
        Ok(payload.len())
    }

    async fn close(mut self) -> Result<(), TransportError> {
        debug!("Closing WebSocket session to {}", self.url);
        self.stream
            .close(None)
            .await
            .map_err(|err| TransportError::WebSocket(err.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_each_send_is_one_text_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            let mut frames = Vec::new();
            while let Some(Ok(frame)) = ws.next().await {
                match frame {
                    WsMessage::Text(text) => frames.push(text.to_string()),
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
            frames
        });

        let config = TransportConfig {
            url: format!("ws://{addr}/logs"),
            ..TransportConfig::default()
        };
        let mut transport = WebSocketTransport::connect(&config).await.unwrap();
        assert_eq!(transport.send(b"I (1) one").await.unwrap(), 9);
        assert_eq!(transport.send(b"I (2) two").await.unwrap(), 9);
        transport.close().await.unwrap();

        assert_eq!(server.await.unwrap(), vec!["I (1) one", "I (2) two"]);
    }
}
