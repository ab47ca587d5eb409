// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Start-up wiring.
//!
//! [`Relay::start`] connects the transport and runs the delivery loop on a
//! dedicated thread with its own single-threaded runtime, so log delivery
//! never competes with the producers' executor. Start-up only returns once
//! the transport is connected; a connect failure is reported to the caller
//! as a [`StartError`] and nothing keeps running.

use std::io;
use std::sync::Arc;
use std::thread;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::constants::DELIVERY_THREAD_NAME;
use crate::delivery::{DeliveryLoop, DeliveryStats};
use crate::errors::StartError;
use crate::intake::LogIntake;
use crate::queue::{RelayReceiver, RelaySender};
use crate::transport::Transport;

/// A running relay. Dropping it cancels the delivery loop without waiting;
/// use [`Relay::shutdown`] to wait for queued messages to be flushed.
#[derive(Debug)]
pub struct Relay {
    intake: LogIntake,
    cancel_token: CancellationToken,
    stats: Arc<DeliveryStats>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Relay {
    /// Validates `config`, connects a `T` transport and starts draining
    /// `receiver`.
    ///
    /// `sender` must belong to the same queue as `receiver`; it backs the
    /// returned relay's [`LogIntake`]. Other producers, such as a
    /// [`RedirectHook`](crate::redirect::RedirectHook), keep their own clones.
    pub async fn start<T>(
        config: &Config,
        sender: RelaySender,
        receiver: RelayReceiver,
    ) -> Result<Self, StartError>
    where
        T: Transport + 'static,
    {
        config.validate()?;

        let cancel_token = CancellationToken::new();
        let receiver = receiver
            .with_wait_timeout(config.receive_timeout)
            .with_cancel_token(cancel_token.clone());
        let transport_config = config.transport.clone();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<Arc<DeliveryStats>, StartError>>();

        let worker = thread::Builder::new()
            .name(DELIVERY_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(StartError::Runtime(e)));
                        return;
                    }
                };

                runtime.block_on(async move {
                    match DeliveryLoop::<T>::connect(&transport_config, receiver).await {
                        Ok(delivery) => {
                            if ready_tx.send(Ok(delivery.stats())).is_err() {
                                debug!("Start-up abandoned, delivery loop not started");
                                return;
                            }
                            delivery.run().await;
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(StartError::Connect(e)));
                        }
                    }
                });
            })
            .map_err(StartError::Runtime)?;

        let stats = match ready_rx.await {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => {
                error!("Network logger failed to start: {e}");
                return Err(e);
            }
            Err(_) => {
                return Err(StartError::Runtime(io::Error::other(
                    "delivery thread exited during start-up",
                )))
            }
        };

        info!("Network logger initialised, sending over {}", T::PROTOCOL);
        Ok(Self {
            intake: LogIntake::new(sender),
            cancel_token,
            stats,
            worker: Some(worker),
        })
    }

    #[must_use]
    pub fn intake(&self) -> &LogIntake {
        &self.intake
    }

    #[must_use]
    pub fn sender(&self) -> &RelaySender {
        self.intake.sender()
    }

    #[must_use]
    pub fn stats(&self) -> Arc<DeliveryStats> {
        Arc::clone(&self.stats)
    }

    /// Stops the delivery loop after it has sent what is already queued and
    /// waits for the delivery thread to exit.
    pub async fn shutdown(mut self) -> Arc<DeliveryStats> {
        self.cancel_token.cancel();
        if let Some(worker) = self.worker.take() {
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => debug!("Delivery thread joined"),
                Ok(Err(_)) => error!("Delivery thread panicked"),
                Err(e) => error!("Failed to join delivery thread: {e}"),
            }
        }
        Arc::clone(&self.stats)
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::errors::TransportError;
    use crate::queue::relay_queue;
    use crate::transport::Protocol;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    static SENT: Mutex<Vec<String>> = Mutex::new(Vec::new());

    struct StaticTransport;

    #[async_trait]
    impl Transport for StaticTransport {
        const PROTOCOL: Protocol = Protocol::Udp;

        async fn connect(_config: &TransportConfig) -> Result<Self, TransportError> {
            Ok(Self)
        }

        async fn send(&mut self, payload: &[u8]) -> Result<usize, TransportError> {
            SENT.lock()
                .unwrap()
                .push(String::from_utf8_lossy(payload).into_owned());
            Ok(payload.len())
        }

        async fn close(self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct UnreachableTransport;

    #[async_trait]
    impl Transport for UnreachableTransport {
        const PROTOCOL: Protocol = Protocol::Tcp;

        async fn connect(config: &TransportConfig) -> Result<Self, TransportError> {
            Err(TransportError::Timeout(config.connect_timeout))
        }

        async fn send(&mut self, _payload: &[u8]) -> Result<usize, TransportError> {
            unreachable!("never connected")
        }

        async fn close(self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_start_then_shutdown_flushes() {
        let (tx, rx) = relay_queue(crate::constants::MESSAGE_QUEUE_SIZE);
        let relay = Relay::start::<StaticTransport>(&Config::default(), tx, rx)
            .await
            .unwrap();

        crate::relay_info!(relay.intake(), "boot", "relay up").unwrap();
        let stats = relay.shutdown().await;

        assert_eq!(stats.delivered(), 1);
        let sent = SENT.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("boot (netlog::relay::tests:"));
        assert!(sent[0].ends_with(") relay up"));
    }

    #[tokio::test]
    async fn test_start_fails_when_transport_cannot_connect() {
        let (tx, rx) = relay_queue(4);
        let result = Relay::start::<UnreachableTransport>(&Config::default(), tx.clone(), rx).await;

        assert!(matches!(
            result,
            Err(StartError::Connect(TransportError::Timeout(_)))
        ));
        // the receiver went down with the delivery thread
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let (tx, rx) = relay_queue(4);
        let config = Config {
            log_level: "loud".to_string(),
            ..Config::default()
        };

        let result = Relay::start::<StaticTransport>(&config, tx, rx).await;

        assert!(matches!(result, Err(StartError::Config(_))));
    }
}
