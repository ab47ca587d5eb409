// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Size of a message buffer, counting the terminator byte the collector
/// protocol historically reserved.
pub const BUFFER_SIZE: usize = 256;

/// Largest number of content bytes a single relayed message may carry.
pub const MAX_MESSAGE_LEN: usize = BUFFER_SIZE - 1;

/// Number of messages the relay queue holds before rejecting new ones.
pub const MESSAGE_QUEUE_SIZE: usize = 20;

/// Sent in place of a message when waiting on the relay queue fails, so the
/// collector sees a gap instead of silence.
pub const SENTINEL_MESSAGE: &str = "Unknown error - receiving log message";

/// Name of the OS thread running the delivery loop.
pub const DELIVERY_THREAD_NAME: &str = "netlog-delivery";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9514;
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:9514/logs";
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_LOG_LEVEL: &str = "info";
