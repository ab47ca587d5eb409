// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Network log relay for connected embedded nodes.
//!
//! Producers format log records into bounded messages and hand them to a
//! fixed-capacity relay queue. A single delivery loop, running on its own
//! thread, drains the queue and ships each message to a remote collector over
//! the transport selected at build time (UDP, TCP or WebSocket).
//!
//! ```text
//! producers ─> formatter ─> relay queue ─> delivery loop ─> transport ─> collector
//!    ^
//!    └── redirect hook (tracing layer mirroring the process' own logs)
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod constants;
pub mod delivery;
pub mod errors;
pub mod formatter;
pub mod intake;
pub mod queue;
pub mod redirect;
pub mod relay;
pub mod transport;
