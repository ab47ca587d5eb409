// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Explicit logging entry point.
//!
//! Call sites use the `relay_*!` macros, which capture the line and module of
//! the caller and hand a [`LogRecord`] to [`LogIntake::log`].
//!
//! ```rust,ignore
//! let intake = relay.intake();
//! netlog::relay_warn!(intake, "wifi", "rssi dropped to {} dBm", rssi);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::errors::RelayError;
use crate::formatter::{self, Decorator, Level, LogRecord, TimestampDecorator};
use crate::queue::RelaySender;

/// Formats records and places them on the relay queue. Cheap to clone, one
/// per producer is fine.
#[derive(Clone)]
pub struct LogIntake {
    sender: RelaySender,
    decorator: Arc<dyn Decorator>,
}

impl LogIntake {
    #[must_use]
    pub fn new(sender: RelaySender) -> Self {
        Self::with_decorator(sender, Arc::new(TimestampDecorator))
    }

    #[must_use]
    pub fn with_decorator(sender: RelaySender, decorator: Arc<dyn Decorator>) -> Self {
        Self { sender, decorator }
    }

    /// Formats and enqueues one record. When the queue is full the message is
    /// dropped and [`RelayError::QueueFull`] returned; the caller has nothing
    /// to clean up.
    pub fn log(
        &self,
        level: Level,
        tag: &str,
        line: u32,
        func: &str,
        args: fmt::Arguments<'_>,
    ) -> Result<(), RelayError> {
        let record = LogRecord {
            level,
            tag,
            line,
            func,
            args,
        };
        let message = formatter::format_record(self.decorator.as_ref(), &record);
        self.sender.enqueue(message)
    }

    #[must_use]
    pub fn sender(&self) -> &RelaySender {
        &self.sender
    }
}

impl fmt::Debug for LogIntake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogIntake")
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

/// Relays a record through a [`LogIntake`], capturing `line!()` and
/// `module_path!()` of the call site.
#[macro_export]
macro_rules! relay_log {
    ($intake:expr, $level:expr, $tag:expr, $($arg:tt)+) => {
        $intake.log($level, $tag, line!(), module_path!(), format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! relay_error {
    ($intake:expr, $tag:expr, $($arg:tt)+) => {
        $crate::relay_log!($intake, $crate::formatter::Level::Error, $tag, $($arg)+)
    };
}

#[macro_export]
macro_rules! relay_warn {
    ($intake:expr, $tag:expr, $($arg:tt)+) => {
        $crate::relay_log!($intake, $crate::formatter::Level::Warn, $tag, $($arg)+)
    };
}

#[macro_export]
macro_rules! relay_info {
    ($intake:expr, $tag:expr, $($arg:tt)+) => {
        $crate::relay_log!($intake, $crate::formatter::Level::Info, $tag, $($arg)+)
    };
}

#[macro_export]
macro_rules! relay_debug {
    ($intake:expr, $tag:expr, $($arg:tt)+) => {
        $crate::relay_log!($intake, $crate::formatter::Level::Debug, $tag, $($arg)+)
    };
}

#[macro_export]
macro_rules! relay_verbose {
    ($intake:expr, $tag:expr, $($arg:tt)+) => {
        $crate::relay_log!($intake, $crate::formatter::Level::Verbose, $tag, $($arg)+)
    };
}
