// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Rendering of log records into bounded relay messages.
//!
//! A record is rendered as `<tag> (<func>:<line>) <text>` and then handed to a
//! [`Decorator`], which prepends the severity marker and the millisecond
//! timestamp. Every [`FormattedMessage`] is capped at
//! [`MAX_MESSAGE_LEN`](crate::constants::MAX_MESSAGE_LEN) bytes: longer content
//! is cut at the last character boundary that fits.

use std::fmt::{self, Write};
use std::sync::OnceLock;
use std::time::Instant;

use crate::constants::MAX_MESSAGE_LEN;

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// Milliseconds elapsed since the relay clock was first read.
pub fn uptime_ms() -> u64 {
    let start = PROCESS_START.get_or_init(Instant::now);
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Severity of a relayed record, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Verbose,
}

impl Level {
    /// Numeric ordinal sent to the decorator, in `0..=4`.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Level::Error => 0,
            Level::Warn => 1,
            Level::Info => 2,
            Level::Debug => 3,
            Level::Verbose => 4,
        }
    }

    /// Inverse of [`Level::ordinal`]. Out of range ordinals fall back to `Info`.
    #[must_use]
    pub const fn from_ordinal(ordinal: u8) -> Self {
        match ordinal {
            0 => Level::Error,
            1 => Level::Warn,
            3 => Level::Debug,
            4 => Level::Verbose,
            _ => Level::Info,
        }
    }

    /// Maps a raw platform log level (`NONE=0, ERROR=1 .. VERBOSE=5`).
    /// Anything unrecognised is treated as `Info`.
    #[must_use]
    pub const fn from_platform(raw: i32) -> Self {
        match raw {
            1 => Level::Error,
            2 => Level::Warn,
            4 => Level::Debug,
            5 => Level::Verbose,
            _ => Level::Info,
        }
    }

    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Level::Error => 'E',
            Level::Warn => 'W',
            Level::Info => 'I',
            Level::Debug => 'D',
            Level::Verbose => 'V',
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        if level == tracing::Level::ERROR {
            Level::Error
        } else if level == tracing::Level::WARN {
            Level::Warn
        } else if level == tracing::Level::DEBUG {
            Level::Debug
        } else if level == tracing::Level::TRACE {
            Level::Verbose
        } else {
            Level::Info
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Verbose => "VERBOSE",
        };
        f.write_str(name)
    }
}

/// An owned message ready for the relay queue. Never longer than
/// [`MAX_MESSAGE_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedMessage(String);

impl FormattedMessage {
    /// Copies `text`, truncating it to the buffer capacity.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut buffer = BoundedBuffer::new();
        // BoundedBuffer never reports an error, it discards what does not fit.
        let _ = buffer.write_str(text);
        buffer.finish()
    }

    /// Renders `args` straight into a bounded buffer without building the
    /// full string first.
    #[must_use]
    pub fn render(args: fmt::Arguments<'_>) -> Self {
        let mut buffer = BoundedBuffer::new();
        let _ = buffer.write_fmt(args);
        buffer.finish()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for FormattedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `fmt::Write` sink that keeps at most [`MAX_MESSAGE_LEN`] bytes and drops
/// the rest, the way `vsnprintf` does.
struct BoundedBuffer {
    buf: String,
}

impl BoundedBuffer {
    fn new() -> Self {
        Self {
            buf: String::with_capacity(64),
        }
    }

    fn finish(self) -> FormattedMessage {
        FormattedMessage(self.buf)
    }
}

impl Write for BoundedBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = MAX_MESSAGE_LEN - self.buf.len();
        if s.len() <= room {
            self.buf.push_str(s);
        } else {
            let mut end = room;
            while !s.is_char_boundary(end) {
                end -= 1;
            }
            self.buf.push_str(&s[..end]);
        }
        Ok(())
    }
}

/// Prepends the severity marker and timestamp to a rendered record.
pub trait Decorator: Send + Sync {
    fn decorate(&self, level_ordinal: u8, timestamp_ms: u64, message: &str) -> FormattedMessage;
}

/// Produces `<L> (<timestamp_ms>) <message>`, the layout of the platform's
/// own console logger.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampDecorator;

impl Decorator for TimestampDecorator {
    fn decorate(&self, level_ordinal: u8, timestamp_ms: u64, message: &str) -> FormattedMessage {
        let letter = Level::from_ordinal(level_ordinal).letter();
        FormattedMessage::render(format_args!("{letter} ({timestamp_ms}) {message}"))
    }
}

/// A single log call, borrowed from the call site.
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    pub level: Level,
    pub tag: &'a str,
    pub line: u32,
    pub func: &'a str,
    pub args: fmt::Arguments<'a>,
}

/// Renders `<tag> (<func>:<line>) <text>` with no timestamp.
#[must_use]
pub fn render_record(record: &LogRecord<'_>) -> FormattedMessage {
    FormattedMessage::render(format_args!(
        "{} ({}:{}) {}",
        record.tag, record.func, record.line, record.args
    ))
}

/// Renders a record and runs it through `decorator` with the current uptime.
#[must_use]
pub fn format_record(decorator: &dyn Decorator, record: &LogRecord<'_>) -> FormattedMessage {
    let body = render_record(record);
    decorator.decorate(record.level.ordinal(), uptime_ms(), body.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_level_ordinals() {
        assert_eq!(Level::Error.ordinal(), 0);
        assert_eq!(Level::Warn.ordinal(), 1);
        assert_eq!(Level::Info.ordinal(), 2);
        assert_eq!(Level::Debug.ordinal(), 3);
        assert_eq!(Level::Verbose.ordinal(), 4);
    }

    #[test]
    fn test_unknown_levels_default_to_info() {
        assert_eq!(Level::from_platform(0).ordinal(), 2);
        assert_eq!(Level::from_platform(-7).ordinal(), 2);
        assert_eq!(Level::from_platform(42).ordinal(), 2);
        assert_eq!(Level::from_ordinal(9), Level::Info);
    }

    #[test]
    fn test_platform_levels() {
        assert_eq!(Level::from_platform(1), Level::Error);
        assert_eq!(Level::from_platform(2), Level::Warn);
        assert_eq!(Level::from_platform(3), Level::Info);
        assert_eq!(Level::from_platform(4), Level::Debug);
        assert_eq!(Level::from_platform(5), Level::Verbose);
    }

    #[test]
    fn test_tracing_levels() {
        assert_eq!(Level::from(tracing::Level::ERROR), Level::Error);
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warn);
        assert_eq!(Level::from(tracing::Level::INFO), Level::Info);
        assert_eq!(Level::from(tracing::Level::DEBUG), Level::Debug);
        assert_eq!(Level::from(tracing::Level::TRACE), Level::Verbose);
    }

    #[test]
    fn test_render_record_layout() {
        let message = render_record(&LogRecord {
            level: Level::Info,
            tag: "wifi",
            line: 42,
            func: "connect",
            args: format_args!("rssi={} dBm", -61),
        });
        assert_eq!(message.as_str(), "wifi (connect:42) rssi=-61 dBm");
    }

    #[test]
    fn test_decorator_prefixes_level_and_timestamp() {
        let message = TimestampDecorator.decorate(1, 1234, "wifi (connect:42) lost");
        assert_eq!(message.as_str(), "W (1234) wifi (connect:42) lost");
    }

    #[test]
    fn test_format_record_decorates() {
        let message = format_record(
            &TimestampDecorator,
            &LogRecord {
                level: Level::Error,
                tag: "ota",
                line: 7,
                func: "flash",
                args: format_args!("write failed"),
            },
        );
        assert!(message.as_str().starts_with("E ("));
        assert!(message.as_str().ends_with(") ota (flash:7) write failed"));
    }

    #[test]
    fn test_long_message_is_truncated() {
        let long = "x".repeat(1000);
        let message = format_record(
            &TimestampDecorator,
            &LogRecord {
                level: Level::Info,
                tag: "big",
                line: 1,
                func: "main",
                args: format_args!("{long}"),
            },
        );
        assert_eq!(message.len(), MAX_MESSAGE_LEN);
        assert!(message.len() < crate::constants::BUFFER_SIZE);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // 'é' is two bytes, so an odd byte budget would split it
        let text = "é".repeat(200);
        let message = FormattedMessage::new(&text);
        assert!(message.len() <= MAX_MESSAGE_LEN);
        assert_eq!(message.len() % 2, 0);
        assert!(message.as_str().chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_short_message_untouched() {
        let message = FormattedMessage::new("hello");
        assert_eq!(message.as_str(), "hello");
        assert_eq!(message.to_string(), "hello");
    }

    proptest! {
        #[test]
        fn prop_formatted_message_never_exceeds_capacity(text in ".{0,600}") {
            let message = FormattedMessage::new(&text);
            prop_assert!(message.len() <= MAX_MESSAGE_LEN);
            prop_assert!(text.starts_with(message.as_str()));
        }

        #[test]
        fn prop_ordinal_round_trips(ordinal in 0u8..=4) {
            prop_assert_eq!(Level::from_ordinal(ordinal).ordinal(), ordinal);
        }

        #[test]
        fn prop_ordinal_always_in_range(raw in any::<i32>()) {
            prop_assert!(Level::from_platform(raw).ordinal() <= 4);
        }
    }
}
