// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Capture of the process' own log output.
//!
//! [`RedirectHook`] feeds every platform log line to two independent sinks:
//! the relay queue and the local output. The local write happens whatever the
//! queue says, so losing network logs never costs local diagnostics.
//!
//! [`RelayLayer`] installs the hook as a `tracing` layer:
//!
//! ```rust,ignore
//! use tracing_subscriber::layer::SubscriberExt;
//! use tracing_subscriber::util::SubscriberInitExt;
//!
//! let (sender, receiver) = netlog::queue::relay_queue(MESSAGE_QUEUE_SIZE);
//! tracing_subscriber::registry()
//!     .with(EnvFilter::new("info"))
//!     .with(RelayLayer::new(RedirectHook::new(sender, StderrSink)))
//!     .init();
//! ```

use std::fmt::{self, Write as _};
use std::io::Write as _;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::formatter::{uptime_ms, FormattedMessage, Level};
use crate::queue::RelaySender;

/// Local destination for platform log lines.
pub trait LocalSink: Send + Sync {
    /// Writes one line and returns the number of bytes written.
    fn write_line(&self, line: &str) -> usize;
}

impl<T: LocalSink + ?Sized> LocalSink for Arc<T> {
    fn write_line(&self, line: &str) -> usize {
        (**self).write_line(line)
    }
}

/// Writes lines to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl LocalSink for StderrSink {
    fn write_line(&self, line: &str) -> usize {
        let mut stderr = std::io::stderr().lock();
        match writeln!(stderr, "{line}") {
            Ok(()) => line.len() + 1,
            Err(_) => 0,
        }
    }
}

/// Dual delivery of platform log lines: relay queue first, local sink always.
#[derive(Debug, Clone)]
pub struct RedirectHook<S = StderrSink> {
    sender: RelaySender,
    sink: S,
}

impl<S: LocalSink> RedirectHook<S> {
    #[must_use]
    pub fn new(sender: RelaySender, sink: S) -> Self {
        Self { sender, sink }
    }

    /// Renders `args`, relays the bounded copy and writes the full line
    /// locally. Returns what the local sink returned.
    pub fn route(&self, args: fmt::Arguments<'_>) -> usize {
        self.route_line(&fmt::format(args))
    }

    pub fn route_line(&self, line: &str) -> usize {
        // Once the relay is shut down only the local sink is left.
        if !self.sender.is_closed() {
            // Queue failures are already reported by the queue itself.
            let _ = self.sender.enqueue(FormattedMessage::new(line));
        }
        self.sink.write_line(line)
    }

    /// Writes `line` to the local sink only.
    pub fn echo(&self, line: &str) -> usize {
        self.sink.write_line(line)
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// `tracing` layer that turns every event into a platform line
/// `<L> (<uptime ms>) <target>: <message> <fields>` and routes it through a
/// [`RedirectHook`].
///
/// Events emitted by this crate are echoed locally but not relayed, otherwise
/// the delivery loop's own diagnostics would feed back into the queue.
#[derive(Debug)]
pub struct RelayLayer<S = StderrSink> {
    hook: RedirectHook<S>,
}

impl<S: LocalSink> RelayLayer<S> {
    #[must_use]
    pub fn new(hook: RedirectHook<S>) -> Self {
        Self { hook }
    }
}

impl<S, Sub> Layer<Sub> for RelayLayer<S>
where
    S: LocalSink + 'static,
    Sub: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, Sub>) {
        let metadata = event.metadata();
        let level = Level::from(*metadata.level());

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let line = format!(
            "{} ({}) {}: {}",
            level.letter(),
            uptime_ms(),
            metadata.target(),
            visitor.finish()
        );

        if is_relay_target(metadata.target()) {
            self.hook.echo(&line);
        } else {
            self.hook.route_line(&line);
        }
    }
}

fn is_relay_target(target: &str) -> bool {
    let own = env!("CARGO_CRATE_NAME");
    target == own
        || target
            .strip_prefix(own)
            .is_some_and(|rest| rest.starts_with("::"))
}

/// Collects the `message` field followed by `name=value` pairs.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields
        } else {
            format!("{} {}", self.message, self.fields)
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}
