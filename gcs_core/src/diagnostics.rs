//! Diagnostics reporting
//!
//! The extension system never formats for display. Every transition and
//! error is handed to a [`DiagnosticsSink`] as a `(severity, plugin, message)`
//! triple; the host decides whether that ends up in the log, in a UI list of
//! plugin errors, or in a test assertion.

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "debug"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Plugin the report is about, empty for manager-wide reports
    pub plugin: String,
    pub message: String,
}

/// Receiver of diagnostics
pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);

    fn debug(&self, plugin: &str, message: String) {
        self.emit(Severity::Debug, plugin, message);
    }

    fn info(&self, plugin: &str, message: String) {
        self.emit(Severity::Info, plugin, message);
    }

    fn warning(&self, plugin: &str, message: String) {
        self.emit(Severity::Warning, plugin, message);
    }

    fn error(&self, plugin: &str, message: String) {
        self.emit(Severity::Error, plugin, message);
    }

    fn emit(&self, severity: Severity, plugin: &str, message: String) {
        self.report(Diagnostic {
            severity,
            plugin: plugin.to_string(),
            message,
        });
    }
}

/// Forwards diagnostics to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        let Diagnostic {
            severity,
            plugin,
            message,
        } = diagnostic;
        match severity {
            Severity::Debug => tracing::debug!(plugin = %plugin, "{}", message),
            Severity::Info => tracing::info!(plugin = %plugin, "{}", message),
            Severity::Warning => tracing::warn!(plugin = %plugin, "{}", message),
            Severity::Error => tracing::error!(plugin = %plugin, "{}", message),
        }
    }
}

/// Sends diagnostics over a channel, e.g. to a plugin error view
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<Diagnostic>,
}

impl ChannelSink {
    pub fn new(sender: Sender<Diagnostic>) -> Self {
        Self { sender }
    }

    /// Sink together with the receiving end of a fresh channel
    pub fn channel() -> (Self, Receiver<Diagnostic>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl DiagnosticsSink for ChannelSink {
    fn report(&self, diagnostic: Diagnostic) {
        // Nobody listening is fine
        let _ = self.sender.send(diagnostic);
    }
}

/// Collects diagnostics in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn with_severity(&self, severity: Severity) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.severity == severity)
            .cloned()
            .collect()
    }

    pub fn for_plugin(&self, plugin: &str) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.plugin == plugin)
            .cloned()
            .collect()
    }

    /// Whether a report of `severity` about `plugin` mentions `fragment`
    pub fn contains(&self, severity: Severity, plugin: &str, fragment: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|d| d.severity == severity && d.plugin == plugin && d.message.contains(fragment))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl DiagnosticsSink for MemorySink {
    fn report(&self, diagnostic: Diagnostic) {
        self.entries.lock().push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_filters() {
        let sink = MemorySink::new();
        sink.info("Core", "Loaded".to_string());
        sink.error("Uploader", "Library missing".to_string());
        sink.warning("Core", "Slow shutdown".to_string());

        assert_eq!(sink.entries().len(), 3);
        assert_eq!(sink.for_plugin("Core").len(), 2);
        assert_eq!(sink.with_severity(Severity::Error).len(), 1);
        assert!(sink.contains(Severity::Error, "Uploader", "missing"));
        assert!(!sink.contains(Severity::Error, "Core", "missing"));

        sink.clear();
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn test_channel_sink_delivers_in_order() {
        let (sink, receiver) = ChannelSink::channel();
        sink.info("A", "first".to_string());
        sink.info("B", "second".to_string());

        let received: Vec<_> = receiver.try_iter().map(|d| d.plugin).collect();
        assert_eq!(received, vec!["A", "B"]);
    }

    #[test]
    fn test_channel_sink_without_receiver() {
        let (sink, receiver) = ChannelSink::channel();
        drop(receiver);
        sink.error("A", "dropped".to_string());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Info > Severity::Debug);
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
