//! Builder tracing hooks.

use std::fmt;

/// Receives one line per builder operation.
///
/// Sinks only observe; they cannot change what the builder does.
pub trait TraceSink: Send + Sync {
    fn trace(&self, line: &str);
}

/// Forwards trace lines to the `log` facade at trace level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn trace(&self, line: &str) {
        log::trace!(target: "textmodel::builder", "{line}");
    }
}

impl fmt::Debug for dyn TraceSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TraceSink")
    }
}
