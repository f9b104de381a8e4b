use tracing::Level;

/// Receives the child's output lines and supervisor diagnostics.
///
/// The host decides where they go; the default forwards to `tracing`.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards everything as tracing events under the `sv_supervisor::child` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "sv_supervisor::child", "{message}"),
            Level::WARN => tracing::warn!(target: "sv_supervisor::child", "{message}"),
            Level::INFO => tracing::info!(target: "sv_supervisor::child", "{message}"),
            Level::DEBUG => tracing::debug!(target: "sv_supervisor::child", "{message}"),
            _ => tracing::trace!(target: "sv_supervisor::child", "{message}"),
        }
    }
}
