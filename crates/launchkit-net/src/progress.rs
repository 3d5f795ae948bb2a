//! ---
//! lk_section: "03-networking-transfer"
//! lk_subsection: "module"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Push-only transfer progress notifications."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
use tracing::{debug, info, warn};

/// Terminal state of one transfer, reported to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// All bytes landed at the destination.
    Completed,
    /// The transfer was abandoned; the destination was not replaced.
    Aborted,
}

/// Push-only observer of transfer progress.
///
/// The pipeline never awaits or queries a sink and a sink can never fail a
/// transfer: every method is infallible and expected to return promptly.
pub trait ProgressSink {
    /// A transfer for `name` is starting. `total_bytes` is `None` when the
    /// source does not announce its size.
    fn begin(&self, name: &str, total_bytes: Option<u64>);

    /// `bytes_so_far` bytes of the current transfer have landed.
    fn advance(&self, bytes_so_far: u64);

    /// The current transfer ended with `outcome`.
    fn finish(&self, outcome: TransferOutcome);
}

/// Sink that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn begin(&self, _name: &str, _total_bytes: Option<u64>) {}
    fn advance(&self, _bytes_so_far: u64) {}
    fn finish(&self, _outcome: TransferOutcome) {}
}

/// Sink that mirrors progress into tracing events, used as the launcher's
/// first-run download display.
#[derive(Debug, Clone, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn begin(&self, name: &str, total_bytes: Option<u64>) {
        match total_bytes {
            Some(total) => info!(component = name, total_bytes = total, "download started"),
            None => info!(component = name, "download started (size unknown)"),
        }
    }

    fn advance(&self, bytes_so_far: u64) {
        debug!(bytes = bytes_so_far, "download progress");
    }

    fn finish(&self, outcome: TransferOutcome) {
        match outcome {
            TransferOutcome::Completed => info!("download complete"),
            TransferOutcome::Aborted => warn!("download aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sinks_accept_full_lifecycle() {
        for sink in [&NoopProgress as &dyn ProgressSink, &LogProgress] {
            sink.begin("core", Some(1024));
            sink.advance(512);
            sink.advance(1024);
            sink.finish(TransferOutcome::Completed);
            sink.begin("plugins", None);
            sink.finish(TransferOutcome::Aborted);
        }
    }
}
