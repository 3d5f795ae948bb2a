//! ---
//! lk_section: "03-networking-transfer"
//! lk_subsection: "module"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Byte-transfer primitives: fetchers, progress, reachability."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Transfer crate isolating the update pipeline from raw byte movement. The
//! orchestrator only ever sees the [`Fetcher`] trait, a push-only
//! [`ProgressSink`], and a boolean reachability probe.

/// Result alias used throughout the transfer crate.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Error type for fetch operations. The pipeline treats every variant
/// identically as stage failure; the split exists for diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Wrapper for IO errors while writing the destination file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for HTTP transport errors.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Server answered with a non-success status.
    #[error("server returned {status} for {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },
    /// The URL scheme has no registered fetcher.
    #[error("unsupported url scheme `{0}`")]
    UnsupportedScheme(String),
}

pub mod fetch;
pub mod probe;
pub mod progress;

pub use fetch::{default_fetcher, Fetcher, FileFetcher, HttpFetcher};
pub use probe::server_reachable;
pub use progress::{LogProgress, NoopProgress, ProgressSink, TransferOutcome};
