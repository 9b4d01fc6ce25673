//! Error types for navigation engine operations.
//!
//! The [`Result`] type alias provides a convenient shorthand for operations
//! that may fail.
//!
//! # Error Categories
//!
//! | Category | Variants | Visit outcome |
//! |----------|----------|---------------|
//! | Transport | `Http`, `Io`, `Timeout` | reported via `error`, no state mutation |
//! | Protocol | `Protocol`, `ForeignResponse`, `HeaderParse`, `Json` | full-page navigation fallback |
//! | Staleness | `StaleVersion` | automatic full reload |
//! | Cancellation | `Aborted` | reported via `cancel`, not an error |
//! | Setup | `Config`, `UrlParse`, `Encryption` | returned to the caller directly |
//!
//! A visit itself never surfaces these as a returned error: navigation
//! failure must not crash caller code, so failures flow through the `error`
//! event and the visit's `on_error` callback instead.

use thiserror::Error;

/// Result type for navigation engine operations.
pub type Result<T> = std::result::Result<T, GlideError>;

/// Errors that can occur while orchestrating a visit.
///
/// # Examples
///
/// ```
/// use glide_rs::GlideError;
///
/// fn classify(err: &GlideError) -> &'static str {
///     match err {
///         GlideError::Timeout => "retry later",
///         GlideError::ForeignResponse { .. } => "leave the page",
///         _ => "report",
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GlideError {
    /// HTTP exchange failed with the given error message.
    ///
    /// Covers unreachable servers, connection resets, and transport-layer
    /// failures surfaced by the adapter.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Network I/O error (connection failed, read/write error, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The visit's timeout elapsed before the transport resolved.
    #[error("Visit timed out")]
    Timeout,

    /// The visit was aborted through its cancel token.
    ///
    /// Not an error at the visit level; reported through the `cancel`
    /// event so callers can distinguish "failed" from "superseded".
    #[error("Visit aborted")]
    Aborted,

    /// The server response violates the wire protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The response carries no protocol marker header.
    ///
    /// The server answered with a plain document (e.g. a redirect to a
    /// page outside the application). The engine escalates to a full
    /// browser navigation toward `url` instead of reconciling.
    #[error("Foreign response from {url}")]
    ForeignResponse {
        /// Where the full-page navigation should go.
        url: String,
    },

    /// The asset version in the response no longer matches the client.
    ///
    /// Triggers an automatic full reload rather than a partial update.
    #[error("Stale asset version: have {current:?}, server sent {received:?}")]
    StaleVersion {
        /// Version the client is holding.
        current: Option<String>,
        /// Version the server responded with.
        received: Option<String>,
    },

    /// Failed to parse a protocol header.
    #[error("Header parse error: {0}")]
    HeaderParse(String),

    /// JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or unresolvable URL.
    #[error("URL error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// History snapshot could not be sealed or opened.
    #[error("History encryption error: {0}")]
    Encryption(String),

    /// Invalid parameters when constructing the router or a visit.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GlideError {
    /// Check if this error is retryable.
    ///
    /// Returns `true` for transient transport failures that may succeed on
    /// retry, `false` for protocol violations and configuration errors.
    ///
    /// # Examples
    ///
    /// ```
    /// use glide_rs::GlideError;
    ///
    /// assert!(GlideError::Timeout.is_retryable());
    /// assert!(!GlideError::Protocol("bad payload".into()).is_retryable());
    /// ```
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            GlideError::Http(msg) => {
                msg.contains("408")
                    || msg.contains("429")
                    || msg.contains("502")
                    || msg.contains("503")
                    || msg.contains("504")
            }
            GlideError::Timeout | GlideError::Io(_) => true,
            _ => false,
        }
    }

    /// Check if this error represents cancellation rather than failure.
    #[inline]
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, GlideError::Aborted)
    }
}
