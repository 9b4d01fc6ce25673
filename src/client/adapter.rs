//! Collaborator seams: transport, view, and location.
//!
//! The engine is adapter-agnostic. Three capabilities are injected at
//! construction:
//!
//! - [`HttpAdapter`] executes the exchange. A `reqwest`-backed
//!   implementation ships behind the `reqwest-client` feature; any
//!   transport that can surface abort and progress is valid.
//! - [`RenderAdapter`] commits a page into the view layer; one exists per
//!   supported view framework, translating "new page" notifications into
//!   its own reactivity primitive. No view reactivity lives in the core.
//! - [`LocationDriver`] performs full (non-engine) navigations when a
//!   response turns out to be foreign or the server forces a redirect.

use crate::client::CancelToken;
use crate::error::Result;
use crate::types::{FormField, Method, Page, Progress};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Body of an outgoing exchange.
#[derive(Clone, Debug, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// JSON-encoded body.
    Json(serde_json::Value),
    /// Multipart form body; present whenever the payload carries files.
    Multipart(Vec<FormField>),
}

/// One outgoing exchange, fully assembled by the orchestrator.
#[derive(Clone, Debug)]
pub struct AdapterRequest {
    /// HTTP method.
    pub method: Method,
    /// Resolved absolute URL, query string included.
    pub url: String,
    /// Request headers, names lowercase.
    pub headers: BTreeMap<String, String>,
    /// Request body.
    pub body: RequestBody,
}

/// Raw response handed back by the transport.
#[derive(Clone, Debug)]
pub struct AdapterResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercase.
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: Bytes,
    /// Final URL after any redirects the transport followed.
    pub final_url: Option<String>,
}

/// Sink receiving transfer progress samples.
pub type ProgressSink = Arc<dyn Fn(Progress) + Send + Sync>;

/// Per-exchange context handed to the transport.
#[derive(Clone)]
pub struct SendContext {
    /// Cancellation handle; the adapter must abort when it fires.
    pub cancel: CancelToken,
    /// Optional progress sink for upload/download samples.
    pub progress: Option<ProgressSink>,
    /// Optional transport-level timeout.
    pub timeout: Option<Duration>,
}

impl SendContext {
    /// Context with just a cancel token.
    #[must_use]
    pub fn new(cancel: CancelToken) -> Self {
        SendContext {
            cancel,
            progress: None,
            timeout: None,
        }
    }

    /// Attach a progress sink.
    #[must_use]
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Attach a transport timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Forward a progress sample to the sink, if any.
    pub fn report(&self, progress: Progress) {
        if let Some(sink) = &self.progress {
            sink(progress);
        }
    }
}

impl std::fmt::Debug for SendContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendContext")
            .field("cancel", &self.cancel)
            .field("has_progress", &self.progress.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Pluggable HTTP transport.
#[async_trait]
pub trait HttpAdapter: Send + Sync {
    /// Execute one exchange.
    ///
    /// Must return [`GlideError::Aborted`](crate::GlideError::Aborted)
    /// promptly when `ctx.cancel` fires, and should forward progress into
    /// `ctx` as bytes move.
    async fn send(&self, request: AdapterRequest, ctx: &SendContext) -> Result<AdapterResponse>;
}

/// Pluggable view layer.
#[async_trait]
pub trait RenderAdapter: Send + Sync {
    /// Commit `page` into the view; resolves once the view has committed
    /// the new props. `preserve_state` tells the adapter whether the
    /// mounted component instance should survive (same component only).
    async fn swap(&self, page: &Page, preserve_state: bool) -> Result<()>;
}

/// Full-page navigation escape hatch.
pub trait LocationDriver: Send + Sync {
    /// Leave the engine: load `url` as a full document navigation.
    fn hard_navigate(&self, url: &str);
}

/// Default location driver: records nothing, logs the escape.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLocationDriver;

impl LocationDriver for NoopLocationDriver {
    fn hard_navigate(&self, url: &str) {
        tracing::warn!(url, "full-page navigation requested with no location driver");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransferDirection;
    use std::sync::Mutex;

    #[test]
    fn test_send_context_report() {
        let samples = Arc::new(Mutex::new(Vec::new()));
        let sink_samples = samples.clone();
        let ctx = SendContext::new(CancelToken::new()).with_progress(Arc::new(move |p| {
            sink_samples.lock().unwrap().push(p);
        }));

        ctx.report(Progress {
            loaded: 10,
            total: Some(100),
            direction: TransferDirection::Download,
        });
        assert_eq!(samples.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_send_context_report_without_sink() {
        let ctx = SendContext::new(CancelToken::new());
        // No sink attached: must be a no-op, not a panic.
        ctx.report(Progress {
            loaded: 1,
            total: None,
            direction: TransferDirection::Upload,
        });
    }
}
