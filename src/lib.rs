//! glide_rs: a server-driven single-page navigation engine.
//!
//! The server keeps owning routing and data-fetching; page transitions
//! happen over asynchronous exchanges instead of full document loads,
//! while history, back/forward traversal, and scroll behavior stay
//! correct. The core of this crate is the visit orchestration engine: it
//! turns a navigation intent (link click, programmatic call, poll tick)
//! into exactly one in-flight exchange, reconciles the response into the
//! current page state, and keeps the history store, scroll manager, and
//! prefetch cache consistent with it.
//!
//! View rendering, head management, and server-side handlers live behind
//! adapter seams; the engine carries no view reactivity and no server
//! half.
//!
//! # Module Organization
//!
//! ```text
//! glide_rs/
//! ├── client   - Router (visit orchestration), adapters, cancellation, polling
//! ├── types    - Page, visit options, progress
//! ├── protocol - wire headers, query serialization, response classification
//! ├── events   - typed pub/sub for lifecycle events
//! ├── history  - version-keyed bounded entry store
//! ├── scroll   - scroll region registry and policy
//! ├── cache    - prefetch cache with staleness and tags
//! └── error    - GlideError and Result alias
//! ```
//!
//! # Example
//!
//! ```no_run
//! use glide_rs::{Page, Router, RouterConfig, VisitOptions};
//! use glide_rs::client::RenderAdapter;
//! use glide_rs::error::Result;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//! use url::Url;
//!
//! struct PrintRenderer;
//!
//! #[async_trait]
//! impl RenderAdapter for PrintRenderer {
//!     async fn swap(&self, page: &Page, _preserve_state: bool) -> Result<()> {
//!         println!("mounting {} at {}", page.component, page.url);
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let router = Router::builder()
//!     .config(RouterConfig::with_base_url(Url::parse("https://app.test")?))
//!     .render_adapter(Arc::new(PrintRenderer))
//!     .build()?;
//!
//! router.init(Page::new("Home", "/")).await?;
//! router.visit("/users", VisitOptions::new()).await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod events;
pub mod history;
pub mod protocol;
pub mod scroll;
pub mod types;

// Top-level re-exports for common usage.
pub use crate::client::{
    CancelToken, PollHandle, PrefetchOptions, Router, RouterBuilder, RouterConfig,
};
pub use crate::error::{GlideError, Result};
pub use crate::events::{Event, EventBus, EventKind, ListenerId};
pub use crate::history::{HistoryCipher, HistoryEntry, HistoryStore, PlainCipher};
pub use crate::scroll::{ScrollManager, ScrollPosition};
pub use crate::types::{
    Method, Page, Progress, Props, ScrollPreserve, StatePreserve, VisitData, VisitFailure,
    VisitInfo, VisitOptions,
};

#[cfg(feature = "reqwest-client")]
pub use crate::client::ReqwestAdapter;
