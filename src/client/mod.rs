//! The visit orchestrator and its collaborator seams.
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── router          - Router: visit orchestration, prefetch, history traversal
//! ├── config          - RouterConfig
//! ├── adapter         - HttpAdapter / RenderAdapter / LocationDriver seams
//! ├── reqwest_adapter - default transport (feature "reqwest-client")
//! ├── retry           - retry policy for idempotent background requests
//! ├── cancel          - cooperative cancellation handle
//! └── poll            - periodic background reloads
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Router`] | The visit orchestrator |
//! | [`RouterConfig`] | Router construction options |
//! | [`CancelToken`] | Idempotent per-visit cancellation handle |
//! | [`HttpAdapter`] | Pluggable transport seam |
//! | [`RenderAdapter`] | Pluggable view seam |
//! | [`PollHandle`] | Stop handle of a background poll |

pub mod adapter;
mod cancel;
mod config;
mod poll;
pub mod retry;
mod router;

#[cfg(feature = "reqwest-client")]
mod reqwest_adapter;

pub use adapter::{
    AdapterRequest, AdapterResponse, HttpAdapter, LocationDriver, NoopLocationDriver,
    ProgressSink, RenderAdapter, RequestBody, SendContext,
};
pub use cancel::CancelToken;
pub use config::RouterConfig;
pub use poll::PollHandle;
pub use retry::{parse_retry_after, RetryConfig, RetryDecision, RetryState};
pub use router::{PrefetchOptions, Router, RouterBuilder};

#[cfg(feature = "reqwest-client")]
pub use reqwest_adapter::ReqwestAdapter;
