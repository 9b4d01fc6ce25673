//! Per-visit request parameters.
//!
//! A visit is one attempted client-driven navigation. [`VisitOptions`] is
//! the frozen options bag handed to [`Router::visit`](crate::Router::visit);
//! it controls the HTTP exchange (method, payload, headers), reconciliation
//! (`only`/`except`/`reset`), history (`replace`), and the preservation of
//! scroll offsets and component state across the swap.
//!
//! Options are built fluently:
//!
//! ```
//! use glide_rs::{Method, VisitOptions};
//! use serde_json::json;
//!
//! let options = VisitOptions::new()
//!     .with_method(Method::Post)
//!     .with_data(json!({"name": "Ada"}))
//!     .with_preserve_scroll(true)
//!     .with_error_bag("signup");
//! ```

use crate::client::CancelToken;
use crate::error::GlideError;
use crate::types::{ErrorMap, Page, Progress, Props};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// HTTP method of a visit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET, the default; request data is serialized into the query string.
    #[default]
    Get,
    /// POST; data travels in the request body.
    Post,
    /// PUT; data travels in the request body.
    Put,
    /// PATCH; data travels in the request body.
    Patch,
    /// DELETE; request data is serialized into the query string.
    Delete,
}

impl Method {
    /// Uppercase wire representation.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Whether request data belongs in the query string rather than a body.
    #[inline]
    #[must_use]
    pub fn carries_query_data(&self) -> bool {
        matches!(self, Method::Get | Method::Delete)
    }

    /// Whether a stale prefetch entry may satisfy this method.
    #[inline]
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file attached to a form payload.
#[derive(Clone, Debug, PartialEq)]
pub struct FileUpload {
    /// File name reported to the server.
    pub filename: String,
    /// MIME type of the content.
    pub content_type: String,
    /// Raw file bytes.
    pub bytes: Bytes,
}

/// One value within a form payload.
#[derive(Clone, Debug, PartialEq)]
pub enum FormValue {
    /// Plain text field.
    Text(String),
    /// File field; its presence forces multipart encoding.
    File(FileUpload),
}

/// One named field of a form payload.
#[derive(Clone, Debug, PartialEq)]
pub struct FormField {
    /// Field name, bracket notation allowed (`user[avatar]`).
    pub name: String,
    /// Field value.
    pub value: FormValue,
}

impl FormField {
    /// Create a text field.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormField {
            name: name.into(),
            value: FormValue::Text(value.into()),
        }
    }

    /// Create a file field.
    #[must_use]
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        FormField {
            name: name.into(),
            value: FormValue::File(FileUpload {
                filename: filename.into(),
                content_type: content_type.into(),
                bytes: bytes.into(),
            }),
        }
    }
}

/// Request payload of a visit.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum VisitData {
    /// No payload.
    #[default]
    None,
    /// A JSON tree; query-serialized for GET/DELETE, JSON body otherwise.
    Json(serde_json::Value),
    /// Form fields; any file present forces multipart encoding.
    Form(Vec<FormField>),
}

impl VisitData {
    /// Whether the payload contains a file anywhere in its tree.
    #[must_use]
    pub fn contains_files(&self) -> bool {
        match self {
            VisitData::Form(fields) => fields
                .iter()
                .any(|f| matches!(f.value, FormValue::File(_))),
            _ => false,
        }
    }

    /// Whether there is any payload at all.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            VisitData::None => true,
            VisitData::Json(v) => v.is_null(),
            VisitData::Form(fields) => fields.is_empty(),
        }
    }
}

/// Whether component instance identity survives the swap.
#[derive(Clone, Default)]
pub enum StatePreserve {
    /// Remount the component (the default for navigation visits).
    #[default]
    Never,
    /// Keep the mounted component instance.
    Always,
    /// Keep it only when the incoming page carries validation errors.
    WhenErrors,
    /// Decide per incoming page.
    Predicate(Arc<dyn Fn(&Page) -> bool + Send + Sync>),
}

impl StatePreserve {
    /// Evaluate against the incoming page.
    #[must_use]
    pub fn resolve(&self, page: &Page) -> bool {
        match self {
            StatePreserve::Never => false,
            StatePreserve::Always => true,
            StatePreserve::WhenErrors => page.has_errors(),
            StatePreserve::Predicate(f) => f(page),
        }
    }
}

impl std::fmt::Debug for StatePreserve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatePreserve::Never => f.write_str("Never"),
            StatePreserve::Always => f.write_str("Always"),
            StatePreserve::WhenErrors => f.write_str("WhenErrors"),
            StatePreserve::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<bool> for StatePreserve {
    fn from(v: bool) -> Self {
        if v {
            StatePreserve::Always
        } else {
            StatePreserve::Never
        }
    }
}

/// Whether scroll offsets survive the swap.
#[derive(Clone, Default)]
pub enum ScrollPreserve {
    /// Reset every region to the origin (the default).
    #[default]
    Never,
    /// Leave offsets untouched.
    Always,
    /// Decide per incoming page.
    Predicate(Arc<dyn Fn(&Page) -> bool + Send + Sync>),
}

impl ScrollPreserve {
    /// Evaluate against the incoming page.
    #[must_use]
    pub fn resolve(&self, page: &Page) -> bool {
        match self {
            ScrollPreserve::Never => false,
            ScrollPreserve::Always => true,
            ScrollPreserve::Predicate(f) => f(page),
        }
    }
}

impl std::fmt::Debug for ScrollPreserve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrollPreserve::Never => f.write_str("Never"),
            ScrollPreserve::Always => f.write_str("Always"),
            ScrollPreserve::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<bool> for ScrollPreserve {
    fn from(v: bool) -> Self {
        if v {
            ScrollPreserve::Always
        } else {
            ScrollPreserve::Never
        }
    }
}

/// Transform applied to the current props to derive an optimistic page
/// before the network responds. Rolled back if the visit fails.
pub type OptimisticTransform = Arc<dyn Fn(&Props) -> Props + Send + Sync>;

/// Hook receiving the visit snapshot before any network activity;
/// returning `false` aborts the visit.
pub type BeforeHook = Arc<dyn Fn(&VisitInfo) -> bool + Send + Sync>;
/// Hook receiving visit lifecycle notifications.
pub type VisitHook = Arc<dyn Fn(&VisitInfo) + Send + Sync>;
/// Hook receiving transfer progress samples.
pub type ProgressHook = Arc<dyn Fn(&Progress) + Send + Sync>;
/// Hook receiving the committed page on success.
pub type SuccessHook = Arc<dyn Fn(&Page) + Send + Sync>;
/// Hook receiving visit failures.
pub type ErrorHook = Arc<dyn Fn(&VisitFailure) + Send + Sync>;
/// Hook receiving the visit's cancellation handle.
pub type CancelTokenHook = Arc<dyn Fn(CancelToken) + Send + Sync>;

/// How a visit failed.
#[derive(Clone, Debug)]
pub enum VisitFailure {
    /// Transport or protocol failure; no state was mutated.
    Transport(Arc<GlideError>),
    /// Well-formed response carrying validation errors; the page committed
    /// normally and the resolved errors map is attached here.
    Validation(ErrorMap),
}

impl VisitFailure {
    /// The validation errors map, when this is a validation failure.
    #[must_use]
    pub fn errors(&self) -> Option<&ErrorMap> {
        match self {
            VisitFailure::Validation(errors) => Some(errors),
            VisitFailure::Transport(_) => None,
        }
    }
}

/// Read-only snapshot of a visit, handed to event listeners and hooks.
#[derive(Clone, Debug)]
pub struct VisitInfo {
    /// Correlation id of the visit.
    pub id: Uuid,
    /// Resolved absolute target URL.
    pub url: String,
    /// HTTP method.
    pub method: Method,
    /// Terminal state reached.
    pub completed: bool,
    /// Cancelled through the cancel handle.
    pub cancelled: bool,
    /// Superseded by a newer active visit before finishing.
    pub interrupted: bool,
}

/// The frozen options bag of one visit.
///
/// Construct with [`VisitOptions::new`] and the `with_*` builders. All
/// fields are also public for struct-update syntax.
#[derive(Clone, Default)]
pub struct VisitOptions {
    /// HTTP method; defaults to GET.
    pub method: Method,
    /// Request payload.
    pub data: VisitData,
    /// Replace the current history entry instead of pushing a new one.
    pub replace: bool,
    /// Scroll offset policy for this visit.
    pub preserve_scroll: ScrollPreserve,
    /// Component identity policy for this visit.
    pub preserve_state: StatePreserve,
    /// Exclusive allow-list of prop keys to request (partial reload).
    pub only: Vec<String>,
    /// Prop keys to leave out of the response. `only` wins when both set.
    pub except: Vec<String>,
    /// Prop keys forced back to their fresh server value even when the
    /// partial response omits them.
    pub reset: Vec<String>,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
    /// Error bag name scoping the `errors` prop.
    pub error_bag: Option<String>,
    /// Optimistic prop transform applied before the network responds.
    pub optimistic: Option<OptimisticTransform>,
    /// Per-visit timeout racing the transport.
    pub timeout: Option<Duration>,
    /// Bypass the prefetch cache even when a fresh entry matches.
    pub fresh: bool,

    /// Receives the cancellation handle once the visit starts.
    pub on_cancel_token: Option<CancelTokenHook>,
    /// Veto hook; returning `false` aborts before any network activity.
    pub on_before: Option<BeforeHook>,
    /// Fired when the exchange starts.
    pub on_start: Option<VisitHook>,
    /// Fired per progress sample.
    pub on_progress: Option<ProgressHook>,
    /// Fired with the committed page.
    pub on_success: Option<SuccessHook>,
    /// Fired on transport failure or validation errors.
    pub on_error: Option<ErrorHook>,
    /// Fired when the visit is cancelled or interrupted.
    pub on_cancel: Option<VisitHook>,
    /// Always fired once the visit reaches a terminal state after `start`.
    pub on_finish: Option<VisitHook>,
}

impl VisitOptions {
    /// Default options: GET, no payload, push history, reset scroll, remount.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set a JSON payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = VisitData::Json(data);
        self
    }

    /// Set a form payload.
    #[must_use]
    pub fn with_form(mut self, fields: Vec<FormField>) -> Self {
        self.data = VisitData::Form(fields);
        self
    }

    /// Replace the current history entry instead of pushing.
    #[must_use]
    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    /// Set the scroll preservation policy.
    #[must_use]
    pub fn with_preserve_scroll(mut self, preserve: impl Into<ScrollPreserve>) -> Self {
        self.preserve_scroll = preserve.into();
        self
    }

    /// Set the component state preservation policy.
    #[must_use]
    pub fn with_preserve_state(mut self, preserve: impl Into<StatePreserve>) -> Self {
        self.preserve_state = preserve.into();
        self
    }

    /// Request only these prop keys (partial reload).
    #[must_use]
    pub fn with_only<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Leave these prop keys out of the response.
    #[must_use]
    pub fn with_except<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Force these prop keys to be replaced rather than merged.
    #[must_use]
    pub fn with_reset<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reset = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Add a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Scope validation errors under this bag name.
    #[must_use]
    pub fn with_error_bag(mut self, bag: impl Into<String>) -> Self {
        self.error_bag = Some(bag.into());
        self
    }

    /// Apply an optimistic prop transform before the network responds.
    #[must_use]
    pub fn with_optimistic(
        mut self,
        transform: impl Fn(&Props) -> Props + Send + Sync + 'static,
    ) -> Self {
        self.optimistic = Some(Arc::new(transform));
        self
    }

    /// Race the transport against this timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bypass the prefetch cache for this visit.
    #[must_use]
    pub fn with_fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    /// Receive the cancellation handle once the visit starts.
    #[must_use]
    pub fn on_cancel_token(mut self, f: impl Fn(CancelToken) + Send + Sync + 'static) -> Self {
        self.on_cancel_token = Some(Arc::new(f));
        self
    }

    /// Veto hook fired before any network activity.
    #[must_use]
    pub fn on_before(mut self, f: impl Fn(&VisitInfo) -> bool + Send + Sync + 'static) -> Self {
        self.on_before = Some(Arc::new(f));
        self
    }

    /// Hook fired when the exchange starts.
    #[must_use]
    pub fn on_start(mut self, f: impl Fn(&VisitInfo) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(f));
        self
    }

    /// Hook fired per progress sample.
    #[must_use]
    pub fn on_progress(mut self, f: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    /// Hook fired with the committed page.
    #[must_use]
    pub fn on_success(mut self, f: impl Fn(&Page) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Hook fired on transport failure or validation errors.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&VisitFailure) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Hook fired when the visit is cancelled or interrupted.
    #[must_use]
    pub fn on_cancel(mut self, f: impl Fn(&VisitInfo) + Send + Sync + 'static) -> Self {
        self.on_cancel = Some(Arc::new(f));
        self
    }

    /// Hook always fired once the visit reaches a terminal state.
    #[must_use]
    pub fn on_finish(mut self, f: impl Fn(&VisitInfo) + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Arc::new(f));
        self
    }

    /// Whether this visit requests a prop subset (`only` or `except`).
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.only.is_empty() || !self.except.is_empty()
    }
}

impl std::fmt::Debug for VisitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisitOptions")
            .field("method", &self.method)
            .field("data", &self.data)
            .field("replace", &self.replace)
            .field("preserve_scroll", &self.preserve_scroll)
            .field("preserve_state", &self.preserve_state)
            .field("only", &self.only)
            .field("except", &self.except)
            .field("reset", &self.reset)
            .field("headers", &self.headers)
            .field("error_bag", &self.error_bag)
            .field("has_optimistic", &self.optimistic.is_some())
            .field("timeout", &self.timeout)
            .field("fresh", &self.fresh)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_as_str() {
        assert_eq!(Method::Get.as_str(), "GET");
        assert_eq!(Method::Patch.as_str(), "PATCH");
    }

    #[test]
    fn test_method_carries_query_data() {
        assert!(Method::Get.carries_query_data());
        assert!(Method::Delete.carries_query_data());
        assert!(!Method::Post.carries_query_data());
    }

    #[test]
    fn test_visit_data_contains_files() {
        let form = VisitData::Form(vec![
            FormField::text("name", "Ada"),
            FormField::file("avatar", "a.png", "image/png", &b"\x89PNG"[..]),
        ]);
        assert!(form.contains_files());

        let plain = VisitData::Form(vec![FormField::text("name", "Ada")]);
        assert!(!plain.contains_files());

        assert!(!VisitData::Json(json!({"a": 1})).contains_files());
    }

    #[test]
    fn test_options_builder() {
        let options = VisitOptions::new()
            .with_method(Method::Post)
            .with_data(json!({"name": "Ada"}))
            .with_only(["users"])
            .with_error_bag("signup")
            .with_replace(true);
        assert_eq!(options.method, Method::Post);
        assert!(options.replace);
        assert!(options.is_partial());
        assert_eq!(options.error_bag.as_deref(), Some("signup"));
    }

    #[test]
    fn test_state_preserve_resolve() {
        let page = Page::new("Home", "/").with_prop("errors", json!({"name": "bad"}));
        assert!(!StatePreserve::Never.resolve(&page));
        assert!(StatePreserve::Always.resolve(&page));
        assert!(StatePreserve::WhenErrors.resolve(&page));

        let clean = Page::new("Home", "/");
        assert!(!StatePreserve::WhenErrors.resolve(&clean));

        let pred = StatePreserve::Predicate(Arc::new(|p: &Page| p.component == "Home"));
        assert!(pred.resolve(&clean));
    }

    #[test]
    fn test_scroll_preserve_from_bool() {
        let page = Page::new("Home", "/");
        assert!(ScrollPreserve::from(true).resolve(&page));
        assert!(!ScrollPreserve::from(false).resolve(&page));
    }

    #[test]
    fn test_options_debug_skips_callbacks() {
        let options = VisitOptions::new().on_start(|_| {});
        let debug = format!("{:?}", options);
        assert!(debug.contains("VisitOptions"));
        assert!(!debug.contains("on_start"));
    }
}
