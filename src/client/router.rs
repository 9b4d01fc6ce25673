//! Visit orchestration.
//!
//! The [`Router`] turns a navigation intent into exactly one in-flight
//! network exchange, reconciles the response into the current page state,
//! and keeps the history store, scroll manager, and prefetch cache
//! consistent with that state.
//!
//! At most one visit is *active* (eligible to mutate the on-screen page)
//! at any time. Starting a new active visit marks the previous one
//! interrupted; its eventual resolution is still observed for event
//! symmetry, but its result is discarded before any state mutation.
//! Prefetch and poll-driven visits are not active by this rule: they run
//! concurrently, keyed by their cache signature, and their results apply
//! only when no active visit is in flight.
//!
//! `visit` resolves when the visit reaches a terminal state and never
//! returns an error: navigation failure must not crash caller code, so
//! failures are reported through callbacks and events instead.

use crate::cache::{CacheKey, PrefetchCache};
use crate::client::adapter::{
    AdapterRequest, HttpAdapter, LocationDriver, NoopLocationDriver, ProgressSink, RenderAdapter,
    RequestBody, SendContext,
};
use crate::client::cancel::CancelToken;
use crate::client::config::RouterConfig;
use crate::error::{GlideError, Result};
use crate::events::{Event, EventBus, EventKind, ListenerId};
use crate::history::{HistoryCipher, HistoryStore};
use crate::protocol::{self, Disposition};
use crate::scroll::{MemoryScrollDriver, ScrollDriver, ScrollManager};
use crate::types::{
    Method, Page, Progress, VisitData, VisitFailure, VisitInfo, VisitOptions,
};
use futures::FutureExt;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Options for a speculative prefetch.
#[derive(Clone, Debug, Default)]
pub struct PrefetchOptions {
    /// Entry lifetime; the router's `default_cache_for` when unset.
    pub cache_for: Option<Duration>,
    /// Invalidation tags attached to the entry.
    pub tags: Vec<String>,
}

impl PrefetchOptions {
    /// Defaults: router-configured lifetime, no tags.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry lifetime.
    #[must_use]
    pub fn with_cache_for(mut self, cache_for: Duration) -> Self {
        self.cache_for = Some(cache_for);
        self
    }

    /// Set the entry lifetime from a duration string (`"30s"`, `"500ms"`,
    /// `"1m"`, or bare seconds).
    pub fn with_cache_for_str(mut self, cache_for: &str) -> Result<Self> {
        self.cache_for = Some(crate::cache::parse_cache_duration(cache_for)?);
        Ok(self)
    }

    /// Attach invalidation tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Default)]
pub(crate) struct VisitFlags {
    interrupted: AtomicBool,
    completed: AtomicBool,
}

impl VisitFlags {
    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn complete(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }
}

struct VisitCtx {
    id: Uuid,
    url: Url,
    options: VisitOptions,
    token: CancelToken,
    flags: Arc<VisitFlags>,
}

impl VisitCtx {
    fn info(&self) -> VisitInfo {
        VisitInfo {
            id: self.id,
            url: self.url.to_string(),
            method: self.options.method,
            completed: self.flags.is_completed(),
            cancelled: self.token.is_cancelled(),
            interrupted: self.flags.is_interrupted(),
        }
    }

    /// Whether this visit may no longer mutate any state.
    fn is_superseded(&self) -> bool {
        self.token.is_cancelled() || self.flags.is_interrupted()
    }
}

struct ActiveVisit {
    flags: Arc<VisitFlags>,
    token: CancelToken,
}

struct RouterState {
    current: Option<Page>,
    version: Option<String>,
    active: Option<ActiveVisit>,
}

struct RouterInner {
    config: RouterConfig,
    http: Arc<dyn HttpAdapter>,
    render: Arc<dyn RenderAdapter>,
    location: Arc<dyn LocationDriver>,
    bus: EventBus,
    cache: PrefetchCache,
    scroll: ScrollManager,
    history: Mutex<HistoryStore>,
    state: Mutex<RouterState>,
}

/// The visit orchestrator.
///
/// Explicitly constructed and lifetime-scoped: create one per browsing
/// context at bootstrap (and one per request in SSR), tear it down when
/// done. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

/// Builder for a [`Router`].
pub struct RouterBuilder {
    config: RouterConfig,
    http: Option<Arc<dyn HttpAdapter>>,
    render: Option<Arc<dyn RenderAdapter>>,
    location: Arc<dyn LocationDriver>,
    scroll_driver: Arc<dyn ScrollDriver>,
    cipher: Option<Arc<dyn HistoryCipher>>,
}

impl RouterBuilder {
    fn new() -> Self {
        RouterBuilder {
            config: RouterConfig::default(),
            http: None,
            render: None,
            location: Arc::new(NoopLocationDriver),
            scroll_driver: Arc::new(MemoryScrollDriver::new()),
            cipher: None,
        }
    }

    /// Set the router configuration.
    #[must_use]
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the HTTP transport.
    #[must_use]
    pub fn http_adapter(mut self, adapter: Arc<dyn HttpAdapter>) -> Self {
        self.http = Some(adapter);
        self
    }

    /// Set the view layer.
    #[must_use]
    pub fn render_adapter(mut self, adapter: Arc<dyn RenderAdapter>) -> Self {
        self.render = Some(adapter);
        self
    }

    /// Set the full-page navigation driver.
    #[must_use]
    pub fn location_driver(mut self, driver: Arc<dyn LocationDriver>) -> Self {
        self.location = driver;
        self
    }

    /// Set the scroll offset driver.
    #[must_use]
    pub fn scroll_driver(mut self, driver: Arc<dyn ScrollDriver>) -> Self {
        self.scroll_driver = driver;
        self
    }

    /// Set the history snapshot cipher.
    #[must_use]
    pub fn history_cipher(mut self, cipher: Arc<dyn HistoryCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Build the router.
    ///
    /// Fails when no render adapter was supplied, or when no HTTP adapter
    /// was supplied and the default transport feature is disabled.
    pub fn build(self) -> Result<Router> {
        let render = self
            .render
            .ok_or_else(|| GlideError::Config("a render adapter is required".to_string()))?;

        #[cfg(feature = "reqwest-client")]
        let http = self
            .http
            .unwrap_or_else(|| Arc::new(crate::client::ReqwestAdapter::new()));
        #[cfg(not(feature = "reqwest-client"))]
        let http = self
            .http
            .ok_or_else(|| GlideError::Config("an HTTP adapter is required".to_string()))?;

        let mut history = HistoryStore::new(self.config.history_capacity);
        if let Some(cipher) = self.cipher {
            history = history.with_cipher(cipher);
        }

        Ok(Router {
            inner: Arc::new(RouterInner {
                config: self.config,
                http,
                render,
                location: self.location,
                bus: EventBus::new(),
                cache: PrefetchCache::new(),
                scroll: ScrollManager::new(self.scroll_driver),
                history: Mutex::new(history),
                state: Mutex::new(RouterState {
                    current: None,
                    version: None,
                    active: None,
                }),
            }),
        })
    }
}

impl Router {
    /// Start building a router.
    #[must_use]
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Seed the router with the server-rendered initial page.
    ///
    /// Overwrites the current history position (like a replace visit) and
    /// commits the page through the render adapter.
    pub async fn init(&self, page: Page) -> Result<()> {
        self.inner.render.swap(&page, false).await?;
        {
            let mut state = self.lock_state();
            state.version.clone_from(&page.version);
            state.current = Some(page.clone());
        }
        self.lock_history().replace(page.clone());
        self.inner.bus.emit(&Event::Navigate { page });
        Ok(())
    }

    /// The page currently on screen.
    #[must_use]
    pub fn page(&self) -> Option<Page> {
        self.lock_state().current.clone()
    }

    /// The asset version last advertised by the server.
    #[must_use]
    pub fn version(&self) -> Option<String> {
        self.lock_state().version.clone()
    }

    /// Version id of the current history position.
    ///
    /// The embedder mirrors this into the native history state on every
    /// commit and hands it back through [`Router::handle_popstate`] on
    /// traversal.
    #[must_use]
    pub fn history_version(&self) -> Option<u64> {
        self.lock_history().current_version()
    }

    /// The event register.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Register a lifecycle event listener. See [`EventBus::on`].
    pub fn on(
        &self,
        kind: EventKind,
        handler: impl Fn(&Event) -> bool + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.bus.on(kind, handler)
    }

    /// Remove a lifecycle event listener.
    pub fn off(&self, listener: ListenerId) {
        self.inner.bus.off(listener)
    }

    /// The scroll region registry.
    #[must_use]
    pub fn scroll(&self) -> &ScrollManager {
        &self.inner.scroll
    }

    /// Remember component-local state on the current history entry.
    pub fn remember(&self, key: impl Into<String>, value: Value) {
        self.lock_history().remember(key, value);
    }

    /// Restore component-local state from the current history entry.
    #[must_use]
    pub fn restore(&self, key: &str) -> Option<Value> {
        self.lock_history().restore(key)
    }

    /// Cancel the active visit, if any. Idempotent.
    pub fn cancel(&self) {
        let token = self
            .lock_state()
            .active
            .as_ref()
            .map(|active| active.token.clone());
        if let Some(token) = token {
            token.cancel();
        }
    }

    /// Make a visit. Resolves at a terminal state; never returns an error.
    pub async fn visit(&self, url: &str, options: VisitOptions) {
        let method = options.method;
        let on_error = options.on_error.clone();
        match self.prepare(url, options) {
            Ok(ctx) => self.run_visit(ctx).await,
            Err(err) => {
                tracing::warn!(url, error = %err, "visit setup failed");
                let failure = VisitFailure::Transport(Arc::new(err));
                if let Some(hook) = &on_error {
                    hook(&failure);
                }
                self.inner.bus.emit(&Event::Error {
                    visit: VisitInfo {
                        id: Uuid::new_v4(),
                        url: url.to_string(),
                        method,
                        completed: true,
                        cancelled: false,
                        interrupted: false,
                    },
                    failure,
                });
            }
        }
    }

    /// GET visit.
    pub async fn get(&self, url: &str, options: VisitOptions) {
        self.visit(url, options.with_method(Method::Get)).await
    }

    /// POST visit.
    pub async fn post(&self, url: &str, options: VisitOptions) {
        self.visit(url, options.with_method(Method::Post)).await
    }

    /// PUT visit.
    pub async fn put(&self, url: &str, options: VisitOptions) {
        self.visit(url, options.with_method(Method::Put)).await
    }

    /// PATCH visit.
    pub async fn patch(&self, url: &str, options: VisitOptions) {
        self.visit(url, options.with_method(Method::Patch)).await
    }

    /// DELETE visit.
    pub async fn delete(&self, url: &str, options: VisitOptions) {
        self.visit(url, options.with_method(Method::Delete)).await
    }

    /// Replace-visit: like [`Router::visit`] with history replacement.
    pub async fn replace(&self, url: &str, options: VisitOptions) {
        self.visit(url, options.with_replace(true)).await
    }

    /// Re-visit the current URL, preserving state and scroll.
    ///
    /// Bypasses the prefetch cache and replaces the history entry. Pass
    /// `only`/`except` in `options` for a partial reload.
    pub async fn reload(&self, options: VisitOptions) {
        let Some(current) = self.page() else {
            tracing::warn!("reload requested before any page was loaded");
            return;
        };
        let options = options
            .with_method(Method::Get)
            .with_replace(true)
            .with_fresh(true)
            .with_preserve_scroll(true)
            .with_preserve_state(true);
        self.visit(&current.url, options).await
    }

    /// Handle a back/forward traversal reported by the embedder.
    ///
    /// `version` is the id mirrored into the native history state at
    /// push/replace time; `None` (or an evicted entry) degrades to a
    /// network re-fetch of `url` instead of failing.
    pub async fn handle_popstate(&self, version: Option<u64>, url: &str) {
        let entry = version.and_then(|v| self.lock_history().get(v));
        match entry {
            Some(entry) => {
                if let Err(err) = self.inner.render.swap(&entry.page, false).await {
                    tracing::warn!(error = %err, "render adapter failed during history restore");
                    return;
                }
                {
                    let mut history = self.lock_history();
                    history.set_current(entry.version);
                }
                {
                    let mut state = self.lock_state();
                    if entry.page.version.is_some() {
                        state.version.clone_from(&entry.page.version);
                    }
                    state.current = Some(entry.page.clone());
                }
                // Offsets come back only after the page settles.
                self.inner.scroll.restore(&entry.scroll_positions);
                self.inner.bus.emit(&Event::Navigate {
                    page: entry.page.clone(),
                });
            }
            None => {
                tracing::debug!(url, "history entry missing; re-fetching from network");
                self.visit(url, VisitOptions::new().with_replace(true)).await;
            }
        }
    }

    // ---- prefetch surface ----

    /// Issue a speculative visit and cache the result for later promotion.
    ///
    /// Concurrent prefetches for the same signature attach to the same
    /// in-flight request. Resolves once the page is cached (or the fetch
    /// failed, which leaves no entry behind).
    pub async fn prefetch(&self, url: &str, options: VisitOptions, prefetch: PrefetchOptions) {
        let resolved = match self.resolve_with_query(url, &options) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::warn!(url, error = %err, "prefetch setup failed");
                return;
            }
        };
        let key = CacheKey::new(Method::Get, resolved.as_str(), None);
        if self.inner.cache.get(&key).is_some() {
            return;
        }

        if !self.inner.cache.is_prefetching(&key) {
            self.inner.bus.emit(&Event::Prefetching {
                url: resolved.to_string(),
            });
        }

        let cache_for = prefetch
            .cache_for
            .unwrap_or(self.inner.config.default_cache_for);
        let tags: HashSet<String> = prefetch.tags.iter().cloned().collect();
        let request = self.assemble_request(&resolved, &options, Method::Get);
        let http = self.inner.http.clone();
        let fetch_url = resolved.to_string();

        let future = self.inner.cache.fetch_or_join(
            &key,
            resolved.as_str(),
            cache_for,
            tags,
            move || {
                async move {
                    let ctx = SendContext::new(CancelToken::new());
                    match http.send(request, &ctx).await {
                        Ok(response) => match protocol::classify_response(
                            response.status,
                            &response.headers,
                            &response.body,
                            &fetch_url,
                        ) {
                            Ok(Disposition::Page(page)) => Some(page),
                            Ok(other) => {
                                tracing::debug!(url = %fetch_url, ?other, "prefetch yielded a non-page response");
                                None
                            }
                            Err(err) => {
                                tracing::debug!(url = %fetch_url, error = %err, "prefetch response invalid");
                                None
                            }
                        },
                        Err(err) => {
                            tracing::debug!(url = %fetch_url, error = %err, "prefetch failed");
                            None
                        }
                    }
                }
                .boxed()
            },
        );

        if let Some(page) = future.await {
            self.inner.bus.emit(&Event::Prefetched {
                url: resolved.to_string(),
                page,
            });
        }
    }

    /// The cached page for `url` + `options`, if fresh.
    #[must_use]
    pub fn get_cached(&self, url: &str, options: &VisitOptions) -> Option<Page> {
        let key = self.signature(url, options).ok()?;
        self.inner.cache.get(&key).map(|entry| entry.page)
    }

    /// Whether a prefetch for `url` + `options` is in flight.
    #[must_use]
    pub fn get_prefetching(&self, url: &str, options: &VisitOptions) -> bool {
        self.signature(url, options)
            .map(|key| self.inner.cache.is_prefetching(&key))
            .unwrap_or(false)
    }

    /// Remove the cache entry (or in-flight fetch) for `url` + `options`.
    pub fn flush(&self, url: &str, options: &VisitOptions) {
        if let Ok(key) = self.signature(url, options) {
            self.inner.cache.flush(&key);
        }
    }

    /// Remove every cache entry whose tag set intersects `tags`.
    pub fn flush_by_tags<S: AsRef<str>>(&self, tags: &[S]) {
        self.inner.cache.flush_by_tags(tags);
    }

    /// Clear the prefetch cache entirely.
    pub fn flush_all(&self) {
        self.inner.cache.flush_all();
    }

    // ---- internals ----

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RouterState> {
        self.inner.state.lock().expect("router state poisoned")
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, HistoryStore> {
        self.inner.history.lock().expect("history store poisoned")
    }

    fn resolve_with_query(&self, url: &str, options: &VisitOptions) -> Result<Url> {
        let mut resolved = protocol::resolve_url(self.inner.config.base_url.as_ref(), url)?;
        if options.method.carries_query_data() {
            if let VisitData::Json(data) = &options.data {
                protocol::append_query(&mut resolved, data)?;
            }
        }
        Ok(resolved)
    }

    fn signature(&self, url: &str, options: &VisitOptions) -> Result<CacheKey> {
        let resolved = self.resolve_with_query(url, options)?;
        Ok(CacheKey::new(Method::Get, resolved.as_str(), None))
    }

    fn prepare(&self, url: &str, options: VisitOptions) -> Result<VisitCtx> {
        let resolved = self.resolve_with_query(url, &options)?;
        Ok(VisitCtx {
            id: Uuid::new_v4(),
            url: resolved,
            options,
            token: CancelToken::new(),
            flags: Arc::new(VisitFlags::default()),
        })
    }

    fn assemble_request(&self, url: &Url, options: &VisitOptions, method: Method) -> AdapterRequest {
        let mut headers = BTreeMap::new();
        headers.insert("accept".to_string(), "application/json".to_string());
        for (name, value) in &options.headers {
            headers.insert(name.to_ascii_lowercase(), value.clone());
        }
        headers.insert(protocol::headers::MARKER.to_string(), "true".to_string());
        if let Some(version) = self.version() {
            headers.insert(protocol::headers::VERSION.to_string(), version);
        }
        if options.is_partial() {
            let component = self
                .page()
                .map(|page| page.component)
                .unwrap_or_default();
            headers.insert(
                protocol::headers::PARTIAL_COMPONENT.to_string(),
                component,
            );
            // `only` is an exclusive allow-list: it wins when both are set.
            if !options.only.is_empty() {
                headers.insert(
                    protocol::headers::PARTIAL_ONLY.to_string(),
                    protocol::format_key_list(&options.only),
                );
            } else {
                headers.insert(
                    protocol::headers::PARTIAL_EXCEPT.to_string(),
                    protocol::format_key_list(&options.except),
                );
            }
        }
        if !options.reset.is_empty() {
            headers.insert(
                protocol::headers::RESET.to_string(),
                protocol::format_key_list(&options.reset),
            );
        }
        if let Some(bag) = &options.error_bag {
            headers.insert(protocol::headers::ERROR_BAG.to_string(), bag.clone());
        }

        let body = if method.carries_query_data() {
            match &options.data {
                // Files force multipart even on query methods.
                VisitData::Form(fields) => RequestBody::Multipart(fields.clone()),
                _ => RequestBody::Empty,
            }
        } else {
            match &options.data {
                VisitData::None => RequestBody::Empty,
                VisitData::Json(value) => RequestBody::Json(value.clone()),
                VisitData::Form(fields) => RequestBody::Multipart(fields.clone()),
            }
        };

        AdapterRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        }
    }

    fn activate(&self, ctx: &VisitCtx) {
        let mut state = self.lock_state();
        if let Some(previous) = &state.active {
            previous.flags.interrupt();
        }
        state.active = Some(ActiveVisit {
            flags: ctx.flags.clone(),
            token: ctx.token.clone(),
        });
    }

    fn deactivate(&self, ctx: &VisitCtx) {
        let mut state = self.lock_state();
        let ours = state
            .active
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(&active.flags, &ctx.flags));
        if ours {
            state.active = None;
        }
    }

    fn fire_before(&self, ctx: &VisitCtx) -> bool {
        if let Some(hook) = &ctx.options.on_before {
            if !hook(&ctx.info()) {
                return false;
            }
        }
        self.inner.bus.emit(&Event::Before { visit: ctx.info() })
    }

    fn fire_start(&self, ctx: &VisitCtx) {
        if let Some(hook) = &ctx.options.on_start {
            hook(&ctx.info());
        }
        self.inner.bus.emit(&Event::Start { visit: ctx.info() });
    }

    fn fire_cancel(&self, ctx: &VisitCtx) {
        if let Some(hook) = &ctx.options.on_cancel {
            hook(&ctx.info());
        }
        self.inner.bus.emit(&Event::Cancel { visit: ctx.info() });
    }

    fn fire_finish(&self, ctx: &VisitCtx) {
        if let Some(hook) = &ctx.options.on_finish {
            hook(&ctx.info());
        }
        self.inner.bus.emit(&Event::Finish { visit: ctx.info() });
    }

    fn fire_error(&self, ctx: &VisitCtx, failure: VisitFailure) {
        if let Some(hook) = &ctx.options.on_error {
            hook(&failure);
        }
        self.inner.bus.emit(&Event::Error {
            visit: ctx.info(),
            failure,
        });
    }

    fn progress_sink(&self, ctx: &VisitCtx) -> ProgressSink {
        let bus = self.inner.bus.clone();
        let info = ctx.info();
        let hook = ctx.options.on_progress.clone();
        Arc::new(move |progress: Progress| {
            if let Some(hook) = &hook {
                hook(&progress);
            }
            bus.emit(&Event::Progress {
                visit: info.clone(),
                progress,
            });
        })
    }

    async fn run_visit(&self, mut ctx: VisitCtx) {
        if let Some(hook) = &ctx.options.on_cancel_token {
            hook(ctx.token.clone());
        }

        // Veto point: abort before any network activity.
        if !self.fire_before(&ctx) {
            ctx.token.cancel();
            ctx.flags.complete();
            self.fire_cancel(&ctx);
            return;
        }

        // Promote a fresh prefetch entry instead of hitting the network.
        if ctx.options.method.is_cacheable() && !ctx.options.fresh && !ctx.options.is_partial() {
            let key = CacheKey::new(Method::Get, ctx.url.as_str(), None);
            if let Some(entry) = self.inner.cache.get(&key) {
                tracing::debug!(url = %ctx.url, "promoting prefetched page");
                self.activate(&ctx);
                self.fire_start(&ctx);
                self.commit(&ctx, entry.page, None).await;
                return;
            }
        }

        self.activate(&ctx);
        self.fire_start(&ctx);

        let rollback = self.apply_optimistic(&ctx).await;

        let send_ctx = SendContext {
            cancel: ctx.token.clone(),
            progress: Some(self.progress_sink(&ctx)),
            timeout: ctx.options.timeout,
        };

        let mut attempt = 0u8;
        loop {
            let request = self.assemble_request(&ctx.url, &ctx.options, ctx.options.method);
            let result = match ctx.options.timeout {
                Some(timeout) => {
                    tokio::select! {
                        result = self.inner.http.send(request, &send_ctx) => result,
                        _ = tokio::time::sleep(timeout) => {
                            // Abort the transport, then report as a
                            // transport failure rather than a cancel.
                            ctx.token.cancel();
                            Err(GlideError::Timeout)
                        }
                    }
                }
                None => self.inner.http.send(request, &send_ctx).await,
            };

            match result {
                Err(err) if err.is_abort() => {
                    self.rollback_optimistic(&ctx, rollback).await;
                    self.finish_cancelled(&ctx);
                    return;
                }
                Err(err) => {
                    self.rollback_optimistic(&ctx, rollback).await;
                    self.finish_failed(&ctx, err);
                    return;
                }
                Ok(response) => {
                    if ctx.is_superseded() {
                        self.rollback_optimistic(&ctx, rollback).await;
                        self.finish_cancelled(&ctx);
                        return;
                    }
                    let disposition = protocol::classify_response(
                        response.status,
                        &response.headers,
                        &response.body,
                        response.final_url.as_deref().unwrap_or(ctx.url.as_str()),
                    );
                    match disposition {
                        Ok(Disposition::Page(page)) => {
                            if attempt == 0
                                && ctx.options.is_partial()
                                && self.version_mismatch(&page)
                            {
                                // Stale assets invalidate a partial merge;
                                // refetch the whole page instead.
                                tracing::debug!(
                                    url = %ctx.url,
                                    "asset version changed during partial reload; refetching full page"
                                );
                                ctx.options.only.clear();
                                ctx.options.except.clear();
                                attempt += 1;
                                continue;
                            }
                            self.commit(&ctx, page, rollback).await;
                            return;
                        }
                        Ok(Disposition::ExternalRedirect(location)) => {
                            self.rollback_optimistic(&ctx, rollback).await;
                            tracing::debug!(location = %location, "server forced a hard redirect");
                            ctx.flags.complete();
                            self.deactivate(&ctx);
                            self.inner.location.hard_navigate(&location);
                            self.fire_finish(&ctx);
                            return;
                        }
                        Ok(Disposition::Foreign(target)) => {
                            self.rollback_optimistic(&ctx, rollback).await;
                            let err = GlideError::ForeignResponse {
                                url: target.clone(),
                            };
                            tracing::warn!(target = %target, "foreign response; leaving the page");
                            ctx.flags.complete();
                            self.deactivate(&ctx);
                            self.fire_error(&ctx, VisitFailure::Transport(Arc::new(err)));
                            self.inner.location.hard_navigate(&target);
                            self.fire_finish(&ctx);
                            return;
                        }
                        Err(err) => {
                            self.rollback_optimistic(&ctx, rollback).await;
                            self.finish_failed(&ctx, err);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn version_mismatch(&self, page: &Page) -> bool {
        match (self.version(), &page.version) {
            (Some(current), Some(received)) => current != *received,
            _ => false,
        }
    }

    /// Apply the optimistic transform, returning the pre-visit page for
    /// rollback.
    async fn apply_optimistic(&self, ctx: &VisitCtx) -> Option<Page> {
        let transform = ctx.options.optimistic.as_ref()?;
        let (snapshot, optimistic) = {
            let state = self.lock_state();
            let current = state.current.clone()?;
            let mut optimistic = current.clone();
            optimistic.props = transform(&current.props);
            (current, optimistic)
        };
        if let Err(err) = self.inner.render.swap(&optimistic, true).await {
            tracing::warn!(error = %err, "render adapter rejected optimistic page");
            return None;
        }
        self.lock_state().current = Some(optimistic);
        Some(snapshot)
    }

    /// Undo an optimistic apply if this visit still owns the screen.
    async fn rollback_optimistic(&self, ctx: &VisitCtx, snapshot: Option<Page>) {
        let Some(snapshot) = snapshot else { return };
        if ctx.flags.is_interrupted() {
            // A newer visit owns the screen now; leave it alone.
            return;
        }
        if let Err(err) = self.inner.render.swap(&snapshot, true).await {
            tracing::warn!(error = %err, "render adapter rejected optimistic rollback");
        }
        self.lock_state().current = Some(snapshot);
    }

    fn finish_cancelled(&self, ctx: &VisitCtx) {
        ctx.flags.complete();
        self.deactivate(ctx);
        self.fire_cancel(ctx);
        self.fire_finish(ctx);
    }

    fn finish_failed(&self, ctx: &VisitCtx, err: GlideError) {
        tracing::warn!(url = %ctx.url, error = %err, "visit failed");
        ctx.flags.complete();
        self.deactivate(ctx);
        self.fire_error(ctx, VisitFailure::Transport(Arc::new(err)));
        self.fire_finish(ctx);
    }

    /// Reconcile a validated page into the current state.
    ///
    /// Everything here happens only after the response fully validated;
    /// a superseded visit bails before the first mutation.
    async fn commit(&self, ctx: &VisitCtx, incoming: Page, rollback: Option<Page>) {
        if ctx.is_superseded() {
            self.rollback_optimistic(ctx, rollback).await;
            self.finish_cancelled(ctx);
            return;
        }

        // Partial responses merge into the pre-visit props (not the
        // optimistic ones); keys never disappear unless reset names them.
        let previous = rollback.clone().or_else(|| self.page());
        let mut page = if ctx.options.is_partial() {
            match &previous {
                Some(previous) => merge_partial(previous, incoming, &ctx.options.reset),
                None => incoming,
            }
        } else {
            incoming
        };

        // Error reconciliation: scope errors by bag before anyone reads them.
        let errors = page.resolved_errors(ctx.options.error_bag.as_deref());
        if ctx.options.error_bag.is_some() && !errors.is_empty() {
            page.props
                .insert("errors".to_string(), Value::Object(errors.clone()));
        }

        let preserve_state = ctx.options.preserve_state.resolve(&page);
        let preserve_scroll = ctx.options.preserve_scroll.resolve(&page);

        // The entry being left keeps the offsets it was showing.
        {
            let offsets = self.inner.scroll.capture();
            let mut history = self.lock_history();
            history.update_current(|entry| entry.scroll_positions = offsets);
        }

        if self.inner.config.swap_before_history {
            if let Err(err) = self.inner.render.swap(&page, preserve_state).await {
                self.rollback_optimistic(ctx, rollback).await;
                self.finish_failed(
                    ctx,
                    GlideError::Protocol(format!("render adapter failed: {err}")),
                );
                return;
            }
            self.store_page(ctx, &page);
        } else {
            self.store_page(ctx, &page);
            if let Err(err) = self.inner.render.swap(&page, preserve_state).await {
                tracing::warn!(error = %err, "render adapter failed after history update");
            }
        }

        // Reset before paint unless this visit preserves offsets.
        if !preserve_scroll {
            self.inner.scroll.reset_all();
        }

        ctx.flags.complete();
        self.deactivate(ctx);

        self.inner.bus.emit(&Event::Navigate { page: page.clone() });
        if let Some(flash) = page.flash() {
            self.inner.bus.emit(&Event::Flash {
                data: flash.clone(),
            });
        }

        if let Some(hook) = &ctx.options.on_success {
            hook(&page);
        }
        self.inner.bus.emit(&Event::Success { page: page.clone() });

        if !errors.is_empty() {
            self.fire_error(ctx, VisitFailure::Validation(errors));
        }

        self.fire_finish(ctx);
    }

    fn store_page(&self, ctx: &VisitCtx, page: &Page) {
        {
            let mut state = self.lock_state();
            if page.version.is_some() {
                state.version.clone_from(&page.version);
            }
            state.current = Some(page.clone());
        }
        let mut history = self.lock_history();
        if ctx.options.replace {
            history.replace(page.clone());
        } else {
            history.push(page.clone());
        }
    }

    /// One background reload tick (polling, visibility-triggered reloads).
    ///
    /// Not an active visit: runs concurrently with one and discards its
    /// result when an active visit is in flight or the page has moved on.
    pub(crate) async fn background_reload(&self, options: VisitOptions) {
        let Some(origin) = self.page() else { return };

        let resolved = match self.resolve_with_query(&origin.url, &options) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::warn!(error = %err, "background reload setup failed");
                return;
            }
        };
        let request = self.assemble_request(&resolved, &options, Method::Get);
        let send_ctx = SendContext::new(CancelToken::new());

        let response = match self.inner.http.send(request, &send_ctx).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "background reload failed");
                return;
            }
        };
        let page = match protocol::classify_response(
            response.status,
            &response.headers,
            &response.body,
            resolved.as_str(),
        ) {
            Ok(Disposition::Page(page)) => page,
            Ok(other) => {
                tracing::debug!(?other, "background reload yielded a non-page response");
                return;
            }
            Err(err) => {
                tracing::debug!(error = %err, "background reload response invalid");
                return;
            }
        };

        // Apply only while nothing else owns the screen.
        let current = {
            let state = self.lock_state();
            if state.active.is_some() {
                tracing::debug!("discarding background reload: a visit is in flight");
                return;
            }
            match &state.current {
                Some(current) if current.url == origin.url => current.clone(),
                _ => {
                    tracing::debug!("discarding background reload: page changed");
                    return;
                }
            }
        };

        let merged = if options.is_partial() {
            merge_partial(&current, page, &options.reset)
        } else {
            page
        };

        if let Err(err) = self.inner.render.swap(&merged, true).await {
            tracing::warn!(error = %err, "render adapter failed during background reload");
            return;
        }
        {
            let mut state = self.lock_state();
            if merged.version.is_some() {
                state.version.clone_from(&merged.version);
            }
            state.current = Some(merged.clone());
        }
        self.lock_history().replace(merged.clone());

        self.inner.bus.emit(&Event::Navigate {
            page: merged.clone(),
        });
        self.inner.bus.emit(&Event::Success { page: merged });
    }
}

/// Merge a partial response into the previous page's props.
///
/// Keys present in the response win; keys not requested are retained
/// unchanged. `reset` keys are always replaced with the fresh server
/// value, or removed when the response omits them.
fn merge_partial(previous: &Page, incoming: Page, reset: &[String]) -> Page {
    let mut props = previous.props.clone();
    for (key, value) in &incoming.props {
        props.insert(key.clone(), value.clone());
    }
    for key in reset {
        match incoming.props.get(key) {
            Some(value) => props.insert(key.clone(), value.clone()),
            None => props.remove(key),
        };
    }
    Page {
        component: incoming.component,
        props,
        url: incoming.url,
        version: incoming.version,
    }
}
