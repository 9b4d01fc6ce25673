//! Test fixtures: mock transport, renderer, and location driver.

#![allow(dead_code)]

use async_trait::async_trait;
use glide_rs::client::{
    AdapterRequest, AdapterResponse, HttpAdapter, LocationDriver, RenderAdapter, SendContext,
};
use glide_rs::error::{GlideError, Result};
use glide_rs::protocol::headers;
use glide_rs::scroll::MemoryScrollDriver;
use glide_rs::{Event, EventKind, Page, Router, RouterConfig};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Base origin every test app runs under.
pub const BASE: &str = "https://app.test";

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// One canned reply of the mock transport.
#[derive(Clone)]
pub enum MockReply {
    /// A well-formed protocol page payload.
    Page(Page),
    /// A raw response (arbitrary status/headers/body).
    Raw {
        status: u16,
        headers: BTreeMap<String, String>,
        body: Vec<u8>,
    },
    /// A transport failure.
    Fail(String),
}

#[derive(Clone)]
struct MockRoute {
    reply: MockReply,
    delay: Option<Duration>,
}

/// Programmable in-memory transport.
#[derive(Default)]
pub struct MockHttp {
    routes: Mutex<HashMap<String, MockRoute>>,
    requests: Mutex<Vec<AdapterRequest>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(method: &str, url: &str) -> String {
        format!("{method} {url}")
    }

    /// Register a reply for `method` + `url` (path or absolute).
    pub fn route(&self, method: &str, url: &str, reply: MockReply) {
        self.route_with_delay(method, url, reply, None);
    }

    /// Register a reply that resolves only after `delay`.
    pub fn route_with_delay(
        &self,
        method: &str,
        url: &str,
        reply: MockReply,
        delay: Option<Duration>,
    ) {
        let url = if url.starts_with("http") {
            url.to_string()
        } else {
            format!("{BASE}{url}")
        };
        self.routes
            .lock()
            .unwrap()
            .insert(Self::key(method, &url), MockRoute { reply, delay });
    }

    /// Every request the transport has seen.
    pub fn requests(&self) -> Vec<AdapterRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests sent to `method` + `url`.
    pub fn hits(&self, method: &str, url: &str) -> usize {
        let url = if url.starts_with("http") {
            url.to_string()
        } else {
            format!("{BASE}{url}")
        };
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method.as_str() == method && r.url == url)
            .count()
    }
}

#[async_trait]
impl HttpAdapter for MockHttp {
    async fn send(&self, request: AdapterRequest, ctx: &SendContext) -> Result<AdapterResponse> {
        let key = Self::key(request.method.as_str(), &request.url);
        self.requests.lock().unwrap().push(request.clone());

        let route = self.routes.lock().unwrap().get(&key).cloned();
        let Some(route) = route else {
            return Err(GlideError::Http(format!("404 no mock route for {key}")));
        };

        if let Some(delay) = route.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.cancel.cancelled() => return Err(GlideError::Aborted),
            }
        }
        if ctx.cancel.is_cancelled() {
            return Err(GlideError::Aborted);
        }

        match route.reply {
            MockReply::Page(page) => Ok(page_response(&page)),
            MockReply::Raw {
                status,
                headers,
                body,
            } => Ok(AdapterResponse {
                status,
                headers,
                body: body.into(),
                final_url: Some(request.url.clone()),
            }),
            MockReply::Fail(message) => Err(GlideError::Http(message)),
        }
    }
}

/// Serialize a page the way a protocol server would.
pub fn page_response(page: &Page) -> AdapterResponse {
    let mut response_headers = BTreeMap::new();
    response_headers.insert(headers::MARKER.to_string(), "true".to_string());
    if let Some(version) = &page.version {
        response_headers.insert(headers::VERSION.to_string(), version.clone());
    }
    AdapterResponse {
        status: 200,
        headers: response_headers,
        body: serde_json::to_vec(page).unwrap().into(),
        final_url: None,
    }
}

/// One recorded render commit.
#[derive(Clone, Debug, PartialEq)]
pub struct Swap {
    pub component: String,
    pub url: String,
    pub preserve_state: bool,
}

/// Recording view layer.
#[derive(Default)]
pub struct MockRenderer {
    swaps: Mutex<Vec<Swap>>,
    fail: Mutex<bool>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn swaps(&self) -> Vec<Swap> {
        self.swaps.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Swap> {
        self.swaps.lock().unwrap().last().cloned()
    }

    pub fn fail_next(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

#[async_trait]
impl RenderAdapter for MockRenderer {
    async fn swap(&self, page: &Page, preserve_state: bool) -> Result<()> {
        if std::mem::take(&mut *self.fail.lock().unwrap()) {
            return Err(GlideError::Config("renderer told to fail".to_string()));
        }
        self.swaps.lock().unwrap().push(Swap {
            component: page.component.clone(),
            url: page.url.clone(),
            preserve_state,
        });
        Ok(())
    }
}

/// Recording full-page navigation driver.
#[derive(Default)]
pub struct MockLocation {
    targets: Mutex<Vec<String>>,
}

impl MockLocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

impl LocationDriver for MockLocation {
    fn hard_navigate(&self, url: &str) {
        self.targets.lock().unwrap().push(url.to_string());
    }
}

/// Captures every bus emission as its kind name, in order.
#[derive(Clone, Default)]
pub struct EventLog {
    kinds: Arc<Mutex<Vec<EventKind>>>,
}

impl EventLog {
    pub fn attach(router: &Router) -> Self {
        let log = EventLog::default();
        for kind in [
            EventKind::Before,
            EventKind::Start,
            EventKind::Progress,
            EventKind::Finish,
            EventKind::Success,
            EventKind::Error,
            EventKind::Cancel,
            EventKind::Navigate,
            EventKind::Prefetching,
            EventKind::Prefetched,
            EventKind::Flash,
        ] {
            let kinds = log.kinds.clone();
            router.on(kind, move |event: &Event| {
                kinds.lock().unwrap().push(event.kind());
                true
            });
        }
        log
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.kinds.lock().unwrap().clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds.lock().unwrap().iter().filter(|k| **k == kind).count()
    }
}

/// A fully wired router over mock collaborators.
pub struct TestApp {
    pub router: Router,
    pub http: Arc<MockHttp>,
    pub renderer: Arc<MockRenderer>,
    pub location: Arc<MockLocation>,
    pub scroll_driver: Arc<MemoryScrollDriver>,
}

/// Build a test app and seed it with a `Home` page at `/`.
pub async fn test_app() -> TestApp {
    init_test_tracing();
    let http = Arc::new(MockHttp::new());
    let renderer = Arc::new(MockRenderer::new());
    let location = Arc::new(MockLocation::new());
    let scroll_driver = Arc::new(MemoryScrollDriver::new());

    let router = Router::builder()
        .config(RouterConfig::with_base_url(Url::parse(BASE).unwrap()))
        .http_adapter(http.clone())
        .render_adapter(renderer.clone())
        .location_driver(location.clone())
        .scroll_driver(scroll_driver.clone())
        .build()
        .expect("router builds");

    router
        .init(Page::new("Home", "/").with_version("1"))
        .await
        .expect("initial page commits");

    TestApp {
        router,
        http,
        renderer,
        location,
        scroll_driver,
    }
}
