//! Integration tests for history traversal, remembered state, and scroll.

mod common;
use common::*;

use glide_rs::scroll::{ScrollDriver, ScrollPosition, DOCUMENT_REGION};
use glide_rs::{EventKind, Page, VisitOptions};
use serde_json::json;

#[tokio::test]
async fn test_history_round_trip_restores_exact_page() -> anyhow::Result<()> {
    let app = test_app().await;

    app.http.route(
        "GET",
        "/a",
        MockReply::Page(
            Page::new("A", "/a")
                .with_prop("items", json!([1, 2, 3]))
                .with_version("1"),
        ),
    );
    app.http.route(
        "GET",
        "/b",
        MockReply::Page(Page::new("B", "/b").with_version("1")),
    );

    app.router.visit("/a", VisitOptions::new()).await;
    let version_a = app.router.history_version().expect("a history position");
    app.router.visit("/b", VisitOptions::new()).await;
    assert_ne!(app.router.history_version(), Some(version_a));

    // Synthetic back navigation.
    app.router.handle_popstate(Some(version_a), "/a").await;

    let page = app.router.page().unwrap();
    assert_eq!(page.component, "A");
    assert_eq!(page.url, "/a");
    assert_eq!(page.props["items"], json!([1, 2, 3]));
    // Restored from the entry, not the network.
    assert_eq!(app.http.hits("GET", "/a"), 1);
    assert_eq!(app.router.history_version(), Some(version_a));
    Ok(())
}

#[tokio::test]
async fn test_popstate_miss_degrades_to_refetch() -> anyhow::Result<()> {
    let app = test_app().await;
    let log = EventLog::attach(&app.router);

    app.http.route(
        "GET",
        "/a",
        MockReply::Page(Page::new("A", "/a").with_version("1")),
    );

    // A version this session never issued (e.g. an external arrival).
    app.router.handle_popstate(Some(999), "/a").await;

    assert_eq!(app.http.hits("GET", "/a"), 1);
    assert_eq!(app.router.page().unwrap().component, "A");
    assert_eq!(log.count(EventKind::Success), 1);
    Ok(())
}

#[tokio::test]
async fn test_replace_keeps_history_position() -> anyhow::Result<()> {
    let app = test_app().await;

    app.http.route(
        "GET",
        "/a",
        MockReply::Page(Page::new("A", "/a").with_version("1")),
    );
    app.http.route(
        "GET",
        "/a2",
        MockReply::Page(Page::new("A2", "/a2").with_version("1")),
    );

    app.router.visit("/a", VisitOptions::new()).await;
    let version = app.router.history_version();

    app.router
        .visit("/a2", VisitOptions::new().with_replace(true))
        .await;
    assert_eq!(app.router.history_version(), version);
    assert_eq!(app.router.page().unwrap().component, "A2");
    Ok(())
}

#[tokio::test]
async fn test_remember_restore_is_per_entry() -> anyhow::Result<()> {
    let app = test_app().await;

    app.http.route(
        "GET",
        "/b",
        MockReply::Page(Page::new("B", "/b").with_version("1")),
    );

    let home_version = app.router.history_version().unwrap();
    app.router.remember("draft", json!("hello"));
    assert_eq!(app.router.restore("draft"), Some(json!("hello")));

    app.router.visit("/b", VisitOptions::new()).await;
    assert_eq!(app.router.restore("draft"), None);

    app.router.handle_popstate(Some(home_version), "/").await;
    assert_eq!(app.router.restore("draft"), Some(json!("hello")));
    Ok(())
}

#[tokio::test]
async fn test_visit_resets_scroll_by_default() -> anyhow::Result<()> {
    let app = test_app().await;

    app.http.route(
        "GET",
        "/b",
        MockReply::Page(Page::new("B", "/b").with_version("1")),
    );

    app.scroll_driver
        .write(DOCUMENT_REGION, ScrollPosition { top: 300.0, left: 0.0 });
    app.router.visit("/b", VisitOptions::new()).await;

    assert_eq!(
        app.scroll_driver.read(DOCUMENT_REGION).unwrap(),
        ScrollPosition::origin()
    );
    Ok(())
}

#[tokio::test]
async fn test_preserve_scroll_leaves_offsets() -> anyhow::Result<()> {
    let app = test_app().await;

    app.http.route(
        "GET",
        "/b",
        MockReply::Page(Page::new("B", "/b").with_version("1")),
    );

    let offset = ScrollPosition { top: 300.0, left: 0.0 };
    app.scroll_driver.write(DOCUMENT_REGION, offset);
    app.router
        .visit("/b", VisitOptions::new().with_preserve_scroll(true))
        .await;

    assert_eq!(app.scroll_driver.read(DOCUMENT_REGION).unwrap(), offset);
    Ok(())
}

#[tokio::test]
async fn test_popstate_restores_scroll_offsets() -> anyhow::Result<()> {
    let app = test_app().await;

    app.http.route(
        "GET",
        "/b",
        MockReply::Page(Page::new("B", "/b").with_version("1")),
    );

    // Scroll down on the home page, then navigate away; the offsets are
    // captured into the entry being left.
    let home_version = app.router.history_version().unwrap();
    let offset = ScrollPosition { top: 450.0, left: 10.0 };
    app.scroll_driver.write(DOCUMENT_REGION, offset);
    app.router.visit("/b", VisitOptions::new()).await;
    assert_eq!(
        app.scroll_driver.read(DOCUMENT_REGION).unwrap(),
        ScrollPosition::origin()
    );

    app.router.handle_popstate(Some(home_version), "/").await;
    assert_eq!(app.scroll_driver.read(DOCUMENT_REGION).unwrap(), offset);
    Ok(())
}
