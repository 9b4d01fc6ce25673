//! Integration tests for background polling.

mod common;
use common::*;

use glide_rs::{Page, VisitOptions};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_poll_refreshes_current_page() -> anyhow::Result<()> {
    let app = test_app().await;

    app.http.route(
        "GET",
        "/",
        MockReply::Page(
            Page::new("Home", "/")
                .with_prop("unread", json!(7))
                .with_version("1"),
        ),
    );

    let version_before = app.router.history_version();
    let handle = app
        .router
        .poll(Duration::from_millis(25), VisitOptions::new());

    tokio::time::sleep(Duration::from_millis(90)).await;
    handle.stop();

    let page = app.router.page().unwrap();
    assert_eq!(page.props["unread"], 7);
    // Background refreshes replace rather than grow history.
    assert_eq!(app.router.history_version(), version_before);
    assert!(app.http.hits("GET", "/") >= 1);
    Ok(())
}

#[tokio::test]
async fn test_poll_stops_on_handle_stop() -> anyhow::Result<()> {
    let app = test_app().await;

    app.http.route(
        "GET",
        "/",
        MockReply::Page(Page::new("Home", "/").with_version("1")),
    );

    let handle = app
        .router
        .poll(Duration::from_millis(20), VisitOptions::new());
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.stop();
    assert!(handle.is_stopped());

    let hits = app.http.hits("GET", "/");
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(app.http.hits("GET", "/"), hits);
    Ok(())
}

#[tokio::test]
async fn test_background_result_never_overrides_active_visit() -> anyhow::Result<()> {
    let app = test_app().await;

    // Background ticks answer for the home page...
    app.http.route_with_delay(
        "GET",
        "/",
        MockReply::Page(
            Page::new("Home", "/")
                .with_prop("unread", json!(7))
                .with_version("1"),
        ),
        Some(Duration::from_millis(30)),
    );
    // ...while an active visit is slowly navigating away.
    app.http.route_with_delay(
        "GET",
        "/slow",
        MockReply::Page(Page::new("Slow", "/slow").with_version("1")),
        Some(Duration::from_millis(120)),
    );

    let handle = app
        .router
        .poll(Duration::from_millis(20), VisitOptions::new());
    app.router.visit("/slow", VisitOptions::new()).await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    handle.stop();

    // Ticks resolving mid-visit were discarded (visit in flight), ticks
    // resolving after were discarded too (page moved on).
    assert_eq!(app.router.page().unwrap().component, "Slow");
    Ok(())
}
