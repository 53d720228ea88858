mod common;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use common::{Harness, harness, send};
use contentgate::revalidation::FULL_REVALIDATION_MESSAGE;

fn paths(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

async fn get_ok(h: &Harness, uri: &str) {
    let (response, _) = send(&h.router, Method::GET, uri, &[], None).await;
    assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
}

async fn prime(h: &Harness) {
    get_ok(h, "/api/content/posts/hello-world").await;
    get_ok(h, "/api/content/posts").await;
    get_ok(h, "/api/content/pages/about").await;
    get_ok(h, "/api/content/pages").await;
}

fn canonical(event: &str, model: &str, id: &str, slug: &str) -> Value {
    json!({
        "event": event,
        "model": model,
        "entry": {
            "id": id,
            "slug": slug,
            "createdAt": "2024-05-01T08:00:00Z",
            "updatedAt": "2024-05-02T08:00:00Z",
            "status": "published"
        },
        "provider": "sanity",
        "timestamp": "2024-05-02T08:00:01Z"
    })
}

#[tokio::test]
async fn deleted_post_drops_entity_and_listing_only() {
    let h = harness(Some("s3cret"));
    prime(&h).await;
    assert_eq!(h.source.calls(), 4);

    let (response, body) = send(
        &h.router,
        Method::POST,
        "/api/webhooks/sanity",
        &[("x-webhook-secret", "s3cret")],
        Some(canonical("deleted", "blogPost", "42", "hello-world")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(h.purger.calls(), vec![paths(&["/blog", "/blog/hello-world"])]);

    // Page entries survive; both post entries are refetched.
    prime(&h).await;
    assert_eq!(h.source.calls(), 6);
}

#[tokio::test]
async fn author_update_invalidates_post_listings() {
    let h = harness(None);
    prime(&h).await;

    let (response, body) = send(
        &h.router,
        Method::POST,
        "/api/webhooks/sanity",
        &[],
        Some(canonical("updated", "author", "a1", "ada")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(h.purger.calls(), vec![paths(&["/blog", "/blog/author/ada"])]);

    // Only the post listing is gone.
    prime(&h).await;
    assert_eq!(h.source.calls(), 5);
}

#[tokio::test]
async fn navigation_change_purges_the_root() {
    let h = harness(None);

    let (response, _) = send(
        &h.router,
        Method::POST,
        "/api/webhooks/sanity",
        &[],
        Some(canonical("updated", "navigation", "main", "main")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.purger.calls(), vec![paths(&["/"])]);
}

#[tokio::test]
async fn full_revalidation_empties_the_cache() {
    let h = harness(None);
    prime(&h).await;
    get_ok(&h, "/api/content/search?q=hello").await;
    assert!(!h.client.cache().is_empty());

    let (response, body) = send(
        &h.router,
        Method::POST,
        "/api/revalidate",
        &[],
        Some(json!({"all": true})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "message": FULL_REVALIDATION_MESSAGE})
    );
    assert!(h.client.cache().is_empty());
    assert_eq!(h.purger.calls(), vec![paths(&["/", "/blog"])]);
}

#[tokio::test]
async fn manual_tags_reach_only_matching_entries() {
    let h = harness(None);
    prime(&h).await;

    let (response, body) = send(
        &h.router,
        Method::POST,
        "/api/revalidate",
        &[],
        Some(json!({"tags": ["pages"], "paths": ["/about"]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(h.purger.calls(), vec![paths(&["/about"])]);

    prime(&h).await;
    assert_eq!(h.source.calls(), 5);
}

#[tokio::test]
async fn unknown_model_is_rejected_before_invalidation() {
    let h = harness(None);
    prime(&h).await;

    let (response, body) = send(
        &h.router,
        Method::POST,
        "/api/webhooks/sanity",
        &[],
        Some(canonical("updated", "product", "1", "shoe")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Unknown content model");
    assert!(h.purger.calls().is_empty());

    prime(&h).await;
    assert_eq!(h.source.calls(), 4);
}

#[tokio::test]
async fn blank_manual_request_reports_a_failed_outcome() {
    let h = harness(None);
    prime(&h).await;

    let (response, body) = send(
        &h.router,
        Method::POST,
        "/api/revalidate",
        &[],
        Some(json!({"tags": ["  "], "paths": []})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(
        body["message"]
            .as_str()
            .is_some_and(|message| message.starts_with("Nothing to revalidate"))
    );
    assert!(h.purger.calls().is_empty());

    prime(&h).await;
    assert_eq!(h.source.calls(), 4);
}
