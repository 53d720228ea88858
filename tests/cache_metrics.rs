mod common;

use std::collections::HashSet;

use axum::http::{Method, StatusCode};
use metrics_util::debugging::DebuggingRecorder;
use serde_json::json;

use common::{harness, send};

#[tokio::test]
async fn content_gateway_emits_expected_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let h = harness(None);

    for uri in [
        "/api/content/pages/about",
        "/api/content/pages/about",
        "/api/content/posts",
    ] {
        let (response, _) = send(&h.router, Method::GET, uri, &[], None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    h.source.fail_with(Some(502));
    let (response, _) = send(&h.router, Method::GET, "/api/content/tags", &[], None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let (response, _) = send(
        &h.router,
        Method::POST,
        "/api/revalidate",
        &[],
        Some(json!({"tags": ["blogPosts"]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "contentgate_cache_hit_total",
        "contentgate_cache_miss_total",
        "contentgate_cache_invalidated_total",
        "contentgate_backend_error_total",
        "contentgate_revalidation_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
