use std::{sync::Arc, time::Duration};

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use settlement_density::{
    dataset::DatasetLoader,
    web::{router, AppState},
    EngineConfig,
};
use tower::ServiceExt;

fn app_state() -> Arc<AppState> {
    let dataset = DatasetLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("datasets/california.yaml")
        .expect("bundled dataset parses");
    AppState::new(dataset, EngineConfig::default())
}

async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_is_ok() {
    let response = router(app_state())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn grid_endpoint_returns_snapshot() {
    let (status, body) = call(router(app_state()), Method::GET, "/api/grid/1800").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["year"], 1800);
    assert_eq!(body["dataset"], "california");
    let cells = body["cells"].as_array().unwrap();
    assert!(!cells.is_empty());
    assert!(cells
        .iter()
        .all(|cell| cell["css"].as_str().unwrap().starts_with("hsl(")));
}

#[tokio::test]
async fn settlements_endpoint_lists_active_settlements() {
    let (status, body) = call(router(app_state()), Method::GET, "/api/settlements/1700").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);

    let (_, body) = call(router(app_state()), Method::GET, "/api/settlements/1800").await;
    let settlements = body.as_array().unwrap();
    assert!(!settlements.is_empty());
    assert!(settlements
        .iter()
        .all(|status| status["population"].as_u64().unwrap() >= 1));
}

#[tokio::test]
async fn bad_year_is_rejected() {
    let (status, _) = call(router(app_state()), Method::GET, "/api/grid/eighteen").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn year_request_publishes_latest_frame() {
    let state = app_state();

    let (status, body) = call(router(Arc::clone(&state)), Method::POST, "/api/year/1810").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["generation"], 1);
    assert_eq!(body["year"], 1810);

    let mut frame = None;
    for _ in 0..500 {
        frame = state.latest_frame();
        if frame.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let frame = frame.expect("grid published");
    assert_eq!(frame.generation, 1);
    assert_eq!(frame.snapshot.year, 1810);

    let (status, body) = call(router(state), Method::GET, "/api/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requested_generation"], 1);
    assert_eq!(body["frame"]["snapshot"]["year"], 1810);
}

#[tokio::test]
async fn expeditions_endpoint_returns_routes_and_annotations() {
    let (status, body) = call(router(app_state()), Method::GET, "/api/expeditions/1542").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["year"], 1542);
    let routes = body["routes"]["features"].as_array().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["geometry"]["type"], "LineString");
    assert_eq!(routes[0]["properties"]["name"], "Cabrillo-Ferrer Expedition");
    let annotations = body["annotations"].as_array().unwrap();
    assert_eq!(annotations.len(), 3);
    assert_eq!(annotations[0]["expedition"], "Cabrillo-Ferrer Expedition");
    assert_eq!(annotations[0]["title"], "San Diego Bay");

    let (_, body) = call(router(app_state()), Method::GET, "/api/expeditions/1769").await;
    let routes = body["routes"]["features"].as_array().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["properties"]["kind"], "land");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_grid_requests_both_complete() {
    let state = app_state();
    let (first, second) = tokio::join!(
        call(router(Arc::clone(&state)), Method::GET, "/api/grid/1790"),
        call(router(Arc::clone(&state)), Method::GET, "/api/grid/1845"),
    );

    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);
    assert_eq!(first.1["year"], 1790);
    assert_eq!(second.1["year"], 1845);
}
