use std::time::Duration;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};

use capture_vault::app_state::AppState;
use capture_vault::service;

// 1x1 transparent PNG
const PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .app_data(service::json_config(10 * 1024 * 1024))
                .configure(service::configure),
        )
        .await
    };
}

fn data_uri(payload: &[u8]) -> String {
    use base64::Engine as _;
    format!("data:image/png;base64,{}", base64::engine::general_purpose::STANDARD.encode(payload))
}

#[actix_web::test]
async fn test_upload_list_fetch_roundtrip() {
    let state = AppState::new_for_testing(0);
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/upload-base64")
        .set_json(json!({ "images": [format!("data:image/png;base64,{}", PNG_BASE64), PNG_BASE64] }))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["success"], true);
    let files: Vec<String> = serde_json::from_value(resp["files"].clone()).unwrap();
    assert_eq!(files, vec!["/photos/photo_000000000001.png", "/photos/photo_000000000002.png"]);

    let req = test::TestRequest::get().uri("/photos").to_request();
    let listed: Vec<String> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed, files);

    let req = test::TestRequest::get().uri(&files[0]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");
    assert!(resp.headers().get("etag").is_some());

    use base64::Engine as _;
    let expected = base64::engine::general_purpose::STANDARD.decode(PNG_BASE64).unwrap();
    let body = test::read_body(resp).await;
    assert_eq!(body.as_ref(), expected.as_slice());
}

#[actix_web::test]
async fn test_capacity_keeps_latest_five() {
    let state = AppState::new_for_testing(5);
    let app = init_app!(state);

    let images: Vec<String> = (1..=8).map(|i| data_uri(format!("P{}", i).as_bytes())).collect();
    let req = test::TestRequest::post()
        .uri("/upload-base64")
        .set_json(json!({ "images": images }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/photos").to_request();
    let listed: Vec<String> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed.len(), 5);

    for (url, i) in listed.iter().zip(4..=8) {
        let req = test::TestRequest::get().uri(url).to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body.as_ref(), format!("P{}", i).as_bytes());
    }

    let req = test::TestRequest::get().uri("/photos?latest=2").to_request();
    let latest: Vec<String> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(latest, listed[3..].to_vec());
}

#[actix_web::test]
async fn test_clear_is_idempotent() {
    let state = AppState::new_for_testing(0);
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/upload-base64")
        .set_json(json!({ "images": [PNG_BASE64, PNG_BASE64, PNG_BASE64] }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post().uri("/clear").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({ "success": true, "removed": 3 }));

    let req = test::TestRequest::get().uri("/clear").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({ "success": true, "removed": 0 }));

    let req = test::TestRequest::get().uri("/photos").to_request();
    let listed: Vec<String> = test::call_and_read_body_json(&app, req).await;
    assert!(listed.is_empty());
}

#[actix_web::test]
async fn test_malformed_upload_does_not_mutate_store() {
    let state = AppState::new_for_testing(0);
    let app = init_app!(state);

    let bad_bodies = [
        json!({}),
        json!({ "images": [] }),
        json!({ "images": "not-an-array" }),
        json!({ "images": [PNG_BASE64, "data:image/png;base64,@@@"] }),
        json!({ "images": ["data:image/png;base64,"] }),
    ];
    for body in bad_bodies {
        let req = test::TestRequest::post().uri("/upload-base64").set_json(&body).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {}", body);
        let resp: Value = test::read_body_json(resp).await;
        assert_eq!(resp["success"], false);
        assert!(resp["error"].is_string());
    }

    assert!(state.store.is_empty());
}

#[actix_web::test]
async fn test_invalid_json_is_client_error() {
    let state = AppState::new_for_testing(0);
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/upload-base64")
        .insert_header(("content-type", "application/json"))
        .set_payload("{ not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_unknown_photo_is_not_found() {
    let state = AppState::new_for_testing(0);
    let app = init_app!(state);

    let req = test::TestRequest::get().uri("/photos/photo_000000000042.png").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_upload_after_shutdown_is_unavailable() {
    let state = AppState::new_for_testing(0);
    let app = init_app!(state);
    assert!(state.store.shutdown(Duration::from_secs(1)));

    let req = test::TestRequest::post()
        .uri("/upload-base64")
        .set_json(json!({ "images": [PNG_BASE64] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let req = test::TestRequest::get().uri("/photos").to_request();
    let listed: Vec<String> = test::call_and_read_body_json(&app, req).await;
    assert!(listed.is_empty());
}

#[actix_web::test]
async fn test_stats_reports_entries() {
    let state = AppState::new_for_testing(2);
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/upload-base64")
        .set_json(json!({ "images": [data_uri(b"abc"), data_uri(b"defg"), data_uri(b"hi")] }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/stats").to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["entries"], 2);
    assert_eq!(stats["capacity"], 2);
    assert_eq!(stats["total_bytes"], 6);
}
