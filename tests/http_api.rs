//! Handler-level tests driving the router in-process. Routes that need
//! the live model endpoint are exercised only up to their validation
//! boundary; everything else is checked end to end.

use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use zip::{ZipArchive, ZipWriter};
use zip::write::SimpleFileOptions;
use zipfix::core::extract::FileFilter;
use zipfix::core::gateway::AiGateway;
use zipfix::infra::config::GatewayConfig;
use zipfix::server::{AppState, router};

const BOUNDARY: &str = "zipfix-test-boundary";

fn test_router() -> Router {
    let gateway =
        AiGateway::new("test-key".to_string(), &GatewayConfig::default()).expect("gateway");
    let state = Arc::new(AppState { gateway, filter: FileFilter::default() });
    router(state, 50 * 1024 * 1024)
}

fn multipart_body(filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut cursor);
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).expect("start entry");
            writer
                .write_all(data.as_bytes())
                .expect("write entry");
        }
        writer.finish().expect("finish archive");
    }
    cursor.into_inner()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn ping_responds_pong() {
    let response = test_router()
        .oneshot(
            Request::builder()
                .uri("/ping")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    assert_eq!(&bytes[..], b"pong");
}

#[tokio::test]
async fn upload_extracts_eligible_files() {
    let archive = zip_of(&[
        ("src/a.js", "x"),
        ("node_modules/lib/b.js", "vendored"),
        ("package-lock.json", "{}"),
    ]);
    let body = multipart_body("project.zip", "application/zip", &archive);

    let response = test_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["files"].as_array().expect("files").len(), 1);
    assert_eq!(json["files"][0]["filename"], "src/a.js");
    assert_eq!(json["files"][0]["content"], "x");
}

#[tokio::test]
async fn upload_rejects_non_zip_files() {
    let body = multipart_body("notes.txt", "text/plain", b"hello");

    let response = test_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn upload_rejects_a_corrupt_archive() {
    let body = multipart_body("broken.zip", "application/zip", b"not really a zip");

    let response = test_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_single_wraps_one_text_file() {
    let body = multipart_body("app.py", "text/x-python", b"print(1)\n");

    let response = test_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload-single")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["files"].as_array().expect("files").len(), 1);
    assert_eq!(json["files"][0]["filename"], "app.py");
    assert_eq!(json["files"][0]["content"], "print(1)\n");
}

#[tokio::test]
async fn fix_with_no_files_is_rejected_up_front() {
    let response = test_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/fix")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"files": [], "userPrompt": "do anything"}"#))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(
        json["message"]
            .as_str()
            .expect("message")
            .contains("No files")
    );
}

#[tokio::test]
async fn download_streams_a_zip_attachment() {
    let response = test_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/download")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"projectState": [{"filename": "src/a.js", "content": "x"}]}"#,
                ))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .expect("content type"),
        "application/zip"
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .expect("disposition")
        .to_str()
        .expect("ascii");
    assert!(disposition.starts_with("attachment"));

    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    let mut archive = ZipArchive::new(Cursor::new(bytes.as_ref())).expect("valid zip");
    assert_eq!(archive.len(), 1);

    let mut entry = archive.by_index(0).expect("entry");
    assert_eq!(entry.name(), "src/a.js");
    let mut content = String::new();
    entry.read_to_string(&mut content).expect("read entry");
    assert_eq!(content, "x");
}

#[tokio::test]
async fn download_of_an_empty_state_is_a_valid_empty_archive() {
    let response = test_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/download")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"projectState": []}"#))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    let archive = ZipArchive::new(Cursor::new(bytes.as_ref())).expect("valid zip");
    assert_eq!(archive.len(), 0);
}
