use reqwest::StatusCode;
use serde_json::{json, Value};
use vlink_core::{FileDescriptor, ServerMessage};

use crate::*;

#[tokio::test]
async fn test_status_and_listing() {
    let dir = TempDir::new("status");
    let server = TestServer::start(dir.path(), None).await.unwrap();
    let _peer = TestPeer::join(&server.hub).await;

    server
        .hub
        .replace_catalog(vec![FileDescriptor::new("a.mp4", 100)], None)
        .await
        .unwrap();

    let status: Value = reqwest::get(server.url("/api/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status, json!({"peers": 1, "files": 1}));

    let files: Value = reqwest::get(server.url("/api/files"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(files, json!([{"name": "a.mp4", "size": 100}]));
}

#[tokio::test]
async fn test_download_streams_file_with_headers() {
    let dir = TempDir::new("download");
    let data = pattern(200_001);
    let path = dir.write("clip.mp4", &data);
    let server = TestServer::start(dir.path(), None).await.unwrap();
    server
        .hub
        .replace_catalog(
            vec![FileDescriptor::new("clip.mp4", data.len() as u64)
                .with_reference(path.to_string_lossy())],
            None,
        )
        .await
        .unwrap();

    let resp = reqwest::Client::new()
        .get(server.url("/api/file/0"))
        .header("origin", "http://viewer.example")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers().clone();
    assert_eq!(headers["content-type"], "video/mp4");
    assert_eq!(headers["content-length"], "200001");
    assert_eq!(headers["content-disposition"], "inline; filename=\"clip.mp4\"");
    assert_eq!(headers["access-control-allow-origin"], "*");

    let body = resp.bytes().await.unwrap();
    assert_eq!(body.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_bad_index_or_missing_file_is_not_found() {
    let dir = TempDir::new("notfound");
    let server = TestServer::start(dir.path(), None).await.unwrap();
    server
        .hub
        .replace_catalog(
            vec![
                FileDescriptor::new("gone.mp4", 10)
                    .with_reference(dir.path().join("gone.mp4").to_string_lossy()),
                FileDescriptor::new("nowhere.mp4", 10),
            ],
            None,
        )
        .await
        .unwrap();

    for path in ["/api/file/0", "/api/file/1", "/api/file/2", "/api/file/-1", "/api/file/abc"] {
        let resp = reqwest::get(server.url(path)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn test_publish_requires_token_and_broadcasts() {
    let dir = TempDir::new("publish");
    let server = TestServer::start(dir.path(), Some("s3cret")).await.unwrap();
    let mut peer = TestPeer::join(&server.hub).await;
    let client = reqwest::Client::new();
    let body = json!([{"name": "a.mp4", "size": 100}]);

    let resp = client
        .post(server.url("/api/files"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(server.url("/api/files"))
        .bearer_auth("wrong")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(peer.pump().is_empty());

    let resp = client
        .post(server.url("/api/files"))
        .bearer_auth("s3cret")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ack: Value = resp.json().await.unwrap();
    assert_eq!(ack, json!({"files": 1}));

    assert_eq!(
        peer.pump(),
        vec![ServerMessage::FilesList {
            files: vec![FileDescriptor::new("a.mp4", 100)]
        }]
    );
}

#[tokio::test]
async fn test_publish_rejects_negative_sizes() {
    let dir = TempDir::new("badpublish");
    let server = TestServer::start(dir.path(), None).await.unwrap();
    let resp = reqwest::Client::new()
        .post(server.url("/api/files"))
        .json(&json!([{"name": "a.mp4", "size": -1}]))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
    assert!(server.hub.catalog().await.is_empty());
}

#[tokio::test]
async fn test_static_assets_fall_back_to_default_page() {
    let dir = TempDir::new("static");
    dir.write("client.html", b"<html>client</html>");
    dir.write("app.js", b"console.log(1)");
    let server = TestServer::start(dir.path(), None).await.unwrap();

    let resp = reqwest::get(server.url("/app.js")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .contains("javascript"));
    assert_eq!(resp.text().await.unwrap(), "console.log(1)");

    for path in ["/", "/missing.css", "/../../etc/passwd"] {
        let resp = reqwest::get(server.url(path)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{path}");
        assert_eq!(resp.headers()["content-type"], "text/html");
        assert_eq!(resp.text().await.unwrap(), "<html>client</html>", "{path}");
    }
}

#[tokio::test]
async fn test_missing_default_page_is_server_error() {
    let dir = TempDir::new("nodefault");
    let server = TestServer::start(dir.path(), None).await.unwrap();
    let resp = reqwest::get(server.url("/anything")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
