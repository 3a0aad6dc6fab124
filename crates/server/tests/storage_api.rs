use std::net::SocketAddr;

use configs::{StorageConfig, StorageKind};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{multipart, StatusCode};
use serde_json::{json, Value};
use server::startup::build_storage_router;
use service::blob_service::StorageService;
use tokio::net::TcpListener;

struct TestApp {
    base_url: String,
}

async fn start_server(cfg: StorageConfig) -> anyhow::Result<TestApp> {
    let limit = cfg.upload_limit_bytes;
    let app = build_storage_router(StorageService::new(cfg), limit);
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("server error: {}", e);
        }
    });
    Ok(TestApp { base_url: format!("http://{}", addr) })
}

async fn start_memory() -> anyhow::Result<TestApp> {
    start_server(StorageConfig { kind: StorageKind::Memory, ..StorageConfig::default() }).await
}

fn now_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[tokio::test]
async fn health_and_ready() -> anyhow::Result<()> {
    let app = start_memory().await?;
    let client = reqwest::Client::new();

    let body: Value = client.get(format!("{}/health", app.base_url)).send().await?.json().await?;
    assert_eq!(body, json!({"status": "healthy", "service": "api-2"}));

    let body: Value = client.get(format!("{}/ready", app.base_url)).send().await?.json().await?;
    assert_eq!(body, json!({"status": "ready", "storage": "connected"}));
    Ok(())
}

#[tokio::test]
async fn ready_fails_with_bad_connection_string() -> anyhow::Result<()> {
    let app = start_server(StorageConfig {
        connection_string: "AccountName=nokey".into(),
        ..StorageConfig::default()
    })
    .await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/ready", app.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = res.json().await?;
    assert_eq!(body["status"], "not ready");

    let res = client.get(format!("{}/health", app.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn uploaded_file_is_listed_and_downloaded_verbatim() -> anyhow::Result<()> {
    let app = start_memory().await?;
    let client = reqwest::Client::new();
    let payload = b"line one\nline two\n".to_vec();

    let before = now_millis();
    let part = multipart::Part::bytes(payload.clone()).file_name("notes.txt").mime_str("text/plain")?;
    let res = client
        .post(format!("{}/upload", app.base_url))
        .multipart(multipart::Form::new().part("file", part))
        .send()
        .await?;
    let after = now_millis();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["file"]["type"], "text/plain");
    assert_eq!(body["file"]["size"], payload.len());

    let name = body["file"]["name"].as_str().unwrap_or_default().to_string();
    let (stamp, rest) = name.split_once('-').unwrap_or_default();
    let stamp: u128 = stamp.parse()?;
    assert!(stamp >= before && stamp <= after);
    assert_eq!(rest, "notes.txt");

    let body: Value = client.get(format!("{}/files", app.base_url)).send().await?.json().await?;
    let files = body["files"].as_array().cloned().unwrap_or_default();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["name"], name.as_str());
    assert_eq!(files[0]["contentType"], "text/plain");

    let res = client.get(format!("{}/files/{}", app.base_url, name)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/plain");
    assert!(res.headers()["content-disposition"]
        .to_str()?
        .starts_with(&format!("attachment; filename=\"{}\";", name)));
    assert_eq!(res.bytes().await?.as_ref(), payload.as_slice());
    Ok(())
}

#[tokio::test]
async fn upload_without_file_part_is_rejected() -> anyhow::Result<()> {
    let app = start_memory().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/upload", app.base_url))
        .multipart(multipart::Form::new().text("other", "x"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body, json!({"success": false, "error": "No file uploaded"}));

    let form = multipart::Form::new()
        .part("file", multipart::Part::bytes(b"a".to_vec()).file_name("a.txt"))
        .part("file", multipart::Part::bytes(b"b".to_vec()).file_name("b.txt"));
    let res = client.post(format!("{}/upload", app.base_url)).multipart(form).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn text_content_round_trip_and_delete() -> anyhow::Result<()> {
    let app = start_memory().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/content", app.base_url))
        .json(&json!({"filename": "", "content": "x"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Filename and content required");

    let res = client
        .post(format!("{}/content", app.base_url))
        .json(&json!({"filename": "hello.txt", "content": "hello"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["file"]["size"], 5);
    assert!(body["file"].get("type").is_none());
    let name = body["file"]["name"].as_str().unwrap_or_default().to_string();
    assert!(body["file"]["url"].as_str().unwrap_or_default().ends_with(&name));

    let res = client.delete(format!("{}/files/{}", app.base_url, name)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], format!("Deleted {}", name));

    let body: Value = client.get(format!("{}/files", app.base_url)).send().await?.json().await?;
    assert_eq!(body["files"], json!([]));

    let res = client.get(format!("{}/files/{}", app.base_url, name)).send().await?;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn non_ascii_name_survives_list_download_and_delete() -> anyhow::Result<()> {
    let app = start_memory().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/content", app.base_url))
        .json(&json!({"filename": "résumé #1.txt", "content": "cv"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let name = body["file"]["name"].as_str().unwrap_or_default().to_string();
    assert!(name.ends_with("-résumé #1.txt"));

    let body: Value = client.get(format!("{}/files", app.base_url)).send().await?.json().await?;
    assert_eq!(body["files"][0]["name"], name.as_str());

    let file_url = format!("{}/files/{}", app.base_url, utf8_percent_encode(&name, NON_ALPHANUMERIC));
    let res = client.get(&file_url).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let disposition = res.headers()["content-disposition"].to_str()?.to_string();
    assert!(disposition.contains("filename*=UTF-8''"));
    assert!(disposition.contains("r%C3%A9sum%C3%A9%20%231%2Etxt"));
    assert_eq!(res.text().await?, "cv");

    let res = client.delete(&file_url).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = client.get(format!("{}/files", app.base_url)).send().await?.json().await?;
    assert_eq!(body["files"], json!([]));
    Ok(())
}

#[tokio::test]
async fn unreadable_bodies_get_json_errors() -> anyhow::Result<()> {
    let app = start_memory().await?;
    let client = reqwest::Client::new();

    // no body at all: same message as empty fields
    let res = client.post(format!("{}/content", app.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body, json!({"success": false, "error": "Filename and content required"}));

    let res = client
        .post(format!("{}/content", app.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let res = client.post(format!("{}/upload", app.base_url)).body("plain").send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);
    Ok(())
}
