use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, Method, Uri},
    response::Redirect,
    routing::get,
    Json, Router,
};
use configs::{GatewayConfig, UpstreamConfig};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn serve(app: Router) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("server error: {}", e);
        }
    });
    Ok(addr)
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "len": body.len(),
        "host": headers.get(header::HOST).and_then(|v| v.to_str().ok()),
    }))
}

/// Throwaway backend that describes every request it receives.
async fn start_echo() -> anyhow::Result<SocketAddr> {
    let app = Router::new()
        .route("/redirect", get(|| async { Redirect::temporary("/elsewhere") }))
        .fallback(echo);
    serve(app).await
}

fn static_dir(tag: &str) -> anyhow::Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("gateway-static-{}-{}", tag, std::process::id()));
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join("index.html"), "<html>spa</html>")?;
    std::fs::write(dir.join("app.js"), "console.log(1);")?;
    Ok(dir)
}

async fn start_gateway(api1: String, api2: String, tag: &str) -> anyhow::Result<String> {
    let cfg = GatewayConfig {
        static_dir: static_dir(tag)?.to_string_lossy().into_owned(),
        api1: UpstreamConfig { prefix: "/api1".into(), target: api1 },
        api2: UpstreamConfig { prefix: "/api2".into(), target: api2 },
        connect_timeout_secs: 2,
        request_timeout_secs: 5,
        body_limit_bytes: 1024,
        ..GatewayConfig::default()
    };
    let addr = serve(gateway::build_router(&cfg)?).await?;
    Ok(format!("http://{}", addr))
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("reqwest client")
}

#[tokio::test]
async fn health_and_client_config() -> anyhow::Result<()> {
    let base = start_gateway("http://127.0.0.1:1".into(), "http://127.0.0.1:1".into(), "config").await?;

    let body: Value = client().get(format!("{}/health", base)).send().await?.json().await?;
    assert_eq!(body, json!({"status": "healthy", "service": "frontend"}));

    let body: Value = client().get(format!("{}/api/config", base)).send().await?.json().await?;
    assert_eq!(body, json!({"api1Url": "/api1", "api2Url": "/api2"}));
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_is_a_500_and_health_still_answers() -> anyhow::Result<()> {
    let echo = start_echo().await?;
    let base = start_gateway("http://127.0.0.1:1".into(), format!("http://{}", echo), "down").await?;
    let c = client();

    let (proxied, health) = tokio::join!(
        c.get(format!("{}/api1/items", base)).send(),
        c.get(format!("{}/health", base)).send(),
    );
    let proxied = proxied?;
    assert_eq!(proxied.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = proxied.json().await?;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap_or_default().contains("upstream request failed"));
    assert_eq!(health?.status(), StatusCode::OK);

    // the other backend is unaffected
    let res = c.get(format!("{}/api2/files", base)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn prefix_is_stripped_and_query_forwarded() -> anyhow::Result<()> {
    let echo = start_echo().await?;
    let target = format!("http://{}", echo);
    let base = start_gateway(target.clone(), target, "rewrite").await?;

    let body: Value = client().get(format!("{}/api2/files?x=1", base)).send().await?.json().await?;
    assert_eq!(body["path"], "/files");
    assert_eq!(body["query"], "x=1");
    assert_eq!(body["host"], echo.to_string());

    let body: Value = client().delete(format!("{}/api1/data/7", base)).send().await?.json().await?;
    assert_eq!(body["method"], "DELETE");
    assert_eq!(body["path"], "/data/7");

    let body: Value = client().get(format!("{}/api1", base)).send().await?.json().await?;
    assert_eq!(body["path"], "/");
    Ok(())
}

#[tokio::test]
async fn proxied_body_is_forwarded_unmodified() -> anyhow::Result<()> {
    let echo = start_echo().await?;
    let target = format!("http://{}", echo);
    let base = start_gateway(target.clone(), target, "body").await?;

    // larger than the gateway's own body limit: proxied routes are exempt
    let payload = vec![b'x'; 256 * 1024];
    let res = client()
        .post(format!("{}/api1/data", base))
        .header("content-type", "application/json")
        .body(payload.clone())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["method"], "POST");
    assert_eq!(body["len"], payload.len());

    let res = client().post(format!("{}/api/config", base)).body(payload).send().await?;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}

#[tokio::test]
async fn backend_redirects_are_relayed() -> anyhow::Result<()> {
    let echo = start_echo().await?;
    let target = format!("http://{}", echo);
    let base = start_gateway(target.clone(), target, "redirect").await?;

    let res = client().get(format!("{}/api1/redirect", base)).send().await?;
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(res.headers()["location"], "/elsewhere");
    Ok(())
}

#[tokio::test]
async fn unknown_paths_fall_back_to_the_spa() -> anyhow::Result<()> {
    let base = start_gateway("http://127.0.0.1:1".into(), "http://127.0.0.1:1".into(), "spa").await?;

    let res = client().get(format!("{}/some/deep/link", base)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await?, "<html>spa</html>");

    let res = client().get(format!("{}/app.js", base)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await?, "console.log(1);");
    Ok(())
}
