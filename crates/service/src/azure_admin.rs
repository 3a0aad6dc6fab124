//! Container-level calls to the Blob service REST API.
//!
//! `object_store` only handles blobs, so creating the container with public
//! blob read access and checking that it exists are sent here directly,
//! authorized with the account's shared key.

use anyhow::{anyhow, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{header, Method, StatusCode};
use sha2::Sha256;
use std::time::Duration;

const API_VERSION: &str = "2021-08-06";

/// Shared-key client for one container.
#[derive(Clone)]
pub struct AzureContainerAdmin {
    client: reqwest::Client,
    account: String,
    key: Vec<u8>,
    container_url: String,
    canonical_resource: String,
}

impl std::fmt::Debug for AzureContainerAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureContainerAdmin")
            .field("account", &self.account)
            .field("container_url", &self.container_url)
            .finish()
    }
}

impl AzureContainerAdmin {
    /// `endpoint` is the blob service base, e.g. `https://acct.blob.core.windows.net`
    /// or `http://127.0.0.1:10000/devstoreaccount1` for the emulator.
    pub fn new(
        account: &str,
        account_key: &str,
        endpoint: &str,
        container: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let key = STANDARD
            .decode(account_key.trim())
            .context("AccountKey is not valid base64")?;
        let container_url = format!("{}/{}", endpoint.trim_end_matches('/'), container);
        let url = reqwest::Url::parse(&container_url).with_context(|| format!("invalid blob endpoint {endpoint}"))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            account: account.to_string(),
            key,
            canonical_resource: format!("/{}{}", account, url.path()),
            container_url,
        })
    }

    /// `StringToSign` of the shared-key scheme for a container request
    /// (`restype=container`, no body).
    fn string_to_sign(&self, method: &Method, ms_headers: &[(&str, String)]) -> String {
        // VERB + 11 standard headers; Content-Length is empty when zero
        let mut s = format!("{}\n\n\n\n\n\n\n\n\n\n\n\n", method.as_str());
        for (name, value) in ms_headers {
            s.push_str(name);
            s.push(':');
            s.push_str(value);
            s.push('\n');
        }
        s.push_str(&self.canonical_resource);
        s.push_str("\nrestype:container");
        s
    }

    fn sign(&self, string_to_sign: &str) -> anyhow::Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key).map_err(|e| anyhow!("invalid account key: {e}"))?;
        mac.update(string_to_sign.as_bytes());
        Ok(format!("SharedKey {}:{}", self.account, STANDARD.encode(mac.finalize().into_bytes())))
    }

    async fn send(&self, method: Method, extra: &[(&'static str, String)]) -> anyhow::Result<StatusCode> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        // 规范化头需按名称排序
        let mut ms_headers: Vec<(&str, String)> = extra.to_vec();
        ms_headers.push(("x-ms-date", date));
        ms_headers.push(("x-ms-version", API_VERSION.to_string()));
        ms_headers.sort_by(|a, b| a.0.cmp(b.0));

        let authorization = self.sign(&self.string_to_sign(&method, &ms_headers))?;
        let mut req = self
            .client
            .request(method.clone(), format!("{}?restype=container", self.container_url))
            .header(header::AUTHORIZATION, authorization);
        if method == Method::PUT {
            req = req.header(header::CONTENT_LENGTH, "0");
        }
        for (name, value) in &ms_headers {
            req = req.header(*name, value.as_str());
        }
        let res = req.send().await.with_context(|| format!("{} {} failed", method, self.container_url))?;
        Ok(res.status())
    }

    pub async fn exists(&self) -> anyhow::Result<bool> {
        match self.send(Method::GET, &[]).await? {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(anyhow!("container properties request returned {s}")),
        }
    }

    /// Create the container with anonymous read access to its blobs.
    /// Returns `false` when it already existed.
    pub async fn create_if_not_exists(&self) -> anyhow::Result<bool> {
        match self.send(Method::PUT, &[("x-ms-blob-public-access", "blob".to_string())]).await? {
            StatusCode::CREATED => Ok(true),
            StatusCode::CONFLICT => Ok(false),
            s => Err(anyhow!("container create request returned {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap, routing::any, Router};
    use std::sync::{Arc, Mutex};

    fn admin(endpoint: &str) -> AzureContainerAdmin {
        AzureContainerAdmin::new("acct", "a2V5", endpoint, "uploads", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn canonical_resource_includes_path_style_account() {
        let a = admin("http://127.0.0.1:10000/devstoreaccount1");
        assert_eq!(a.canonical_resource, "/acct/devstoreaccount1/uploads");
        let b = admin("https://acct.blob.core.windows.net/");
        assert_eq!(b.canonical_resource, "/acct/uploads");
    }

    #[test]
    fn string_to_sign_layout() {
        let a = admin("https://acct.blob.core.windows.net");
        let s = a.string_to_sign(
            &Method::PUT,
            &[("x-ms-blob-public-access", "blob".into()), ("x-ms-version", API_VERSION.into())],
        );
        assert_eq!(
            s,
            "PUT\n\n\n\n\n\n\n\n\n\n\n\nx-ms-blob-public-access:blob\nx-ms-version:2021-08-06\n/acct/uploads\nrestype:container"
        );
        let auth = a.sign(&s).unwrap();
        assert!(auth.starts_with("SharedKey acct:"));
        assert_eq!(auth, a.sign(&s).unwrap());
    }

    #[test]
    fn bad_key_is_rejected() {
        assert!(AzureContainerAdmin::new("acct", "not base64!", "http://x", "c", Duration::from_secs(1)).is_err());
    }

    #[derive(Default)]
    struct FakeBlobService {
        created: bool,
        public_access: Option<String>,
        authorized: bool,
    }

    async fn container_endpoint(
        State(state): State<Arc<Mutex<FakeBlobService>>>,
        method: Method,
        headers: HeaderMap,
    ) -> StatusCode {
        let mut s = state.lock().unwrap();
        s.authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("SharedKey acct:"));
        match method {
            Method::PUT if s.created => StatusCode::CONFLICT,
            Method::PUT => {
                s.created = true;
                s.public_access = headers
                    .get("x-ms-blob-public-access")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                StatusCode::CREATED
            }
            Method::GET if s.created => StatusCode::OK,
            _ => StatusCode::NOT_FOUND,
        }
    }

    #[tokio::test]
    async fn missing_container_is_created_with_public_blob_access() {
        let state = Arc::new(Mutex::new(FakeBlobService::default()));
        let app = Router::new()
            .route("/acct/uploads", any(container_endpoint))
            .with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let a = admin(&format!("http://{}/acct", addr));
        assert!(!a.exists().await.unwrap());
        assert!(a.create_if_not_exists().await.unwrap());
        assert!(a.exists().await.unwrap());
        assert!(!a.create_if_not_exists().await.unwrap());

        let s = state.lock().unwrap();
        assert_eq!(s.public_access.as_deref(), Some("blob"));
        assert!(s.authorized);
    }
}
