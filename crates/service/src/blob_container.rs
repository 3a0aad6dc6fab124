//! One blob container behind the `object_store` client.
//!
//! The container kind decides how it is reached: Azure Blob Storage (or the
//! Azurite emulator) from a connection string, a directory on local disk, or
//! an in-process map.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use common::ResourceFactory;
use configs::{StorageConfig, StorageKind};
use futures::stream::{BoxStream, TryStreamExt};
use models::blob::{BlobObject, FALLBACK_CONTENT_TYPE};
use object_store::azure::MicrosoftAzureBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    Attribute, Attributes, ClientOptions, GetOptions, ObjectStore, PutOptions, PutPayload,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{info, warn};

use crate::azure_admin::AzureContainerAdmin;

const EMULATOR_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";
const EMULATOR_ACCOUNT: &str = "devstoreaccount1";
const EMULATOR_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// RFC 3986 unreserved characters stay as they are in object URLs.
const URL_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// A blob's bytes as a stream, plus what the response headers need.
pub struct BlobDownload {
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub body: BoxStream<'static, Result<Bytes, object_store::Error>>,
}

/// Handle to one container. Cheap to clone.
#[derive(Clone)]
pub struct BlobContainer {
    store: Arc<dyn ObjectStore>,
    kind: StorageKind,
    name: String,
    base_url: String,
    local_dir: Option<PathBuf>,
    azure_admin: Option<AzureContainerAdmin>,
}

impl std::fmt::Debug for BlobContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobContainer")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BlobContainer {
    pub fn in_memory(name: &str) -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            kind: StorageKind::Memory,
            name: name.to_string(),
            base_url: format!("memory:///{name}"),
            local_dir: None,
            azure_admin: None,
        }
    }

    /// Build the client for `cfg`. Nothing is sent over the network here; the
    /// `local` kind creates its directory since the client needs it to exist.
    pub fn from_config(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let mut container = match cfg.kind {
            StorageKind::Memory => Self::in_memory(&cfg.container),
            StorageKind::Local => {
                let dir = PathBuf::from(&cfg.local_root).join(&cfg.container);
                // LocalFileSystem 要求前缀目录已存在，这里顺带完成"容器"创建
                std::fs::create_dir_all(&dir)?;
                let dir = std::fs::canonicalize(&dir)?;
                Self {
                    store: Arc::new(LocalFileSystem::new_with_prefix(&dir)?),
                    kind: StorageKind::Local,
                    name: cfg.container.clone(),
                    base_url: format!("file://{}", dir.display()),
                    local_dir: Some(dir),
                    azure_admin: None,
                }
            }
            StorageKind::Azure => azure_container(cfg)?,
        };
        if let Some(base) = cfg.public_base_url.as_deref() {
            container.base_url = base.trim_end_matches('/').to_string();
        }
        Ok(container)
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical access URL of an object.
    pub fn url(&self, object: &str) -> String {
        format!("{}/{}", self.base_url, utf8_percent_encode(object, URL_SEGMENT))
    }

    /// Object keys are stored verbatim so listed names can be fed back to
    /// `get` and `delete`.
    fn path(&self, object: &str) -> Result<Path, object_store::Error> {
        Ok(Path::parse(object)?)
    }

    fn stores_attributes(&self) -> bool {
        !matches!(self.kind, StorageKind::Local)
    }

    /// Create the container when missing. On Azure it is created with
    /// anonymous read access to its blobs.
    pub async fn create_if_not_exists(&self) -> anyhow::Result<()> {
        if let Some(dir) = &self.local_dir {
            tokio::fs::create_dir_all(dir).await?;
        }
        if let Some(admin) = &self.azure_admin {
            if admin.create_if_not_exists().await? {
                info!(container = %self.name, "created storage container with public blob access");
            }
        }
        Ok(())
    }

    pub async fn exists(&self) -> anyhow::Result<bool> {
        match (&self.kind, &self.local_dir, &self.azure_admin) {
            (StorageKind::Local, Some(dir), _) => Ok(tokio::fs::metadata(dir)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false)),
            (StorageKind::Azure, _, Some(admin)) => admin.exists().await,
            _ => Ok(true),
        }
    }

    async fn content_type_of(&self, location: &Path) -> Option<String> {
        if !self.stores_attributes() {
            return None;
        }
        let mut opts = GetOptions::default();
        opts.head = true;
        match self.store.get_opts(location, opts).await {
            Ok(res) => res.attributes.get(&Attribute::ContentType).map(|v| v.to_string()),
            Err(e) => {
                warn!(object = %location, error = %e, "content type lookup failed");
                None
            }
        }
    }

    /// Every object in the container, fully materialized.
    pub async fn list(&self) -> Result<Vec<BlobObject>, object_store::Error> {
        // 列表接口不带属性，内容类型按对象逐个 HEAD；容器规模小，不分页
        let metas: Vec<_> = self.store.list(None).try_collect().await?;

        let mut objects = Vec::with_capacity(metas.len());
        for meta in metas {
            let name = meta.location.to_string();
            let content_type = match self.content_type_of(&meta.location).await {
                Some(ct) => Some(ct),
                None => guess_content_type(&name),
            };
            objects.push(BlobObject {
                name,
                size: meta.size as u64,
                last_modified: meta.last_modified,
                content_type,
            });
        }
        Ok(objects)
    }

    pub async fn put(&self, object: &str, data: Bytes, content_type: &str) -> Result<(), object_store::Error> {
        let mut opts = PutOptions::default();
        if self.stores_attributes() {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            opts.attributes = attributes;
        }
        self.store.put_opts(&self.path(object)?, PutPayload::from(data), opts).await?;
        Ok(())
    }

    pub async fn get(&self, object: &str) -> Result<BlobDownload, object_store::Error> {
        let res = self.store.get(&self.path(object)?).await?;
        let content_type = res
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| v.to_string())
            .or_else(|| guess_content_type(object))
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
        let size = res.meta.size as u64;
        Ok(BlobDownload { name: object.to_string(), content_type, size, body: res.into_stream() })
    }

    pub async fn delete(&self, object: &str) -> Result<(), object_store::Error> {
        self.store.delete(&self.path(object)?).await
    }
}

fn guess_content_type(name: &str) -> Option<String> {
    mime_guess::from_path(name).first_raw().map(str::to_string)
}

/// Split `Key=Value;Key=Value` into a map. Values may contain `=`.
pub fn parse_connection_string(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter_map(|part| {
            let part = part.trim();
            let (k, v) = part.split_once('=')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

fn azure_container(cfg: &StorageConfig) -> anyhow::Result<BlobContainer> {
    let pairs = parse_connection_string(&cfg.connection_string);
    let mut builder = MicrosoftAzureBuilder::new().with_container_name(&cfg.container);

    let emulator = pairs
        .get("UseDevelopmentStorage")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));

    let (endpoint, account, key) = if emulator {
        builder = builder.with_use_emulator(true);
        (EMULATOR_BLOB_ENDPOINT.to_string(), EMULATOR_ACCOUNT.to_string(), EMULATOR_KEY.to_string())
    } else {
        let account = pairs
            .get("AccountName")
            .ok_or_else(|| anyhow::anyhow!("connection string has no AccountName"))?;
        let key = pairs
            .get("AccountKey")
            .ok_or_else(|| anyhow::anyhow!("connection string has no AccountKey"))?;
        builder = builder.with_account(account).with_access_key(key);
        let endpoint = match pairs.get("BlobEndpoint") {
            Some(ep) => {
                let ep = ep.trim_end_matches('/').to_string();
                builder = builder.with_endpoint(ep.clone());
                ep
            }
            None => {
                let protocol = pairs.get("DefaultEndpointsProtocol").map(String::as_str).unwrap_or("https");
                let suffix = pairs.get("EndpointSuffix").map(String::as_str).unwrap_or("core.windows.net");
                format!("{protocol}://{account}.blob.{suffix}")
            }
        };
        (endpoint, account.clone(), key.clone())
    };
    let admin = AzureContainerAdmin::new(&account, &key, &endpoint, &cfg.container, cfg.request_timeout())?;

    let client_options = ClientOptions::new()
        .with_timeout(cfg.request_timeout())
        .with_allow_http(endpoint.starts_with("http://"));
    let store = builder.with_client_options(client_options).build()?;

    Ok(BlobContainer {
        store: Arc::new(store),
        kind: StorageKind::Azure,
        name: cfg.container.clone(),
        base_url: format!("{}/{}", endpoint, cfg.container),
        local_dir: None,
        azure_admin: Some(admin),
    })
}

/// Builds the container client and makes sure the container exists.
pub struct ContainerFactory {
    config: StorageConfig,
}

impl ContainerFactory {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ResourceFactory for ContainerFactory {
    type Handle = BlobContainer;

    fn name(&self) -> &str {
        "storage"
    }

    async fn create(&self) -> anyhow::Result<BlobContainer> {
        let container = BlobContainer::from_config(&self.config)?;
        container.create_if_not_exists().await?;
        info!(kind = ?container.kind(), container = %container.name(), "connected to storage container");
        Ok(container)
    }
}
