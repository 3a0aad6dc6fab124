use bytes::Bytes;
use chrono::Utc;
use common::LazyResource;
use configs::StorageConfig;
use models::blob::{self, BlobObject, StoredBlob};
use tracing::{info, warn};

use crate::blob_container::{BlobContainer, BlobDownload, ContainerFactory};
use crate::errors::ServiceError;

pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// CRUD over the blobs of one container.
#[derive(Clone)]
pub struct StorageService {
    container: LazyResource<ContainerFactory>,
}

impl StorageService {
    pub fn new(config: StorageConfig) -> Self {
        Self { container: LazyResource::new(ContainerFactory::new(config)) }
    }

    pub fn container(&self) -> &LazyResource<ContainerFactory> {
        &self.container
    }

    async fn handle(&self) -> Result<BlobContainer, ServiceError> {
        Ok(self.container.acquire().await?)
    }

    /// Startup side effect: connect and create the container if absent.
    /// A failure is only logged; later requests retry through `acquire`.
    pub async fn warm_up(&self) {
        match self.container.acquire().await {
            Ok(c) => info!(container = %c.name(), event = "storage_warm_up", "storage container ready"),
            Err(e) => warn!(error = %e, event = "storage_warm_up_failed", "storage initialization error"),
        }
    }

    /// Ready only when the client exists and the container is there.
    pub async fn ready(&self) -> Result<(), ServiceError> {
        let c = self.handle().await?;
        let exists = c.exists().await.map_err(|e| ServiceError::Storage(format!("{e:#}")))?;
        if !exists {
            return Err(ServiceError::Storage(format!("container '{}' not found", c.name())));
        }
        Ok(())
    }

    pub async fn list_files(&self) -> Result<Vec<BlobObject>, ServiceError> {
        let c = self.handle().await?;
        Ok(c.list().await?)
    }

    /// Store an uploaded file under a time-prefixed name, keeping its content type.
    pub async fn upload(
        &self,
        original_name: &str,
        content_type: Option<&str>,
        data: Bytes,
    ) -> Result<StoredBlob, ServiceError> {
        let name = blob::object_name(original_name, Utc::now())?;
        let content_type = content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or(blob::FALLBACK_CONTENT_TYPE)
            .to_string();
        let size = data.len() as u64;

        let c = self.handle().await?;
        c.put(&name, data, &content_type).await?;
        info!(object = %name, size, content_type = %content_type, "blob uploaded");
        Ok(StoredBlob { url: c.url(&name), name, size, content_type: Some(content_type) })
    }

    /// Store a text blob. Both fields are required.
    pub async fn put_text(&self, filename: &str, content: &str) -> Result<StoredBlob, ServiceError> {
        if filename.is_empty() || content.is_empty() {
            return Err(ServiceError::Validation("Filename and content required".into()));
        }
        let name = blob::object_name(filename, Utc::now())?;
        let data = Bytes::copy_from_slice(content.as_bytes());
        let size = data.len() as u64;

        let c = self.handle().await?;
        c.put(&name, data, TEXT_CONTENT_TYPE).await?;
        info!(object = %name, size, "text blob uploaded");
        Ok(StoredBlob { url: c.url(&name), name, size, content_type: None })
    }

    pub async fn download(&self, name: &str) -> Result<BlobDownload, ServiceError> {
        let c = self.handle().await?;
        Ok(c.get(name).await?)
    }

    pub async fn delete(&self, name: &str) -> Result<(), ServiceError> {
        let c = self.handle().await?;
        c.delete(name).await?;
        info!(object = %name, "blob deleted");
        Ok(())
    }
}
