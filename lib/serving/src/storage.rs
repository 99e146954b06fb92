// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Durable storage for models, datasets and evaluation results.
//!
//! Keys are validated relative paths. Files are always used from a local
//! directory; a backend only moves whole files in and out of it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use modelhost_runtime::{StorageConfig, StorageMode};
use object_store::{
    ObjectStore, PutPayload, aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory,
    path::Path as ObjectPath,
};

use crate::path::ValidPath;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{0} must be present locally, no remote storage is configured")]
    NotConfigured(String),

    #[error("{0} not found in storage")]
    NotFound(String),

    #[error("Storage backend failed on {key}: {source}")]
    Backend {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Invalid storage configuration: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Whole-object storage. Retries, if any, are the implementation's concern.
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    async fn download(&self, key: &ValidPath) -> Result<Bytes, StorageError>;

    async fn upload(&self, key: &ValidPath, data: Bytes) -> Result<(), StorageError>;

    /// Download `key` to `destination` unless a file is already there.
    /// Returns whether a download happened.
    async fn fetch_to_local(&self, key: &ValidPath, destination: &Path) -> Result<bool, StorageError> {
        if tokio::fs::try_exists(destination).await.unwrap_or(false) {
            return Ok(false);
        }
        let data = self.download(key).await?;
        let parent = destination.parent().unwrap_or(Path::new("."));
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
        let temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| StorageError::io(parent, e))?;
        tokio::fs::write(temp.path(), &data)
            .await
            .map_err(|e| StorageError::io(temp.path(), e))?;
        temp.persist(destination)
            .map_err(|e| StorageError::io(destination, e.error))?;
        tracing::info!(%key, path = %destination.display(), size = data.len(), "Downloaded from storage");
        Ok(true)
    }

    /// Upload the local file at `source` under `key`
    async fn upload_file(&self, key: &ValidPath, source: &Path) -> Result<(), StorageError> {
        let data = tokio::fs::read(source)
            .await
            .map_err(|e| StorageError::io(source, e))?;
        self.upload(key, Bytes::from(data)).await
    }
}

/// No remote storage: files must already be in place and uploads stay local
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalOnly;

#[async_trait]
impl StorageBackend for LocalOnly {
    async fn download(&self, key: &ValidPath) -> Result<Bytes, StorageError> {
        Err(StorageError::NotConfigured(key.to_string()))
    }

    async fn upload(&self, key: &ValidPath, _data: Bytes) -> Result<(), StorageError> {
        tracing::debug!(%key, "Local storage only, skipping upload");
        Ok(())
    }
}

/// Storage on any `object_store` implementation
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        ObjectStorage { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Objects kept as files below `root`
    pub fn filesystem(root: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root).map_err(|e| StorageError::io(root, e))?;
        let store = LocalFileSystem::new_with_prefix(root).map_err(|source| StorageError::Backend {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self::new(Arc::new(store)))
    }

    /// S3-compatible bucket. Credentials come from `AWS_ACCESS_KEY_ID` and
    /// `AWS_SECRET_ACCESS_KEY`; the region from the config or `AWS_REGION`.
    pub fn s3(config: &StorageConfig) -> Result<Self, StorageError> {
        let bucket = config
            .bucket
            .as_deref()
            .ok_or_else(|| StorageError::Config("storage.bucket is required for s3".into()))?;
        let env = |name: &str| {
            std::env::var(name).map_err(|_| StorageError::Config(format!("{name} not set")))
        };
        let region = match &config.region {
            Some(region) => region.clone(),
            None => std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        };

        let mut builder = AmazonS3Builder::new()
            .with_access_key_id(env("AWS_ACCESS_KEY_ID")?)
            .with_secret_access_key(env("AWS_SECRET_ACCESS_KEY")?)
            .with_region(region)
            .with_bucket_name(bucket);

        let endpoint = config
            .endpoint
            .clone()
            .or_else(|| std::env::var("AWS_ENDPOINT").ok());
        if let Some(endpoint) = endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false);

            let allow_http = config.allow_http
                || std::env::var("AWS_ALLOW_HTTP")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false);
            if allow_http {
                builder = builder.with_allow_http(true);
            }
        }

        let store = builder.build().map_err(|source| StorageError::Backend {
            key: bucket.to_string(),
            source,
        })?;
        Ok(Self::new(Arc::new(store)))
    }

    fn backend_error(key: &ValidPath, source: object_store::Error) -> StorageError {
        match source {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            source => StorageError::Backend {
                key: key.to_string(),
                source,
            },
        }
    }
}

#[async_trait]
impl StorageBackend for ObjectStorage {
    async fn download(&self, key: &ValidPath) -> Result<Bytes, StorageError> {
        let location = ObjectPath::from(key.as_str());
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| Self::backend_error(key, e))?;
        result.bytes().await.map_err(|e| Self::backend_error(key, e))
    }

    async fn upload(&self, key: &ValidPath, data: Bytes) -> Result<(), StorageError> {
        let location = ObjectPath::from(key.as_str());
        let size = data.len();
        self.store
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| Self::backend_error(key, e))?;
        tracing::debug!(%key, size, "Uploaded to storage");
        Ok(())
    }
}

/// Build the backend selected by `config`
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    let backend: Arc<dyn StorageBackend> = match config.mode {
        StorageMode::Local => Arc::new(LocalOnly),
        StorageMode::Memory => Arc::new(ObjectStorage::in_memory()),
        StorageMode::Filesystem => {
            let root = config.root.as_deref().ok_or_else(|| {
                StorageError::Config("storage.root is required for filesystem storage".into())
            })?;
            Arc::new(ObjectStorage::filesystem(root)?)
        }
        StorageMode::S3 => Arc::new(ObjectStorage::s3(config)?),
    };
    tracing::info!(mode = ?config.mode, "Storage backend ready");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::validate;
    use tempfile::TempDir;

    fn key(s: &str) -> ValidPath {
        validate(s).unwrap()
    }

    #[tokio::test]
    async fn test_local_only() {
        let dir = TempDir::new().unwrap();
        let err = LocalOnly
            .fetch_to_local(&key("m.bin"), &dir.path().join("m.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotConfigured(_)));

        std::fs::write(dir.path().join("m.bin"), b"x").unwrap();
        let fetched = LocalOnly
            .fetch_to_local(&key("m.bin"), &dir.path().join("m.bin"))
            .await
            .unwrap();
        assert!(!fetched);
        LocalOnly.upload(&key("m.bin"), Bytes::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let storage = ObjectStorage::in_memory();
        let err = storage.download(&key("missing")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));

        storage
            .upload(&key("a/b.bin"), Bytes::from_static(b"payload"))
            .await
            .unwrap();
        assert_eq!(
            storage.download(&key("a/b.bin")).await.unwrap(),
            Bytes::from_static(b"payload")
        );
    }

    #[tokio::test]
    async fn test_fetch_to_local_writes_once() {
        let dir = TempDir::new().unwrap();
        let storage = ObjectStorage::in_memory();
        storage
            .upload(&key("m/model.bin"), Bytes::from_static(b"v1"))
            .await
            .unwrap();
        let destination = dir.path().join("cache").join("m").join("model.bin");
        assert!(storage.fetch_to_local(&key("m/model.bin"), &destination).await.unwrap());
        assert_eq!(std::fs::read(&destination).unwrap(), b"v1");

        storage
            .upload(&key("m/model.bin"), Bytes::from_static(b"v2"))
            .await
            .unwrap();
        assert!(!storage.fetch_to_local(&key("m/model.bin"), &destination).await.unwrap());
        assert_eq!(std::fs::read(&destination).unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_filesystem_upload_file() {
        let dir = TempDir::new().unwrap();
        let storage = ObjectStorage::filesystem(&dir.path().join("bucket")).unwrap();
        let source = dir.path().join("local.bin");
        std::fs::write(&source, b"abc").unwrap();
        storage.upload_file(&key("x/y.bin"), &source).await.unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("bucket").join("x").join("y.bin")).unwrap(),
            b"abc"
        );
    }

    #[test]
    fn test_from_config() {
        let config = StorageConfig {
            mode: StorageMode::Filesystem,
            ..Default::default()
        };
        assert!(matches!(from_config(&config), Err(StorageError::Config(_))));

        let config = StorageConfig {
            mode: StorageMode::S3,
            ..Default::default()
        };
        assert!(matches!(from_config(&config), Err(StorageError::Config(_))));

        let config = StorageConfig {
            mode: StorageMode::Memory,
            ..Default::default()
        };
        assert!(from_config(&config).is_ok());
    }
}
