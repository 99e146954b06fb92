// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use anyhow::Context as _;
use async_trait::async_trait;

use super::{Key, KeyValueBucket, KeyValueStore, StoreError, StoreOutcome};

/// Records as files: a bucket is a directory, a key is a file in it.
/// Files are replaced with a rename so readers never observe a partial record.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub(super) fn new<P: Into<PathBuf>>(root_dir: P) -> Self {
        FileStore {
            root: root_dir.into(),
        }
    }

    fn bucket_path(&self, bucket_name: &str) -> PathBuf {
        self.root.join(bucket_name.replace('/', "_"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    /// A "bucket" is a directory
    async fn get_or_create_bucket(
        &self,
        bucket_name: &str,
    ) -> Result<Box<dyn KeyValueBucket>, StoreError> {
        let p = self.bucket_path(bucket_name);
        if p.exists() {
            if !p.is_dir() {
                return Err(StoreError::FilesystemError(
                    "Bucket name is not a directory".to_string(),
                ));
            }
        } else {
            fs::create_dir_all(&p).map_err(to_fs_err)?;
        }
        Ok(Box::new(Directory { p }))
    }

    /// A "bucket" is a directory
    async fn get_bucket(
        &self,
        bucket_name: &str,
    ) -> Result<Option<Box<dyn KeyValueBucket>>, StoreError> {
        let p = self.bucket_path(bucket_name);
        if !p.exists() {
            return Ok(None);
        }
        if !p.is_dir() {
            return Err(StoreError::FilesystemError(
                "Bucket name is not a directory".to_string(),
            ));
        }
        Ok(Some(Box::new(Directory { p })))
    }
}

pub struct Directory {
    p: PathBuf,
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.p.display())
    }
}

#[async_trait]
impl KeyValueBucket for Directory {
    /// Write a file to the directory. Files carry no revision, so identical
    /// content is what makes a write a no-op.
    async fn insert(
        &self,
        key: &Key,
        value: bytes::Bytes,
        revision: u64,
    ) -> Result<StoreOutcome, StoreError> {
        let full_path = self.p.join(key.file_safe());
        if matches!(fs::read(&full_path), Ok(existing) if existing == value.as_ref()) {
            return Ok(StoreOutcome::Exists(revision));
        }

        let tmp_path = self.p.join(format!(".{}.tmp", key.file_safe()));
        let str_path = full_path.display().to_string();
        fs::write(&tmp_path, &value)
            .and_then(|_| fs::rename(&tmp_path, &full_path))
            .context(str_path)
            .map_err(a_to_fs_err)?;
        tracing::trace!(path = %full_path.display(), revision, "FileStore wrote record");
        Ok(StoreOutcome::Created(revision))
    }

    /// Read a file from the directory
    async fn get(&self, key: &Key) -> Result<Option<bytes::Bytes>, StoreError> {
        let full_path = self.p.join(key.file_safe());
        if !full_path.exists() {
            return Ok(None);
        }
        let str_path = full_path.display().to_string();
        let data: bytes::Bytes = fs::read(&full_path)
            .context(str_path)
            .map_err(a_to_fs_err)?
            .into();
        Ok(Some(data))
    }

    /// Delete a file from the directory
    async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        let full_path = self.p.join(key.file_safe());
        let str_path = full_path.display().to_string();
        if !full_path.exists() {
            return Err(StoreError::MissingKey(str_path));
        }
        fs::remove_file(&full_path)
            .context(str_path)
            .map_err(a_to_fs_err)
    }

    async fn entries(&self) -> Result<HashMap<String, bytes::Bytes>, StoreError> {
        let contents = fs::read_dir(&self.p)
            .with_context(|| self.p.display().to_string())
            .map_err(a_to_fs_err)?;
        let mut out = HashMap::new();
        for entry in contents {
            let entry = entry.map_err(to_fs_err)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !entry.path().is_file() || name.starts_with('.') {
                tracing::warn!(
                    path = %entry.path().display(),
                    "Unexpected entry, directory should only contain record files."
                );
                continue;
            }
            let data: bytes::Bytes = fs::read(entry.path())
                .with_context(|| entry.path().display().to_string())
                .map_err(a_to_fs_err)?
                .into();
            out.insert(name.replace('_', "/"), data);
        }
        Ok(out)
    }
}

// For anyhow preserve the context
fn a_to_fs_err(err: anyhow::Error) -> StoreError {
    StoreError::FilesystemError(format!("{err:#}"))
}

fn to_fs_err<E: std::error::Error>(err: E) -> StoreError {
    StoreError::FilesystemError(err.to_string())
}
