// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Interface to a small record store holding durable service state such as the
//! active model assignment. Records are JSON documents grouped into buckets.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{AssignmentStoreConfig, AssignmentStoreMode};

mod file;
pub use file::FileStore;
mod mem;
pub use mem::MemoryStore;

/// String we use as the Key in a key-value storage operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(String);

impl Key {
    pub fn new(s: String) -> Key {
        Key(s)
    }

    /// Representation usable as a single path component
    pub fn file_safe(&self) -> String {
        self.0.replace('/', "_")
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Key {
        Key::new(s.to_string())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_or_create_bucket(
        &self,
        bucket_name: &str,
    ) -> Result<Box<dyn KeyValueBucket>, StoreError>;

    async fn get_bucket(
        &self,
        bucket_name: &str,
    ) -> Result<Option<Box<dyn KeyValueBucket>>, StoreError>;
}

/// A named collection of key/value records.
#[async_trait]
pub trait KeyValueBucket: Send + Sync {
    /// Insert or replace a value.
    ///
    /// Writing the same revision of an existing key is a no-op and reports
    /// [`StoreOutcome::Exists`]; any other write replaces the stored value.
    async fn insert(
        &self,
        key: &Key,
        value: bytes::Bytes,
        revision: u64,
    ) -> Result<StoreOutcome, StoreError>;

    /// Fetch an item from the bucket
    async fn get(&self, key: &Key) -> Result<Option<bytes::Bytes>, StoreError>;

    /// Delete an item from the bucket
    async fn delete(&self, key: &Key) -> Result<(), StoreError>;

    /// The entries in this bucket.
    async fn entries(&self) -> Result<HashMap<String, bytes::Bytes>, StoreError>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StoreOutcome {
    /// The operation succeeded and wrote this revision.
    /// Note that "create" also means update, because each new revision is a "create".
    Created(u64),
    /// The operation did not do anything, the value was already present, with this revision.
    Exists(u64),
}

impl fmt::Display for StoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOutcome::Created(revision) => write!(f, "Created at {revision}"),
            StoreOutcome::Exists(revision) => write!(f, "Exists at {revision}"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Could not find bucket '{0}'")]
    MissingBucket(String),

    #[error("Could not find key '{0}'")]
    MissingKey(String),

    #[error("Internal filesystem error: {0}")]
    FilesystemError(String),

    #[error("Error decoding bytes: {0}")]
    JSONDecodeError(#[from] serde_json::error::Error),
}

/// A trait allowing to get/set a revision on an object.
pub trait Versioned {
    fn revision(&self) -> u64;
    fn set_revision(&mut self, r: u64);
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selector {
    File(PathBuf),
    #[default]
    Memory,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::File(path) => write!(f, "File({})", path.display()),
            Selector::Memory => write!(f, "Memory"),
        }
    }
}

impl From<&AssignmentStoreConfig> for Selector {
    fn from(config: &AssignmentStoreConfig) -> Selector {
        match config.mode {
            AssignmentStoreMode::Memory => Selector::Memory,
            AssignmentStoreMode::File => Selector::File(
                config
                    .root
                    .clone()
                    .unwrap_or_else(|| std::env::temp_dir().join("modelhost_store_kv")),
            ),
        }
    }
}

#[derive(Clone)]
pub struct Manager(Arc<dyn KeyValueStore>);

impl Default for Manager {
    fn default() -> Self {
        Manager::memory()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Manager")
    }
}

impl Manager {
    /// In-memory store, for tests and single-process deployments
    pub fn memory() -> Self {
        Manager(Arc::new(MemoryStore::new()))
    }

    pub fn file<P: Into<PathBuf>>(root: P) -> Self {
        Manager(Arc::new(FileStore::new(root)))
    }

    pub fn from_selector(selector: &Selector) -> Self {
        match selector {
            Selector::Memory => Manager::memory(),
            Selector::File(root) => Manager::file(root.clone()),
        }
    }

    pub async fn get_or_create_bucket(
        &self,
        bucket_name: &str,
    ) -> Result<Box<dyn KeyValueBucket>, StoreError> {
        self.0.get_or_create_bucket(bucket_name).await
    }

    pub async fn load<T: for<'a> Deserialize<'a>>(
        &self,
        bucket: &str,
        key: &Key,
    ) -> Result<Option<T>, StoreError> {
        let Some(bucket) = self.0.get_bucket(bucket).await? else {
            // No bucket means no records
            return Ok(None);
        };
        Ok(match bucket.get(key).await? {
            Some(bytes) => Some(serde_json::from_slice(bytes.as_ref())?),
            None => None,
        })
    }

    pub async fn publish<T: Serialize + Versioned + Send + Sync>(
        &self,
        bucket_name: &str,
        key: &Key,
        obj: &mut T,
    ) -> Result<StoreOutcome, StoreError> {
        let obj_json = serde_json::to_vec(obj)?;
        let bucket = self.0.get_or_create_bucket(bucket_name).await?;

        let outcome = bucket.insert(key, obj_json.into(), obj.revision()).await?;

        match outcome {
            StoreOutcome::Created(revision) | StoreOutcome::Exists(revision) => {
                obj.set_revision(revision);
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const BUCKET_NAME: &str = "v1/assignment";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        revision: u64,
    }

    impl Versioned for Record {
        fn revision(&self) -> u64 {
            self.revision
        }

        fn set_revision(&mut self, r: u64) {
            self.revision = r;
        }
    }

    async fn exercise(manager: Manager) -> anyhow::Result<()> {
        let key = Key::from("svc/1");
        assert!(manager.load::<Record>(BUCKET_NAME, &key).await?.is_none());

        let mut record = Record {
            name: "a".to_string(),
            revision: 1,
        };
        let outcome = manager.publish(BUCKET_NAME, &key, &mut record).await?;
        assert_eq!(outcome, StoreOutcome::Created(1));

        // Same revision again is a no-op
        let outcome = manager.publish(BUCKET_NAME, &key, &mut record).await?;
        assert_eq!(outcome, StoreOutcome::Exists(1));

        record.name = "b".to_string();
        record.revision = 2;
        let outcome = manager.publish(BUCKET_NAME, &key, &mut record).await?;
        assert_eq!(outcome, StoreOutcome::Created(2));

        let loaded: Record = manager.load(BUCKET_NAME, &key).await?.unwrap();
        assert_eq!(loaded, record);

        let bucket = manager.get_or_create_bucket(BUCKET_NAME).await?;
        assert_eq!(bucket.entries().await?.len(), 1);
        bucket.delete(&key).await?;
        assert!(bucket.get(&key).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_store() -> anyhow::Result<()> {
        exercise(Manager::memory()).await
    }

    #[tokio::test]
    async fn test_file_store() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        exercise(Manager::file(dir.path())).await?;

        // Records survive a new store on the same root
        let key = Key::from("svc");
        let mut record = Record {
            name: "persisted".to_string(),
            revision: 7,
        };
        Manager::file(dir.path())
            .publish(BUCKET_NAME, &key, &mut record)
            .await?;
        let loaded: Option<Record> = Manager::file(dir.path()).load(BUCKET_NAME, &key).await?;
        assert_eq!(loaded, Some(record));
        Ok(())
    }

    #[rstest]
    #[case(AssignmentStoreMode::Memory, None, Selector::Memory)]
    #[case(
        AssignmentStoreMode::File,
        Some(PathBuf::from("/data/kv")),
        Selector::File(PathBuf::from("/data/kv"))
    )]
    fn test_selector_from_config(
        #[case] mode: AssignmentStoreMode,
        #[case] root: Option<PathBuf>,
        #[case] expected: Selector,
    ) {
        let config = AssignmentStoreConfig { mode, root };
        assert_eq!(Selector::from(&config), expected);
    }
}
