// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The durable record of which model a service runs.

use modelhost_runtime::storage::key_value_store::{Key, Manager, StoreError, StoreOutcome, Versioned};
use serde::{Deserialize, Serialize};

pub const ASSIGNMENT_BUCKET: &str = "v1/model_assignment";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAssignment {
    pub service_id: String,
    pub model_path: String,
    /// Set when the record was created by a booting service that has not
    /// loaded its model yet
    pub first_boot: bool,
    #[serde(default)]
    pub revision: u64,
}

impl Versioned for ModelAssignment {
    fn revision(&self) -> u64 {
        self.revision
    }

    fn set_revision(&mut self, r: u64) {
        self.revision = r;
    }
}

/// Model assignment of one service, stored under its service id
#[derive(Debug, Clone)]
pub struct AssignmentStore {
    manager: Manager,
    service_id: String,
    key: Key,
}

impl AssignmentStore {
    pub fn new(manager: Manager, service_id: impl Into<String>) -> Self {
        let service_id = service_id.into();
        AssignmentStore {
            manager,
            key: Key::new(service_id.clone()),
            service_id,
        }
    }

    pub async fn current(&self) -> Result<Option<ModelAssignment>, StoreError> {
        self.manager.load(ASSIGNMENT_BUCKET, &self.key).await
    }

    /// The stored assignment, or a new first-boot record for `default_model_path`
    pub async fn load_or_create(&self, default_model_path: &str) -> Result<ModelAssignment, StoreError> {
        if let Some(assignment) = self.current().await? {
            return Ok(assignment);
        }
        let mut assignment = ModelAssignment {
            service_id: self.service_id.clone(),
            model_path: default_model_path.to_string(),
            first_boot: true,
            revision: 1,
        };
        self.manager
            .publish(ASSIGNMENT_BUCKET, &self.key, &mut assignment)
            .await?;
        tracing::info!(service_id = %self.service_id, model_path = default_model_path, "Created model assignment");
        Ok(assignment)
    }

    /// Point the service at `model_path`. Assigning the current model again
    /// writes nothing. Returns the record and whether it changed.
    pub async fn assign(&self, model_path: &str) -> Result<(ModelAssignment, bool), StoreError> {
        let current = self.current().await?;
        if let Some(current) = &current {
            if current.model_path == model_path && !current.first_boot {
                return Ok((current.clone(), false));
            }
        }
        let mut assignment = ModelAssignment {
            service_id: self.service_id.clone(),
            model_path: model_path.to_string(),
            first_boot: false,
            revision: current.map(|c| c.revision + 1).unwrap_or(1),
        };
        let outcome = self
            .manager
            .publish(ASSIGNMENT_BUCKET, &self.key, &mut assignment)
            .await?;
        tracing::debug!(service_id = %self.service_id, model_path, %outcome, "Updated model assignment");
        Ok((assignment, matches!(outcome, StoreOutcome::Created(_))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_boot_record() {
        let store = AssignmentStore::new(Manager::memory(), "svc-1");
        assert!(store.current().await.unwrap().is_none());

        let created = store.load_or_create("default/model.bin").await.unwrap();
        assert!(created.first_boot);
        assert_eq!(created.model_path, "default/model.bin");

        // A second boot sees the stored record
        let again = store.load_or_create("other.bin").await.unwrap();
        assert_eq!(again, created);
    }

    #[tokio::test]
    async fn test_assign_is_idempotent() {
        let store = AssignmentStore::new(Manager::memory(), "svc-1");
        store.load_or_create("a.bin").await.unwrap();

        let (first, changed) = store.assign("b.bin").await.unwrap();
        assert!(changed);
        assert!(!first.first_boot);

        let (second, changed) = store.assign("b.bin").await.unwrap();
        assert!(!changed);
        assert_eq!(second, first);
        assert_eq!(store.current().await.unwrap().unwrap().model_path, "b.bin");
    }

    #[tokio::test]
    async fn test_assign_clears_first_boot() {
        let store = AssignmentStore::new(Manager::memory(), "svc-1");
        store.load_or_create("a.bin").await.unwrap();
        let (assignment, changed) = store.assign("a.bin").await.unwrap();
        assert!(changed);
        assert!(!assignment.first_boot);
        assert_eq!(assignment.revision, 2);
    }
}
