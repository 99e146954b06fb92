// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Process start: from a [`ServiceConfig`] to a running server.

use std::sync::Arc;

use anyhow::Context;
use modelhost_runtime::storage::key_value_store::{Manager, Selector};
use modelhost_runtime::{CancellationToken, ServiceConfig};

use crate::assignment::AssignmentStore;
use crate::dispatch::PredictDispatcher;
use crate::grpc::service::{ModelhostService, ModelhostServiceConfig, State};
use crate::lifecycle::ModelLifecycleCoordinator;
use crate::path;
use crate::predictor::{ModelSlot, Predictor};
use crate::protocols::wire;
use crate::service_log::TracingServiceLogger;
use crate::storage;

/// Build the serving state for `predictor`.
///
/// The model recorded for this service (or `model_path` on first boot) is
/// fetched and loaded. On first boot a model that cannot be loaded is logged
/// and the service starts without one, so a working model can still be
/// uploaded and switched to. Once a model has been assigned, failing to load
/// it is an error and the process exits for its supervisor to restart.
pub async fn prepare<P: Predictor>(config: &ServiceConfig, predictor: P) -> anyhow::Result<State<P>> {
    let storage = storage::from_config(&config.storage).context("building storage backend")?;
    let manager = Manager::from_selector(&Selector::from(&config.assignment_store));
    let assignments = AssignmentStore::new(manager, config.service_id.clone());
    let assignment = assignments
        .load_or_create(&config.model_path)
        .await
        .context("reading model assignment")?;

    let predictor = Arc::new(predictor);
    let models = Arc::new(ModelSlot::new());
    let lifecycle = ModelLifecycleCoordinator::new(
        predictor.clone(),
        models.clone(),
        storage,
        assignments,
        config.reload_mode,
        config.model_dir.clone(),
        config.eval_dir.clone(),
    );

    match load_assigned(&lifecycle, &assignment.model_path).await {
        Ok(()) if assignment.first_boot => {
            lifecycle
                .assignments()
                .assign(&assignment.model_path)
                .await
                .context("recording first boot")?;
        }
        Ok(()) => {}
        Err(err) if assignment.first_boot => {
            tracing::error!(
                model_path = %assignment.model_path,
                error = %format!("{err:#}"),
                "Could not load the default model on first boot, serving without one"
            );
        }
        Err(err) => {
            return Err(err.context(format!(
                "loading assigned model {}",
                assignment.model_path
            )));
        }
    }

    let service_log = Arc::new(TracingServiceLogger::new(
        config.application_name.clone(),
        config.service_level,
    ));
    let dispatcher = PredictDispatcher::new(predictor, models, service_log);
    let info = wire::ServiceInfoResponse {
        application_name: config.application_name.clone(),
        service_name: config.service_id.clone(),
        service_level: config.service_level.to_string(),
    };
    Ok(State::new(dispatcher, lifecycle, info))
}

async fn load_assigned<P: Predictor>(
    lifecycle: &ModelLifecycleCoordinator<P>,
    model_path: &str,
) -> anyhow::Result<()> {
    let model = path::validate(model_path)?;
    let local = lifecycle.fetch_model(&model).await?;
    lifecycle.load_model(local).await?;
    Ok(())
}

/// Serve `predictor` until `cancel_token` is cancelled
pub async fn serve<P: Predictor>(
    config: ServiceConfig,
    predictor: P,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    tracing::info!(%config, "Starting service");
    let state = prepare(&config, predictor).await?;
    let service = ModelhostServiceConfig::builder()
        .host(config.host.clone())
        .port(config.port)
        .concurrency_limit(config.concurrency_limit)
        .build(state)?;
    service.run(cancel_token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::echo::EchoPredictor;
    use modelhost_runtime::config::{AssignmentStoreConfig, AssignmentStoreMode};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> ServiceConfig {
        ServiceConfig::builder()
            .application_name("echo")
            .service_id("svc-boot")
            .model_path("default/model.txt")
            .model_dir(dir.path().join("model"))
            .eval_dir(dir.path().join("eval"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_prepare_loads_default_model() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        std::fs::create_dir_all(dir.path().join("model/default")).unwrap();
        std::fs::write(dir.path().join("model/default/model.txt"), "echo-1").unwrap();

        let state = prepare(&config, EchoPredictor).await.unwrap();
        assert_eq!(state.info().application_name, "echo");
        assert_eq!(state.info().service_name, "svc-boot");
        let assignment = state
            .lifecycle()
            .assignments()
            .current()
            .await
            .unwrap()
            .unwrap();
        assert!(!assignment.first_boot);
        assert_eq!(assignment.model_path, "default/model.txt");
    }

    #[tokio::test]
    async fn test_prepare_fails_for_missing_assigned_model() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.assignment_store = AssignmentStoreConfig {
            mode: AssignmentStoreMode::File,
            root: Some(dir.path().join("assignments")),
        };

        let assignments = AssignmentStore::new(
            Manager::from_selector(&Selector::from(&config.assignment_store)),
            config.service_id.clone(),
        );
        assignments.load_or_create(&config.model_path).await.unwrap();
        let (assignment, _) = assignments.assign("gone/model.txt").await.unwrap();
        assert!(!assignment.first_boot);

        let err = prepare(&config, EchoPredictor).await.unwrap_err();
        assert!(format!("{err:#}").contains("gone/model.txt"));
    }

    #[tokio::test]
    async fn test_prepare_without_model() {
        let dir = TempDir::new().unwrap();
        let state = prepare(&config(&dir), EchoPredictor).await.unwrap();
        let assignment = state
            .lifecycle()
            .assignments()
            .current()
            .await
            .unwrap()
            .unwrap();
        assert!(assignment.first_boot);

        let output: wire::StringOutput = state
            .dispatcher()
            .predict(wire::StringInput {
                input: "x".into(),
                option: None,
            })
            .await;
        assert_eq!(output.output, "None");
    }
}
