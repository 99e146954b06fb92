// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Model and dataset lifecycle: upload, switch, evaluate and read back.
//!
//! Every operation validates the client's paths before touching the
//! filesystem or storage. Models live below `model_dir` and are stored under
//! `model/<path>`; datasets and evaluation results live below `eval_dir` and
//! are stored under `eval/<path>`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use modelhost_runtime::ReloadMode;

use crate::assignment::{AssignmentStore, ModelAssignment};
use crate::errors::ServingError;
use crate::evaluation::results::{self, DetailWriter, ResultFiles};
use crate::evaluation::{StreamError, stream_results};
use crate::path::{self, ValidPath};
use crate::predictor::{ModelSlot, Predictor};
use crate::protocols::wire;
use crate::protocols::{EvaluateMetrics, EvaluationDetail};
use crate::storage::{StorageBackend, StorageError};
use crate::transfer::{
    ChunkedFileReceiver, DEFAULT_FRAGMENT_SIZE, FileFragment, ReceivedFile, TransferError, send_file,
};

const MODEL_PREFIX: &str = "model";
const EVAL_PREFIX: &str = "eval";

pub struct ModelLifecycleCoordinator<P: Predictor> {
    predictor: Arc<P>,
    models: Arc<ModelSlot<P::Model>>,
    storage: Arc<dyn StorageBackend>,
    assignments: AssignmentStore,
    reload_mode: ReloadMode,
    model_files: ChunkedFileReceiver,
    eval_files: ChunkedFileReceiver,
}

impl<P: Predictor> fmt::Debug for ModelLifecycleCoordinator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelLifecycleCoordinator")
            .field("storage", &self.storage)
            .field("reload_mode", &self.reload_mode)
            .field("model_dir", &self.model_files.root())
            .field("eval_dir", &self.eval_files.root())
            .finish()
    }
}

impl<P: Predictor> ModelLifecycleCoordinator<P> {
    pub fn new(
        predictor: Arc<P>,
        models: Arc<ModelSlot<P::Model>>,
        storage: Arc<dyn StorageBackend>,
        assignments: AssignmentStore,
        reload_mode: ReloadMode,
        model_dir: PathBuf,
        eval_dir: PathBuf,
    ) -> Self {
        ModelLifecycleCoordinator {
            predictor,
            models,
            storage,
            assignments,
            reload_mode,
            model_files: ChunkedFileReceiver::new(model_dir),
            eval_files: ChunkedFileReceiver::new(eval_dir),
        }
    }

    pub fn model_dir(&self) -> &Path {
        self.model_files.root()
    }

    pub fn eval_dir(&self) -> &Path {
        self.eval_files.root()
    }

    pub fn assignments(&self) -> &AssignmentStore {
        &self.assignments
    }

    /// Receive a model file and copy it to storage
    pub async fn upload_model<F, E, S>(&self, fragments: S) -> Result<ReceivedFile, ServingError>
    where
        F: FileFragment,
        E: fmt::Display,
        S: Stream<Item = Result<F, E>> + Send,
    {
        let received = self.model_files.receive(fragments).await?;
        self.storage
            .upload_file(&received.key.prefixed(MODEL_PREFIX), &received.local_path)
            .await?;
        tracing::info!(path = %received.key, size = received.size, "Uploaded model");
        Ok(received)
    }

    /// Receive a dataset file and copy it to storage
    pub async fn upload_evaluation_data<F, E, S>(
        &self,
        fragments: S,
    ) -> Result<ReceivedFile, ServingError>
    where
        F: FileFragment,
        E: fmt::Display,
        S: Stream<Item = Result<F, E>> + Send,
    {
        let received = self.eval_files.receive(fragments).await?;
        self.storage
            .upload_file(&received.key.prefixed(EVAL_PREFIX), &received.local_path)
            .await?;
        tracing::info!(path = %received.key, size = received.size, "Uploaded evaluation data");
        Ok(received)
    }

    /// Make sure the model file is present locally
    pub async fn fetch_model(&self, model: &ValidPath) -> Result<PathBuf, ServingError> {
        let local = model.under(self.model_dir());
        self.storage
            .fetch_to_local(&model.prefixed(MODEL_PREFIX), &local)
            .await?;
        Ok(local)
    }

    /// Load the model file at `local` and make it the active model
    pub async fn load_model(&self, local: PathBuf) -> Result<(), ServingError> {
        let predictor = self.predictor.clone();
        let path = local.clone();
        let model = tokio::task::spawn_blocking(move || predictor.load_model(&path))
            .await
            .map_err(anyhow::Error::from)??;
        self.models.install(local.clone(), model);
        tracing::info!(path = %local.display(), "Model loaded");
        Ok(())
    }

    /// Point the service at another model.
    ///
    /// With in-process reloading the model is loaded first; a model that
    /// fails to load leaves both the assignment and the active model as they
    /// were.
    pub async fn switch_model(&self, raw_path: &str) -> Result<ModelAssignment, ServingError> {
        let model = path::validate(raw_path)?;
        let local = self.fetch_model(&model).await?;
        match self.reload_mode {
            ReloadMode::InProcess => self.load_model(local).await?,
            ReloadMode::External => {
                tracing::info!(path = %model, "Model assignment changes, waiting for an external restart");
            }
        }
        let (assignment, changed) = self.assignments.assign(model.as_str()).await?;
        if !changed {
            tracing::debug!(path = %model, "Model assignment unchanged");
        }
        Ok(assignment)
    }

    /// Evaluate the active model on a dataset and persist the run under
    /// `result_path`
    pub async fn evaluate(
        &self,
        raw_data_path: &str,
        raw_result_path: &str,
    ) -> Result<EvaluateMetrics, ServingError> {
        let data = path::validate(raw_data_path)?;
        let result = path::validate(raw_result_path)?;
        let Some(model) = self.models.snapshot() else {
            return Err(ServingError::InvalidRequest("No model is loaded".into()));
        };

        let data_local = data.under(self.eval_dir());
        self.storage
            .fetch_to_local(&data.prefixed(EVAL_PREFIX), &data_local)
            .await?;

        let files = ResultFiles::new(self.eval_dir(), &result);
        let predictor = self.predictor.clone();
        let detail_path = files.detail_path.clone();
        let metrics = tokio::task::spawn_blocking(move || -> anyhow::Result<EvaluateMetrics> {
            let mut writer = DetailWriter::create(&detail_path)?;
            let metrics = {
                let mut sink = |detail: EvaluationDetail| -> anyhow::Result<()> {
                    writer.write(&detail)?;
                    Ok(())
                };
                predictor.evaluate(&model.model, &data_local, &mut sink)?
            };
            let count = writer.finish()?;
            tracing::debug!(count, "Wrote evaluation details");
            Ok(metrics)
        })
        .await
        .map_err(anyhow::Error::from)??;

        results::write_summary(&files.summary_path, &metrics).await?;
        self.storage
            .upload_file(&files.detail_key.prefixed(EVAL_PREFIX), &files.detail_path)
            .await?;
        self.storage
            .upload_file(&files.summary_key.prefixed(EVAL_PREFIX), &files.summary_path)
            .await?;
        tracing::info!(
            data = %data,
            result = %result,
            count = metrics.count,
            accuracy = metrics.accuracy,
            "Evaluation finished"
        );
        Ok(metrics)
    }

    /// Stream a persisted evaluation run. The summary is attached to every
    /// response; a run without one gets the zero metrics.
    pub async fn fetch_result(
        &self,
        raw_data_path: &str,
        raw_result_path: &str,
    ) -> Result<BoxStream<'static, Result<wire::EvaluationResultResponse, StreamError>>, ServingError>
    {
        path::validate(raw_data_path)?;
        let result = path::validate(raw_result_path)?;
        let files = ResultFiles::new(self.eval_dir(), &result);

        self.storage
            .fetch_to_local(&files.detail_key.prefixed(EVAL_PREFIX), &files.detail_path)
            .await
            .map_err(|err| match err {
                StorageError::NotFound(_) | StorageError::NotConfigured(_) => {
                    ServingError::NotFound(format!("evaluation result {result}"))
                }
                err => err.into(),
            })?;

        let summary = self
            .storage
            .fetch_to_local(&files.summary_key.prefixed(EVAL_PREFIX), &files.summary_path)
            .await;
        let metrics = match summary {
            Ok(_) => results::read_summary(&files.summary_path).await?,
            Err(StorageError::NotFound(_) | StorageError::NotConfigured(_)) => None,
            Err(err) => return Err(err.into()),
        };
        let metrics = metrics.unwrap_or_else(|| {
            tracing::warn!(result = %result, "Evaluation summary missing, sending zero metrics");
            EvaluateMetrics::default()
        });

        Ok(stream_results(&metrics, results::read_details(files.detail_path)).boxed())
    }

    /// Stream a model file back to the client
    pub async fn download_model(
        &self,
        raw_path: &str,
    ) -> Result<BoxStream<'static, Result<wire::UploadModelRequest, TransferError>>, ServingError> {
        let model = path::validate(raw_path)?;
        let local = self.fetch_model(&model).await?;
        Ok(send_file(local, model.to_string(), DEFAULT_FRAGMENT_SIZE).boxed())
    }

    /// Stream a dataset file back to the client
    pub async fn download_evaluation_data(
        &self,
        raw_path: &str,
    ) -> Result<BoxStream<'static, Result<wire::UploadEvaluationDataRequest, TransferError>>, ServingError>
    {
        let data = path::validate(raw_path)?;
        let local = data.under(self.eval_dir());
        self.storage
            .fetch_to_local(&data.prefixed(EVAL_PREFIX), &local)
            .await?;
        Ok(send_file(local, data.to_string(), DEFAULT_FRAGMENT_SIZE).boxed())
    }
}
