// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The application seam: what a served model must provide, and the slot
//! holding the model currently in use.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::protocols::{EvaluateMetrics, EvaluationDetail, Options, PredictResult, TypedValue};

/// Receives evaluation details one at a time as they are produced
pub type DetailSink<'a> = dyn FnMut(EvaluationDetail) -> anyhow::Result<()> + 'a;

/// A served application.
///
/// All methods are called from blocking worker threads. Errors and panics
/// from [`Predictor::predict`] never reach the client; they are replaced by a
/// fallback value of the requested shape.
pub trait Predictor: Send + Sync + 'static {
    type Model: Send + Sync + 'static;

    /// Load a model file
    fn load_model(&self, path: &Path) -> anyhow::Result<Self::Model>;

    fn predict(
        &self,
        model: &Self::Model,
        input: &TypedValue,
        options: &Options,
    ) -> anyhow::Result<PredictResult>;

    /// Evaluate `model` on the dataset at `data_path`, handing every detail
    /// to `sink` in dataset order. An error from `sink` must abort the run.
    fn evaluate(
        &self,
        model: &Self::Model,
        data_path: &Path,
        sink: &mut DetailSink<'_>,
    ) -> anyhow::Result<EvaluateMetrics>;
}

/// A model together with the file it was loaded from
#[derive(Debug)]
pub struct LoadedModel<M> {
    pub path: PathBuf,
    pub model: M,
}

/// Holds the active model. Readers take a snapshot that stays valid while a
/// switch installs a replacement.
#[derive(Debug)]
pub struct ModelSlot<M> {
    current: ArcSwapOption<LoadedModel<M>>,
}

impl<M> Default for ModelSlot<M> {
    fn default() -> Self {
        ModelSlot {
            current: ArcSwapOption::empty(),
        }
    }
}

impl<M> ModelSlot<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<Arc<LoadedModel<M>>> {
        self.current.load_full()
    }

    pub fn install(&self, path: PathBuf, model: M) {
        self.current.store(Some(Arc::new(LoadedModel { path, model })));
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_survives_switch() {
        let slot = ModelSlot::new();
        assert!(!slot.is_loaded());
        slot.install(PathBuf::from("a"), 1u32);
        let before = slot.snapshot().unwrap();
        slot.install(PathBuf::from("b"), 2u32);
        assert_eq!(before.model, 1);
        assert_eq!(before.path, PathBuf::from("a"));
        assert_eq!(slot.snapshot().unwrap().model, 2);
    }
}
