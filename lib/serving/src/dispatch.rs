// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Predict dispatch.
//!
//! The dispatcher runs the application's predictor on the blocking pool and
//! never lets a predictor failure reach the caller: errors, panics, a missing
//! model and labels of the wrong shape are all answered with the fallback
//! value of the declared output shape.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use crate::predictor::{ModelSlot, Predictor};
use crate::protocols::predict::{PredictInput, PredictOutput};
use crate::protocols::{Options, PredictResult, TypedValue};
use crate::service_log::{ServiceLogEntry, ServiceLogger, suppress_log_inout};

pub mod any;

/// Parse the request's option string.
///
/// An empty string is an empty map. Anything that is not a JSON object is
/// kept verbatim as `{raw: raw}` instead of failing the call.
pub fn parse_options(raw: &str) -> Options {
    if raw.trim().is_empty() {
        return Options::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(options)) => options,
        _ => {
            let mut options = Options::new();
            options.insert(raw.to_string(), Value::String(raw.to_string()));
            options
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

pub struct PredictDispatcher<P: Predictor> {
    predictor: Arc<P>,
    models: Arc<ModelSlot<P::Model>>,
    service_log: Arc<dyn ServiceLogger>,
}

impl<P: Predictor> Clone for PredictDispatcher<P> {
    fn clone(&self) -> Self {
        PredictDispatcher {
            predictor: self.predictor.clone(),
            models: self.models.clone(),
            service_log: self.service_log.clone(),
        }
    }
}

impl<P: Predictor> PredictDispatcher<P> {
    pub fn new(
        predictor: Arc<P>,
        models: Arc<ModelSlot<P::Model>>,
        service_log: Arc<dyn ServiceLogger>,
    ) -> Self {
        PredictDispatcher {
            predictor,
            models,
            service_log,
        }
    }

    /// Run one fixed-shape prediction
    pub async fn predict<I: PredictInput, O: PredictOutput>(&self, request: I) -> O {
        let (input, raw_options) = request.into_parts();
        let input = Arc::new(input);
        let options = Arc::new(parse_options(&raw_options));

        let mut result = match self.invoke(&input, &options).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(
                    input = %I::TAG,
                    output = %O::TAG,
                    error = %format!("{err:#}"),
                    "Prediction failed, returning fallback"
                );
                O::TAG.fallback()
            }
        };
        result.label = result.label.widen_to(O::TAG);
        if result.label.tag() != O::TAG {
            tracing::error!(
                expected = %O::TAG,
                actual = %result.label.tag(),
                "Prediction label has the wrong shape, returning fallback"
            );
            result = O::TAG.fallback();
        }

        self.log(&input, &options, &result);
        O::marshal(result).unwrap_or_default()
    }

    /// Call the predictor against the current model snapshot
    async fn invoke(
        &self,
        input: &Arc<TypedValue>,
        options: &Arc<Options>,
    ) -> anyhow::Result<PredictResult> {
        let Some(model) = self.models.snapshot() else {
            anyhow::bail!("No model is loaded");
        };
        let predictor = self.predictor.clone();
        let input = input.clone();
        let options = options.clone();
        tokio::task::spawn_blocking(move || {
            panic::catch_unwind(AssertUnwindSafe(|| {
                predictor.predict(&model.model, &input, &options)
            }))
            .unwrap_or_else(|payload| {
                Err(anyhow::anyhow!(
                    "Predictor panicked: {}",
                    panic_message(payload.as_ref())
                ))
            })
        })
        .await?
    }

    fn log(&self, input: &TypedValue, options: &Options, output: &PredictResult) {
        let entry = ServiceLogEntry {
            input,
            options,
            output,
            suppress_log_inout: suppress_log_inout(options),
        };
        if panic::catch_unwind(AssertUnwindSafe(|| self.service_log.emit(&entry))).is_err() {
            tracing::warn!("Service logger panicked, audit record dropped");
        }
    }
}
