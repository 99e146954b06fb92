// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Prediction audit log.

use modelhost_runtime::config::is_truthy;
use serde_json::Value;

use crate::protocols::{Options, PredictResult, TypedValue};

/// `tracing` target of prediction audit events
pub const SERVICE_LOG_TARGET: &str = "modelhost::service";

/// Option key that blanks inputs and outputs in the audit log
pub const SUPPRESS_LOG_INOUT: &str = "suppress_log_inout";

/// One prediction as seen by the audit log
#[derive(Debug, Clone, Copy)]
pub struct ServiceLogEntry<'a> {
    pub input: &'a TypedValue,
    pub options: &'a Options,
    pub output: &'a PredictResult,
    pub suppress_log_inout: bool,
}

impl ServiceLogEntry<'_> {
    pub fn ml_input(&self) -> String {
        if self.suppress_log_inout {
            return String::new();
        }
        serde_json::json!({ "input": self.input, "option": self.options }).to_string()
    }

    pub fn ml_output(&self) -> String {
        if self.suppress_log_inout {
            return String::new();
        }
        serde_json::to_string(self.output).unwrap_or_default()
    }
}

/// Sink for prediction audit records. Implementations must not fail the
/// prediction: errors are theirs to swallow.
pub trait ServiceLogger: Send + Sync {
    fn emit(&self, entry: &ServiceLogEntry<'_>);
}

/// Emits audit records as `tracing` events on [`SERVICE_LOG_TARGET`]
#[derive(Debug, Clone)]
pub struct TracingServiceLogger {
    ml_service: String,
    service_level: String,
}

impl TracingServiceLogger {
    pub fn new(ml_service: impl Into<String>, service_level: impl ToString) -> Self {
        TracingServiceLogger {
            ml_service: ml_service.into(),
            service_level: service_level.to_string(),
        }
    }
}

impl ServiceLogger for TracingServiceLogger {
    fn emit(&self, entry: &ServiceLogEntry<'_>) {
        tracing::info!(
            target: SERVICE_LOG_TARGET,
            ml_service = %self.ml_service,
            service_level = %self.service_level,
            ml_input = %entry.ml_input(),
            ml_output = %entry.ml_output(),
            "prediction result."
        );
    }
}

/// True when the options ask to keep inputs and outputs out of the audit log
pub fn suppress_log_inout(options: &Options) -> bool {
    match options.get(SUPPRESS_LOG_INOUT) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => is_truthy(s),
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}
