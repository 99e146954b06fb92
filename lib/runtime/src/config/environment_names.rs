// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Environment variable name constants.
//!
//! Variables are grouped by functional area:
//! - **Logging**: log level, configuration file and output format
//! - **Service**: the serving process configuration (`MODELHOST_*`)
//! - **Storage**: S3-compatible object store credentials

/// Logging environment variables
pub mod logging {
    /// Log filter directives (e.g., "debug", "modelhost_serving=trace")
    pub const MODELHOST_LOG: &str = "MODELHOST_LOG";

    /// Path to logging configuration file
    pub const MODELHOST_LOGGING_CONFIG_PATH: &str = "MODELHOST_LOGGING_CONFIG_PATH";

    /// Enable JSONL logging format
    pub const MODELHOST_LOGGING_JSONL: &str = "MODELHOST_LOGGING_JSONL";

    /// Disable ANSI terminal colors in logs
    pub const MODELHOST_SDK_DISABLE_ANSI_LOGGING: &str = "MODELHOST_SDK_DISABLE_ANSI_LOGGING";

    /// Use local timezone for logging timestamps (default is UTC)
    pub const MODELHOST_LOG_USE_LOCAL_TZ: &str = "MODELHOST_LOG_USE_LOCAL_TZ";
}

/// Service configuration environment variables
///
/// Every field of [`crate::config::ServiceConfig`] can be set with the `MODELHOST_` prefix.
/// Nested tables use a double underscore, e.g. `MODELHOST_STORAGE__BUCKET`.
pub mod service {
    pub const PREFIX: &str = "MODELHOST_";

    pub const MODELHOST_APPLICATION_NAME: &str = "MODELHOST_APPLICATION_NAME";
    pub const MODELHOST_SERVICE_ID: &str = "MODELHOST_SERVICE_ID";
    pub const MODELHOST_SERVICE_LEVEL: &str = "MODELHOST_SERVICE_LEVEL";
    pub const MODELHOST_HOST: &str = "MODELHOST_HOST";
    pub const MODELHOST_PORT: &str = "MODELHOST_PORT";
    pub const MODELHOST_MODEL_PATH: &str = "MODELHOST_MODEL_PATH";
    pub const MODELHOST_MODEL_DIR: &str = "MODELHOST_MODEL_DIR";
    pub const MODELHOST_EVAL_DIR: &str = "MODELHOST_EVAL_DIR";
    pub const MODELHOST_RELOAD_MODE: &str = "MODELHOST_RELOAD_MODE";
    pub const MODELHOST_CONCURRENCY_LIMIT: &str = "MODELHOST_CONCURRENCY_LIMIT";

    /// Path to an additional service configuration file
    pub const MODELHOST_CONFIG_PATH: &str = "MODELHOST_CONFIG_PATH";
}

/// S3-compatible object store credentials, read by the storage backend
pub mod storage {
    pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
    pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
    pub const AWS_REGION: &str = "AWS_REGION";
    pub const AWS_ENDPOINT: &str = "AWS_ENDPOINT";
    pub const AWS_ALLOW_HTTP: &str = "AWS_ALLOW_HTTP";
}
