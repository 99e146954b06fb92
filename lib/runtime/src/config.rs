// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use derive_builder::Builder;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use validator::Validate;

pub mod environment_names;

/// Default bind address of the gRPC server
const DEFAULT_HOST: &str = "127.0.0.1";

/// Default gRPC port
const DEFAULT_PORT: u16 = 5000;

/// Model file loaded on first boot, relative to the model directory
const DEFAULT_MODEL_PATH: &str = "model/default.model";

/// Local directory for model files
const DEFAULT_MODEL_DIR: &str = "modelhost-model";

/// Local directory for evaluation datasets and results
const DEFAULT_EVAL_DIR: &str = "modelhost-eval";

/// Maximum number of concurrent requests per connection
const DEFAULT_CONCURRENCY_LIMIT: usize = 32;

/// System-wide configuration file, lower priority than the environment
const SYSTEM_CONFIG_PATH: &str = "/opt/modelhost/etc/service.toml";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceLevel {
    #[default]
    Development,
    Beta,
    Staging,
    Sandbox,
    Production,
}

impl fmt::Display for ServiceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceLevel::Development => "development",
            ServiceLevel::Beta => "beta",
            ServiceLevel::Staging => "staging",
            ServiceLevel::Sandbox => "sandbox",
            ServiceLevel::Production => "production",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ServiceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(ServiceLevel::Development),
            "beta" => Ok(ServiceLevel::Beta),
            "staging" => Ok(ServiceLevel::Staging),
            "sandbox" => Ok(ServiceLevel::Sandbox),
            "production" => Ok(ServiceLevel::Production),
            other => Err(format!("Invalid service level '{other}'")),
        }
    }
}

/// What happens to the running predictor after a successful model switch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReloadMode {
    /// Load the new model and swap it in without restarting
    #[default]
    InProcess,
    /// Only record the assignment; the orchestrator restarts the process
    External,
}

impl FromStr for ReloadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "in_process" => Ok(ReloadMode::InProcess),
            "external" => Ok(ReloadMode::External),
            other => Err(format!("Invalid reload mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Files must already be present locally; uploads stay local
    #[default]
    Local,
    /// In-process object store, lost on exit
    Memory,
    /// Object store rooted at a local directory
    Filesystem,
    /// S3-compatible object store
    S3,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub mode: StorageMode,

    /// Root directory for [`StorageMode::Filesystem`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible stores such as Ceph or MinIO
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    pub allow_http: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStoreMode {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AssignmentStoreConfig {
    pub mode: AssignmentStoreMode,

    /// Root directory for [`AssignmentStoreMode::File`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

/// Service configuration
///
/// Loaded in order of increasing priority from built-in defaults,
/// `/opt/modelhost/etc/service.toml`, an optional TOML file, and `MODELHOST_*`
/// environment variables.
#[derive(Serialize, Deserialize, Validate, Debug, Builder, Clone)]
#[builder(build_fn(private, name = "build_internal"), derive(Debug, Serialize))]
pub struct ServiceConfig {
    /// Name of the application served by this process
    #[validate(length(min = 1))]
    #[builder(setter(into), default = "\"modelhost\".to_string()")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub application_name: String,

    /// Unique id of this service; keys the model assignment record.
    /// Defaults to a random UUID.
    #[validate(length(min = 1))]
    #[builder(setter(into), default = "new_service_id()")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub service_id: String,

    #[builder(default)]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub service_level: ServiceLevel,

    #[builder(setter(into), default = "DEFAULT_HOST.to_string()")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub host: String,

    #[validate(range(min = 1))]
    #[builder(default = "DEFAULT_PORT")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub port: u16,

    /// Model used when no assignment has been recorded yet
    #[validate(length(min = 1))]
    #[builder(setter(into), default = "DEFAULT_MODEL_PATH.to_string()")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub model_path: String,

    #[builder(setter(into), default = "PathBuf::from(DEFAULT_MODEL_DIR)")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub model_dir: PathBuf,

    #[builder(setter(into), default = "PathBuf::from(DEFAULT_EVAL_DIR)")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub eval_dir: PathBuf,

    #[builder(default)]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub storage: StorageConfig,

    #[builder(default)]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub assignment_store: AssignmentStoreConfig,

    #[builder(default)]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub reload_mode: ReloadMode,

    #[validate(range(min = 1))]
    #[builder(default = "DEFAULT_CONCURRENCY_LIMIT")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub concurrency_limit: usize,

    /// Seconds to wait for in-flight requests on shutdown
    #[builder(default = "default_graceful_shutdown_timeout()")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub graceful_shutdown_timeout: u64,
}

fn new_service_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn default_graceful_shutdown_timeout() -> u64 {
    if cfg!(debug_assertions) { 1 } else { 30 }
}

impl fmt::Display for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "application_name={}, ", self.application_name)?;
        write!(f, "service_id={}, ", self.service_id)?;
        write!(f, "service_level={}, ", self.service_level)?;
        write!(f, "address={}:{}, ", self.host, self.port)?;
        write!(f, "model_path={}, ", self.model_path)?;
        write!(f, "model_dir={}, ", self.model_dir.display())?;
        write!(f, "eval_dir={}, ", self.eval_dir.display())?;
        write!(f, "storage={:?}, ", self.storage.mode)?;
        write!(f, "assignment_store={:?}, ", self.assignment_store.mode)?;
        write!(f, "reload_mode={:?}", self.reload_mode)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            application_name: "modelhost".to_string(),
            service_id: new_service_id(),
            service_level: ServiceLevel::default(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model_path: DEFAULT_MODEL_PATH.to_string(),
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            eval_dir: PathBuf::from(DEFAULT_EVAL_DIR),
            storage: StorageConfig::default(),
            assignment_store: AssignmentStoreConfig::default(),
            reload_mode: ReloadMode::default(),
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            graceful_shutdown_timeout: default_graceful_shutdown_timeout(),
        }
    }
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    pub(crate) fn figment(config_file: Option<&Path>) -> Figment {
        use environment_names::service::PREFIX;

        let mut figment = Figment::new()
            .merge(Serialized::defaults(ServiceConfig::default()))
            .merge(Toml::file(SYSTEM_CONFIG_PATH));
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(
            Env::prefixed(PREFIX)
                .filter_map(|k| {
                    let full_key = format!("{PREFIX}{}", k.as_str());
                    // filters out empty environment variables
                    match std::env::var(&full_key) {
                        Ok(v) if !v.is_empty() => Some(k.into()),
                        _ => None,
                    }
                })
                .split("__"),
        )
    }

    /// Load the service configuration from files and the environment.
    ///
    /// `config_file` falls back to `MODELHOST_CONFIG_PATH` when not given.
    pub fn from_settings(config_file: Option<&Path>) -> Result<ServiceConfig> {
        let env_file = std::env::var(environment_names::service::MODELHOST_CONFIG_PATH)
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let config_file = config_file.map(Path::to_path_buf).or(env_file);

        let config: ServiceConfig = Self::figment(config_file.as_deref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Address the gRPC server binds to
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ServiceConfigBuilder {
    /// Build and validate the service configuration
    pub fn build(&self) -> Result<ServiceConfig> {
        let config = self.build_internal()?;
        config.validate()?;
        Ok(config)
    }
}

/// Check if a string is truthy
/// This will be used to evaluate environment variables or any other subjective
/// configuration parameters that can be set by the user that should be evaluated
/// as a boolean value.
pub fn is_truthy(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "1" | "true" | "on" | "yes")
}

/// Check if a string is falsey (opposite of [`is_truthy`]).
pub fn is_falsey(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "0" | "false" | "off" | "no")
}

pub fn parse_bool(val: &str) -> anyhow::Result<bool> {
    if is_truthy(val) {
        Ok(true)
    } else if is_falsey(val) {
        Ok(false)
    } else {
        anyhow::bail!(
            "Invalid boolean value: '{}'. Expected one of: true/false, 1/0, on/off, yes/no",
            val
        )
    }
}

/// Check if an environment variable is truthy
pub fn env_is_truthy(env: &str) -> bool {
    match std::env::var(env) {
        Ok(val) => is_truthy(val.as_str()),
        Err(_) => false,
    }
}

/// Check whether JSONL logging enabled
/// Set the `MODELHOST_LOGGING_JSONL` environment variable a [`is_truthy`] value
pub fn jsonl_logging_enabled() -> bool {
    env_is_truthy(environment_names::logging::MODELHOST_LOGGING_JSONL)
}

/// Check whether logging with ANSI terminal escape codes and colors is disabled.
pub fn disable_ansi_logging() -> bool {
    env_is_truthy(environment_names::logging::MODELHOST_SDK_DISABLE_ANSI_LOGGING)
}

/// Check whether to use local timezone for logging timestamps (default is UTC)
pub fn use_local_timezone() -> bool {
    env_is_truthy(environment_names::logging::MODELHOST_LOG_USE_LOCAL_TZ)
}
