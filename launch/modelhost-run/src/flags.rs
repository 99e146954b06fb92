// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use clap::Parser;
use modelhost_runtime::{ReloadMode, ServiceConfig, ServiceLevel};

/// Command line overrides. Anything left unset comes from the config file
/// and `MODELHOST_*` environment variables.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about, long_about = None)]
pub struct Flags {
    /// TOML configuration file
    #[arg(long, env = "MODELHOST_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Predictor to serve
    #[arg(long, default_value = "echo")]
    pub predictor: String,

    #[arg(long)]
    pub application_name: Option<String>,

    /// Unique id of this service, keys the model assignment
    #[arg(long)]
    pub service_id: Option<String>,

    /// development, beta, staging, sandbox or production
    #[arg(long)]
    pub service_level: Option<ServiceLevel>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Model loaded on first boot, relative to the model directory
    #[arg(long)]
    pub model_path: Option<String>,

    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    #[arg(long)]
    pub eval_dir: Option<PathBuf>,

    /// in_process or external
    #[arg(long)]
    pub reload_mode: Option<ReloadMode>,
}

impl Flags {
    /// Apply the flags that were given on top of `config`
    pub fn apply(&self, config: &mut ServiceConfig) {
        if let Some(name) = &self.application_name {
            config.application_name = name.clone();
        }
        if let Some(id) = &self.service_id {
            config.service_id = id.clone();
        }
        if let Some(level) = self.service_level {
            config.service_level = level;
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(path) = &self.model_path {
            config.model_path = path.clone();
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(dir) = &self.eval_dir {
            config.eval_dir = dir.clone();
        }
        if let Some(mode) = self.reload_mode {
            config.reload_mode = mode;
        }
    }
}
