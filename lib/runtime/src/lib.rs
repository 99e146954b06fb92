// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Modelhost runtime: configuration, logging, durable service state and
//! process lifecycle shared by the serving crates.

pub use anyhow::{
    Context as ErrorContext, Error, Ok as OK, Result, anyhow as error, bail as raise,
};

pub mod config;
pub use config::{ReloadMode, ServiceConfig, ServiceLevel, StorageConfig, StorageMode};

pub mod logging;
pub mod storage;
pub mod worker;

pub use tokio_util::sync::CancellationToken;
pub use worker::Worker;
