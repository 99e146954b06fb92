// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Serving protocol layer of a model host.
//!
//! A [`predictor::Predictor`] supplied by the application is exposed over two
//! gRPC services: `Worker` answers predictions through the
//! [`dispatch::PredictDispatcher`], and `Dashboard` manages models, datasets
//! and evaluation runs through the [`lifecycle::ModelLifecycleCoordinator`].

pub mod assignment;
pub mod bootstrap;
pub mod dispatch;
pub mod echo;
pub mod errors;
pub mod evaluation;
pub mod grpc;
pub mod lifecycle;
pub mod path;
pub mod predictor;
pub mod protocols;
pub mod service_log;
pub mod storage;
pub mod transfer;

pub use errors::ServingError;
pub use predictor::Predictor;
