// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

pub mod predict;
pub mod typed_value;
pub mod wire;

pub use typed_value::{
    EvaluateMetrics, EvaluationDetail, Options, PredictResult, Score, Tag, TypedValue,
};
