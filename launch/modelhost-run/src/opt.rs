// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// The predictors this binary can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorKind {
    /// Answers every request with its input
    Echo,
}

impl TryFrom<&str> for PredictorKind {
    type Error = anyhow::Error;

    fn try_from(s: &str) -> anyhow::Result<Self> {
        match s {
            "echo" => Ok(PredictorKind::Echo),
            e => Err(anyhow::anyhow!(
                "Invalid predictor '{e}', available: {}",
                PredictorKind::available().join(", ")
            )),
        }
    }
}

impl fmt::Display for PredictorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            PredictorKind::Echo => "echo",
        };
        write!(f, "{s}")
    }
}

impl PredictorKind {
    pub fn available() -> Vec<String> {
        vec![PredictorKind::Echo.to_string()]
    }
}
