// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use modelhost_runtime::{CancellationToken, ServiceConfig};
use modelhost_serving::bootstrap;
use modelhost_serving::echo::EchoPredictor;

mod flags;
pub use flags::Flags;
mod opt;
pub use opt::PredictorKind;

/// Merge the flags into the loaded configuration and validate the result
pub fn service_config(flags: &Flags) -> anyhow::Result<ServiceConfig> {
    let mut config = ServiceConfig::from_settings(flags.config.as_deref())?;
    flags.apply(&mut config);
    if config.port == 0 {
        anyhow::bail!("--port must be greater than zero");
    }
    if config.application_name.is_empty() || config.model_path.is_empty() {
        anyhow::bail!("application name and model path must not be empty");
    }
    Ok(config)
}

pub async fn run(
    kind: PredictorKind,
    config: ServiceConfig,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    tracing::info!(predictor = %kind, "Serving");
    match kind {
        PredictorKind::Echo => bootstrap::serve(config, EchoPredictor, cancel_token).await,
    }
}
