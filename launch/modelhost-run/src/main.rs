// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;

use modelhost_run::{Flags, PredictorKind};
use modelhost_runtime::{Worker, logging};

const HELP: &str = r#"
modelhost-run is a single binary that serves a predictor over the modelhost gRPC protocol.

Example:
- modelhost-run --predictor echo --port 5000 --model-path default/model.txt

Settings are read from /opt/modelhost/etc/service.toml, then --config, then MODELHOST_* environment variables, then flags.
"#;

fn main() -> anyhow::Result<()> {
    logging::init();

    let flags = Flags::try_parse().map_err(|e| {
        let _ = e.print();
        println!("{HELP}");
        anyhow::anyhow!("Invalid arguments")
    })?;
    let kind = PredictorKind::try_from(flags.predictor.as_str())?;
    let config = modelhost_run::service_config(&flags)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        Worker::from_config(&config)
            .execute(move |token| modelhost_run::run(kind, config, token))
            .await
    })
}
