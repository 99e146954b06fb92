// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! A [`Worker`] owns the process-level [`CancellationToken`] and turns OS
//! signals into a graceful shutdown of the application future.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;

#[derive(Debug, Clone)]
pub struct Worker {
    cancel_token: CancellationToken,
    graceful_shutdown_timeout: Duration,
}

impl Worker {
    pub fn new(graceful_shutdown_timeout: Duration) -> Self {
        Worker {
            cancel_token: CancellationToken::new(),
            graceful_shutdown_timeout,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(Duration::from_secs(config.graceful_shutdown_timeout))
    }

    /// Token cancelled when the process is asked to stop
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Run the application until it completes or a shutdown signal arrives.
    ///
    /// After cancellation the application gets `graceful_shutdown_timeout` to
    /// finish in-flight work before it is abandoned.
    pub async fn execute<F, Fut>(self, app: F) -> anyhow::Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let token = self.cancel_token.clone();
        let signals = tokio::spawn(signal_handler(token.clone()));
        let mut app = tokio::spawn(app(token.clone()));

        let result = tokio::select! {
            result = &mut app => result,
            _ = token.cancelled() => {
                tracing::info!(
                    timeout = %humantime::format_duration(self.graceful_shutdown_timeout),
                    "Shutdown requested, waiting for in-flight requests"
                );
                match tokio::time::timeout(self.graceful_shutdown_timeout, &mut app).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!("Graceful shutdown timed out, aborting");
                        app.abort();
                        signals.abort();
                        return Ok(());
                    }
                }
            }
        };

        token.cancel();
        signals.abort();
        result?
    }
}

/// Cancel `cancel_token` on Ctrl-C or SIGTERM.
async fn signal_handler(cancel_token: CancellationToken) -> anyhow::Result<()> {
    let ctrl_c = async {
        signal::ctrl_c().await?;
        anyhow::Ok(())
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        anyhow::Ok(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<anyhow::Result<()>>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("SIGTERM received, starting graceful shutdown");
        },
        _ = cancel_token.cancelled() => {
            tracing::debug!("Cancellation token triggered");
        }
    }

    cancel_token.cancel();
    Ok(())
}
