// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The gRPC server hosting the `Worker` and `Dashboard` services.

use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use derive_builder::Builder;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::{Status, transport::Server};

use crate::dispatch::PredictDispatcher;
use crate::lifecycle::ModelLifecycleCoordinator;
use crate::predictor::Predictor;
use crate::protocols::wire;

pub mod dashboard;
pub mod worker;

use dashboard::DashboardService;
use dashboard::dashboard_proto::dashboard_server::DashboardServer;
use worker::WorkerService;
use worker::worker_proto::worker_server::WorkerServer;

/// Server-streaming response body
pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send + 'static>>;

/// Shared by every request handler
pub struct State<P: Predictor> {
    dispatcher: PredictDispatcher<P>,
    lifecycle: ModelLifecycleCoordinator<P>,
    info: wire::ServiceInfoResponse,
}

impl<P: Predictor> State<P> {
    pub fn new(
        dispatcher: PredictDispatcher<P>,
        lifecycle: ModelLifecycleCoordinator<P>,
        info: wire::ServiceInfoResponse,
    ) -> Self {
        State {
            dispatcher,
            lifecycle,
            info,
        }
    }

    pub fn dispatcher(&self) -> &PredictDispatcher<P> {
        &self.dispatcher
    }

    pub fn lifecycle(&self) -> &ModelLifecycleCoordinator<P> {
        &self.lifecycle
    }

    pub fn info(&self) -> &wire::ServiceInfoResponse {
        &self.info
    }
}

impl<P: Predictor> std::fmt::Debug for State<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

pub struct ModelhostService<P: Predictor> {
    // The state we share with every request handler
    state: Arc<State<P>>,

    port: u16,
    host: String,
    concurrency_limit: usize,
}

impl<P: Predictor> Clone for ModelhostService<P> {
    fn clone(&self) -> Self {
        ModelhostService {
            state: self.state.clone(),
            port: self.port,
            host: self.host.clone(),
            concurrency_limit: self.concurrency_limit,
        }
    }
}

#[derive(Clone, Builder)]
#[builder(pattern = "owned", build_fn(private, name = "build_internal"))]
pub struct ModelhostServiceConfig {
    #[builder(default = "5000")]
    port: u16,

    #[builder(setter(into), default = "String::from(\"0.0.0.0\")")]
    host: String,

    /// Concurrent requests per connection
    #[builder(default = "32")]
    concurrency_limit: usize,
}

impl ModelhostServiceConfig {
    pub fn builder() -> ModelhostServiceConfigBuilder {
        ModelhostServiceConfigBuilder::default()
    }
}

impl<P: Predictor> ModelhostService<P> {
    pub fn state_clone(&self) -> Arc<State<P>> {
        self.state.clone()
    }

    pub fn state(&self) -> &State<P> {
        Arc::as_ref(&self.state)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn spawn(&self, cancel_token: CancellationToken) -> JoinHandle<Result<()>> {
        let this = self.clone();
        tokio::spawn(async move { this.run(cancel_token).await })
    }

    pub async fn run(&self, cancel_token: CancellationToken) -> Result<()> {
        let address = format!("{}:{}", self.host, self.port);
        tracing::info!(address, "Starting modelhost gRPC service on: {address}");

        let observer = cancel_token.child_token();
        Server::builder()
            .concurrency_limit_per_connection(self.concurrency_limit)
            .add_service(WorkerServer::new(WorkerService::new(self.state_clone())))
            .add_service(DashboardServer::new(DashboardService::new(self.state_clone())))
            .serve_with_shutdown(address.parse()?, observer.cancelled_owned())
            .await
            .inspect_err(|_| cancel_token.cancel())?;

        tracing::info!(address, "modelhost gRPC service stopped");
        Ok(())
    }
}

impl ModelhostServiceConfigBuilder {
    pub fn build<P: Predictor>(self, state: State<P>) -> Result<ModelhostService<P>, anyhow::Error> {
        let config: ModelhostServiceConfig = self.build_internal()?;
        if config.concurrency_limit == 0 {
            anyhow::bail!("concurrency_limit must be at least 1");
        }
        Ok(ModelhostService {
            state: Arc::new(state),
            port: config.port,
            host: config.host,
            concurrency_limit: config.concurrency_limit,
        })
    }
}

/// The first message of a client stream. The call is answered as soon as it
/// arrives; the rest of the stream is dropped unread.
pub(crate) async fn first_message<T, S>(mut stream: S) -> Result<T, Status>
where
    S: Stream<Item = Result<T, Status>> + Unpin,
{
    match stream.next().await {
        Some(first) => first,
        None => Err(Status::invalid_argument("Request stream contained no messages")),
    }
}
