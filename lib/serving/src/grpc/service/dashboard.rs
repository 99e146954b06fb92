// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The `Dashboard` service: model and dataset management.
//!
//! Successful calls answer with [`STATUS_SUCCESS`] and a fixed message.
//! Failed calls answer with an RPC error whose message starts with the
//! operation's fixed failure message.

use std::sync::Arc;

use futures::StreamExt;
use tonic::{Request, Response, Status, Streaming};

use super::{ResponseStream, State, first_message};
use crate::errors::ServingError;
use crate::predictor::Predictor;
use crate::protocols::wire;

pub mod dashboard_proto {
    include!(concat!(env!("OUT_DIR"), "/modelhost.Dashboard.rs"));
}
use dashboard_proto::dashboard_server::Dashboard;

pub const STATUS_SUCCESS: i32 = 1;

const UPLOAD_MODEL_OK: &str = "Success: Uploading model file.";
const UPLOAD_MODEL_ERR: &str = "Error: Uploading model file.";
const SWITCH_MODEL_OK: &str = "Success: Switching model file.";
const SWITCH_MODEL_ERR: &str = "Error: Switching model file.";
const DOWNLOAD_MODEL_ERR: &str = "Error: Downloading model file.";
const UPLOAD_DATA_OK: &str = "Success: Uploading evaluation data.";
const UPLOAD_DATA_ERR: &str = "Error: Uploading evaluation data.";
const DOWNLOAD_DATA_ERR: &str = "Error: Downloading evaluation data.";
const EVALUATE_ERR: &str = "Error: Evaluating model.";
const FETCH_RESULT_ERR: &str = "Error: Fetching evaluation result.";

pub struct DashboardService<P: Predictor> {
    state: Arc<State<P>>,
}

impl<P: Predictor> DashboardService<P> {
    pub fn new(state: Arc<State<P>>) -> Self {
        DashboardService { state }
    }
}

fn failure(context: &'static str) -> impl FnOnce(ServingError) -> Status {
    move |err| {
        tracing::error!(error = %err, "{context}");
        err.into_status(context)
    }
}

#[tonic::async_trait]
impl<P: Predictor> Dashboard for DashboardService<P> {
    async fn service_info(
        &self,
        _request: Request<wire::ServiceInfoRequest>,
    ) -> Result<Response<wire::ServiceInfoResponse>, Status> {
        Ok(Response::new(self.state.info().clone()))
    }

    async fn upload_model(
        &self,
        request: Request<Streaming<wire::UploadModelRequest>>,
    ) -> Result<Response<wire::ModelResponse>, Status> {
        self.state
            .lifecycle()
            .upload_model(request.into_inner())
            .await
            .map_err(failure(UPLOAD_MODEL_ERR))?;
        Ok(Response::new(wire::ModelResponse {
            status: STATUS_SUCCESS,
            message: UPLOAD_MODEL_OK.to_string(),
        }))
    }

    async fn switch_model(
        &self,
        request: Request<wire::SwitchModelRequest>,
    ) -> Result<Response<wire::ModelResponse>, Status> {
        let request = request.into_inner();
        self.state
            .lifecycle()
            .switch_model(&request.path)
            .await
            .map_err(failure(SWITCH_MODEL_ERR))?;
        Ok(Response::new(wire::ModelResponse {
            status: STATUS_SUCCESS,
            message: SWITCH_MODEL_OK.to_string(),
        }))
    }

    type DownloadModelStream = ResponseStream<wire::UploadModelRequest>;

    async fn download_model(
        &self,
        request: Request<wire::DownloadModelRequest>,
    ) -> Result<Response<Self::DownloadModelStream>, Status> {
        let request = request.into_inner();
        let fragments = self
            .state
            .lifecycle()
            .download_model(&request.path)
            .await
            .map_err(failure(DOWNLOAD_MODEL_ERR))?;
        let output = fragments.map(|f| f.map_err(|e| failure(DOWNLOAD_MODEL_ERR)(e.into())));
        Ok(Response::new(Box::pin(output) as Self::DownloadModelStream))
    }

    async fn upload_evaluation_data(
        &self,
        request: Request<Streaming<wire::UploadEvaluationDataRequest>>,
    ) -> Result<Response<wire::UploadEvaluationDataResponse>, Status> {
        self.state
            .lifecycle()
            .upload_evaluation_data(request.into_inner())
            .await
            .map_err(failure(UPLOAD_DATA_ERR))?;
        Ok(Response::new(wire::UploadEvaluationDataResponse {
            status: STATUS_SUCCESS,
            message: UPLOAD_DATA_OK.to_string(),
        }))
    }

    type DownloadEvaluationDataStream = ResponseStream<wire::UploadEvaluationDataRequest>;

    async fn download_evaluation_data(
        &self,
        request: Request<wire::DownloadEvaluationDataRequest>,
    ) -> Result<Response<Self::DownloadEvaluationDataStream>, Status> {
        let request = request.into_inner();
        let fragments = self
            .state
            .lifecycle()
            .download_evaluation_data(&request.data_path)
            .await
            .map_err(failure(DOWNLOAD_DATA_ERR))?;
        let output = fragments.map(|f| f.map_err(|e| failure(DOWNLOAD_DATA_ERR)(e.into())));
        Ok(Response::new(
            Box::pin(output) as Self::DownloadEvaluationDataStream
        ))
    }

    async fn evaluate_model(
        &self,
        request: Request<Streaming<wire::EvaluateModelRequest>>,
    ) -> Result<Response<wire::EvaluateModelResponse>, Status> {
        let request = first_message(request.into_inner()).await?;
        let metrics = self
            .state
            .lifecycle()
            .evaluate(&request.data_path, &request.result_path)
            .await
            .map_err(failure(EVALUATE_ERR))?;
        Ok(Response::new(wire::EvaluateModelResponse {
            metrics: Some((&metrics).into()),
        }))
    }

    type FetchEvaluationResultStream = ResponseStream<wire::EvaluationResultResponse>;

    async fn fetch_evaluation_result(
        &self,
        request: Request<wire::EvaluationResultRequest>,
    ) -> Result<Response<Self::FetchEvaluationResultStream>, Status> {
        let request = request.into_inner();
        let responses = self
            .state
            .lifecycle()
            .fetch_result(&request.data_path, &request.result_path)
            .await
            .map_err(failure(FETCH_RESULT_ERR))?;
        let output = responses.map(|r| r.map_err(|e| failure(FETCH_RESULT_ERR)(e.into())));
        Ok(Response::new(
            Box::pin(output) as Self::FetchEvaluationResultStream
        ))
    }
}
