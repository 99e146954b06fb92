// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The `Worker` service: one predict method per input and output shape, plus
//! the generic `Predict_Any_Any`.
//!
//! Methods taking bytes are client-streaming and use the first message of the
//! stream, except `Predict_Bytes_Bytes` which answers every message. Methods
//! returning bytes are server-streaming with a single response.

use std::sync::Arc;

use futures::{future, stream};
use tonic::{Request, Response, Status, Streaming};

use super::{ResponseStream, State, first_message};
use crate::predictor::Predictor;
use crate::protocols::wire;

pub mod worker_proto {
    include!(concat!(env!("OUT_DIR"), "/modelhost.Worker.rs"));
}
use worker_proto::worker_server::Worker;

pub struct WorkerService<P: Predictor> {
    state: Arc<State<P>>,
}

impl<P: Predictor> WorkerService<P> {
    pub fn new(state: Arc<State<P>>) -> Self {
        WorkerService { state }
    }
}

macro_rules! worker_methods {
    (
        unary: [$($u_name:ident: $u_in:ident => $u_out:ident),* $(,)?],
        streamed_input: [$($c_name:ident => $c_out:ident),* $(,)?],
        streamed_output: [$($s_name:ident: $s_in:ident => $s_stream:ident),* $(,)?] $(,)?
    ) => {
        #[tonic::async_trait]
        impl<P: Predictor> Worker for WorkerService<P> {
            $(
                async fn $u_name(
                    &self,
                    request: Request<wire::$u_in>,
                ) -> Result<Response<wire::$u_out>, Status> {
                    let output: wire::$u_out = self.state.dispatcher().predict(request.into_inner()).await;
                    Ok(Response::new(output))
                }
            )*

            $(
                async fn $c_name(
                    &self,
                    request: Request<Streaming<wire::BytesInput>>,
                ) -> Result<Response<wire::$c_out>, Status> {
                    let input = first_message(request.into_inner()).await?;
                    let output: wire::$c_out = self.state.dispatcher().predict(input).await;
                    Ok(Response::new(output))
                }
            )*

            $(
                #[allow(non_camel_case_types)]
                type $s_stream = ResponseStream<wire::BytesOutput>;

                async fn $s_name(
                    &self,
                    request: Request<wire::$s_in>,
                ) -> Result<Response<Self::$s_stream>, Status> {
                    let output: wire::BytesOutput = self.state.dispatcher().predict(request.into_inner()).await;
                    let output = stream::once(future::ready(Ok(output)));
                    Ok(Response::new(Box::pin(output) as Self::$s_stream))
                }
            )*

            #[allow(non_camel_case_types)]
            type Predict_Bytes_BytesStream = ResponseStream<wire::BytesOutput>;

            async fn predict_bytes_bytes(
                &self,
                request: Request<Streaming<wire::BytesInput>>,
            ) -> Result<Response<Self::Predict_Bytes_BytesStream>, Status> {
                let mut inputs = request.into_inner();
                let state = self.state.clone();
                let output = async_stream::try_stream! {
                    while let Some(input) = inputs.message().await? {
                        let output: wire::BytesOutput = state.dispatcher().predict(input).await;
                        yield output;
                    }
                };
                Ok(Response::new(Box::pin(output) as Self::Predict_Bytes_BytesStream))
            }

            async fn predict_any_any(
                &self,
                request: Request<wire::AnyInput>,
            ) -> Result<Response<wire::AnyOutput>, Status> {
                let output = self.state.dispatcher().predict_any(request.into_inner()).await;
                Ok(Response::new(output))
            }
        }
    };
}

worker_methods! {
    unary: [
        predict_string_string: StringInput => StringOutput,
        predict_string_arr_int: StringInput => ArrIntOutput,
        predict_string_arr_float: StringInput => ArrFloatOutput,
        predict_string_arr_string: StringInput => ArrStringOutput,
        predict_arr_int_string: ArrIntInput => StringOutput,
        predict_arr_int_arr_int: ArrIntInput => ArrIntOutput,
        predict_arr_int_arr_float: ArrIntInput => ArrFloatOutput,
        predict_arr_int_arr_string: ArrIntInput => ArrStringOutput,
        predict_arr_float_string: ArrFloatInput => StringOutput,
        predict_arr_float_arr_int: ArrFloatInput => ArrIntOutput,
        predict_arr_float_arr_float: ArrFloatInput => ArrFloatOutput,
        predict_arr_float_arr_string: ArrFloatInput => ArrStringOutput,
        predict_arr_string_string: ArrStringInput => StringOutput,
        predict_arr_string_arr_int: ArrStringInput => ArrIntOutput,
        predict_arr_string_arr_float: ArrStringInput => ArrFloatOutput,
        predict_arr_string_arr_string: ArrStringInput => ArrStringOutput,
    ],
    streamed_input: [
        predict_bytes_string => StringOutput,
        predict_bytes_arr_int => ArrIntOutput,
        predict_bytes_arr_float => ArrFloatOutput,
        predict_bytes_arr_string => ArrStringOutput,
    ],
    streamed_output: [
        predict_string_bytes: StringInput => Predict_String_BytesStream,
        predict_arr_int_bytes: ArrIntInput => Predict_ArrInt_BytesStream,
        predict_arr_float_bytes: ArrFloatInput => Predict_ArrFloat_BytesStream,
        predict_arr_string_bytes: ArrStringInput => Predict_ArrString_BytesStream,
    ],
}
