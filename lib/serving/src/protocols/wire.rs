// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Protobuf messages of the `modelhost` package.
//!
//! Field numbers are part of the wire contract with existing clients and must
//! not be reused.

use std::collections::HashMap;

/// Package name used in type URLs of the generic predict protocol
pub const PACKAGE: &str = "modelhost";

/// Options travel as an opaque JSON string
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PredictOption {
    #[prost(string, tag = "1")]
    pub val: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StringInput {
    #[prost(string, tag = "1")]
    pub input: String,
    #[prost(message, optional, tag = "2")]
    pub option: Option<PredictOption>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BytesInput {
    #[prost(bytes = "vec", tag = "1")]
    pub input: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub option: Option<PredictOption>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ArrIntInput {
    #[prost(int64, repeated, tag = "1")]
    pub input: Vec<i64>,
    #[prost(message, optional, tag = "2")]
    pub option: Option<PredictOption>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ArrFloatInput {
    #[prost(double, repeated, tag = "1")]
    pub input: Vec<f64>,
    #[prost(message, optional, tag = "2")]
    pub option: Option<PredictOption>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ArrStringInput {
    #[prost(string, repeated, tag = "1")]
    pub input: Vec<String>,
    #[prost(message, optional, tag = "2")]
    pub option: Option<PredictOption>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StringOutput {
    #[prost(string, tag = "1")]
    pub output: String,
    #[prost(double, tag = "2")]
    pub score: f64,
    #[prost(message, optional, tag = "3")]
    pub option: Option<PredictOption>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BytesOutput {
    #[prost(bytes = "vec", tag = "1")]
    pub output: Vec<u8>,
    #[prost(double, tag = "2")]
    pub score: f64,
    #[prost(message, optional, tag = "3")]
    pub option: Option<PredictOption>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ArrIntOutput {
    #[prost(int64, repeated, tag = "1")]
    pub output: Vec<i64>,
    #[prost(double, repeated, tag = "2")]
    pub score: Vec<f64>,
    #[prost(message, optional, tag = "3")]
    pub option: Option<PredictOption>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ArrFloatOutput {
    #[prost(double, repeated, tag = "1")]
    pub output: Vec<f64>,
    #[prost(double, repeated, tag = "2")]
    pub score: Vec<f64>,
    #[prost(message, optional, tag = "3")]
    pub option: Option<PredictOption>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ArrStringOutput {
    #[prost(string, repeated, tag = "1")]
    pub output: Vec<String>,
    #[prost(double, repeated, tag = "2")]
    pub score: Vec<f64>,
    #[prost(message, optional, tag = "3")]
    pub option: Option<PredictOption>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AnyInput {
    #[prost(message, optional, tag = "1")]
    pub input: Option<::prost_types::Any>,
    #[prost(message, optional, tag = "2")]
    pub option: Option<PredictOption>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AnyOutput {
    #[prost(message, optional, tag = "1")]
    pub output: Option<::prost_types::Any>,
    #[prost(double, repeated, tag = "2")]
    pub score: Vec<f64>,
    #[prost(message, optional, tag = "3")]
    pub option: Option<PredictOption>,
}

/// Declares the singular and array wrapper message of one scalar kind.
/// Every wrapper carries its payload in field 1, `val`.
macro_rules! scalar_wrappers {
    ($($single:ident, $arr:ident, $kind:ident, $ty:ty;)*) => {
        $(
            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct $single {
                #[prost($kind, tag = "1")]
                pub val: $ty,
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct $arr {
                #[prost($kind, repeated, tag = "1")]
                pub val: Vec<$ty>,
            }
        )*
    };
}

scalar_wrappers! {
    SingleInt32, ArrInt32, int32, i32;
    SingleInt64, ArrInt64, int64, i64;
    SingleUint32, ArrUint32, uint32, u32;
    SingleUint64, ArrUint64, uint64, u64;
    SingleSint32, ArrSint32, sint32, i32;
    SingleSint64, ArrSint64, sint64, i64;
    SingleFixed32, ArrFixed32, fixed32, u32;
    SingleFixed64, ArrFixed64, fixed64, u64;
    SingleSfixed32, ArrSfixed32, sfixed32, i32;
    SingleSfixed64, ArrSfixed64, sfixed64, i64;
    SingleFloat, ArrFloat, float, f32;
    SingleDouble, ArrDouble, double, f64;
    SingleBool, ArrBool, bool, bool;
    SingleString, ArrString, string, String;
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceInfoRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceInfoResponse {
    #[prost(string, tag = "1")]
    pub application_name: String,
    #[prost(string, tag = "2")]
    pub service_name: String,
    #[prost(string, tag = "3")]
    pub service_level: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UploadModelRequest {
    #[prost(string, tag = "1")]
    pub path: String,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SwitchModelRequest {
    #[prost(string, tag = "1")]
    pub path: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DownloadModelRequest {
    #[prost(string, tag = "1")]
    pub path: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelResponse {
    #[prost(int32, tag = "1")]
    pub status: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UploadEvaluationDataRequest {
    #[prost(string, tag = "1")]
    pub data_path: String,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UploadEvaluationDataResponse {
    #[prost(int32, tag = "1")]
    pub status: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DownloadEvaluationDataRequest {
    #[prost(string, tag = "1")]
    pub data_path: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EvaluateModelRequest {
    #[prost(string, tag = "1")]
    pub data_path: String,
    #[prost(string, tag = "2")]
    pub result_path: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EvaluateModelResponse {
    #[prost(message, optional, tag = "1")]
    pub metrics: Option<EvaluationMetrics>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Tensor {
    #[prost(int32, repeated, tag = "1")]
    pub shape: Vec<i32>,
    #[prost(double, repeated, tag = "2")]
    pub val: Vec<f64>,
}

/// One input, label or output in an evaluation report
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Io {
    #[prost(oneof = "io::Value", tags = "1, 2, 3")]
    pub value: Option<io::Value>,
}

pub mod io {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(message, tag = "1")]
        Tensor(super::Tensor),
        #[prost(message, tag = "2")]
        Str(super::ArrString),
        #[prost(bytes, tag = "3")]
        Bytes(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EvaluationMetrics {
    #[prost(uint64, tag = "1")]
    pub num: u64,
    #[prost(double, tag = "2")]
    pub accuracy: f64,
    #[prost(double, repeated, tag = "3")]
    pub precision: Vec<f64>,
    #[prost(double, repeated, tag = "4")]
    pub recall: Vec<f64>,
    #[prost(double, repeated, tag = "5")]
    pub fvalue: Vec<f64>,
    #[prost(map = "string, double", tag = "6")]
    pub option: HashMap<String, f64>,
    #[prost(message, repeated, tag = "7")]
    pub label: Vec<Io>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EvaluationResultRequest {
    #[prost(string, tag = "1")]
    pub data_path: String,
    #[prost(string, tag = "2")]
    pub result_path: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResultDetail {
    #[prost(message, optional, tag = "1")]
    pub input: Option<Io>,
    #[prost(message, optional, tag = "2")]
    pub label: Option<Io>,
    #[prost(message, optional, tag = "3")]
    pub output: Option<Io>,
    #[prost(double, repeated, tag = "4")]
    pub score: Vec<f64>,
    #[prost(bool, tag = "5")]
    pub is_correct: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EvaluationResultResponse {
    #[prost(message, optional, tag = "1")]
    pub metrics: Option<EvaluationMetrics>,
    #[prost(message, repeated, tag = "2")]
    pub detail: Vec<ResultDetail>,
}
