// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Generates the tonic client and server stubs for the `modelhost.Worker` and
//! `modelhost.Dashboard` services. Message types are hand-written prost
//! structs in `src/protocols/wire.rs`, so no protoc is needed at build time.

use tonic_build::manual::{Builder, Method, Service};

const PACKAGE: &str = "modelhost";
const CODEC: &str = "tonic::codec::ProstCodec";
const WIRE: &str = "crate::protocols::wire";

/// Shapes of the fixed-shape predict protocol: (route name, input message, output message)
const SHAPES: [(&str, &str, &str); 5] = [
    ("String", "StringInput", "StringOutput"),
    ("Bytes", "BytesInput", "BytesOutput"),
    ("ArrInt", "ArrIntInput", "ArrIntOutput"),
    ("ArrFloat", "ArrFloatInput", "ArrFloatOutput"),
    ("ArrString", "ArrStringInput", "ArrStringOutput"),
];

fn method(
    name: &str,
    route: &str,
    input: &str,
    output: &str,
    client_streaming: bool,
    server_streaming: bool,
) -> Method {
    let mut builder = Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("{WIRE}::{input}"))
        .output_type(format!("{WIRE}::{output}"))
        .codec_path(CODEC);
    if client_streaming {
        builder = builder.client_streaming();
    }
    if server_streaming {
        builder = builder.server_streaming();
    }
    builder.build()
}

fn snake_case(route: &str) -> String {
    let mut out = String::with_capacity(route.len() + 4);
    for (i, c) in route.chars().enumerate() {
        if c == '_' {
            out.push('_');
            continue;
        }
        if c.is_ascii_uppercase() {
            let prev = route.chars().nth(i.wrapping_sub(1));
            if i > 0 && !matches!(prev, Some('_')) {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn worker_service() -> Service {
    let mut service = Service::builder().name("Worker").package(PACKAGE);
    for (in_name, in_msg, _) in SHAPES {
        for (out_name, _, out_msg) in SHAPES {
            let route = format!("Predict_{in_name}_{out_name}");
            service = service.method(method(
                &snake_case(&route),
                &route,
                in_msg,
                out_msg,
                in_name == "Bytes",
                out_name == "Bytes",
            ));
        }
    }
    service
        .method(method(
            "predict_any_any",
            "Predict_Any_Any",
            "AnyInput",
            "AnyOutput",
            false,
            false,
        ))
        .build()
}

fn dashboard_service() -> Service {
    Service::builder()
        .name("Dashboard")
        .package(PACKAGE)
        .method(method(
            "service_info",
            "ServiceInfo",
            "ServiceInfoRequest",
            "ServiceInfoResponse",
            false,
            false,
        ))
        .method(method(
            "upload_model",
            "UploadModel",
            "UploadModelRequest",
            "ModelResponse",
            true,
            false,
        ))
        .method(method(
            "switch_model",
            "SwitchModel",
            "SwitchModelRequest",
            "ModelResponse",
            false,
            false,
        ))
        .method(method(
            "download_model",
            "DownloadModel",
            "DownloadModelRequest",
            "UploadModelRequest",
            false,
            true,
        ))
        .method(method(
            "upload_evaluation_data",
            "UploadEvaluationData",
            "UploadEvaluationDataRequest",
            "UploadEvaluationDataResponse",
            true,
            false,
        ))
        .method(method(
            "download_evaluation_data",
            "DownloadEvaluationData",
            "DownloadEvaluationDataRequest",
            "UploadEvaluationDataRequest",
            false,
            true,
        ))
        .method(method(
            "evaluate_model",
            "EvaluateModel",
            "EvaluateModelRequest",
            "EvaluateModelResponse",
            true,
            false,
        ))
        .method(method(
            "fetch_evaluation_result",
            "FetchEvaluationResult",
            "EvaluationResultRequest",
            "EvaluationResultResponse",
            false,
            true,
        ))
        .build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    Builder::new().compile(&[worker_service(), dashboard_service()]);
    Ok(())
}
