// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

pub mod grpc_test {
    use std::sync::Arc;

    use modelhost_runtime::storage::key_value_store::Manager;
    use modelhost_runtime::{CancellationToken, ReloadMode};
    use modelhost_serving::assignment::AssignmentStore;
    use modelhost_serving::dispatch::PredictDispatcher;
    use modelhost_serving::dispatch::any::type_url;
    use modelhost_serving::echo::{EchoModel, EchoPredictor};
    use modelhost_serving::grpc::service::dashboard::STATUS_SUCCESS;
    use modelhost_serving::grpc::service::dashboard::dashboard_proto::dashboard_client::DashboardClient;
    use modelhost_serving::grpc::service::worker::worker_proto::worker_client::WorkerClient;
    use modelhost_serving::grpc::service::{ModelhostService, ModelhostServiceConfig, State};
    use modelhost_serving::lifecycle::ModelLifecycleCoordinator;
    use modelhost_serving::predictor::ModelSlot;
    use modelhost_serving::protocols::wire;
    use modelhost_serving::service_log::TracingServiceLogger;
    use modelhost_serving::storage::LocalOnly;
    use prost::Message;
    use rstest::*;
    use tempfile::TempDir;
    use tokio_stream::StreamExt;
    use tonic::Code;
    use tonic::transport::Channel;

    struct RunningService {
        token: CancellationToken,
    }

    impl RunningService {
        fn spawn(service: ModelhostService<EchoPredictor>) -> Self {
            let token = CancellationToken::new();
            tokio::spawn({
                let t = token.clone();
                async move { service.run(t).await }
            });
            Self { token }
        }
    }

    impl Drop for RunningService {
        fn drop(&mut self) {
            self.token.cancel();
        }
    }

    // Tests may run in parallel, use this enum to keep track of port used for different
    // test cases
    enum TestPort {
        PredictShapes = 9188,
        PredictStreams = 9189,
        PredictAny = 9190,
        Lifecycle = 9191,
        InvalidPath = 9192,
        ServiceInfo = 9193,
    }

    #[fixture]
    fn service(#[default(9188)] port: u16) -> (ModelhostService<EchoPredictor>, TempDir) {
        let dir = TempDir::new().unwrap();
        let predictor = Arc::new(EchoPredictor);
        let models = Arc::new(ModelSlot::new());
        models.install(
            dir.path().join("model/initial.txt"),
            EchoModel {
                name: "initial".into(),
            },
        );
        let lifecycle = ModelLifecycleCoordinator::new(
            predictor.clone(),
            models.clone(),
            Arc::new(LocalOnly),
            AssignmentStore::new(Manager::memory(), "svc-test"),
            ReloadMode::InProcess,
            dir.path().join("model"),
            dir.path().join("eval"),
        );
        let dispatcher = PredictDispatcher::new(
            predictor,
            models,
            Arc::new(TracingServiceLogger::new("echo", "development")),
        );
        let info = wire::ServiceInfoResponse {
            application_name: "echo".into(),
            service_name: "svc-test".into(),
            service_level: "development".into(),
        };
        let service = ModelhostServiceConfig::builder()
            .port(port)
            .build(State::new(dispatcher, lifecycle, info))
            .unwrap();
        (service, dir)
    }

    async fn get_ready_channel(port: u16, timeout_secs: u64) -> Channel {
        let start = tokio::time::Instant::now();
        let timeout = tokio::time::Duration::from_secs(timeout_secs);
        loop {
            let address = format!("http://0.0.0.0:{}", port);
            match Channel::from_shared(address).unwrap().connect().await {
                Ok(channel) => return channel,
                Err(_) if start.elapsed() < timeout => {
                    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
                }
                Err(e) => panic!("Service failed to start within timeout: {}", e),
            }
        }
    }

    fn option(val: &str) -> Option<wire::PredictOption> {
        Some(wire::PredictOption {
            val: val.to_string(),
        })
    }

    #[rstest]
    #[tokio::test]
    async fn test_predict_shapes(
        #[with(TestPort::PredictShapes as u16)] service: (ModelhostService<EchoPredictor>, TempDir),
    ) {
        let _running = RunningService::spawn(service.0);
        let mut client = WorkerClient::new(get_ready_channel(TestPort::PredictShapes as u16, 5).await);

        let response = client
            .predict_string_string(wire::StringInput {
                input: "hello".into(),
                option: option(r#"{"request":"1"}"#),
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.output, "hello");
        assert_eq!(response.score, 1.0);
        let options: serde_json::Value = serde_json::from_str(&response.option.unwrap().val).unwrap();
        assert_eq!(options["model"], "initial");
        assert_eq!(options["request"], "1");

        let response = client
            .predict_arr_int_arr_int(wire::ArrIntInput {
                input: vec![1, 2, 3],
                option: None,
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.output, vec![1, 2, 3]);

        // The echo label is a string, not the declared float array
        let response = client
            .predict_string_arr_float(wire::StringInput {
                input: "ok".into(),
                option: None,
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.output, vec![0.0]);
        assert_eq!(response.score, vec![0.0]);
    }

    #[rstest]
    #[tokio::test]
    async fn test_predict_streams(
        #[with(TestPort::PredictStreams as u16)] service: (ModelhostService<EchoPredictor>, TempDir),
    ) {
        let _running = RunningService::spawn(service.0);
        let mut client = WorkerClient::new(get_ready_channel(TestPort::PredictStreams as u16, 5).await);

        let inputs: Vec<wire::BytesInput> = (0..3u8)
            .map(|i| wire::BytesInput {
                input: vec![i; 4],
                option: None,
            })
            .collect();
        let mut outputs = client
            .predict_bytes_bytes(tokio_stream::iter(inputs))
            .await
            .unwrap()
            .into_inner();
        let mut received = Vec::new();
        while let Some(output) = outputs.next().await {
            received.push(output.unwrap().output);
        }
        assert_eq!(received, vec![vec![0u8; 4], vec![1u8; 4], vec![2u8; 4]]);

        let response = client
            .predict_bytes_string(tokio_stream::iter(vec![wire::BytesInput {
                input: b"raw".to_vec(),
                option: None,
            }]))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.output, "None");

        let status = client
            .predict_bytes_arr_int(tokio_stream::iter(Vec::<wire::BytesInput>::new()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let outputs: Vec<_> = client
            .predict_string_bytes(wire::StringInput {
                input: "text".into(),
                option: None,
            })
            .await
            .unwrap()
            .into_inner()
            .collect()
            .await;
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].as_ref().unwrap().output, b"None");
    }

    #[rstest]
    #[tokio::test]
    async fn test_predict_any(
        #[with(TestPort::PredictAny as u16)] service: (ModelhostService<EchoPredictor>, TempDir),
    ) {
        let _running = RunningService::spawn(service.0);
        let mut client = WorkerClient::new(get_ready_channel(TestPort::PredictAny as u16, 5).await);

        let input = prost_types::Any {
            type_url: type_url("SingleInt32"),
            value: wire::SingleInt32 { val: 42 }.encode_to_vec(),
        };
        let response = client
            .predict_any_any(wire::AnyInput {
                input: Some(input),
                option: None,
            })
            .await
            .unwrap()
            .into_inner();
        let output = response.output.unwrap();
        assert_eq!(output.type_url, type_url("SingleInt64"));
        assert_eq!(wire::SingleInt64::decode(output.value.as_slice()).unwrap().val, 42);

        let input = prost_types::Any {
            type_url: "type.googleapis.com/unknown.Message".into(),
            value: Vec::new(),
        };
        let response = client
            .predict_any_any(wire::AnyInput {
                input: Some(input),
                option: None,
            })
            .await
            .unwrap()
            .into_inner();
        assert!(response.output.is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn test_model_lifecycle(
        #[with(TestPort::Lifecycle as u16)] service: (ModelhostService<EchoPredictor>, TempDir),
    ) {
        let (service, dir) = service;
        let _running = RunningService::spawn(service);
        let channel = get_ready_channel(TestPort::Lifecycle as u16, 5).await;
        let mut dashboard = DashboardClient::new(channel.clone());
        let mut worker = WorkerClient::new(channel);

        // Upload a model in three fragments and switch to it
        let fragments = vec![
            wire::UploadModelRequest {
                path: "v2/model.txt".into(),
                data: b"ech".to_vec(),
            },
            wire::UploadModelRequest {
                path: String::new(),
                data: b"o-v".to_vec(),
            },
            wire::UploadModelRequest {
                path: String::new(),
                data: b"2".to_vec(),
            },
        ];
        let response = dashboard
            .upload_model(tokio_stream::iter(fragments))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.status, STATUS_SUCCESS);
        assert_eq!(response.message, "Success: Uploading model file.");
        assert_eq!(
            std::fs::read(dir.path().join("model/v2/model.txt")).unwrap(),
            b"echo-v2"
        );

        for _ in 0..2 {
            let response = dashboard
                .switch_model(wire::SwitchModelRequest {
                    path: "v2/model.txt".into(),
                })
                .await
                .unwrap()
                .into_inner();
            assert_eq!(response.message, "Success: Switching model file.");
        }
        let response = worker
            .predict_string_string(wire::StringInput {
                input: "x".into(),
                option: None,
            })
            .await
            .unwrap()
            .into_inner();
        let options: serde_json::Value = serde_json::from_str(&response.option.unwrap().val).unwrap();
        assert_eq!(options["model"], "echo-v2");

        // Download returns the uploaded bytes
        let downloaded: Vec<u8> = dashboard
            .download_model(wire::DownloadModelRequest {
                path: "v2/model.txt".into(),
            })
            .await
            .unwrap()
            .into_inner()
            .map(|f| f.unwrap().data)
            .collect::<Vec<_>>()
            .await
            .concat();
        assert_eq!(downloaded, b"echo-v2");

        // Evaluate on a small dataset and read the run back
        let mut dataset = String::new();
        for i in 0..250 {
            let label = if i % 5 == 0 { "other" } else { "same" };
            let input = if i % 5 == 0 { "x" } else { "same" };
            dataset.push_str(&format!(
                r#"{{"input":{{"type":"string","value":"{input}"}},"label":{{"type":"string","value":"{label}"}}}}"#
            ));
            dataset.push('\n');
        }
        let response = dashboard
            .upload_evaluation_data(tokio_stream::iter(vec![wire::UploadEvaluationDataRequest {
                data_path: "sets/data.jsonl".into(),
                data: dataset.into_bytes(),
            }]))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.message, "Success: Uploading evaluation data.");

        let metrics = dashboard
            .evaluate_model(tokio_stream::iter(vec![wire::EvaluateModelRequest {
                data_path: "sets/data.jsonl".into(),
                result_path: "runs/first".into(),
            }]))
            .await
            .unwrap()
            .into_inner()
            .metrics
            .unwrap();
        assert_eq!(metrics.num, 250);
        assert!((metrics.accuracy - 0.8).abs() < 1e-9);
        assert!(dir.path().join("eval/runs/first_eval_res.json").exists());
        assert!(dir.path().join("eval/runs/first_eval_detail.jsonl").exists());

        let chunks: Vec<wire::EvaluationResultResponse> = dashboard
            .fetch_evaluation_result(wire::EvaluationResultRequest {
                data_path: "sets/data.jsonl".into(),
                result_path: "runs/first".into(),
            })
            .await
            .unwrap()
            .into_inner()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert!(!chunks.is_empty());
        let details: Vec<&wire::ResultDetail> = chunks.iter().flat_map(|c| c.detail.iter()).collect();
        assert_eq!(details.len(), 250);
        assert!(!details[0].is_correct);
        assert!(details[1].is_correct);
        for chunk in &chunks {
            assert_eq!(chunk.metrics.as_ref().unwrap().num, 250);
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_invalid_paths(
        #[with(TestPort::InvalidPath as u16)] service: (ModelhostService<EchoPredictor>, TempDir),
    ) {
        let (service, dir) = service;
        let _running = RunningService::spawn(service);
        let mut dashboard = DashboardClient::new(get_ready_channel(TestPort::InvalidPath as u16, 5).await);

        let status = dashboard
            .upload_model(tokio_stream::iter(vec![wire::UploadModelRequest {
                path: "../outside.txt".into(),
                data: b"x".to_vec(),
            }]))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().starts_with("Error: Uploading model file."));
        assert!(!dir.path().join("outside.txt").exists());

        let status = dashboard
            .switch_model(wire::SwitchModelRequest {
                path: "/etc/passwd".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().starts_with("Error: Switching model file."));

        let status = dashboard
            .switch_model(wire::SwitchModelRequest {
                path: "missing.txt".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);

        let status = dashboard
            .fetch_evaluation_result(wire::EvaluationResultRequest {
                data_path: "data".into(),
                result_path: "a/../b".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[rstest]
    #[tokio::test]
    async fn test_service_info(
        #[with(TestPort::ServiceInfo as u16)] service: (ModelhostService<EchoPredictor>, TempDir),
    ) {
        let _running = RunningService::spawn(service.0);
        let mut dashboard = DashboardClient::new(get_ready_channel(TestPort::ServiceInfo as u16, 5).await);
        let info = dashboard
            .service_info(wire::ServiceInfoRequest {})
            .await
            .unwrap()
            .into_inner();
        assert_eq!(info.application_name, "echo");
        assert_eq!(info.service_name, "svc-test");
        assert_eq!(info.service_level, "development");
    }
}
