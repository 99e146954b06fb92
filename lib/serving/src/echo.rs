// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! A predictor that answers with its input. Useful for smoke tests of a
//! deployment and as the smallest example of a [`Predictor`].
//!
//! The model file holds a name, reported back in the `model` option.
//! Evaluation datasets are JSONL files of `{"input": .., "label": ..}`
//! records using the [`TypedValue`] JSON form.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::predictor::{DetailSink, Predictor};
use crate::protocols::{EvaluateMetrics, EvaluationDetail, Options, PredictResult, TypedValue};

#[derive(Debug, Default, Clone, Copy)]
pub struct EchoPredictor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoModel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct Example {
    input: TypedValue,
    label: TypedValue,
}

impl Predictor for EchoPredictor {
    type Model = EchoModel;

    fn load_model(&self, path: &Path) -> anyhow::Result<EchoModel> {
        let name = std::fs::read_to_string(path)
            .with_context(|| format!("reading model file {}", path.display()))?;
        Ok(EchoModel {
            name: name.trim().to_string(),
        })
    }

    fn predict(
        &self,
        model: &EchoModel,
        input: &TypedValue,
        options: &Options,
    ) -> anyhow::Result<PredictResult> {
        let mut options = options.clone();
        options.insert("model".to_string(), Value::String(model.name.clone()));
        Ok(PredictResult::new(input.clone(), 1.0).with_options(options))
    }

    fn evaluate(
        &self,
        model: &EchoModel,
        data_path: &Path,
        sink: &mut DetailSink<'_>,
    ) -> anyhow::Result<EvaluateMetrics> {
        let file = File::open(data_path)
            .with_context(|| format!("opening dataset {}", data_path.display()))?;
        let mut count = 0u64;
        let mut correct = 0u64;
        let mut labels: Vec<TypedValue> = Vec::new();

        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let example: Example = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}", data_path.display(), number + 1))?;
            let output = self.predict(model, &example.input, &Options::new())?;
            let is_correct = output.label == example.label;
            if !labels.contains(&example.label) {
                labels.push(example.label.clone());
            }
            count += 1;
            correct += u64::from(is_correct);
            sink(EvaluationDetail {
                input: example.input,
                label: example.label,
                output,
                is_correct,
            })?;
        }

        let accuracy = if count == 0 {
            0.0
        } else {
            correct as f64 / count as f64
        };
        Ok(EvaluateMetrics {
            count,
            accuracy,
            precision: vec![accuracy],
            recall: vec![accuracy],
            f1: vec![accuracy],
            labels,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_echo_evaluate() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("model.txt");
        std::fs::write(&model_path, "echo-v1\n").unwrap();
        let model = EchoPredictor.load_model(&model_path).unwrap();
        assert_eq!(model.name, "echo-v1");

        let data = dir.path().join("data.jsonl");
        std::fs::write(
            &data,
            concat!(
                r#"{"input":{"type":"string","value":"a"},"label":{"type":"string","value":"a"}}"#,
                "\n\n",
                r#"{"input":{"type":"string","value":"b"},"label":{"type":"string","value":"c"}}"#,
                "\n",
            ),
        )
        .unwrap();

        let mut details = Vec::new();
        let metrics = EchoPredictor
            .evaluate(&model, &data, &mut |d| {
                details.push(d);
                Ok(())
            })
            .unwrap();
        assert_eq!(metrics.count, 2);
        assert_eq!(metrics.accuracy, 0.5);
        assert_eq!(metrics.labels.len(), 2);
        assert_eq!(details.len(), 2);
        assert!(details[0].is_correct);
        assert!(!details[1].is_correct);
    }

    #[test]
    fn test_sink_error_aborts() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data.jsonl");
        std::fs::write(
            &data,
            r#"{"input":{"type":"int_seq","value":[1]},"label":{"type":"int_seq","value":[1]}}"#,
        )
        .unwrap();
        let model = EchoModel { name: "m".into() };
        let err = EchoPredictor
            .evaluate(&model, &data, &mut |_| anyhow::bail!("disk full"))
            .unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_predict_reports_model() {
        let model = EchoModel { name: "m".into() };
        let result = EchoPredictor
            .predict(&model, &TypedValue::IntSeq(vec![3]), &Options::new())
            .unwrap();
        assert_eq!(result.label, TypedValue::IntSeq(vec![3]));
        assert_eq!(result.options.get("model"), Some(&Value::from("m")));
    }
}
