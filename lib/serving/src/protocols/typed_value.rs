// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::wire;

/// Free-form predict options, parsed from the request's JSON option string
pub type Options = serde_json::Map<String, serde_json::Value>;

/// Payload shape of a [`TypedValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    String,
    Bytes,
    IntSeq,
    FloatSeq,
    StringSeq,
    /// Only produced by the generic predict protocol
    BoolSeq,
}

impl Tag {
    /// Singular shapes carry a scalar label and a scalar score on the wire
    pub fn is_singular(self) -> bool {
        matches!(self, Tag::String | Tag::Bytes)
    }

    /// Label returned in place of a failed prediction
    pub fn fallback_label(self) -> TypedValue {
        match self {
            Tag::String => TypedValue::String("None".to_string()),
            Tag::Bytes => TypedValue::Bytes(b"None".to_vec()),
            Tag::IntSeq => TypedValue::IntSeq(vec![0]),
            Tag::FloatSeq => TypedValue::FloatSeq(vec![0.0]),
            Tag::StringSeq => TypedValue::StringSeq(vec!["None".to_string()]),
            Tag::BoolSeq => TypedValue::BoolSeq(vec![false]),
        }
    }

    pub fn fallback_score(self) -> Score {
        if self.is_singular() {
            Score::Single(0.0)
        } else {
            Score::Seq(vec![0.0])
        }
    }

    /// Result returned in place of a failed prediction, shaped like `self`
    pub fn fallback(self) -> PredictResult {
        PredictResult {
            label: self.fallback_label(),
            score: self.fallback_score(),
            options: Options::new(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tag::String => "String",
            Tag::Bytes => "Bytes",
            Tag::IntSeq => "ArrInt",
            Tag::FloatSeq => "ArrFloat",
            Tag::StringSeq => "ArrString",
            Tag::BoolSeq => "ArrBool",
        };
        f.write_str(s)
    }
}

/// A predict input, output or label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    String(String),
    Bytes(Vec<u8>),
    IntSeq(Vec<i64>),
    FloatSeq(Vec<f64>),
    StringSeq(Vec<String>),
    BoolSeq(Vec<bool>),
}

impl TypedValue {
    pub fn tag(&self) -> Tag {
        match self {
            TypedValue::String(_) => Tag::String,
            TypedValue::Bytes(_) => Tag::Bytes,
            TypedValue::IntSeq(_) => Tag::IntSeq,
            TypedValue::FloatSeq(_) => Tag::FloatSeq,
            TypedValue::StringSeq(_) => Tag::StringSeq,
            TypedValue::BoolSeq(_) => Tag::BoolSeq,
        }
    }

    /// Number of elements; singular values count as one
    pub fn len(&self) -> usize {
        match self {
            TypedValue::String(_) | TypedValue::Bytes(_) => 1,
            TypedValue::IntSeq(v) => v.len(),
            TypedValue::FloatSeq(v) => v.len(),
            TypedValue::StringSeq(v) => v.len(),
            TypedValue::BoolSeq(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to `tag` where no information is lost: integer labels widen
    /// into a float sequence. Anything else is returned unchanged.
    pub fn widen_to(self, tag: Tag) -> TypedValue {
        match (self, tag) {
            (TypedValue::IntSeq(v), Tag::FloatSeq) => {
                TypedValue::FloatSeq(v.into_iter().map(|i| i as f64).collect())
            }
            (value, _) => value,
        }
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::String(s.to_string())
    }
}

impl From<Vec<i64>> for TypedValue {
    fn from(v: Vec<i64>) -> Self {
        TypedValue::IntSeq(v)
    }
}

impl From<Vec<f64>> for TypedValue {
    fn from(v: Vec<f64>) -> Self {
        TypedValue::FloatSeq(v)
    }
}

impl From<Vec<String>> for TypedValue {
    fn from(v: Vec<String>) -> Self {
        TypedValue::StringSeq(v)
    }
}

/// Confidence of a prediction. A sequence label may come with one score per
/// element or a single score for all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Single(f64),
    Seq(Vec<f64>),
}

impl Default for Score {
    fn default() -> Self {
        Score::Single(0.0)
    }
}

impl Score {
    /// Scalar view for singular outputs
    pub fn first(&self) -> f64 {
        match self {
            Score::Single(s) => *s,
            Score::Seq(v) => v.first().copied().unwrap_or_default(),
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        match self {
            Score::Single(s) => vec![*s],
            Score::Seq(v) => v.clone(),
        }
    }
}

impl From<f64> for Score {
    fn from(s: f64) -> Self {
        Score::Single(s)
    }
}

impl From<Vec<f64>> for Score {
    fn from(v: Vec<f64>) -> Self {
        Score::Seq(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResult {
    pub label: TypedValue,
    pub score: Score,
    #[serde(default)]
    pub options: Options,
}

impl PredictResult {
    pub fn new(label: impl Into<TypedValue>, score: impl Into<Score>) -> Self {
        PredictResult {
            label: label.into(),
            score: score.into(),
            options: Options::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Options rendered for the wire
    pub fn option_message(&self) -> wire::PredictOption {
        option_message(&self.options)
    }
}

pub fn option_message(options: &Options) -> wire::PredictOption {
    wire::PredictOption {
        val: serde_json::to_string(options).unwrap_or_else(|_| "{}".to_string()),
    }
}

/// Summary of an evaluation run. `labels` names the classes the per-class
/// vectors refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateMetrics {
    pub count: u64,
    pub accuracy: f64,
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub f1: Vec<f64>,
    pub options: BTreeMap<String, f64>,
    pub labels: Vec<TypedValue>,
}

impl Default for EvaluateMetrics {
    fn default() -> Self {
        EvaluateMetrics {
            count: 0,
            accuracy: 0.0,
            precision: vec![0.0],
            recall: vec![0.0],
            f1: vec![0.0],
            options: BTreeMap::new(),
            labels: Vec::new(),
        }
    }
}

/// Outcome of evaluating one example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDetail {
    pub input: TypedValue,
    pub label: TypedValue,
    pub output: PredictResult,
    pub is_correct: bool,
}

impl From<&TypedValue> for wire::Io {
    fn from(value: &TypedValue) -> Self {
        use wire::io::Value;

        fn tensor(val: Vec<f64>) -> Value {
            let shape = if val.is_empty() {
                Vec::new()
            } else {
                vec![i32::try_from(val.len()).unwrap_or(i32::MAX)]
            };
            Value::Tensor(wire::Tensor { shape, val })
        }

        let value = match value {
            TypedValue::String(s) => Value::Str(wire::ArrString {
                val: vec![s.clone()],
            }),
            TypedValue::StringSeq(v) if v.is_empty() => tensor(Vec::new()),
            TypedValue::StringSeq(v) => Value::Str(wire::ArrString { val: v.clone() }),
            TypedValue::Bytes(b) => Value::Bytes(b.clone()),
            TypedValue::IntSeq(v) => tensor(v.iter().map(|x| *x as f64).collect()),
            TypedValue::FloatSeq(v) => tensor(v.clone()),
            TypedValue::BoolSeq(v) => tensor(v.iter().map(|b| f64::from(u8::from(*b))).collect()),
        };
        wire::Io { value: Some(value) }
    }
}

impl From<&EvaluateMetrics> for wire::EvaluationMetrics {
    fn from(m: &EvaluateMetrics) -> Self {
        wire::EvaluationMetrics {
            num: m.count,
            accuracy: m.accuracy,
            precision: m.precision.clone(),
            recall: m.recall.clone(),
            fvalue: m.f1.clone(),
            option: m.options.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            label: m.labels.iter().map(wire::Io::from).collect(),
        }
    }
}

impl From<&EvaluationDetail> for wire::ResultDetail {
    fn from(d: &EvaluationDetail) -> Self {
        wire::ResultDetail {
            input: Some(wire::Io::from(&d.input)),
            label: Some(wire::Io::from(&d.label)),
            output: Some(wire::Io::from(&d.output.label)),
            score: d.output.score.to_vec(),
            is_correct: d.is_correct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Tag::String, TypedValue::String("None".into()), Score::Single(0.0))]
    #[case(Tag::Bytes, TypedValue::Bytes(b"None".to_vec()), Score::Single(0.0))]
    #[case(Tag::IntSeq, TypedValue::IntSeq(vec![0]), Score::Seq(vec![0.0]))]
    #[case(Tag::FloatSeq, TypedValue::FloatSeq(vec![0.0]), Score::Seq(vec![0.0]))]
    #[case(Tag::StringSeq, TypedValue::StringSeq(vec!["None".into()]), Score::Seq(vec![0.0]))]
    fn test_fallback_matches_tag(
        #[case] tag: Tag,
        #[case] label: TypedValue,
        #[case] score: Score,
    ) {
        let fallback = tag.fallback();
        assert_eq!(fallback.label, label);
        assert_eq!(fallback.label.tag(), tag);
        assert_eq!(fallback.score, score);
        assert!(fallback.options.is_empty());
        assert_eq!(fallback.option_message().val, "{}");
    }

    #[test]
    fn test_score_views() {
        assert_eq!(Score::Single(0.5).to_vec(), vec![0.5]);
        assert_eq!(Score::Seq(vec![0.1, 0.2]).first(), 0.1);
        assert_eq!(Score::Seq(vec![]).first(), 0.0);
    }

    #[test]
    fn test_io_conversion() {
        let io = wire::Io::from(&TypedValue::IntSeq(vec![1, 2, 3]));
        assert_eq!(
            io.value,
            Some(wire::io::Value::Tensor(wire::Tensor {
                shape: vec![3],
                val: vec![1.0, 2.0, 3.0],
            }))
        );

        let io = wire::Io::from(&TypedValue::String("cat".into()));
        assert_eq!(
            io.value,
            Some(wire::io::Value::Str(wire::ArrString {
                val: vec!["cat".to_string()]
            }))
        );

        let io = wire::Io::from(&TypedValue::StringSeq(vec![]));
        assert_eq!(
            io.value,
            Some(wire::io::Value::Tensor(wire::Tensor::default()))
        );
    }

    #[test]
    fn test_detail_json_lines() {
        let detail = EvaluationDetail {
            input: TypedValue::StringSeq(vec!["a".into(), "b".into()]),
            label: TypedValue::IntSeq(vec![1]),
            output: PredictResult::new(vec![1i64], vec![0.9f64]),
            is_correct: true,
        };
        let line = serde_json::to_string(&detail).unwrap();
        assert!(!line.contains('\n'));
        let back: EvaluationDetail = serde_json::from_str(&line).unwrap();
        assert_eq!(back, detail);
    }

    #[test]
    fn test_default_metrics() {
        let metrics = EvaluateMetrics::default();
        assert_eq!(metrics.count, 0);
        assert_eq!(metrics.precision, vec![0.0]);
        let wire = wire::EvaluationMetrics::from(&metrics);
        assert_eq!(wire.fvalue, vec![0.0]);
        assert!(wire.label.is_empty());
    }
}
