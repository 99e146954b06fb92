// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Mapping between the fixed-shape predict messages and [`TypedValue`].

use super::typed_value::{PredictResult, Tag, TypedValue, option_message};
use super::wire;

/// A fixed-shape predict request
pub trait PredictInput: Send + 'static {
    const TAG: Tag;

    /// Split into the typed input and the raw option string
    fn into_parts(self) -> (TypedValue, String);
}

/// A fixed-shape predict response
pub trait PredictOutput: Default + Send + 'static {
    const TAG: Tag;

    /// Marshal a result into this shape. Gives the result back when its label
    /// does not have this shape's tag.
    fn marshal(result: PredictResult) -> Result<Self, PredictResult>;
}

fn option_val(option: Option<wire::PredictOption>) -> String {
    option.map(|o| o.val).unwrap_or_default()
}

macro_rules! predict_input {
    ($msg:ty, $tag:expr, $variant:path) => {
        impl PredictInput for $msg {
            const TAG: Tag = $tag;

            fn into_parts(self) -> (TypedValue, String) {
                ($variant(self.input), option_val(self.option))
            }
        }
    };
}

predict_input!(wire::StringInput, Tag::String, TypedValue::String);
predict_input!(wire::BytesInput, Tag::Bytes, TypedValue::Bytes);
predict_input!(wire::ArrIntInput, Tag::IntSeq, TypedValue::IntSeq);
predict_input!(wire::ArrFloatInput, Tag::FloatSeq, TypedValue::FloatSeq);
predict_input!(wire::ArrStringInput, Tag::StringSeq, TypedValue::StringSeq);

macro_rules! singular_output {
    ($msg:ty, $tag:expr, $variant:path) => {
        impl PredictOutput for $msg {
            const TAG: Tag = $tag;

            fn marshal(result: PredictResult) -> Result<Self, PredictResult> {
                match result {
                    PredictResult {
                        label: $variant(output),
                        score,
                        options,
                    } => Ok(Self {
                        output,
                        score: score.first(),
                        option: Some(option_message(&options)),
                    }),
                    other => Err(other),
                }
            }
        }
    };
}

macro_rules! sequence_output {
    ($msg:ty, $tag:expr, $variant:path) => {
        impl PredictOutput for $msg {
            const TAG: Tag = $tag;

            fn marshal(result: PredictResult) -> Result<Self, PredictResult> {
                let PredictResult {
                    label,
                    score,
                    options,
                } = result;
                match label.widen_to($tag) {
                    $variant(output) => Ok(Self {
                        output,
                        score: score.to_vec(),
                        option: Some(option_message(&options)),
                    }),
                    label => Err(PredictResult {
                        label,
                        score,
                        options,
                    }),
                }
            }
        }
    };
}

singular_output!(wire::StringOutput, Tag::String, TypedValue::String);
singular_output!(wire::BytesOutput, Tag::Bytes, TypedValue::Bytes);
sequence_output!(wire::ArrIntOutput, Tag::IntSeq, TypedValue::IntSeq);
sequence_output!(wire::ArrFloatOutput, Tag::FloatSeq, TypedValue::FloatSeq);
sequence_output!(wire::ArrStringOutput, Tag::StringSeq, TypedValue::StringSeq);
