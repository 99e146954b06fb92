// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Generic predict protocol: inputs and outputs are `google.protobuf.Any`
//! values wrapping one of the scalar or array wrapper messages. The wire
//! shape is read from the type URL instead of the method name.

use std::sync::Arc;

use prost::Message;
use prost_types::Any;

use super::{PredictDispatcher, parse_options};
use crate::predictor::Predictor;
use crate::protocols::wire::{self, PACKAGE};
use crate::protocols::{PredictResult, TypedValue};

const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// Scalar kinds of the wrapper messages. Each has a `Single*` and an `Arr*`
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Float,
    Double,
    Bool,
    String,
}

const KINDS: [(Kind, &str); 14] = [
    (Kind::Int32, "Int32"),
    (Kind::Int64, "Int64"),
    (Kind::Uint32, "Uint32"),
    (Kind::Uint64, "Uint64"),
    (Kind::Sint32, "Sint32"),
    (Kind::Sint64, "Sint64"),
    (Kind::Fixed32, "Fixed32"),
    (Kind::Fixed64, "Fixed64"),
    (Kind::Sfixed32, "Sfixed32"),
    (Kind::Sfixed64, "Sfixed64"),
    (Kind::Float, "Float"),
    (Kind::Double, "Double"),
    (Kind::Bool, "Bool"),
    (Kind::String, "String"),
];

#[derive(Debug, thiserror::Error)]
pub enum UnpackError {
    #[error("Request has no input")]
    MissingInput,

    #[error("Unknown type URL '{0}'")]
    UnknownType(String),

    #[error("Malformed payload: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Integer value out of range")]
    OutOfRange,
}

/// Type URL of the wrapper message `name`, e.g. `SingleInt32`
pub fn type_url(name: &str) -> String {
    format!("{TYPE_URL_PREFIX}{PACKAGE}.{name}")
}

/// Resolve a type URL to its scalar kind and whether it is singular
fn lookup(url: &str) -> Option<(Kind, bool)> {
    let name = url
        .strip_prefix(TYPE_URL_PREFIX)?
        .strip_prefix(PACKAGE)?
        .strip_prefix('.')?;
    let (singular, kind_name) = match name.strip_prefix("Single") {
        Some(rest) => (true, rest),
        None => (false, name.strip_prefix("Arr")?),
    };
    KINDS
        .iter()
        .find(|(_, n)| *n == kind_name)
        .map(|(kind, _)| (*kind, singular))
}

fn ints<T>(values: Vec<T>) -> Result<TypedValue, UnpackError>
where
    i64: TryFrom<T>,
{
    values
        .into_iter()
        .map(|v| i64::try_from(v).map_err(|_| UnpackError::OutOfRange))
        .collect::<Result<Vec<_>, _>>()
        .map(TypedValue::IntSeq)
}

macro_rules! decode_ints {
    ($singular:expr, $value:expr, $single:ty, $arr:ty) => {
        if $singular {
            ints(vec![<$single>::decode($value)?.val])
        } else {
            ints(<$arr>::decode($value)?.val)
        }
    };
}

/// Decode an `Any` input. Returns the value and whether it was singular.
pub fn unpack(any: &Any) -> Result<(TypedValue, bool), UnpackError> {
    let (kind, singular) =
        lookup(&any.type_url).ok_or_else(|| UnpackError::UnknownType(any.type_url.clone()))?;
    let value = any.value.as_slice();
    let typed = match kind {
        Kind::Int32 => decode_ints!(singular, value, wire::SingleInt32, wire::ArrInt32)?,
        Kind::Int64 => decode_ints!(singular, value, wire::SingleInt64, wire::ArrInt64)?,
        Kind::Uint32 => decode_ints!(singular, value, wire::SingleUint32, wire::ArrUint32)?,
        Kind::Uint64 => decode_ints!(singular, value, wire::SingleUint64, wire::ArrUint64)?,
        Kind::Sint32 => decode_ints!(singular, value, wire::SingleSint32, wire::ArrSint32)?,
        Kind::Sint64 => decode_ints!(singular, value, wire::SingleSint64, wire::ArrSint64)?,
        Kind::Fixed32 => decode_ints!(singular, value, wire::SingleFixed32, wire::ArrFixed32)?,
        Kind::Fixed64 => decode_ints!(singular, value, wire::SingleFixed64, wire::ArrFixed64)?,
        Kind::Sfixed32 => decode_ints!(singular, value, wire::SingleSfixed32, wire::ArrSfixed32)?,
        Kind::Sfixed64 => decode_ints!(singular, value, wire::SingleSfixed64, wire::ArrSfixed64)?,
        Kind::Float if singular => {
            TypedValue::FloatSeq(vec![f64::from(wire::SingleFloat::decode(value)?.val)])
        }
        Kind::Float => TypedValue::FloatSeq(
            wire::ArrFloat::decode(value)?
                .val
                .into_iter()
                .map(f64::from)
                .collect(),
        ),
        Kind::Double if singular => TypedValue::FloatSeq(vec![wire::SingleDouble::decode(value)?.val]),
        Kind::Double => TypedValue::FloatSeq(wire::ArrDouble::decode(value)?.val),
        Kind::Bool if singular => TypedValue::BoolSeq(vec![wire::SingleBool::decode(value)?.val]),
        Kind::Bool => TypedValue::BoolSeq(wire::ArrBool::decode(value)?.val),
        Kind::String if singular => TypedValue::String(wire::SingleString::decode(value)?.val),
        Kind::String => TypedValue::StringSeq(wire::ArrString::decode(value)?.val),
    };
    Ok((typed, singular))
}

fn to_any<M: Message>(name: &str, message: &M) -> Any {
    Any {
        type_url: type_url(name),
        value: message.encode_to_vec(),
    }
}

/// Encode a label. Singular wrappers are used when the input was singular and
/// the label has one element. Byte labels have no wrapper.
pub fn pack(label: &TypedValue, singular: bool) -> Option<Any> {
    let one = singular && label.len() == 1;
    let any = match label {
        TypedValue::String(val) => to_any("SingleString", &wire::SingleString { val: val.clone() }),
        TypedValue::StringSeq(val) if one => to_any(
            "SingleString",
            &wire::SingleString {
                val: val[0].clone(),
            },
        ),
        TypedValue::StringSeq(val) => to_any("ArrString", &wire::ArrString { val: val.clone() }),
        TypedValue::IntSeq(val) if one => to_any("SingleInt64", &wire::SingleInt64 { val: val[0] }),
        TypedValue::IntSeq(val) => to_any("ArrInt64", &wire::ArrInt64 { val: val.clone() }),
        TypedValue::FloatSeq(val) if one => {
            to_any("SingleDouble", &wire::SingleDouble { val: val[0] })
        }
        TypedValue::FloatSeq(val) => to_any("ArrDouble", &wire::ArrDouble { val: val.clone() }),
        TypedValue::BoolSeq(val) if one => to_any("SingleBool", &wire::SingleBool { val: val[0] }),
        TypedValue::BoolSeq(val) => to_any("ArrBool", &wire::ArrBool { val: val.clone() }),
        TypedValue::Bytes(_) => return None,
    };
    Some(any)
}

impl<P: Predictor> PredictDispatcher<P> {
    /// Run one generic prediction. An input of unknown type yields an empty
    /// response; a predictor failure yields the fallback for the input shape.
    pub async fn predict_any(&self, request: wire::AnyInput) -> wire::AnyOutput {
        let raw_options = request.option.map(|o| o.val).unwrap_or_default();
        let unpacked = request
            .input
            .as_ref()
            .ok_or(UnpackError::MissingInput)
            .and_then(unpack);
        let (input, singular) = match unpacked {
            Ok(unpacked) => unpacked,
            Err(err) => {
                tracing::warn!(error = %err, "Cannot dispatch generic prediction");
                return wire::AnyOutput::default();
            }
        };
        let shape = input.tag();
        let input = Arc::new(input);
        let options = Arc::new(parse_options(&raw_options));

        let result = match self.invoke(&input, &options).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(
                    input = %shape,
                    error = %format!("{err:#}"),
                    "Prediction failed, returning fallback"
                );
                shape.fallback()
            }
        };
        let (result, output) = match pack(&result.label, singular) {
            Some(output) => (result, output),
            None => {
                tracing::error!(
                    label = %result.label.tag(),
                    "Prediction label cannot be packed, returning fallback"
                );
                let fallback: PredictResult = shape.fallback();
                let output = pack(&fallback.label, singular).unwrap_or_default();
                (fallback, output)
            }
        };

        self.log(&input, &options, &result);
        wire::AnyOutput {
            output: Some(output),
            score: result.score.to_vec(),
            option: Some(result.option_message()),
        }
    }
}
