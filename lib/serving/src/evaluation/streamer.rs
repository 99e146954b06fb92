// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Byte-budgeted batching of evaluation details.
//!
//! Details are collected in blocks of [`CHUNK_SIZE`]. A completed block joins
//! the held unit while the encoded response stays within [`BYTE_LIMIT`];
//! otherwise the held unit is emitted first and the block starts a new one.
//! Every emitted response repeats the full metrics.

use futures::{Stream, StreamExt};
use prost::encoding::message::encoded_len;

use crate::protocols::wire::{EvaluationMetrics, EvaluationResultResponse, ResultDetail};
use crate::protocols::{EvaluateMetrics, EvaluationDetail};

/// Details per accumulation step
pub const CHUNK_SIZE: usize = 100;

/// Largest encoded response, just under the default 4 MiB gRPC message limit
pub const BYTE_LIMIT: usize = 4_190_000;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Evaluation detail of {size} bytes cannot fit in a message of {limit} bytes")]
    Oversized { size: usize, limit: usize },

    #[error("Reading evaluation details failed: {0:#}")]
    Source(anyhow::Error),
}

/// A run of details with its encoded size
#[derive(Debug, Default)]
struct Unit {
    details: Vec<ResultDetail>,
    len: usize,
}

impl Unit {
    fn push(&mut self, detail: ResultDetail, len: usize) {
        self.details.push(detail);
        self.len += len;
    }

    fn append(&mut self, other: Unit) {
        self.details.extend(other.details);
        self.len += other.len;
    }

    fn is_empty(&self) -> bool {
        self.details.is_empty()
    }
}

/// Incremental form of the batching algorithm.
///
/// [`ResultChunker::push`] and [`ResultChunker::finish`] return the responses
/// that became ready. None of them is empty and none encodes to more than
/// the byte limit.
#[derive(Debug)]
pub struct ResultChunker {
    metrics: EvaluationMetrics,
    base_len: usize,
    limit: usize,
    chunk_size: usize,
    held: Unit,
    pending: Unit,
}

impl ResultChunker {
    pub fn new(metrics: EvaluationMetrics) -> Self {
        Self::with_limits(metrics, CHUNK_SIZE, BYTE_LIMIT)
    }

    pub fn with_limits(metrics: EvaluationMetrics, chunk_size: usize, limit: usize) -> Self {
        let base_len = encoded_len(1, &metrics);
        ResultChunker {
            metrics,
            base_len,
            limit,
            chunk_size: chunk_size.max(1),
            held: Unit::default(),
            pending: Unit::default(),
        }
    }

    /// Encoded size of a response carrying `details_len` bytes of details
    fn fits(&self, details_len: usize) -> bool {
        self.base_len + details_len <= self.limit
    }

    pub fn push(&mut self, detail: ResultDetail) -> Result<Vec<EvaluationResultResponse>, StreamError> {
        let len = encoded_len(2, &detail);
        if !self.fits(len) {
            return Err(StreamError::Oversized {
                size: self.base_len + len,
                limit: self.limit,
            });
        }
        self.pending.push(detail, len);
        if self.pending.details.len() < self.chunk_size {
            return Ok(Vec::new());
        }

        let block = std::mem::take(&mut self.pending);
        if self.fits(self.held.len + block.len) {
            self.held.append(block);
            return Ok(Vec::new());
        }

        let mut ready = Vec::new();
        let held = std::mem::take(&mut self.held);
        if !held.is_empty() {
            ready.push(self.response(held));
        }
        let mut units = self.split(block);
        // Keep the last piece so later blocks can join it
        if let Some(last) = units.pop() {
            self.held = last;
        }
        ready.extend(units.into_iter().map(|u| self.response(u)));
        Ok(ready)
    }

    /// Flush everything still buffered
    pub fn finish(mut self) -> Vec<EvaluationResultResponse> {
        let held = std::mem::take(&mut self.held);
        let pending = std::mem::take(&mut self.pending);
        let mut ready = Vec::new();
        if self.fits(held.len + pending.len) {
            let mut unit = held;
            unit.append(pending);
            if !unit.is_empty() {
                ready.push(self.response(unit));
            }
            return ready;
        }
        if !held.is_empty() {
            ready.push(self.response(held));
        }
        for unit in self.split(pending) {
            ready.push(self.response(unit));
        }
        ready
    }

    /// Greedily cut `unit` into pieces that each fit. Every detail fits on
    /// its own, which `push` checked.
    fn split(&self, unit: Unit) -> Vec<Unit> {
        let mut units = Vec::new();
        let mut current = Unit::default();
        for detail in unit.details {
            let len = encoded_len(2, &detail);
            if !current.is_empty() && !self.fits(current.len + len) {
                units.push(std::mem::take(&mut current));
            }
            current.push(detail, len);
        }
        if !current.is_empty() {
            units.push(current);
        }
        units
    }

    fn response(&self, unit: Unit) -> EvaluationResultResponse {
        EvaluationResultResponse {
            metrics: Some(self.metrics.clone()),
            detail: unit.details,
        }
    }
}

/// Stream `details` as byte-bounded responses carrying `metrics`.
///
/// The source is pulled lazily as the transport asks for more; dropping the
/// returned stream stops reading it.
pub fn stream_results<S, E>(
    metrics: &EvaluateMetrics,
    details: S,
) -> impl Stream<Item = Result<EvaluationResultResponse, StreamError>> + Send + use<S, E>
where
    S: Stream<Item = Result<EvaluationDetail, E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    let metrics = EvaluationMetrics::from(metrics);
    async_stream::try_stream! {
        let mut chunker = ResultChunker::new(metrics);
        let mut details = std::pin::pin!(details);
        let mut count = 0usize;
        while let Some(detail) = details.next().await {
            let detail = detail.map_err(|e| StreamError::Source(e.into()))?;
            count += 1;
            for response in chunker.push(ResultDetail::from(&detail))? {
                yield response;
            }
        }
        for response in chunker.finish() {
            yield response;
        }
        tracing::debug!(count, "Streamed evaluation details");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::{PredictResult, TypedValue};
    use futures::stream;
    use prost::Message;
    use rstest::rstest;

    fn detail(index: usize, payload: usize) -> EvaluationDetail {
        EvaluationDetail {
            input: TypedValue::Bytes(vec![(index % 256) as u8; payload]),
            label: TypedValue::IntSeq(vec![index as i64]),
            output: PredictResult::new(TypedValue::IntSeq(vec![index as i64]), vec![1.0f64]),
            is_correct: true,
        }
    }

    async fn collect(count: usize, payload: usize) -> Vec<EvaluationResultResponse> {
        let details: Vec<Result<EvaluationDetail, anyhow::Error>> =
            (0..count).map(|i| Ok(detail(i, payload))).collect();
        stream_results(&EvaluateMetrics::default(), stream::iter(details))
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    fn labels(responses: &[EvaluationResultResponse]) -> Vec<ResultDetail> {
        responses.iter().flat_map(|r| r.detail.clone()).collect()
    }

    fn assert_ordered(responses: &[EvaluationResultResponse], count: usize) {
        let details = labels(responses);
        assert_eq!(details.len(), count);
        for (i, d) in details.iter().enumerate() {
            assert_eq!(d.label, Some((&TypedValue::IntSeq(vec![i as i64])).into()));
        }
        for response in responses {
            assert!(!response.detail.is_empty());
            assert!(response.encoded_len() <= BYTE_LIMIT);
            assert!(response.metrics.is_some());
        }
    }

    #[tokio::test]
    async fn test_third_block_overflows() {
        // ~30 KB per detail: two blocks of 100 exceed the limit
        let responses = collect(250, 30_000).await;
        let sizes: Vec<usize> = responses.iter().map(|r| r.detail.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_ordered(&responses, 250);
    }

    #[rstest]
    #[case(0, 10, 0)]
    #[case(5, 10, 1)]
    #[case(100, 10, 1)]
    #[case(1001, 10, 1)]
    #[tokio::test]
    async fn test_small_details_share_one_response(
        #[case] count: usize,
        #[case] payload: usize,
        #[case] responses: usize,
    ) {
        let out = collect(count, payload).await;
        assert_eq!(out.len(), responses);
        assert_ordered(&out, count);
    }

    #[tokio::test]
    async fn test_full_block_too_large_is_split() {
        // One block of 100 at ~100 KB each is more than twice the limit
        let out = collect(130, 100_000).await;
        assert!(out.len() >= 4);
        assert_ordered(&out, 130);
    }

    #[test]
    fn test_oversized_detail() {
        let mut chunker = ResultChunker::new(EvaluationMetrics::default());
        let err = chunker
            .push(ResultDetail::from(&detail(0, BYTE_LIMIT)))
            .unwrap_err();
        assert!(matches!(err, StreamError::Oversized { .. }));
    }

    #[test]
    fn test_limit_is_inclusive() {
        let metrics = EvaluationMetrics::default();
        let one = ResultDetail::from(&detail(0, 10));
        let exact = encoded_len(1, &metrics) + 2 * encoded_len(2, &one);
        let mut chunker = ResultChunker::with_limits(metrics, 2, exact);
        assert!(chunker.push(one.clone()).unwrap().is_empty());
        assert!(chunker.push(one.clone()).unwrap().is_empty());
        let out = chunker.finish();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].encoded_len(), exact);
    }

    #[tokio::test]
    async fn test_source_error_ends_stream() {
        let details: Vec<Result<EvaluationDetail, anyhow::Error>> =
            vec![Ok(detail(0, 1)), Err(anyhow::anyhow!("disk gone"))];
        let out: Vec<_> = stream_results(&EvaluateMetrics::default(), stream::iter(details))
            .collect()
            .await;
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(StreamError::Source(_))));
    }
}
