// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! On-disk form of an evaluation run: a JSON summary and a JSONL file with
//! one detail per line, in evaluation order.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use futures::Stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::path::ValidPath;
use crate::protocols::{EvaluateMetrics, EvaluationDetail};

const DETAIL_SUFFIX: &str = "_eval_detail.jsonl";
const SUMMARY_SUFFIX: &str = "_eval_res.json";

/// Storage keys and local paths of one evaluation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFiles {
    pub detail_key: ValidPath,
    pub summary_key: ValidPath,
    pub detail_path: PathBuf,
    pub summary_path: PathBuf,
}

impl ResultFiles {
    pub fn new(eval_dir: &Path, result: &ValidPath) -> Self {
        let detail_key = result.with_suffix(DETAIL_SUFFIX);
        let summary_key = result.with_suffix(SUMMARY_SUFFIX);
        ResultFiles {
            detail_path: detail_key.under(eval_dir),
            summary_path: summary_key.under(eval_dir),
            detail_key,
            summary_key,
        }
    }
}

/// Writes details to a temporary file that replaces the destination on
/// [`DetailWriter::finish`]. Used from the blocking evaluation thread.
#[derive(Debug)]
pub struct DetailWriter {
    destination: PathBuf,
    file: BufWriter<tempfile::NamedTempFile>,
    count: u64,
}

impl DetailWriter {
    pub fn create(destination: &Path) -> io::Result<Self> {
        let parent = destination.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)?;
        Ok(DetailWriter {
            destination: destination.to_path_buf(),
            file: BufWriter::new(tempfile::NamedTempFile::new_in(parent)?),
            count: 0,
        })
    }

    pub fn write(&mut self, detail: &EvaluationDetail) -> io::Result<()> {
        serde_json::to_writer(&mut self.file, detail)?;
        self.file.write_all(b"\n")?;
        self.count += 1;
        Ok(())
    }

    /// Number of details written so far
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn finish(self) -> io::Result<u64> {
        let temp = self.file.into_inner().map_err(|e| e.into_error())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.destination).map_err(|e| e.error)?;
        Ok(self.count)
    }
}

pub async fn write_summary(path: &Path, metrics: &EvaluateMetrics) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(metrics)?;
    tokio::fs::write(path, json).await
}

/// The persisted metrics, or `None` when the run left no summary
pub async fn read_summary(path: &Path) -> io::Result<Option<EvaluateMetrics>> {
    match tokio::fs::read(path).await {
        Ok(json) => Ok(Some(serde_json::from_slice(&json)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Lazily read the details of a run, one line at a time
pub fn read_details(
    path: PathBuf,
) -> impl Stream<Item = anyhow::Result<EvaluationDetail>> + Send + 'static {
    async_stream::try_stream! {
        let file = tokio::fs::File::open(&path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut line_number = 0usize;
        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let detail: EvaluationDetail = serde_json::from_str(&line).map_err(|e| {
                anyhow::anyhow!("{}:{line_number}: {e}", path.display())
            })?;
            yield detail;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::validate;
    use crate::protocols::{PredictResult, TypedValue};
    use futures::StreamExt;
    use tempfile::TempDir;

    fn detail(i: i64) -> EvaluationDetail {
        EvaluationDetail {
            input: TypedValue::String(format!("input {i}")),
            label: TypedValue::IntSeq(vec![i]),
            output: PredictResult::new(TypedValue::IntSeq(vec![i]), 0.5),
            is_correct: i % 2 == 0,
        }
    }

    #[test]
    fn test_result_files() {
        let files = ResultFiles::new(Path::new("/data/eval"), &validate("runs/r1").unwrap());
        assert_eq!(files.detail_key.as_str(), "runs/r1_eval_detail.jsonl");
        assert_eq!(files.summary_key.as_str(), "runs/r1_eval_res.json");
        assert_eq!(
            files.summary_path,
            PathBuf::from("/data/eval/runs/r1_eval_res.json")
        );
    }

    #[tokio::test]
    async fn test_details_round_trip_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("r_eval_detail.jsonl");
        let mut writer = DetailWriter::create(&path).unwrap();
        for i in 0..50 {
            writer.write(&detail(i)).unwrap();
        }
        assert!(!path.exists());
        assert_eq!(writer.finish().unwrap(), 50);

        let read: Vec<EvaluationDetail> = read_details(path)
            .map(|d| d.unwrap())
            .collect()
            .await;
        assert_eq!(read, (0..50).map(detail).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_dropped_writer_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r_eval_detail.jsonl");
        let mut writer = DetailWriter::create(&path).unwrap();
        writer.write(&detail(1)).unwrap();
        drop(writer);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_summary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r_eval_res.json");
        assert_eq!(read_summary(&path).await.unwrap(), None);

        let metrics = EvaluateMetrics {
            count: 3,
            accuracy: 2.0 / 3.0,
            ..Default::default()
        };
        write_summary(&path, &metrics).await.unwrap();
        assert_eq!(read_summary(&path).await.unwrap(), Some(metrics));
    }

    #[tokio::test]
    async fn test_corrupt_line_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();
        let read: Vec<_> = read_details(path).collect().await;
        assert_eq!(read.len(), 1);
        assert!(read[0].is_err());
    }
}
