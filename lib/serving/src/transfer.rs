// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Chunked file transfer.
//!
//! A file travels as a stream of fragments. The first fragment names the
//! destination; later fragments only carry data. Received files are written to
//! a temporary file next to the destination and renamed into place, so the
//! destination never holds a partial file.

use std::fmt;
use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::path::{self, InvalidPathError, ValidPath};
use crate::protocols::wire;

/// Fragment size used when sending files, below the default 4 MiB gRPC
/// message limit
pub const DEFAULT_FRAGMENT_SIZE: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error(transparent)]
    InvalidPath(#[from] InvalidPathError),

    #[error("Transfer contained no fragments")]
    EmptyTransfer,

    #[error("Transfer stream failed: {0}")]
    Stream(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        TransferError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One message of a chunked file transfer
pub trait FileFragment: Send + 'static {
    fn path(&self) -> &str;
    fn into_data(self) -> Vec<u8>;
    fn from_parts(path: String, data: Vec<u8>) -> Self;
}

impl FileFragment for wire::UploadModelRequest {
    fn path(&self) -> &str {
        &self.path
    }

    fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn from_parts(path: String, data: Vec<u8>) -> Self {
        wire::UploadModelRequest { path, data }
    }
}

impl FileFragment for wire::UploadEvaluationDataRequest {
    fn path(&self) -> &str {
        &self.data_path
    }

    fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn from_parts(data_path: String, data: Vec<u8>) -> Self {
        wire::UploadEvaluationDataRequest { data_path, data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    /// Validated path the sender asked for
    pub key: ValidPath,
    /// Where the file now lives
    pub local_path: PathBuf,
    pub size: u64,
}

/// Assembles fragment streams into files below a root directory.
#[derive(Debug, Clone)]
pub struct ChunkedFileReceiver {
    root: PathBuf,
}

impl ChunkedFileReceiver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ChunkedFileReceiver { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drain `fragments` into `<root>/<path of the first fragment>`.
    ///
    /// The path is validated before anything touches the filesystem, and an
    /// invalid path stops the transfer without reading further fragments.
    pub async fn receive<F, E, S>(&self, fragments: S) -> Result<ReceivedFile, TransferError>
    where
        F: FileFragment,
        E: fmt::Display,
        S: Stream<Item = Result<F, E>> + Send,
    {
        let mut fragments = std::pin::pin!(fragments);

        let first = match fragments.next().await {
            Some(first) => first.map_err(|e| TransferError::Stream(e.to_string()))?,
            None => return Err(TransferError::EmptyTransfer),
        };
        let key = path::validate(first.path())?;
        let destination = key.under(&self.root);
        let parent = destination
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| TransferError::io(&parent, e))?;

        // Dropping `temp` on any error below removes the partial file
        let temp = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| TransferError::io(&parent, e))?;
        let std_file = temp
            .as_file()
            .try_clone()
            .map_err(|e| TransferError::io(temp.path(), e))?;
        let mut file = tokio::fs::File::from_std(std_file);

        let mut size = write_fragment(&mut file, temp.path(), first.into_data()).await?;
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment.map_err(|e| TransferError::Stream(e.to_string()))?;
            size += write_fragment(&mut file, temp.path(), fragment.into_data()).await?;
        }
        file.flush()
            .await
            .map_err(|e| TransferError::io(temp.path(), e))?;
        file.sync_all()
            .await
            .map_err(|e| TransferError::io(temp.path(), e))?;
        drop(file);

        temp.persist(&destination)
            .map_err(|e| TransferError::io(&destination, e.error))?;
        tracing::debug!(path = %destination.display(), size, "Received file");

        Ok(ReceivedFile {
            key,
            local_path: destination,
            size,
        })
    }
}

async fn write_fragment(
    file: &mut tokio::fs::File,
    path: &Path,
    data: Vec<u8>,
) -> Result<u64, TransferError> {
    file.write_all(&data)
        .await
        .map_err(|e| TransferError::io(path, e))?;
    Ok(data.len() as u64)
}

/// Stream the file at `local_path` as fragments of at most `fragment_size`
/// bytes. The first fragment carries `key`; an empty file is sent as one
/// empty fragment.
pub fn send_file<F: FileFragment>(
    local_path: PathBuf,
    key: String,
    fragment_size: usize,
) -> impl Stream<Item = Result<F, TransferError>> + Send {
    async_stream::try_stream! {
        let mut file = tokio::fs::File::open(&local_path)
            .await
            .map_err(|e| TransferError::io(&local_path, e))?;
        let mut key = Some(key);
        let mut buf = vec![0u8; fragment_size.max(1)];
        loop {
            let n = read_full(&mut file, &mut buf)
                .await
                .map_err(|e| TransferError::io(&local_path, e))?;
            if n == 0 && key.is_none() {
                break;
            }
            yield F::from_parts(key.take().unwrap_or_default(), buf[..n].to_vec());
            if n < buf.len() {
                break;
            }
        }
    }
}

/// Fill `buf` unless the file ends first
async fn read_full(file: &mut tokio::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
