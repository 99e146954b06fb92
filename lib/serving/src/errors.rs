// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use tonic::Status;

use crate::evaluation::StreamError;
use crate::path::InvalidPathError;
use crate::storage::StorageError;
use crate::transfer::TransferError;

/// Failure of a lifecycle operation. Converting into a [`Status`] is the one
/// place gRPC status codes are chosen.
#[derive(Debug, thiserror::Error)]
pub enum ServingError {
    #[error(transparent)]
    InvalidPath(#[from] InvalidPathError),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transfer(TransferError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("Record store error: {0}")]
    Store(#[from] modelhost_runtime::storage::key_value_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl From<TransferError> for ServingError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::InvalidPath(e) => ServingError::InvalidPath(e),
            other => ServingError::Transfer(other),
        }
    }
}

impl ServingError {
    /// Prefix the message with the operation's fixed failure message
    pub fn into_status(self, context: &str) -> Status {
        let message = format!("{context} {self}");
        match self {
            ServingError::InvalidPath(_) | ServingError::InvalidRequest(_) => {
                Status::invalid_argument(message)
            }
            ServingError::Transfer(TransferError::EmptyTransfer) => {
                Status::invalid_argument(message)
            }
            ServingError::NotFound(_)
            | ServingError::Storage(StorageError::NotFound(_))
            | ServingError::Storage(StorageError::NotConfigured(_)) => Status::not_found(message),
            ServingError::Storage(StorageError::Io { .. }) => Status::internal(message),
            ServingError::Storage(_) => Status::unavailable(message),
            _ => Status::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_status_mapping() {
        let err = ServingError::from(crate::path::validate("../x").unwrap_err());
        let status = err.into_status("Error: Uploading model file.");
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().starts_with("Error: Uploading model file."));

        let status = ServingError::Storage(StorageError::NotFound("m".into())).into_status("e");
        assert_eq!(status.code(), Code::NotFound);

        let status = ServingError::Storage(StorageError::NotConfigured("m".into())).into_status("e");
        assert_eq!(status.code(), Code::NotFound);

        let status = ServingError::from(TransferError::EmptyTransfer).into_status("e");
        assert_eq!(status.code(), Code::InvalidArgument);

        let status = ServingError::from(anyhow::anyhow!("load failed")).into_status("e");
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "e load failed");
    }
}
