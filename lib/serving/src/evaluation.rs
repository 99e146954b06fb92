// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Evaluation results: persistence of a run and byte-bounded streaming of its
//! details back to clients.

pub mod results;
pub mod streamer;

pub use results::{ResultFiles, read_details, read_summary};
pub use streamer::{BYTE_LIMIT, CHUNK_SIZE, ResultChunker, StreamError, stream_results};
