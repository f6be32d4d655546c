// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! modest-io: the byte-buffer and incremental-mutation I/O stack —
//! [`byte_buffer::ByteBuffer`], pluggable [`mutation::MutationAlgorithm`]s
//! (DEFLATE, charset transcoding), the [`mutator_stream`] adapters that
//! drive them over an arbitrary `Read`/`Write`, and a standalone gzip
//! member header codec.

pub mod byte_buffer;
pub mod gzip;
pub mod mutation;
pub mod mutator_stream;

pub use byte_buffer::ByteBuffer;
pub use gzip::{GzipHeader, ParseOutcome};
pub use mutation::{
    CharsetAlgorithm, DeflateAlgorithm, IdentityAlgorithm, InflateAlgorithm, MutationAlgorithm, MutationResult,
};
pub use mutator_stream::{MutatorReader, MutatorWriter};
