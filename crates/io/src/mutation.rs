// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable, incremental data transforms that sit between a
//! [`crate::mutator_stream::MutatorReader`]/[`crate::mutator_stream::MutatorWriter`]
//! and the underlying byte stream.
//!
//! A [`MutationAlgorithm`] is driven one step at a time: each call pulls
//! whatever it needs out of `src`, transforms it, and appends the result to
//! `dst`. It never blocks and never owns the stream itself — the mutator
//! stream calls it repeatedly as more source bytes become available.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use modest_core::{ErrorKind, ModestError};

use crate::byte_buffer::ByteBuffer;

/// The outcome of one call to [`MutationAlgorithm::mutate`].
#[derive(Debug)]
pub enum MutationResult {
    /// More source data is required before the next step can run.
    NeedsData,
    /// The algorithm made progress; it may or may not be done.
    Stepped,
    /// The algorithm is finished. Any untouched bytes remaining in `src`
    /// belong after what was written to `dst` (e.g. trailing plaintext
    /// after a decompressed stream).
    CompleteAppend,
    /// The algorithm is finished. Any untouched bytes remaining in `src`
    /// must be discarded by the caller, not appended to `dst`.
    CompleteTruncate,
    /// The algorithm failed and cannot continue.
    Error(ModestError),
}

/// Transforms bytes from `src` into `dst`, incrementally.
///
/// Once `mutate` returns a `Complete*` variant it will not be called again
/// for the same stream.
pub trait MutationAlgorithm {
    fn mutate(&mut self, src: &mut ByteBuffer, dst: &mut ByteBuffer, finish: bool) -> MutationResult;
}

/// Passes bytes through unchanged. Useful for exercising the mutator
/// stream plumbing without a real codec.
#[derive(Debug, Default)]
pub struct IdentityAlgorithm;

impl MutationAlgorithm for IdentityAlgorithm {
    fn mutate(&mut self, src: &mut ByteBuffer, dst: &mut ByteBuffer, finish: bool) -> MutationResult {
        if src.is_empty() {
            return if finish { MutationResult::CompleteAppend } else { MutationResult::NeedsData };
        }
        let n = src.get(dst, src.length(), true);
        if n == 0 {
            return MutationResult::NeedsData;
        }
        if finish && src.is_empty() {
            MutationResult::CompleteAppend
        } else {
            MutationResult::Stepped
        }
    }
}

/// Compresses bytes with raw DEFLATE.
pub struct DeflateAlgorithm {
    compress: Compress,
}

impl DeflateAlgorithm {
    pub fn new(level: u32) -> Self {
        Self { compress: Compress::new(Compression::new(level), false) }
    }
}

impl MutationAlgorithm for DeflateAlgorithm {
    fn mutate(&mut self, src: &mut ByteBuffer, dst: &mut ByteBuffer, finish: bool) -> MutationResult {
        dst.allocate_space(src.length().max(64), true);
        let flush = if finish { FlushCompress::Finish } else { FlushCompress::None };
        let before_in = self.compress.total_in();
        let before_out = self.compress.total_out();

        let status = match self.compress.compress(src.data(), dst.spare_capacity_mut(), flush) {
            Ok(s) => s,
            Err(e) => return MutationResult::Error(ModestError::new(ErrorKind::Io, e.to_string())),
        };

        let consumed = (self.compress.total_in() - before_in) as usize;
        let produced = (self.compress.total_out() - before_out) as usize;
        src.advance_offset(consumed);
        dst.extend(produced);

        match status {
            Status::StreamEnd => MutationResult::CompleteTruncate,
            Status::BufError if consumed == 0 && produced == 0 => MutationResult::NeedsData,
            _ => MutationResult::Stepped,
        }
    }
}

/// Decompresses a raw DEFLATE stream.
pub struct InflateAlgorithm {
    decompress: Decompress,
}

impl InflateAlgorithm {
    pub fn new() -> Self {
        Self { decompress: Decompress::new(false) }
    }
}

impl Default for InflateAlgorithm {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationAlgorithm for InflateAlgorithm {
    fn mutate(&mut self, src: &mut ByteBuffer, dst: &mut ByteBuffer, finish: bool) -> MutationResult {
        dst.allocate_space(src.length().max(64).saturating_mul(2), true);
        let flush = if finish { FlushDecompress::Finish } else { FlushDecompress::None };
        let before_in = self.decompress.total_in();
        let before_out = self.decompress.total_out();

        let status = match self.decompress.decompress(src.data(), dst.spare_capacity_mut(), flush) {
            Ok(s) => s,
            Err(e) => {
                return MutationResult::Error(ModestError::new(ErrorKind::Io, format!("inflate error: {e}")))
            }
        };

        let consumed = (self.decompress.total_in() - before_in) as usize;
        let produced = (self.decompress.total_out() - before_out) as usize;
        src.advance_offset(consumed);
        dst.extend(produced);

        match status {
            Status::StreamEnd => MutationResult::CompleteAppend,
            Status::BufError if consumed == 0 && produced == 0 => MutationResult::NeedsData,
            _ => MutationResult::Stepped,
        }
    }
}

/// Transcodes text from one character encoding to another (e.g.
/// `windows-1252` to `utf-8`), using the WHATWG encodings `encoding_rs`
/// implements.
pub struct CharsetAlgorithm {
    decoder: encoding_rs::Decoder,
    encoder: encoding_rs::Encoder,
}

impl CharsetAlgorithm {
    pub fn new(from: &'static encoding_rs::Encoding, to: &'static encoding_rs::Encoding) -> Self {
        Self { decoder: from.new_decoder(), encoder: to.new_encoder() }
    }
}

impl MutationAlgorithm for CharsetAlgorithm {
    fn mutate(&mut self, src: &mut ByteBuffer, dst: &mut ByteBuffer, finish: bool) -> MutationResult {
        if src.is_empty() && !finish {
            return MutationResult::NeedsData;
        }

        let mut utf16 = String::new();
        let (_, consumed, _) = self.decoder.decode_to_string(src.data(), &mut utf16, finish);
        src.advance_offset(consumed);

        dst.allocate_space(utf16.len().max(64), true);
        let spare = dst.spare_capacity_mut();
        let (result, _, written, _) = self.encoder.encode_from_utf8(&utf16, spare, finish);
        dst.extend(written);

        if result == encoding_rs::CoderResult::OutputFull {
            return MutationResult::Stepped;
        }
        if finish && src.is_empty() {
            MutationResult::CompleteAppend
        } else {
            MutationResult::Stepped
        }
    }
}

#[cfg(test)]
#[path = "mutation_tests.rs"]
mod tests;
