// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream adapters that run a [`MutationAlgorithm`] over bytes as they
//! flow through an underlying [`std::io::Read`] or [`std::io::Write`].

use std::io::{self, Read, Write};

use crate::byte_buffer::ByteBuffer;
use crate::mutation::{MutationAlgorithm, MutationResult};

const STAGING_CAPACITY: usize = 8 * 1024;

/// Reads from an underlying stream, mutating the bytes with `A` before
/// handing them to the caller.
pub struct MutatorReader<R, A> {
    inner: R,
    algorithm: A,
    src: ByteBuffer,
    dst: ByteBuffer,
    source_empty: bool,
    finished: bool,
}

impl<R: Read, A: MutationAlgorithm> MutatorReader<R, A> {
    pub fn new(inner: R, algorithm: A) -> Self {
        Self {
            inner,
            algorithm,
            src: ByteBuffer::new(STAGING_CAPACITY),
            dst: ByteBuffer::new(STAGING_CAPACITY),
            source_empty: false,
            finished: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read, A: MutationAlgorithm> Read for MutatorReader<R, A> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if !self.dst.is_empty() {
                return Ok(self.dst.get_into(buf));
            }
            if self.finished {
                return Ok(0);
            }

            if !self.source_empty {
                self.src.allocate_space(STAGING_CAPACITY, true);
                let n = self.src.put_from_reader(&mut self.inner, 0)?;
                if n == 0 {
                    self.source_empty = true;
                }
            }

            match self.algorithm.mutate(&mut self.src, &mut self.dst, self.source_empty) {
                MutationResult::NeedsData => {
                    if self.source_empty {
                        // Source exhausted and the algorithm still wants more: nothing left to give it.
                        self.finished = true;
                        return Ok(0);
                    }
                }
                MutationResult::Stepped => {}
                MutationResult::CompleteAppend => {
                    self.dst.put_from(&self.src, self.src.length(), true);
                    self.src.clear_all();
                    self.finished = true;
                }
                MutationResult::CompleteTruncate => {
                    self.src.clear_all();
                    self.finished = true;
                }
                MutationResult::Error(e) => {
                    return Err(io::Error::other(e));
                }
            }
        }
    }
}

/// Writes to an underlying stream, mutating bytes with `A` before they
/// reach it. Callers must call [`MutatorWriter::finish`] once all data has
/// been written to flush any data the algorithm is still holding.
pub struct MutatorWriter<W, A> {
    inner: W,
    algorithm: A,
    src: ByteBuffer,
    dst: ByteBuffer,
    finished: bool,
}

impl<W: Write, A: MutationAlgorithm> MutatorWriter<W, A> {
    pub fn new(inner: W, algorithm: A) -> Self {
        Self {
            inner,
            algorithm,
            src: ByteBuffer::new(STAGING_CAPACITY),
            dst: ByteBuffer::new(STAGING_CAPACITY),
            finished: false,
        }
    }

    fn drain_step(&mut self, finish: bool) -> io::Result<MutationResult> {
        let result = self.algorithm.mutate(&mut self.src, &mut self.dst, finish);
        while !self.dst.is_empty() {
            self.dst.get_to_writer(&mut self.inner)?;
        }
        Ok(result)
    }

    /// Signal that no more data will be written, flush the algorithm's
    /// remaining internal state, and return the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        if !self.finished {
            loop {
                match self.drain_step(true)? {
                    MutationResult::CompleteAppend => {
                        let mut leftover = ByteBuffer::new(self.src.length().max(1));
                        self.src.get(&mut leftover, self.src.length(), true);
                        self.inner.write_all(leftover.data())?;
                        break;
                    }
                    MutationResult::CompleteTruncate => break,
                    MutationResult::Error(e) => return Err(io::Error::other(e)),
                    MutationResult::NeedsData | MutationResult::Stepped => {
                        if self.src.is_empty() {
                            break;
                        }
                    }
                }
            }
            self.finished = true;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write, A: MutationAlgorithm> Write for MutatorWriter<W, A> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Ok(0);
        }
        let n = self.src.put(buf, true);
        loop {
            match self.drain_step(false)? {
                MutationResult::Error(e) => return Err(io::Error::other(e)),
                MutationResult::NeedsData => break,
                MutationResult::CompleteAppend | MutationResult::CompleteTruncate => {
                    self.finished = true;
                    break;
                }
                MutationResult::Stepped => {
                    if self.src.is_empty() {
                        break;
                    }
                }
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
#[path = "mutator_stream_tests.rs"]
mod tests;
