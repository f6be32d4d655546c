// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! modest-rt: the guarded-task scheduler — [`operation::Operation`] plus
//! its guard/mutator chains, the [`engine::Engine`] that admits queued
//! operations against a shared [`modest_core::State`], and the
//! [`pool::ThreadPool`] that actually runs them.

pub mod engine;
pub mod operation;
pub mod pool;
pub mod thread;

pub use engine::Engine;
pub use operation::{Guard, GuardChain, GuardResult, MutatorChain, Operation, OperationId, OperationPhase, StateMutator};
pub use pool::ThreadPool;
pub use thread::Thread;
