// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::*;
use crate::engine::Engine;
use crate::operation::Operation;
use crate::pool::ThreadPool;

#[test]
fn sleep_outside_an_operation_just_sleeps_the_duration() {
    let start = Instant::now();
    assert!(Thread::sleep(Duration::from_millis(20)));
    assert!(start.elapsed() >= Duration::from_millis(20));
}

#[test]
fn sleep_inside_an_operation_wakes_early_on_interrupt() {
    let engine = Engine::new(ThreadPool::new(Some(1)));
    let op = Operation::new(|| {
        Thread::sleep(Duration::from_secs(30));
    });

    engine.submit(op.clone());
    std::thread::sleep(Duration::from_millis(30));
    let start = Instant::now();
    op.interrupt();

    assert!(op.wait_for(false, Some(Duration::from_millis(200))));
    assert!(start.elapsed() < Duration::from_secs(1), "interrupt should wake the sleeper promptly, not after the full duration");
}

#[test]
fn interrupted_reports_and_optionally_clears_the_flag() {
    let completed = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let engine = Engine::new(ThreadPool::new(Some(1)));
    let flag = completed.clone();
    let op = Operation::new(move || {
        Operation::current_is_interrupted(); // warm the current-operation slot
        assert!(Thread::interrupted(false));
        assert!(Thread::interrupted(true));
        assert!(!Thread::interrupted(false));
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
    });
    op.interrupt();
    engine.submit(op.clone());

    assert!(op.wait_for(false, Some(Duration::from_millis(200))));
    assert!(completed.load(std::sync::atomic::Ordering::SeqCst));
}

#[test]
fn current_thread_identifies_the_running_operation() {
    let engine = Engine::new(ThreadPool::new(Some(1)));
    let op = Operation::new(|| {
        assert!(Thread::current_thread().is_some());
    });
    let expected_id = op.id();
    engine.submit(op.clone());
    assert!(op.wait_for(false, Some(Duration::from_millis(200))));
    let _ = expected_id;
}
