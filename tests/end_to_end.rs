// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-crate scenarios exercising the guarded scheduler, the pool, and
//! the event bus together, the way a single real caller would combine
//! them rather than any one crate's unit tests in isolation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use modest_core::State;
use modest_event::{Event, Observable, Observer};
use modest_rt::{Engine, Guard, Operation, StateMutator, Thread, ThreadPool};

struct RunningBelow(i64);
impl Guard for RunningBelow {
    fn can_execute(&self, state: &State) -> bool {
        state.get("running").map(|v| v.as_i64()).unwrap_or(0) < self.0
    }
}

struct AdjustRunning(i64);
impl StateMutator for AdjustRunning {
    fn mutate_pre_execution(&self, state: &mut State) {
        state.increment("running", self.0);
    }
    fn mutate_post_execution(&self, state: &mut State) {
        state.increment("running", -self.0);
    }
}

/// Scenario 1: a guard-gated counter never admits more than `LIMIT`
/// concurrently-running operations, and every operation eventually
/// finishes.
#[test]
fn guard_gated_counter_never_exceeds_its_limit() {
    const LIMIT: i64 = 5;
    const JOBS: usize = 100;

    let engine = Engine::new(ThreadPool::new(Some(16)));
    let max_observed = Arc::new(AtomicI64::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    let ops: Vec<Operation> = (0..JOBS)
        .map(|_| {
            let engine_for_peek = engine.clone();
            let max_observed = max_observed.clone();
            let completed = completed.clone();
            let op = Operation::new(move || {
                let running = engine_for_peek.state_snapshot().get("running").map(|v| v.as_i64()).unwrap_or(0);
                max_observed.fetch_max(running, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(10));
                completed.fetch_add(1, Ordering::SeqCst);
            });
            op.add_guard(Arc::new(RunningBelow(LIMIT)), true);
            op.add_state_mutator(Arc::new(AdjustRunning(1)), true);
            op
        })
        .collect();

    for op in &ops {
        engine.submit(op.clone());
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while ops.iter().any(|op| !op.stopped()) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    assert!(ops.iter().all(Operation::stopped), "every operation must stop");
    assert!(ops.iter().all(Operation::finished), "every operation must finish, none canceled");
    assert_eq!(completed.load(Ordering::SeqCst), JOBS);
    assert!(
        max_observed.load(Ordering::SeqCst) <= LIMIT,
        "running count observed inside a runnable exceeded the guard's limit"
    );
}

/// Scenario 2: interrupting an operation blocked in `Thread::sleep` wakes
/// it immediately (well within its 60-second sleep) and stops it promptly
/// as `canceled`, never `finished`.
#[test]
fn interrupting_a_sleeping_operation_cancels_it_promptly() {
    let engine = Engine::new(ThreadPool::new(Some(2)));
    let op = Operation::new(|| {
        Thread::sleep(Duration::from_secs(60));
    });

    engine.submit(op.clone());
    std::thread::sleep(Duration::from_millis(50));
    op.interrupt();

    let stopped = op.wait_for(false, Some(Duration::from_millis(100)));
    assert!(stopped, "operation should stop within its timeout after being interrupted");
    assert!(op.canceled());
    assert!(!op.finished());
}

/// Scenario 3: idle pooled threads expire after `idle_expire_ms` of
/// continuous idleness.
#[test]
fn idle_pool_threads_expire_after_their_idle_window() {
    let pool = ThreadPool::with_expire_time(Some(4), Some(Duration::from_millis(50)));

    let done = Arc::new(std::sync::Barrier::new(5));
    for _ in 0..4 {
        let done = done.clone();
        pool.run_job(move || {
            done.wait();
        })
        .expect("job dispatch");
    }
    done.wait();

    std::thread::sleep(Duration::from_millis(250));
    assert_eq!(pool.thread_count(), 0, "idle workers must have self-expired");
}

struct RecordingObserver {
    received: Mutex<Vec<u64>>,
}

impl RecordingObserver {
    fn new() -> Self {
        Self { received: Mutex::new(Vec::new()) }
    }
}

impl Observer for RecordingObserver {
    fn handle_event(&self, event: &Event) {
        // Hold the delivery operation open briefly so a serial dispatch's
        // "wait for every delivery before the next event" guarantee is
        // actually exercised rather than racing past it.
        std::thread::sleep(Duration::from_millis(20));
        self.received.lock().unwrap().push(event.sequence_id);
    }
}

/// Scenario 6: two observers registered for the same event ID each see
/// two serially-scheduled events in sequence-ID order, and the second
/// event is not delivered to either until both finish the first.
#[test]
fn serial_events_dispatch_in_sequence_id_order_to_every_observer() {
    let engine = Engine::new(ThreadPool::new(Some(8)));
    let observable = Observable::new(engine);

    const EVENT_ID: u64 = 42;
    let a = Arc::new(RecordingObserver::new());
    let b = Arc::new(RecordingObserver::new());
    observable.register(a.clone() as Arc<dyn Observer>, EVENT_ID, None);
    observable.register(b.clone() as Arc<dyn Observer>, EVENT_ID, None);

    observable.schedule(Event::new(), EVENT_ID, false);
    observable.schedule(Event::new(), EVENT_ID, false);

    let a_seen = a.received.lock().unwrap().clone();
    let b_seen = b.received.lock().unwrap().clone();
    assert_eq!(a_seen.len(), 2);
    assert_eq!(b_seen.len(), 2);
    assert!(a_seen[0] < a_seen[1], "observer A must see events in sequence-id order");
    assert!(b_seen[0] < b_seen[1], "observer B must see events in sequence-id order");
}

/// Scenario 5 (subset): the gzip header parser reports exactly how many
/// more bytes it needs while fed incrementally, then completes and
/// recovers the embedded filename.
#[test]
fn gzip_header_parses_incrementally_and_recovers_the_filename() {
    use modest_io::{GzipHeader, ParseOutcome};

    // 1f 8b 08 08 (FNAME set) 00 00 00 00 00 ff, then "hi\0".
    let mut full = vec![0x1f, 0x8b, 0x08, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff];
    full.extend_from_slice(b"hi\0");

    let mut header = GzipHeader::new();
    let mut fed = Vec::new();
    let mut outcome = None;
    for byte in &full {
        fed.push(*byte);
        outcome = Some(header.parse(&fed).expect("valid gzip header bytes"));
        if matches!(outcome, Some(ParseOutcome::Complete { .. })) {
            break;
        }
    }

    match outcome.expect("parser produced an outcome") {
        ParseOutcome::Complete { consumed } => assert_eq!(consumed, full.len()),
        ParseOutcome::NeedMoreBytes(_) => panic!("header should have completed once all bytes were fed"),
    }
    assert_eq!(header.filename.as_deref(), Some("hi"));
}

/// DEFLATE/INFLATE round trip through the mutator stream adapters,
/// backing the source design's "inflate(deflate(x)) == x" law end to
/// end rather than unit-by-unit.
#[test]
fn deflate_then_inflate_stream_round_trips() {
    use modest_io::{DeflateAlgorithm, InflateAlgorithm, MutatorReader, MutatorWriter};
    use std::io::Read;

    let original = b"the quick brown fox jumps over the lazy dog".repeat(64);

    let mut compressed = Vec::new();
    {
        let mut writer = MutatorWriter::new(&mut compressed, DeflateAlgorithm::new(6));
        std::io::Write::write_all(&mut writer, &original).expect("compress");
        writer.finish().expect("finish compression");
    }

    let mut reader = MutatorReader::new(compressed.as_slice(), InflateAlgorithm::new());
    let mut round_tripped = Vec::new();
    reader.read_to_end(&mut round_tripped).expect("decompress");

    assert_eq!(round_tripped, original);
}
