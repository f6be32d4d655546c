// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A pool of reusable OS threads that run boxed jobs, one job per thread
//! at a time, going idle (and eventually expiring) between jobs.
//!
//! Deliberately `std::thread` based rather than an async runtime: the
//! scheduler this pool backs is one-OS-thread-per-running-job by design,
//! with no fibers or green threads.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use modest_core::{ErrorKind, ModestError};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A counting semaphore with a blocking, non-interruptible `acquire`, a
/// non-blocking `try_acquire`, and a capacity that can be grown or shrunk
/// at runtime. `capacity: None` means unlimited — every acquire succeeds
/// immediately.
struct Semaphore {
    state: Mutex<SemaphoreState>,
    condvar: Condvar,
}

struct SemaphoreState {
    capacity: Option<usize>,
    used: usize,
}

impl Semaphore {
    fn new(capacity: Option<usize>) -> Self {
        Self { state: Mutex::new(SemaphoreState { capacity, used: 0 }), condvar: Condvar::new() }
    }

    fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        match state.capacity {
            None => true,
            Some(cap) if state.used < cap => {
                state.used += 1;
                true
            }
            Some(_) => false,
        }
    }

    fn acquire(&self) {
        let mut state = self.state.lock();
        if state.capacity.is_none() {
            return;
        }
        loop {
            match state.capacity {
                None => return,
                Some(cap) if state.used < cap => {
                    state.used += 1;
                    return;
                }
                _ => self.condvar.wait(&mut state),
            }
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        if state.used > 0 {
            state.used -= 1;
        }
        self.condvar.notify_one();
    }

    fn set_capacity(&self, capacity: Option<usize>) {
        let mut state = self.state.lock();
        state.capacity = capacity;
        self.condvar.notify_all();
    }
}

struct PooledThreadShared {
    /// The job to run, plus an optional hook invoked after the pool has
    /// already released this job's permit (see
    /// [`ThreadPool::dispatch_reserved`]) — callers that need to retry
    /// admission once pool capacity frees up must run that retry from
    /// this hook rather than from the job itself, since the permit is
    /// not yet released while the job is still on the worker's stack.
    job: Mutex<Option<(Job, Option<Job>)>>,
    condvar: Condvar,
    expire_after: Option<Duration>,
    expired: AtomicBool,
}

/// A single worker thread owned by a [`ThreadPool`]: runs whatever job is
/// placed in its slot, then waits (with an expiry timeout, if configured)
/// for the next one.
struct PooledThread {
    id: usize,
    shared: Arc<PooledThreadShared>,
    handle: Option<JoinHandle<()>>,
}

impl PooledThread {
    /// Spawn a worker thread. Returns `None` if the OS refuses to create
    /// one (resource exhaustion) — the caller treats that exactly like a
    /// pool that stayed at its current size.
    fn spawn(id: usize, expire_after: Option<Duration>, pool: Arc<ThreadPoolInner>) -> Option<Self> {
        let shared = Arc::new(PooledThreadShared {
            job: Mutex::new(None),
            condvar: Condvar::new(),
            expire_after,
            expired: AtomicBool::new(false),
        });
        let worker_shared = shared.clone();
        let handle = std::thread::Builder::new()
            .name(format!("modest-pool-{id}"))
            .spawn(move || pooled_thread_main(id, worker_shared, pool))
            .ok()?;
        Some(Self { id, shared, handle: Some(handle) })
    }

    fn set_job(&self, job: Job, after_release: Option<Job>) {
        let mut slot = self.shared.job.lock();
        *slot = Some((job, after_release));
        self.shared.condvar.notify_one();
    }

    fn is_expired(&self) -> bool {
        self.shared.expired.load(Ordering::SeqCst)
    }

    fn interrupt(&self) {
        self.shared.expired.store(true, Ordering::SeqCst);
        self.shared.condvar.notify_all();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// The idle-wait loop a pooled thread runs between jobs. Re-checks
/// elapsed idle time against `expire_after` on every wakeup instead of
/// trusting a single condvar wait to mean the timeout genuinely elapsed —
/// spurious wakeups must not expire a thread early.
fn pooled_thread_main(id: usize, shared: Arc<PooledThreadShared>, pool: Arc<ThreadPoolInner>) {
    loop {
        let job = {
            let mut slot = shared.job.lock();
            let idle_since = Instant::now();
            loop {
                if let Some(job) = slot.take() {
                    break Some(job);
                }
                if shared.expired.load(Ordering::SeqCst) {
                    break None;
                }
                match shared.expire_after {
                    None => shared.condvar.wait(&mut slot),
                    Some(expire_after) => {
                        let elapsed = idle_since.elapsed();
                        if elapsed >= expire_after {
                            shared.expired.store(true, Ordering::SeqCst);
                            break None;
                        }
                        shared.condvar.wait_for(&mut slot, expire_after - elapsed);
                    }
                }
            }
        };

        match job {
            Some((job, after_release)) => {
                job();
                pool.job_completed(id);
                if let Some(after_release) = after_release {
                    after_release();
                }
            }
            None => {
                pool.thread_expired(id);
                return;
            }
        }
    }
}

struct PoolLists {
    all: Vec<PooledThread>,
    idle: Vec<usize>,
}

struct ThreadPoolInner {
    lists: Mutex<PoolLists>,
    semaphore: Semaphore,
    expire_after: Option<Duration>,
    next_id: AtomicUsize,
}

impl ThreadPoolInner {
    fn job_completed(&self, id: usize) {
        self.lists.lock().idle.push(id);
        self.semaphore.release();
    }

    fn thread_expired(&self, id: usize) {
        let mut lists = self.lists.lock();
        lists.idle.retain(|&i| i != id);
        lists.all.retain(|t| t.id != id);
        self.semaphore.release();
    }
}

/// A pool of reusable worker threads bounded to `pool_size` concurrent
/// jobs (or unbounded if `pool_size` is `None`).
#[derive(Clone)]
pub struct ThreadPool {
    inner: Arc<ThreadPoolInner>,
}

impl ThreadPool {
    pub fn new(pool_size: Option<usize>) -> Self {
        Self::with_expire_time(pool_size, None)
    }

    /// `idle_expire` bounds how long an idle worker thread survives before
    /// it tears itself down; `None` means idle threads never expire.
    pub fn with_expire_time(pool_size: Option<usize>, idle_expire: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(ThreadPoolInner {
                lists: Mutex::new(PoolLists { all: Vec::new(), idle: Vec::new() }),
                semaphore: Semaphore::new(pool_size),
                expire_after: idle_expire,
                next_id: AtomicUsize::new(0),
            }),
        }
    }

    fn idle_thread_id(&self) -> Result<usize, ModestError> {
        let mut lists = self.inner.lists.lock();
        loop {
            while let Some(id) = lists.idle.pop() {
                if lists.all.iter().any(|t| t.id == id && !t.is_expired()) {
                    return Ok(id);
                }
                lists.all.retain(|t| t.id != id);
            }
            let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
            match PooledThread::spawn(id, self.inner.expire_after, self.inner.clone()) {
                Some(thread) => {
                    lists.all.push(thread);
                    return Ok(id);
                }
                None => {
                    return Err(ModestError::new(
                        ErrorKind::ThreadInsufficientResources,
                        "operating system refused to create a new pooled thread",
                    ));
                }
            }
        }
    }

    fn dispatch(&self, job: Job, after_release: Option<Job>) -> Result<(), ModestError> {
        let id = self.idle_thread_id()?;
        let lists = self.inner.lists.lock();
        let thread = lists
            .all
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| ModestError::new(ErrorKind::ThreadError, "dispatched thread vanished before assignment"))?;
        thread.set_job(job, after_release);
        Ok(())
    }

    /// Reserve a permit without blocking, for a caller that needs to
    /// commit other state before handing over the job itself (see
    /// [`ThreadPool::dispatch_reserved`]). Returns `false` if the pool is
    /// at capacity; reserves nothing in that case.
    pub(crate) fn try_reserve(&self) -> bool {
        self.inner.semaphore.try_acquire()
    }

    /// Hand `job` to an idle (or freshly spawned) worker thread, using a
    /// permit already obtained from [`ThreadPool::try_reserve`]. Releases
    /// the permit and returns an error if no thread could be assigned.
    ///
    /// `after_release`, if given, runs once this job's permit has
    /// actually been released back to the pool — after `job` returns and
    /// after the pool's own idle/permit bookkeeping for it completes, not
    /// while the job is still attributed against the pool's capacity. A
    /// caller that reserves admission for further queued work from
    /// `after_release` (rather than from inside `job` itself) is
    /// guaranteed to see its own permit already available to reclaim.
    pub(crate) fn dispatch_reserved(&self, job: Job, after_release: Option<Job>) -> Result<(), ModestError> {
        if let Err(e) = self.dispatch(job, after_release) {
            self.inner.semaphore.release();
            return Err(e);
        }
        Ok(())
    }

    /// Run `job` if a permit is immediately available, without blocking.
    /// Returns `Ok(false)` if the pool is at capacity.
    pub fn try_run_job(&self, job: impl FnOnce() + Send + 'static) -> Result<bool, ModestError> {
        if !self.try_reserve() {
            return Ok(false);
        }
        self.dispatch_reserved(Box::new(job), None).map(|_| true)
    }

    /// Run `job`, blocking until a permit becomes available.
    pub fn run_job(&self, job: impl FnOnce() + Send + 'static) -> Result<(), ModestError> {
        self.inner.semaphore.acquire();
        self.dispatch_reserved(Box::new(job), None)
    }

    /// Interrupt every worker thread, idle or not, so they tear themselves
    /// down as soon as their current job (if any) finishes.
    pub fn interrupt_all_threads(&self) {
        let lists = self.inner.lists.lock();
        for thread in &lists.all {
            thread.interrupt();
        }
    }

    /// Interrupt and join every worker thread.
    ///
    /// Joins happen after the thread list lock is released: an exiting
    /// worker's own teardown (`thread_expired`, or `job_completed` for one
    /// that was mid-job when interrupted) needs that same lock, so holding
    /// it across a `join` would deadlock this call against the very
    /// thread it's waiting on.
    pub fn terminate_all_threads(&self) {
        self.interrupt_all_threads();
        let mut threads = {
            let mut lists = self.inner.lists.lock();
            lists.idle.clear();
            std::mem::take(&mut lists.all)
        };
        for thread in threads.iter_mut() {
            thread.join();
        }
    }

    /// Resize the pool. `None` lifts any cap; `Some(0)` still allows
    /// already-running jobs to finish but admits no more concurrently
    /// than the new capacity.
    pub fn set_pool_size(&self, pool_size: Option<usize>) {
        self.inner.semaphore.set_capacity(pool_size);
    }

    pub fn thread_count(&self) -> usize {
        self.inner.lists.lock().all.len()
    }

    pub fn idle_count(&self) -> usize {
        self.inner.lists.lock().idle.len()
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
