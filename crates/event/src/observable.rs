// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Observable`: registration with optional subset-match filters, event
//! taps (fan-out of one event ID to others), and `schedule`d delivery —
//! serial events wait for every one of their observer deliveries before
//! the next event is dispatched; `parallel` events do not.
//!
//! Registration lookups (many concurrent dispatches) take the
//! [`parking_lot::RwLock`] in shared mode; registration changes
//! (`register`/`unregister`/`add_tap`/`remove_tap`) take it exclusively.
//!
//! Unregistering an observer waits for any of its in-flight delivery
//! operations to finish first — except a delivery that originates from
//! the very operation doing the unregistering, which would otherwise
//! deadlock waiting on itself. Two deliveries on different threads
//! racing to unregister the same observer is a programmer error this
//! does not attempt to resolve, matching the dispatcher it's modeled on.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};

use modest_rt::{Engine, Operation};

use crate::event::{Event, EventId, Filter};
use crate::observer::{Observer, ObserverHandle};

#[derive(Default)]
struct Registration {
    /// `taps[id]` is every event ID that events scheduled on `id` also
    /// dispatch to; an ID always taps itself once registered or tapped.
    taps: HashMap<EventId, Vec<EventId>>,
    observers: HashMap<EventId, HashMap<Filter, Vec<ObserverHandle>>>,
}

fn ensure_self_tap(taps: &mut HashMap<EventId, Vec<EventId>>, id: EventId) {
    let list = taps.entry(id).or_default();
    if !list.contains(&id) {
        list.push(id);
    }
}

struct QueueState {
    events: VecDeque<Event>,
    dispatch: bool,
    sequence_id: u64,
}

struct ObservableInner {
    engine: Engine,
    registration: RwLock<Registration>,
    queue: Mutex<QueueState>,
    queue_cv: Condvar,
    op_list: Mutex<Vec<(ObserverHandle, Operation)>>,
    dispatch_operation: Mutex<Option<Operation>>,
}

/// A cheaply cloneable handle; every clone shares the same
/// registrations, event queue, and dispatch operation.
#[derive(Clone)]
pub struct Observable {
    inner: Arc<ObservableInner>,
}

impl Observable {
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(ObservableInner {
                engine,
                registration: RwLock::new(Registration::default()),
                queue: Mutex::new(QueueState { events: VecDeque::new(), dispatch: false, sequence_id: 0 }),
                queue_cv: Condvar::new(),
                op_list: Mutex::new(Vec::new()),
                dispatch_operation: Mutex::new(None),
            }),
        }
    }

    /// Register `observer` to receive events with ID `id`. When `filter`
    /// is given, only events that are a superset of it are delivered.
    /// Multiple filters may coexist for the same observer and ID.
    pub fn register(&self, observer: Arc<dyn Observer>, id: EventId, filter: Option<Filter>) {
        let handle = ObserverHandle::new(observer);
        let mut reg = self.inner.registration.write();
        ensure_self_tap(&mut reg.taps, id);
        reg.observers.entry(id).or_default().entry(filter.unwrap_or_default()).or_default().push(handle);
    }

    /// Unregister `observer` from event ID `id`, or from every ID it is
    /// registered for if `id` is `None`.
    pub fn unregister(&self, observer: &Arc<dyn Observer>, id: Option<EventId>) {
        let handle = ObserverHandle::new(observer.clone());
        loop {
            let waiting = self.in_flight_for(&handle);
            if waiting.is_empty() {
                let mut reg = self.inner.registration.write();
                match id {
                    Some(id) => Self::remove_from_id(&mut reg, &handle, id),
                    None => Self::remove_from_all(&mut reg, &handle),
                }
                return;
            }
            for op in waiting {
                op.wait_for(false, None);
            }
            self.prune_op_list();
        }
    }

    /// Declare that every event dispatched on `id` is also dispatched to
    /// observers registered for `tap`.
    pub fn add_tap(&self, id: EventId, tap: EventId) {
        let mut reg = self.inner.registration.write();
        ensure_self_tap(&mut reg.taps, id);
        let list = reg.taps.entry(id).or_default();
        if !list.contains(&tap) {
            list.push(tap);
        }
        ensure_self_tap(&mut reg.taps, tap);
    }

    pub fn remove_tap(&self, id: EventId, tap: EventId) {
        let mut reg = self.inner.registration.write();
        if let Some(list) = reg.taps.get_mut(&id) {
            if let Some(pos) = list.iter().position(|t| *t == tap) {
                list.remove(pos);
            }
        }
    }

    /// Schedule `event` for dispatch on `id`. When `async_dispatch` is
    /// true the event is queued for the dispatch operation started by
    /// [`Observable::start`]; otherwise it dispatches immediately on the
    /// calling thread.
    pub fn schedule(&self, mut event: Event, id: EventId, async_dispatch: bool) {
        event.id = id;
        if async_dispatch {
            let mut queue = self.inner.queue.lock();
            queue.dispatch = true;
            queue.sequence_id = next_sequence_id(queue.sequence_id);
            event.sequence_id = queue.sequence_id;
            queue.events.push_back(event);
            self.inner.queue_cv.notify_all();
        } else {
            {
                let mut queue = self.inner.queue.lock();
                queue.sequence_id = next_sequence_id(queue.sequence_id);
                event.sequence_id = queue.sequence_id;
            }
            self.dispatch_event(&event);
        }
    }

    /// Start the dispatch operation that drains asynchronously scheduled
    /// events, if it isn't already running.
    pub fn start(&self) {
        let mut dispatch_op = self.inner.dispatch_operation.lock();
        if dispatch_op.is_some() {
            return;
        }
        let this = self.clone();
        let op = Operation::new(move || this.dispatch_loop());
        self.inner.engine.submit(op.clone());
        *dispatch_op = Some(op);
    }

    /// Interrupt and wait for the dispatch operation, if one is running.
    pub fn stop(&self) {
        let op = self.inner.dispatch_operation.lock().take();
        if let Some(op) = op {
            op.interrupt();
            self.inner.queue_cv.notify_all();
            op.wait_for(false, None);
        }
    }

    fn dispatch_loop(&self) {
        loop {
            if Operation::current_is_interrupted() {
                return;
            }
            let mut queue = self.inner.queue.lock();
            if queue.dispatch {
                drop(queue);
                self.dispatch_events();
            } else {
                self.inner.queue_cv.wait(&mut queue);
            }
        }
    }

    fn dispatch_events(&self) {
        loop {
            let event = {
                let mut queue = self.inner.queue.lock();
                if Operation::current_is_interrupted() {
                    None
                } else {
                    queue.events.pop_front()
                }
            };
            match event {
                Some(event) => self.dispatch_event(&event),
                None => break,
            }
        }
        self.inner.queue.lock().dispatch = false;
    }

    fn dispatch_event(&self, event: &Event) {
        let mut wait_list = Vec::new();
        {
            let reg = self.inner.registration.read();
            self.dispatch_to_tap(&reg, event, event.id, &mut wait_list);
        }

        for op in &wait_list {
            if !op.wait_for(true, None) {
                // This dispatch thread was itself interrupted mid-wait;
                // interrupt every outstanding delivery and wait it out
                // uninterruptibly so we don't return with deliveries
                // still in flight.
                for op in &wait_list {
                    op.interrupt();
                }
                for op in &wait_list {
                    op.wait_for(false, None);
                }
                break;
            }
        }
        self.prune_op_list();
    }

    fn dispatch_to_tap(&self, reg: &Registration, event: &Event, id: EventId, wait_list: &mut Vec<Operation>) {
        let Some(taps) = reg.taps.get(&id) else { return };
        for &tap in taps {
            if tap == id {
                let Some(filter_map) = reg.observers.get(&id) else { continue };
                for (filter, observers) in filter_map {
                    if !filter.is_empty() && !filter.is_subset_of(event) {
                        continue;
                    }
                    for handle in observers {
                        let op = self.submit_delivery(handle.clone(), event.clone());
                        self.inner.op_list.lock().push((handle.clone(), op.clone()));
                        if !event.parallel {
                            wait_list.push(op);
                        }
                    }
                }
            } else {
                self.dispatch_to_tap(reg, event, tap, wait_list);
            }
        }
    }

    fn submit_delivery(&self, handle: ObserverHandle, event: Event) -> Operation {
        let op = Operation::new(move || handle.deliver(&event));
        self.inner.engine.submit(op.clone());
        op
    }

    fn in_flight_for(&self, handle: &ObserverHandle) -> Vec<Operation> {
        self.inner
            .op_list
            .lock()
            .iter()
            .filter(|(h, op)| h == handle && !op.stopped() && !op.is_current_thread())
            .map(|(_, op)| op.clone())
            .collect()
    }

    fn prune_op_list(&self) {
        self.inner.op_list.lock().retain(|(_, op)| !op.stopped());
    }

    fn remove_from_id(reg: &mut Registration, handle: &ObserverHandle, id: EventId) {
        if let Some(filter_map) = reg.observers.get_mut(&id) {
            filter_map.retain(|_, observers| {
                observers.retain(|h| h != handle);
                !observers.is_empty()
            });
            if filter_map.is_empty() {
                reg.observers.remove(&id);
            }
        }
    }

    fn remove_from_all(reg: &mut Registration, handle: &ObserverHandle) {
        let ids: Vec<EventId> = reg.observers.keys().copied().collect();
        for id in ids {
            Self::remove_from_id(reg, handle, id);
        }
    }
}

fn next_sequence_id(current: u64) -> u64 {
    if current == u64::MAX {
        1
    } else {
        current + 1
    }
}

#[cfg(test)]
#[path = "observable_tests.rs"]
mod tests;
