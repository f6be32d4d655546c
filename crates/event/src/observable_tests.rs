// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::{Duration, Instant};

use modest_rt::ThreadPool;
use parking_lot::Mutex;

use super::*;

fn engine() -> Engine {
    Engine::new(ThreadPool::new(Some(8)))
}

struct RecordingObserver {
    name: &'static str,
    log: Arc<Mutex<Vec<(&'static str, u64)>>>,
    delay: Duration,
}

impl Observer for RecordingObserver {
    fn handle_event(&self, event: &Event) {
        std::thread::sleep(self.delay);
        self.log.lock().push((self.name, event.sequence_id));
    }
}

fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !predicate() {
        if Instant::now() >= deadline {
            return predicate();
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    true
}

#[test]
fn two_observers_receive_a_serial_event_before_the_next_one_dispatches() {
    let observable = Observable::new(engine());
    let log = Arc::new(Mutex::new(Vec::new()));

    let a = Arc::new(RecordingObserver { name: "A", log: log.clone(), delay: Duration::from_millis(30) });
    let b = Arc::new(RecordingObserver { name: "B", log: log.clone(), delay: Duration::from_millis(5) });
    observable.register(a, 42, None);
    observable.register(b, 42, None);

    observable.start();
    observable.schedule(Event::new(), 42, true);
    observable.schedule(Event::new(), 42, true);

    assert!(wait_until(|| log.lock().len() == 4, Duration::from_secs(5)));
    observable.stop();

    let entries = log.lock().clone();
    let first_sequence = entries[0].1;
    let mut saw_other_sequence = false;
    for (_, sequence) in &entries {
        if *sequence != first_sequence {
            saw_other_sequence = true;
        } else if saw_other_sequence {
            panic!("a delivery for the first event arrived after the second event had started: {entries:?}");
        }
    }
    assert!(entries.iter().filter(|(_, s)| *s == first_sequence).count() == 2, "both observers must see the first event");
}

#[test]
fn a_filter_excludes_observers_whose_filter_does_not_match() {
    let observable = Observable::new(engine());
    let log = Arc::new(Mutex::new(Vec::new()));

    let matching = Arc::new(RecordingObserver { name: "matching", log: log.clone(), delay: Duration::ZERO });
    let non_matching = Arc::new(RecordingObserver { name: "non_matching", log: log.clone(), delay: Duration::ZERO });
    observable.register(matching, 1, Some(Filter::new().with("kind", "ping")));
    observable.register(non_matching, 1, Some(Filter::new().with("kind", "pong")));

    observable.schedule(Event::new().with_field("kind", "ping"), 1, false);

    let entries = log.lock().clone();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "matching");
}

#[test]
fn add_tap_fans_an_event_out_to_observers_registered_on_the_tap_id() {
    let observable = Observable::new(engine());
    let log = Arc::new(Mutex::new(Vec::new()));

    let tapped = Arc::new(RecordingObserver { name: "tapped", log: log.clone(), delay: Duration::ZERO });
    observable.register(tapped, 99, None);
    observable.add_tap(1, 99);

    observable.schedule(Event::new(), 1, false);

    assert_eq!(log.lock().len(), 1);
}

#[test]
fn unregister_prevents_further_delivery() {
    let observable = Observable::new(engine());
    let log = Arc::new(Mutex::new(Vec::new()));

    let observer: Arc<dyn Observer> =
        Arc::new(RecordingObserver { name: "gone", log: log.clone(), delay: Duration::ZERO });
    observable.register(observer.clone(), 7, None);

    observable.schedule(Event::new(), 7, false);
    assert_eq!(log.lock().len(), 1);

    observable.unregister(&observer, None);
    observable.schedule(Event::new(), 7, false);
    assert_eq!(log.lock().len(), 1, "no further delivery after unregister");
}

#[test]
fn an_observer_may_unregister_itself_from_within_its_own_delivery_without_deadlocking() {
    let observable = Observable::new(engine());
    let marker = Arc::new(Mutex::new(false));

    struct SelfRemoving {
        observable: Observable,
        id: EventId,
        marker: Arc<Mutex<bool>>,
        me: Mutex<Option<Arc<dyn Observer>>>,
    }
    impl Observer for SelfRemoving {
        fn handle_event(&self, _event: &Event) {
            *self.marker.lock() = true;
            if let Some(me) = self.me.lock().clone() {
                self.observable.unregister(&me, Some(self.id));
            }
        }
    }

    let holder: Arc<SelfRemoving> =
        Arc::new(SelfRemoving { observable: observable.clone(), id: 5, marker: marker.clone(), me: Mutex::new(None) });
    let as_observer: Arc<dyn Observer> = holder.clone();
    *holder.me.lock() = Some(as_observer.clone());
    observable.register(as_observer, 5, None);

    observable.schedule(Event::new(), 5, false);
    assert!(*marker.lock(), "self-unregistering delivery should complete without deadlock");
}

#[test]
fn sequence_ids_increase_strictly_across_scheduled_events() {
    let observable = Observable::new(engine());
    let e1 = capture_sequence(&observable);
    let e2 = capture_sequence(&observable);
    assert!(e2 > e1);
}

fn capture_sequence(observable: &Observable) -> u64 {
    let log = Arc::new(Mutex::new(Vec::new()));
    let observer = Arc::new(RecordingObserver { name: "seq", log: log.clone(), delay: Duration::ZERO });
    observable.register(observer, 123, None);
    observable.schedule(Event::new(), 123, false);
    let sequence = log.lock().last().expect("delivery recorded").1;
    sequence
}
