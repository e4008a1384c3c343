//! # Integration Tests
//!
//! Cross-crate tests against the public dispatcher contract.
//!
//! Covers:
//! - Delivery properties of every variant behind `Box<dyn Dispatch>`
//! - Variant-specific scenarios (late subscribe, unbound keys)
//! - Concurrent producer stress
//! - Config file to running dispatcher

#[cfg(test)]
mod support {
    use std::time::{Duration, Instant};

    pub const TIMEOUT: Duration = Duration::from_secs(10);

    /// Poll `predicate` until it holds or `timeout` elapses
    pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if predicate() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
mod property_tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier};
    use std::thread::{self, ThreadId};
    use std::time::{Duration, Instant};

    use contracts::{ConsumerRef, DispatcherConfig, Variant};
    use dispatcher::{create_dispatcher, BoxedDispatcher, RecordingConsumer};
    use parking_lot::Mutex;

    use crate::support::{wait_until, TIMEOUT};

    fn build<V: Send + 'static>(variant: Variant, capacity: usize) -> BoxedDispatcher<u32, V> {
        create_dispatcher(variant, DispatcherConfig::with_capacity(capacity)).unwrap()
    }

    #[test]
    fn test_fifo_per_key_every_variant() {
        for variant in Variant::ALL {
            let dispatcher = build::<u32>(variant, 10_000);
            let consumers: Vec<Arc<RecordingConsumer<u32, u32>>> =
                (0..4).map(|_| Arc::new(RecordingConsumer::new())).collect();
            for (key, consumer) in consumers.iter().enumerate() {
                let binding: ConsumerRef<u32, u32> = consumer.clone();
                assert!(dispatcher.subscribe(key as u32, binding).unwrap());
            }
            dispatcher.start().unwrap();

            for i in 0..2000u32 {
                assert!(dispatcher.enqueue(i % 4, i));
            }

            assert!(
                wait_until(TIMEOUT, || consumers.iter().all(|c| c.len() == 500)),
                "{variant}: not all values delivered"
            );
            for (key, consumer) in consumers.iter().enumerate() {
                let expected: Vec<u32> = (0..2000).filter(|i| i % 4 == key as u32).collect();
                assert_eq!(consumer.values(), expected, "{variant}: key {key} out of order");
                assert!(consumer.records().iter().all(|(k, _)| *k == key as u32));
            }
            dispatcher.stop().unwrap();
        }
    }

    #[test]
    fn test_capacity_bound_every_variant() {
        const CAPACITY: usize = 5;
        for variant in Variant::ALL {
            let dispatcher = build::<u32>(variant, CAPACITY);
            for i in 0..CAPACITY as u32 {
                assert!(dispatcher.enqueue(1, i), "{variant}: enqueue {i} rejected");
            }
            assert!(!dispatcher.enqueue(1, 99));

            let snapshot = dispatcher.snapshot();
            assert_eq!(snapshot.counters.dropped, 1, "{variant}");
            assert_eq!(snapshot.counters.accepted, CAPACITY as u64, "{variant}");
            assert_eq!(snapshot.pending, CAPACITY, "{variant}");
        }
    }

    #[test]
    fn test_at_most_one_consumer_per_key_every_variant() {
        for variant in Variant::ALL {
            let dispatcher = build::<u32>(variant, 100);
            let first = Arc::new(RecordingConsumer::<u32, u32>::new());
            let second = Arc::new(RecordingConsumer::<u32, u32>::new());

            assert!(dispatcher.subscribe(7, first.clone()).unwrap());
            assert!(!dispatcher.subscribe(7, second.clone()).unwrap());
            dispatcher.start().unwrap();

            for i in 0..10 {
                dispatcher.enqueue(7, i);
            }
            assert!(wait_until(TIMEOUT, || first.len() == 10), "{variant}");
            dispatcher.stop().unwrap();

            assert!(second.is_empty(), "{variant}: second consumer was used");
        }
    }

    #[test]
    fn test_unsubscribe_discards_queued_values() {
        for variant in Variant::ALL.into_iter().filter(|v| v.supports_unsubscribe()) {
            let dispatcher = build::<u32>(variant, 100);
            let original = Arc::new(RecordingConsumer::<u32, u32>::new());
            let replacement = Arc::new(RecordingConsumer::<u32, u32>::new());

            dispatcher.subscribe(3, original.clone()).unwrap();
            for i in 0..8 {
                assert!(dispatcher.enqueue(3, i));
            }

            let topology = dispatcher.as_unsubscribe().unwrap();
            assert!(topology.unsubscribe(&3));
            assert!(!topology.unsubscribe(&3));

            dispatcher.subscribe(3, replacement.clone()).unwrap();
            dispatcher.start().unwrap();
            dispatcher.enqueue(3, 100);

            assert!(wait_until(TIMEOUT, || replacement.len() == 1), "{variant}");
            assert!(
                wait_until(TIMEOUT, || dispatcher.snapshot().counters.discarded == 8),
                "{variant}: discarded count"
            );
            dispatcher.stop().unwrap();

            assert_eq!(replacement.values(), vec![100], "{variant}");
            assert!(original.is_empty(), "{variant}");
        }
    }

    #[test]
    fn test_prebuilt_has_no_unsubscribe() {
        let dispatcher = build::<u32>(Variant::Prebuilt, 10);
        assert!(dispatcher.as_unsubscribe().is_none());
    }

    #[test]
    fn test_idempotent_lifecycle_every_variant() {
        for variant in Variant::ALL {
            let dispatcher = build::<u32>(variant, 10);
            dispatcher.stop().unwrap();

            dispatcher.start().unwrap();
            dispatcher.start().unwrap();
            assert!(dispatcher.is_running());

            let started = Instant::now();
            dispatcher.stop().unwrap();
            dispatcher.stop().unwrap();
            assert!(!dispatcher.is_running());
            assert!(started.elapsed() < Duration::from_secs(5), "{variant}");

            // restartable after stop
            dispatcher.start().unwrap();
            assert!(dispatcher.is_running());
            dispatcher.stop().unwrap();
        }
    }

    #[test]
    fn test_single_worker_thread_every_variant() {
        for variant in Variant::ALL {
            let config = DispatcherConfig {
                worker_name: format!("only-worker-{variant}"),
                ..DispatcherConfig::default()
            };
            let dispatcher: BoxedDispatcher<u32, u32> = create_dispatcher(variant, config).unwrap();
            let consumer = Arc::new(ThreadRecorder::default());
            dispatcher.subscribe(0, consumer.clone()).unwrap();

            dispatcher.start().unwrap();
            dispatcher.start().unwrap();
            for i in 0..50 {
                dispatcher.enqueue(0, i);
            }
            assert!(wait_until(TIMEOUT, || consumer.calls() == 50), "{variant}");
            dispatcher.stop().unwrap();

            let names = consumer.thread_names();
            assert_eq!(names.len(), 1, "{variant}: {names:?}");
            assert_eq!(names[0], format!("only-worker-{variant}"));
        }
    }

    #[test]
    fn test_concurrent_start_spawns_one_worker_every_variant() {
        const CALLERS: usize = 8;

        for variant in Variant::ALL {
            let config = DispatcherConfig {
                worker_name: format!("raced-worker-{variant}"),
                ..DispatcherConfig::default()
            };
            let dispatcher: BoxedDispatcher<u32, u32> = create_dispatcher(variant, config).unwrap();
            let consumer = Arc::new(ThreadRecorder::default());
            dispatcher.subscribe(0, consumer.clone()).unwrap();

            let barrier = Barrier::new(CALLERS);
            thread::scope(|s| {
                for _ in 0..CALLERS {
                    s.spawn(|| {
                        barrier.wait();
                        dispatcher.start().unwrap();
                    });
                }
            });
            assert!(dispatcher.is_running(), "{variant}");

            for i in 0..200 {
                dispatcher.enqueue(0, i);
            }
            assert!(wait_until(TIMEOUT, || consumer.calls() == 200), "{variant}");
            dispatcher.stop().unwrap();

            assert_eq!(consumer.thread_ids(), 1, "{variant}");
            assert_eq!(
                consumer.thread_names(),
                vec![format!("raced-worker-{variant}")]
            );
        }
    }

    #[test]
    fn test_racing_start_stop_ends_stopped_every_variant() {
        const CALLERS: usize = 4;
        const ROUNDS: usize = 25;

        for variant in Variant::ALL {
            let dispatcher = build::<u32>(variant, 100);

            let barrier = Barrier::new(CALLERS);
            thread::scope(|s| {
                for _ in 0..CALLERS {
                    s.spawn(|| {
                        barrier.wait();
                        for _ in 0..ROUNDS {
                            dispatcher.start().unwrap();
                            dispatcher.stop().unwrap();
                        }
                    });
                }
            });
            assert!(!dispatcher.is_running(), "{variant}");

            // still usable after the race
            let consumer = Arc::new(RecordingConsumer::<u32, u32>::new());
            assert!(dispatcher.subscribe(0, consumer.clone()).unwrap());
            dispatcher.start().unwrap();
            dispatcher.enqueue(0, 7);
            assert!(wait_until(TIMEOUT, || consumer.len() == 1), "{variant}");
            dispatcher.stop().unwrap();
            assert!(!dispatcher.is_running(), "{variant}");
        }
    }

    #[test]
    fn test_no_delivery_after_stop_every_variant() {
        for variant in Variant::ALL {
            let dispatcher = build::<u32>(variant, 100);
            let consumer = Arc::new(RecordingConsumer::<u32, u32>::new());
            dispatcher.subscribe(0, consumer.clone()).unwrap();
            dispatcher.start().unwrap();
            dispatcher.stop().unwrap();

            for i in 0..5 {
                assert!(dispatcher.enqueue(0, i));
            }
            thread::sleep(Duration::from_millis(50));
            assert!(consumer.is_empty(), "{variant}");
            assert_eq!(dispatcher.snapshot().pending, 5, "{variant}");
        }
    }

    #[test]
    fn test_drain_on_stop_every_variant() {
        for variant in Variant::ALL {
            let config = DispatcherConfig::with_capacity(10_000).drain_on_stop(true);
            let dispatcher: BoxedDispatcher<u32, u32> = create_dispatcher(variant, config).unwrap();
            let consumer = Arc::new(RecordingConsumer::<u32, u32>::new());
            dispatcher.subscribe(0, consumer.clone()).unwrap();
            dispatcher.start().unwrap();

            for i in 0..3000 {
                dispatcher.enqueue(0, i);
            }
            dispatcher.stop().unwrap();

            assert_eq!(consumer.len(), 3000, "{variant}");
            assert_eq!(dispatcher.snapshot().pending, 0, "{variant}");
        }
    }

    #[test]
    fn test_consumer_panic_counted_every_variant() {
        for variant in Variant::ALL {
            let dispatcher = build::<u32>(variant, 100);
            let healthy = Arc::new(RecordingConsumer::<u32, u32>::new());
            dispatcher.subscribe(0, Arc::new(Exploding)).unwrap();
            dispatcher.subscribe(1, healthy.clone()).unwrap();
            dispatcher.start().unwrap();

            for i in 0..3 {
                dispatcher.enqueue(0, i);
                dispatcher.enqueue(1, i);
            }

            assert!(wait_until(TIMEOUT, || healthy.len() == 3), "{variant}");
            assert!(
                wait_until(TIMEOUT, || dispatcher.counter_snapshot().faults == 3),
                "{variant}: faults"
            );
            assert!(dispatcher.is_running());
            dispatcher.stop().unwrap();
            assert_eq!(dispatcher.counter_snapshot().delivered, 3, "{variant}");
        }
    }

    /// Records the identity of every thread that delivered to it
    #[derive(Default)]
    struct ThreadRecorder {
        seen: Mutex<Vec<(ThreadId, String)>>,
    }

    impl ThreadRecorder {
        fn calls(&self) -> usize {
            self.seen.lock().len()
        }

        fn thread_names(&self) -> Vec<String> {
            let mut names: Vec<String> =
                self.seen.lock().iter().map(|(_, name)| name.clone()).collect();
            names.sort();
            names.dedup();
            names
        }

        /// Number of distinct delivering threads
        fn thread_ids(&self) -> usize {
            self.seen.lock().iter().map(|(id, _)| *id).collect::<HashSet<_>>().len()
        }
    }

    impl contracts::Consumer<u32, u32> for ThreadRecorder {
        fn consume(&self, _key: &u32, _value: &u32) {
            let current = thread::current();
            let name = current.name().unwrap_or("<unnamed>").to_string();
            self.seen.lock().push((current.id(), name));
        }
    }

    struct Exploding;

    impl contracts::Consumer<u32, u32> for Exploding {
        fn consume(&self, _key: &u32, _value: &u32) {
            panic!("consumer exploded");
        }
    }
}

#[cfg(test)]
mod scenario_tests {
    use std::sync::Arc;

    use contracts::{DispatchError, DispatcherConfig, Variant};
    use dispatcher::{
        create_dispatcher, BoxedDispatcher, Dispatch, LockingDispatcher, PrebuiltDispatcher,
        RecordingConsumer, SplitLockDispatcher,
    };

    use crate::support::{wait_until, TIMEOUT};

    /// Locking, capacity 2: values queued before subscribe survive until a
    /// consumer attaches; the overflow is dropped.
    #[test]
    fn test_locking_late_subscriber_receives_queued_values() {
        let dispatcher: LockingDispatcher<&str, &str> =
            LockingDispatcher::new(DispatcherConfig::with_capacity(2));

        assert!(dispatcher.enqueue("K", "a"));
        assert!(dispatcher.enqueue("K", "b"));
        assert!(!dispatcher.enqueue("K", "c"));
        assert_eq!(dispatcher.snapshot().counters.dropped, 1);

        let consumer = Arc::new(RecordingConsumer::<&str, &str>::new());
        dispatcher.subscribe("K", consumer.clone()).unwrap();
        dispatcher.start().unwrap();

        assert!(wait_until(TIMEOUT, || consumer.len() == 2));
        assert_eq!(consumer.values(), vec!["a", "b"]);
        assert!(wait_until(TIMEOUT, || dispatcher.snapshot().pending == 0));
        dispatcher.stop().unwrap();
    }

    /// Split-lock: a value enqueued before its key is bound is never
    /// delivered, even after the consumer attaches.
    #[test]
    fn test_split_lock_loses_pre_subscription_value() {
        let dispatcher: SplitLockDispatcher<&str, u32> =
            SplitLockDispatcher::new(DispatcherConfig::default());
        dispatcher.start().unwrap();

        assert!(dispatcher.enqueue("K1", 1));
        let consumer = Arc::new(RecordingConsumer::<&str, u32>::new());
        assert!(dispatcher.subscribe("K1", consumer.clone()).unwrap());
        assert!(dispatcher.enqueue("K1", 2));

        assert!(wait_until(TIMEOUT, || consumer.len() == 1));
        assert!(wait_until(TIMEOUT, || dispatcher.snapshot().counters.discarded == 1));
        assert_eq!(consumer.values(), vec![2]);
        dispatcher.stop().unwrap();
    }

    /// The same sequence keeps the early value in the locking variant.
    #[test]
    fn test_locking_keeps_pre_subscription_value() {
        let dispatcher: BoxedDispatcher<&str, u32> =
            create_dispatcher(Variant::Locking, DispatcherConfig::default()).unwrap();
        dispatcher.start().unwrap();

        assert!(dispatcher.enqueue("K1", 1));
        let consumer = Arc::new(RecordingConsumer::<&str, u32>::new());
        dispatcher.subscribe("K1", consumer.clone()).unwrap();
        dispatcher.enqueue("K1", 2);

        assert!(wait_until(TIMEOUT, || consumer.len() == 2));
        assert_eq!(consumer.values(), vec![1, 2]);
        dispatcher.stop().unwrap();
    }

    #[test]
    fn test_prebuilt_topology_frozen_while_running() {
        let dispatcher: PrebuiltDispatcher<u32, u32> =
            PrebuiltDispatcher::new(DispatcherConfig::default());
        let early = Arc::new(RecordingConsumer::<u32, u32>::new());
        let late = Arc::new(RecordingConsumer::<u32, u32>::new());
        dispatcher.subscribe(1, early.clone()).unwrap();
        dispatcher.start().unwrap();

        let err = dispatcher.subscribe(2, late.clone()).unwrap_err();
        assert!(matches!(err, DispatchError::TopologyFrozen { .. }));

        // queued for the unknown key until the next start after a subscribe
        dispatcher.enqueue(1, 10);
        dispatcher.enqueue(2, 20);
        assert!(wait_until(TIMEOUT, || early.len() == 1));
        dispatcher.stop().unwrap();
        assert!(late.is_empty());

        assert!(dispatcher.subscribe(2, late.clone()).unwrap());
        dispatcher.start().unwrap();
        assert!(wait_until(TIMEOUT, || late.len() == 1));
        assert_eq!(late.values(), vec![20]);
        dispatcher.stop().unwrap();
    }

    #[test]
    fn test_counters_are_per_instance() {
        let a: BoxedDispatcher<u8, u8> =
            create_dispatcher(Variant::Locking, DispatcherConfig::with_capacity(1)).unwrap();
        let b: BoxedDispatcher<u8, u8> =
            create_dispatcher(Variant::Locking, DispatcherConfig::with_capacity(1)).unwrap();

        a.enqueue(0, 0);
        a.enqueue(0, 1);

        assert_eq!(a.counter_snapshot().dropped, 1);
        assert_eq!(b.counter_snapshot().dropped, 0);
        assert_eq!(b.counter_snapshot().accepted, 0);
    }
}

#[cfg(test)]
mod stress_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;

    use contracts::{ConsumerRef, DispatcherConfig, Variant};
    use dispatcher::{create_dispatcher, BoxedDispatcher, RecordingConsumer};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::support::{wait_until, TIMEOUT};

    const KEYS: u32 = 16;
    const PRODUCERS: u32 = 6;
    const PER_PRODUCER: u32 = 2000;

    /// Many producers on random keys; each producer's values for one key
    /// must arrive in the order that producer sent them.
    #[test]
    fn test_concurrent_producers_keep_per_key_order() {
        for variant in Variant::ALL {
            let config = DispatcherConfig::with_capacity(1_000_000);
            let dispatcher: Arc<BoxedDispatcher<u32, (u32, u32)>> =
                Arc::new(create_dispatcher(variant, config).unwrap());
            let consumers: Vec<Arc<RecordingConsumer<u32, (u32, u32)>>> =
                (0..KEYS).map(|_| Arc::new(RecordingConsumer::new())).collect();
            for (key, consumer) in consumers.iter().enumerate() {
                let binding: ConsumerRef<u32, (u32, u32)> = consumer.clone();
                dispatcher.subscribe(key as u32, binding).unwrap();
            }
            dispatcher.start().unwrap();

            let handles: Vec<_> = (0..PRODUCERS)
                .map(|producer| {
                    let dispatcher = Arc::clone(&dispatcher);
                    thread::spawn(move || {
                        let mut rng = StdRng::seed_from_u64(u64::from(producer));
                        for seq in 0..PER_PRODUCER {
                            let key = rng.random_range(0..KEYS);
                            assert!(dispatcher.enqueue(key, (producer, seq)));
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let total = (PRODUCERS * PER_PRODUCER) as usize;
            let delivered = || consumers.iter().map(|c| c.len()).sum::<usize>();
            assert!(
                wait_until(TIMEOUT, || delivered() == total),
                "{variant}: not all values delivered"
            );
            dispatcher.stop().unwrap();

            for (key, consumer) in consumers.iter().enumerate() {
                let mut last: HashMap<u32, u32> = HashMap::new();
                for (k, (producer, seq)) in consumer.records() {
                    assert_eq!(k, key as u32);
                    if let Some(prev) = last.insert(producer, seq) {
                        assert!(prev < seq, "{variant}: key {key} producer {producer} reordered");
                    }
                }
            }

            let counters = dispatcher.counter_snapshot();
            assert_eq!(counters.accepted, total as u64);
            assert_eq!(counters.delivered, total as u64);
            assert_eq!(counters.dropped, 0);
        }
    }

    /// Subscribe/unsubscribe churn concurrent with enqueue must not deadlock
    /// and must keep the accounting closed.
    #[test]
    fn test_churn_with_enqueue() {
        for variant in Variant::ALL.into_iter().filter(|v| v.supports_unsubscribe()) {
            let dispatcher: Arc<BoxedDispatcher<u32, u32>> =
                Arc::new(create_dispatcher(variant, DispatcherConfig::with_capacity(64)).unwrap());
            dispatcher.start().unwrap();

            let producer = {
                let dispatcher = Arc::clone(&dispatcher);
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(7);
                    for i in 0..20_000 {
                        dispatcher.enqueue(rng.random_range(0..8), i);
                    }
                })
            };
            let churner = {
                let dispatcher = Arc::clone(&dispatcher);
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(11);
                    for _ in 0..2_000 {
                        let key = rng.random_range(0..8);
                        let consumer: ConsumerRef<u32, u32> =
                            Arc::new(RecordingConsumer::<u32, u32>::new());
                        dispatcher.subscribe(key, consumer).unwrap();
                        if let Some(topology) = dispatcher.as_unsubscribe() {
                            topology.unsubscribe(&key);
                        }
                    }
                })
            };
            producer.join().unwrap();
            churner.join().unwrap();
            dispatcher.stop().unwrap();

            let snapshot = dispatcher.snapshot();
            let c = snapshot.counters;
            assert_eq!(c.accepted + c.dropped, 20_000, "{variant}");
            assert_eq!(
                c.accepted,
                c.delivered + c.discarded + snapshot.pending as u64,
                "{variant}: accounting"
            );
        }
    }
}

#[cfg(test)]
mod config_tests {
    use std::io::Write;
    use std::sync::Arc;

    use config_loader::ConfigLoader;
    use contracts::Variant;
    use dispatcher::{create_dispatcher, BoxedDispatcher, NoopConsumer};

    use crate::support::{wait_until, TIMEOUT};

    #[test]
    fn test_config_file_to_running_dispatcher() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "variant = \"split-lock\"\ntopics = 4\nproducers = 1\nduration_secs = 1\n\n[dispatcher]\ncapacity = 16\nworker_name = \"cfg-worker\""
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.variant, Variant::SplitLock);

        let dispatcher: BoxedDispatcher<u64, u64> =
            create_dispatcher(config.variant, config.dispatcher.clone()).unwrap();
        let consumer = Arc::new(NoopConsumer::new());
        for key in 0..config.topics {
            dispatcher.subscribe(key, consumer.clone()).unwrap();
        }
        dispatcher.start().unwrap();

        let accepted = (0..32u64).filter(|i| dispatcher.enqueue(i % 4, *i)).count() as u64;
        assert!(accepted > 0);
        assert!(wait_until(TIMEOUT, || consumer.consumed() == accepted));
        dispatcher.stop().unwrap();

        let snapshot = dispatcher.snapshot();
        observability::record_snapshot(&snapshot);
        assert_eq!(snapshot.bound_keys(), 4);
    }

    #[test]
    fn test_invalid_capacity_rejected_by_loader() {
        let err = ConfigLoader::load_from_str(
            "[dispatcher]\ncapacity = 0\n",
            config_loader::ConfigFormat::Toml,
        )
        .unwrap_err();
        assert!(err.to_string().contains("dispatcher.capacity"), "got: {err}");
    }
}
