//! Consumer invocation with per-value fault isolation

use std::any::Any;
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};

use contracts::Consumer;
use tracing::error;

use crate::metrics::DispatchCounters;

/// Hand one value to `consumer`.
///
/// Returns `false` if the consumer panicked; the panic is counted and logged
/// and does not propagate to the worker.
pub(crate) fn deliver<K, V>(
    consumer: &dyn Consumer<K, V>,
    key: &K,
    value: &V,
    counters: &DispatchCounters,
) -> bool
where
    K: Debug,
{
    match panic::catch_unwind(AssertUnwindSafe(|| consumer.consume(key, value))) {
        Ok(()) => {
            counters.inc_delivered();
            true
        }
        Err(payload) => {
            counters.inc_faults();
            error!(
                key = ?key,
                panic = %panic_message(payload.as_ref()),
                "Consumer panicked, value skipped"
            );
            false
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
    }

    impl Consumer<u32, u32> for Flaky {
        fn consume(&self, _key: &u32, value: &u32) {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if *value == 0 {
                panic!("zero is not allowed");
            }
        }
    }

    #[test]
    fn test_deliver_counts_success() {
        let consumer = Flaky {
            calls: AtomicUsize::new(0),
        };
        let counters = DispatchCounters::new();

        assert!(deliver(&consumer, &1, &5, &counters));
        assert_eq!(counters.delivered(), 1);
        assert_eq!(counters.faults(), 0);
    }

    #[test]
    fn test_deliver_isolates_panic() {
        let consumer = Flaky {
            calls: AtomicUsize::new(0),
        };
        let counters = DispatchCounters::new();

        assert!(!deliver(&consumer, &1, &0, &counters));
        assert!(deliver(&consumer, &1, &2, &counters));

        assert_eq!(consumer.calls.load(Ordering::Relaxed), 2);
        assert_eq!(counters.delivered(), 1);
        assert_eq!(counters.faults(), 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
