//! Shared helpers for unit tests

use std::time::{Duration, Instant};

use contracts::Consumer;

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

/// Consumer that panics on every value
pub struct PanickingConsumer;

impl<K, V> Consumer<K, V> for PanickingConsumer {
    fn consume(&self, _key: &K, _value: &V) {
        panic!("consumer failure");
    }
}
