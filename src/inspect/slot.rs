//! Single-slot, last-writer-wins handoff between a frame producer and the
//! detection loop
//!
//! A publish overwrites whatever the consumer has not taken yet; the
//! overwritten value is counted as dropped. There is no queue and no
//! backpressure.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct SlotState<T> {
    value: Option<T>,
    closed: bool,
    published: u64,
    dropped: u64,
}

#[derive(Debug)]
pub struct LatestSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

/// Counters for a slot's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    pub published: u64,
    pub dropped: u64,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                closed: false,
                published: 0,
                dropped: 0,
            }),
            ready: Condvar::new(),
        }
    }

    /// Store a value, replacing any unconsumed one.
    ///
    /// Returns `false` once the slot is closed; the value is discarded.
    pub fn publish(&self, value: T) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        if state.value.replace(value).is_some() {
            state.dropped += 1;
        }
        state.published += 1;
        drop(state);
        self.ready.notify_one();
        true
    }

    /// Take the latest value without waiting
    pub fn try_take(&self) -> Option<T> {
        self.state.lock().value.take()
    }

    /// Wait for the next value.
    ///
    /// Returns `None` when the slot is closed and empty, or when `timeout`
    /// elapses first. A value published before `close()` is still delivered.
    pub fn take(&self, timeout: Option<Duration>) -> Option<T> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            if let Some(value) = state.value.take() {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut state, deadline).timed_out() {
                        return state.value.take();
                    }
                }
                None => self.ready.wait(&mut state),
            }
        }
    }

    /// Stop accepting values and wake any waiting consumer
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn stats(&self) -> SlotStats {
        let state = self.state.lock();
        SlotStats {
            published: state.published,
            dropped: state.dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_last_writer_wins() {
        let slot = LatestSlot::new();
        assert!(slot.publish(1));
        assert!(slot.publish(2));
        assert!(slot.publish(3));
        assert_eq!(slot.try_take(), Some(3));
        assert_eq!(slot.try_take(), None);
        assert_eq!(
            slot.stats(),
            SlotStats {
                published: 3,
                dropped: 2
            }
        );
    }

    #[test]
    fn test_close_drains_then_ends() {
        let slot = LatestSlot::new();
        slot.publish("frame");
        slot.close();
        assert!(!slot.publish("late"));
        assert_eq!(slot.take(None), Some("frame"));
        assert_eq!(slot.take(None), None);
    }

    #[test]
    fn test_take_times_out() {
        let slot: LatestSlot<u8> = LatestSlot::new();
        assert_eq!(slot.take(Some(Duration::from_millis(10))), None);
        assert!(!slot.is_closed());
    }

    #[test]
    fn test_consumer_wakes_on_publish() {
        let slot = Arc::new(LatestSlot::new());
        let consumer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.take(Some(Duration::from_secs(5))))
        };
        thread::sleep(Duration::from_millis(20));
        slot.publish(42);
        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn test_close_wakes_waiting_consumer() {
        let slot: Arc<LatestSlot<u8>> = Arc::new(LatestSlot::new());
        let consumer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.take(None))
        };
        thread::sleep(Duration::from_millis(20));
        slot.close();
        assert_eq!(consumer.join().unwrap(), None);
    }
}
