//! Hand-off queue between two adjacent stages.
//!
//! `HandoffQueue<T>` is a logically unbounded FIFO guarded by a `Mutex` and a
//! `Condvar`. It has one producer role and one consumer role:
//!
//! - `enqueue` never blocks and wakes one waiting consumer.
//! - `dequeue` is the only blocking call in the pipeline. It returns the head
//!   item, or `None` once the queue is empty and finished.
//! - `mark_finished` is the producer's "no more data" latch.
//! - `abort` tears the queue down: queued items are dropped and both sides
//!   stop immediately.
//!
//! Items move into the queue; the producer keeps no handle to them:
//!
//! ```compile_fail
//! use framepipe::{Frame, HandoffQueue};
//!
//! let queue = HandoffQueue::new();
//! let mut frame = Frame::from_rgb(vec![0; 3], 1, 1).unwrap();
//! queue.enqueue(frame).unwrap();
//! frame.pixels_mut()[0] = 255;
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// An item refused by `enqueue` because the queue was already finished or
/// aborted. The item is handed back to the caller.
pub struct Rejected<T>(pub T);

impl<T> Rejected<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Rejected(..)")
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("enqueue after the queue was finished")
    }
}

impl<T> std::error::Error for Rejected<T> {}

struct QueueState<T> {
    items: VecDeque<T>,
    finished: bool,
    aborted: bool,
    high_water: usize,
}

/// Single-producer/single-consumer FIFO with a permanent finished latch.
pub struct HandoffQueue<T> {
    state: Mutex<QueueState<T>>,
    ready: Condvar,
}

impl<T> HandoffQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                finished: false,
                aborted: false,
                high_water: 0,
            }),
            ready: Condvar::new(),
        }
    }

    // A panicking holder cannot leave the state half-updated: every critical
    // section below is a single push, pop, or flag store.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append `item` to the tail and wake one waiting consumer.
    ///
    /// Refused once the producer has called `mark_finished` or the queue was
    /// aborted; the item comes back inside `Rejected`.
    pub fn enqueue(&self, item: T) -> Result<(), Rejected<T>> {
        let mut state = self.lock();
        if state.finished {
            return Err(Rejected(item));
        }
        state.items.push_back(item);
        state.high_water = state.high_water.max(state.items.len());
        drop(state);
        self.ready.notify_one();
        Ok(())
    }

    /// Remove the head item, blocking while the queue is empty and unfinished.
    ///
    /// Returns `None` (end of stream) only when the queue is drained and
    /// finished, or when it was aborted.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if state.aborted {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.finished {
                return None;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Like `dequeue`, but gives up after `timeout`.
    ///
    /// `Ok(Some(item))` is an item, `Ok(None)` is end of stream, and `Err(())`
    /// means the timeout elapsed with the queue still empty and open.
    #[allow(clippy::result_unit_err)]
    pub fn dequeue_timeout(&self, timeout: Duration) -> Result<Option<T>, ()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if state.aborted {
                return Ok(None);
            }
            if let Some(item) = state.items.pop_front() {
                return Ok(Some(item));
            }
            if state.finished {
                return Ok(None);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(());
            }
            let (next, _) = self
                .ready
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state = next;
        }
    }

    /// Non-blocking dequeue. `None` means nothing is queued right now.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut state = self.lock();
        if state.aborted {
            return None;
        }
        state.items.pop_front()
    }

    /// Latch the queue as finished and wake every consumer. Idempotent.
    pub fn mark_finished(&self) {
        let mut state = self.lock();
        state.finished = true;
        drop(state);
        self.ready.notify_all();
    }

    /// Finish the queue, drop everything still queued, and wake every consumer.
    ///
    /// Returns the number of items dropped.
    pub fn abort(&self) -> usize {
        let mut state = self.lock();
        state.finished = true;
        state.aborted = true;
        let dropped = std::mem::take(&mut state.items);
        drop(state);
        self.ready.notify_all();
        // Items are dropped outside the lock.
        dropped.len()
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    pub fn is_aborted(&self) -> bool {
        self.lock().aborted
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Largest number of items ever queued at once.
    pub fn high_water_mark(&self) -> usize {
        self.lock().high_water
    }
}

impl<T> Default for HandoffQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for HandoffQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("HandoffQueue")
            .field("len", &state.items.len())
            .field("finished", &state.finished)
            .field("aborted", &state.aborted)
            .field("high_water", &state.high_water)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn dequeues_in_fifo_order() {
        let queue = HandoffQueue::new();
        for i in 0..5 {
            queue.enqueue(i).unwrap();
        }
        queue.mark_finished();

        let drained: Vec<i32> = std::iter::from_fn(|| queue.dequeue()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn finished_queue_drains_before_end_of_stream() {
        let queue = HandoffQueue::new();
        queue.enqueue("a").unwrap();
        queue.mark_finished();

        assert_eq!(queue.dequeue(), Some("a"));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn dequeue_after_finish_on_empty_queue_returns_immediately() {
        let queue: HandoffQueue<u8> = HandoffQueue::new();
        queue.mark_finished();

        let start = Instant::now();
        assert_eq!(queue.dequeue(), None);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn mark_finished_is_idempotent() {
        let queue = HandoffQueue::new();
        queue.enqueue(1).unwrap();
        queue.mark_finished();
        queue.mark_finished();

        assert!(queue.is_finished());
        assert!(!queue.is_aborted());
        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.dequeue(), None);
        queue.mark_finished();
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn enqueue_after_finish_is_rejected() {
        let queue = HandoffQueue::new();
        queue.mark_finished();

        let rejected = queue.enqueue(42).unwrap_err();
        assert_eq!(rejected.into_inner(), 42);
        assert!(queue.is_empty());
    }

    #[test]
    fn dequeue_blocks_until_enqueue() {
        let queue = Arc::new(HandoffQueue::new());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let item = queue.dequeue();
                (item, start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(100));
        let enqueued_at = Instant::now();
        queue.enqueue(7u32).unwrap();

        let (item, waited) = consumer.join().unwrap();
        assert_eq!(item, Some(7));
        assert!(waited >= Duration::from_millis(90));
        assert!(enqueued_at.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn dequeue_blocks_until_finish() {
        let queue: Arc<HandoffQueue<u32>> = Arc::new(HandoffQueue::new());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.dequeue())
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!consumer.is_finished());
        queue.mark_finished();

        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn dequeue_timeout_reports_elapsed_wait() {
        let queue: HandoffQueue<u8> = HandoffQueue::new();
        assert_eq!(queue.dequeue_timeout(Duration::from_millis(20)), Err(()));

        queue.enqueue(3).unwrap();
        assert_eq!(queue.dequeue_timeout(Duration::from_millis(20)), Ok(Some(3)));

        queue.mark_finished();
        assert_eq!(queue.dequeue_timeout(Duration::from_millis(20)), Ok(None));
    }

    #[test]
    fn abort_drops_items_and_unblocks_consumer() {
        let queue = HandoffQueue::new();
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();

        assert_eq!(queue.abort(), 2);
        assert!(queue.is_aborted());
        assert!(queue.is_finished());
        assert_eq!(queue.dequeue(), None);
        assert!(queue.enqueue(3).is_err());

        let waiting: Arc<HandoffQueue<u8>> = Arc::new(HandoffQueue::new());
        let consumer = {
            let waiting = waiting.clone();
            thread::spawn(move || waiting.dequeue())
        };
        thread::sleep(Duration::from_millis(30));
        waiting.abort();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn high_water_mark_tracks_peak_depth() {
        let queue = HandoffQueue::new();
        for i in 0..4 {
            queue.enqueue(i).unwrap();
        }
        queue.try_dequeue();
        queue.try_dequeue();
        queue.enqueue(9).unwrap();

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.high_water_mark(), 4);
    }

    #[test]
    fn concurrent_producer_and_consumer_lose_nothing() {
        let queue = Arc::new(HandoffQueue::new());
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..10_000u32 {
                    queue.enqueue(i).unwrap();
                }
                queue.mark_finished();
            })
        };

        let mut expected = 0u32;
        while let Some(item) = queue.dequeue() {
            assert_eq!(item, expected);
            expected += 1;
        }
        producer.join().unwrap();
        assert_eq!(expected, 10_000);
    }
}
