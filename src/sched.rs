//! Deferred one-shot tasks on the frame loop.
//!
//! Everything in the show that happens "a moment later" (glint
//! flashes, double launches, swipe staggering, the midnight barrage)
//! goes through one due-time-ordered queue drained once per frame.
//! Time comes from a `Clock` so tests can drive the queue with a fake
//! one instead of real timers.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall clock, measured from construction.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

struct Entry<T> {
    due_ms: u64,
    seq: u64,
    task: T,
}

// Min-heap on (due, seq); seq keeps same-deadline tasks FIFO.
impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due_ms, other.seq).cmp(&(self.due_ms, self.seq))
    }
}

/// One-shot task queue keyed by absolute due time.
pub struct Scheduler<T> {
    queue: BinaryHeap<Entry<T>>,
    seq: u64,
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Schedule `task` to fire `delay_ms` after `now_ms`.
    pub fn schedule_in(&mut self, now_ms: u64, delay_ms: u64, task: T) {
        let seq = self.seq;
        self.seq += 1;
        self.queue.push(Entry {
            due_ms: now_ms.saturating_add(delay_ms),
            seq,
            task,
        });
    }

    /// Pop every task due at or before `now_ms`, in due order.
    pub fn drain_due(&mut self, now_ms: u64) -> Vec<T> {
        let mut out = Vec::new();
        while self.queue.peek().is_some_and(|e| e.due_ms <= now_ms) {
            if let Some(e) = self.queue.pop() {
                out.push(e.task);
            }
        }
        out
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_order() {
        let mut s = Scheduler::new();
        s.schedule_in(0, 120, "late");
        s.schedule_in(0, 50, "early");
        s.schedule_in(0, 80, "mid");

        assert!(s.drain_due(40).is_empty());
        assert_eq!(s.drain_due(80), vec!["early", "mid"]);
        assert_eq!(s.drain_due(200), vec!["late"]);
        assert!(s.is_empty());
    }

    #[test]
    fn equal_deadlines_stay_fifo() {
        let mut s = Scheduler::new();
        s.schedule_in(0, 100, 1);
        s.schedule_in(0, 100, 2);
        s.schedule_in(0, 100, 3);
        assert_eq!(s.drain_due(100), vec![1, 2, 3]);
    }

    #[test]
    fn tasks_survive_until_drained() {
        let mut s = Scheduler::new();
        s.schedule_in(500, 80, "x");
        assert!(s.drain_due(500).is_empty());
        assert_eq!(s.drain_due(580), vec!["x"]);
    }
}
