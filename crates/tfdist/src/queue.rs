// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pipeline queues and the send-slot semaphore.
//!
//! Every stage boundary in the pipeline is a [`ConcurrentFifo`]; the queue
//! is the only legal suspension point. Backpressure is not a queue concern:
//! it is enforced globally by [`SendSlots`], which bounds the number of
//! in-flight STFs on the sender.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Unbounded blocking MPMC FIFO with a terminal *stopped* state.
///
/// - `push` is O(1), never blocks, and is silently dropped once stopped.
/// - `pop` blocks until an element is available; returns `None` only when
///   the queue is stopped *and* drained (never spuriously).
/// - `stop` is a one-way transition that wakes all blocked consumers.
pub struct ConcurrentFifo<T> {
    inner: Mutex<FifoInner<T>>,
    available: Condvar,
}

struct FifoInner<T> {
    queue: VecDeque<T>,
    stopped: bool,
}

impl<T> Default for ConcurrentFifo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConcurrentFifo<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FifoInner {
                queue: VecDeque::new(),
                stopped: false,
            }),
            available: Condvar::new(),
        }
    }

    pub fn push(&self, v: T) {
        let mut inner = self.inner.lock();
        if inner.stopped {
            return;
        }
        inner.queue.push_back(v);
        drop(inner);
        self.available.notify_one();
    }

    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(v) = inner.queue.pop_front() {
                return Some(v);
            }
            if inner.stopped {
                return None;
            }
            self.available.wait(&mut inner);
        }
    }

    /// Non-blocking pop; `None` when currently empty (stopped or not).
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().queue.pop_front()
    }

    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.stopped = true;
        drop(inner);
        self.available.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }
}

/// Global bound on in-flight sends.
///
/// The scheduler acquires one slot per STF before dispatching to a
/// destination queue; each sender thread releases one slot after its send
/// completes. Acquire polls the running flag once per second so a stopping
/// device never parks a scheduler indefinitely.
pub struct SendSlots {
    slots: Mutex<u32>,
    capacity: u32,
    available: Condvar,
}

const ACQUIRE_POLL: Duration = Duration::from_secs(1);

impl SendSlots {
    pub fn new(capacity: u32) -> Self {
        Self {
            slots: Mutex::new(capacity),
            capacity,
            available: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Take one slot. Returns `false` without taking a slot when `running`
    /// clears while waiting.
    pub fn acquire(&self, running: &AtomicBool) -> bool {
        let mut slots = self.slots.lock();
        while *slots == 0 {
            if !running.load(Ordering::Acquire) {
                return false;
            }
            let _ = self.available.wait_for(&mut slots, ACQUIRE_POLL);
        }
        *slots -= 1;
        true
    }

    /// Return one slot and wake one waiter.
    pub fn release(&self) {
        let mut slots = self.slots.lock();
        debug_assert!(*slots < self.capacity, "slot released twice");
        *slots += 1;
        drop(slots);
        self.available.notify_one();
    }

    /// Wake all waiters so they re-check the running flag.
    pub fn notify_all(&self) {
        self.available.notify_all();
    }

    pub fn free(&self) -> u32 {
        *self.slots.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let q = ConcurrentFifo::new();
        q.push(1);
        q.push(2);
        q.push(3);

        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn test_stop_drains_pending_elements() {
        let q = ConcurrentFifo::new();
        q.push(1);
        q.push(2);
        q.stop();

        // pending elements still observable after stop
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_push_after_stop_is_dropped() {
        let q = ConcurrentFifo::new();
        q.stop();
        q.push(1);
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_stop_wakes_blocked_consumers() {
        let q: Arc<ConcurrentFifo<u32>> = Arc::new(ConcurrentFifo::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let q = q.clone();
            handles.push(thread::spawn(move || q.pop()));
        }

        thread::sleep(Duration::from_millis(30));
        q.stop();

        for h in handles {
            assert_eq!(h.join().expect("join"), None);
        }
    }

    #[test]
    fn test_mpmc_delivery() {
        let q: Arc<ConcurrentFifo<u64>> = Arc::new(ConcurrentFifo::new());
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let q = q.clone();
                thread::spawn(move || {
                    let mut got = Vec::new();
                    while let Some(v) = q.pop() {
                        got.push(v);
                    }
                    got
                })
            })
            .collect();

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let q = q.clone();
                thread::spawn(move || {
                    for i in 0..100u64 {
                        q.push(p * 100 + i);
                    }
                })
            })
            .collect();

        for p in producers {
            p.join().expect("producer");
        }
        q.stop();

        let total: usize = consumers
            .into_iter()
            .map(|c| c.join().expect("consumer").len())
            .sum();
        assert_eq!(total, 400);
    }

    #[test]
    fn test_slots_acquire_release() {
        let slots = SendSlots::new(2);
        let running = AtomicBool::new(true);

        assert!(slots.acquire(&running));
        assert!(slots.acquire(&running));
        assert_eq!(slots.free(), 0);

        slots.release();
        assert_eq!(slots.free(), 1);
        assert!(slots.acquire(&running));
    }

    #[test]
    fn test_slots_acquire_observes_shutdown() {
        let slots = Arc::new(SendSlots::new(1));
        let running = Arc::new(AtomicBool::new(true));
        assert!(slots.acquire(&running));

        let (s, r) = (slots.clone(), running.clone());
        let handle = thread::spawn(move || s.acquire(&r));

        thread::sleep(Duration::from_millis(30));
        running.store(false, Ordering::Release);
        slots.notify_all();

        assert!(!handle.join().expect("join"));
        // the refused acquire did not consume a slot
        slots.release();
        assert_eq!(slots.free(), 1);
    }

    #[test]
    fn test_slots_bound_in_flight() {
        let slots = Arc::new(SendSlots::new(3));
        let running = Arc::new(AtomicBool::new(true));
        let in_flight = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let peak = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let (s, r) = (slots.clone(), running.clone());
                let (inf, pk) = (in_flight.clone(), peak.clone());
                thread::spawn(move || {
                    for _ in 0..20 {
                        assert!(s.acquire(&r));
                        let now = inf.fetch_add(1, Ordering::SeqCst) + 1;
                        pk.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_micros(100));
                        inf.fetch_sub(1, Ordering::SeqCst);
                        s.release();
                    }
                })
            })
            .collect();

        for w in workers {
            w.join().expect("worker");
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(slots.free(), 3);
    }
}
