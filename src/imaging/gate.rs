//! Bounded admission control for transformations.
//!
//! [`AdmissionGate`] is a counting semaphore sized by the configured number of
//! concurrent transformations. Callers beyond the limit block until a slot
//! frees. Waiting is cooperative: the caller's [`Interrupt`] is polled, so a
//! cancellation or an expired deadline aborts the wait instead of leaving the
//! thread parked. Blocked callers are served first come, first served.

use log::debug;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often a blocked caller re-checks its interrupt.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Why a wait or an in-flight call was aborted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    #[error("cancelled")]
    Cancelled,
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// Cancellation flag plus optional deadline for one caller.
///
/// Share it behind an `Arc` to cancel from another thread.
#[derive(Debug, Default)]
pub struct Interrupt {
    cancelled: AtomicBool,
    deadline: Option<(Instant, Duration)>,
}

impl Interrupt {
    /// Never times out; only an explicit [`cancel`](Self::cancel) interrupts.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            deadline: Some((Instant::now() + timeout, timeout)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|(deadline, _)| deadline.saturating_duration_since(Instant::now()))
    }

    /// `Err` once cancelled or past the deadline. Cancellation wins.
    pub fn check(&self) -> Result<(), Interruption> {
        if self.is_cancelled() {
            return Err(Interruption::Cancelled);
        }
        match self.deadline {
            Some((deadline, timeout)) if Instant::now() >= deadline => {
                Err(Interruption::TimedOut(timeout))
            }
            _ => Ok(()),
        }
    }
}

/// Fair counting semaphore bounding concurrent transformations.
///
/// Waiters are admitted strictly in arrival order: a freed slot goes to the
/// oldest ticket, never to a caller that arrives later.
#[derive(Debug)]
pub struct AdmissionGate {
    capacity: usize,
    state: Mutex<GateState>,
    released: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    in_use: usize,
    next_ticket: u64,
    /// Tickets of blocked callers, oldest first.
    queue: VecDeque<u64>,
}

impl AdmissionGate {
    /// A gate admitting `capacity` holders at once (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(GateState::default()),
            released: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.state.lock().in_use)
    }

    /// Number of callers currently blocked in [`acquire`](Self::acquire).
    pub fn waiting(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Block until a slot is free and every earlier waiter has been served,
    /// or until `interrupt` fires. An interrupted waiter gives up its place.
    pub fn acquire(&self, interrupt: &Interrupt) -> Result<Permit<'_>, Interruption> {
        interrupt.check()?;
        let mut state = self.state.lock();
        if state.queue.is_empty() && state.in_use < self.capacity {
            state.in_use += 1;
            return Ok(Permit { gate: self });
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.queue.push_back(ticket);
        let started = Instant::now();
        let mut logged = false;

        loop {
            if state.queue.front() == Some(&ticket) && state.in_use < self.capacity {
                state.queue.pop_front();
                state.in_use += 1;
                if state.in_use < self.capacity && !state.queue.is_empty() {
                    self.released.notify_all();
                }
                return Ok(Permit { gate: self });
            }

            let wait = interrupt
                .remaining()
                .map_or(POLL_INTERVAL, |left| left.min(POLL_INTERVAL));
            self.released.wait_for(&mut state, wait);

            if let Err(interruption) = interrupt.check() {
                state.queue.retain(|t| *t != ticket);
                drop(state);
                self.released.notify_all();
                return Err(interruption);
            }
            if !logged && started.elapsed() >= POLL_INTERVAL {
                debug!(
                    "Waiting for a transformation slot ({} of {} in use, {} queued)",
                    state.in_use,
                    self.capacity,
                    state.queue.len()
                );
                logged = true;
            }
        }
    }
}

/// A held slot. Dropping it frees the slot and wakes the queue.
#[derive(Debug)]
pub struct Permit<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock();
        state.in_use = state.in_use.saturating_sub(1);
        drop(state);
        self.gate.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    // =========================================================================
    // Interrupt
    // =========================================================================

    #[test]
    fn interrupt_none_never_fires() {
        let interrupt = Interrupt::none();
        assert_eq!(interrupt.check(), Ok(()));
        assert_eq!(interrupt.remaining(), None);
    }

    #[test]
    fn interrupt_cancel() {
        let interrupt = Interrupt::none();
        interrupt.cancel();
        assert_eq!(interrupt.check(), Err(Interruption::Cancelled));
    }

    #[test]
    fn interrupt_deadline() {
        let interrupt = Interrupt::with_timeout(Duration::ZERO);
        assert_eq!(
            interrupt.check(),
            Err(Interruption::TimedOut(Duration::ZERO))
        );
        interrupt.cancel();
        assert_eq!(interrupt.check(), Err(Interruption::Cancelled));
    }

    // =========================================================================
    // AdmissionGate
    // =========================================================================

    #[test]
    fn zero_capacity_admits_one() {
        assert_eq!(AdmissionGate::new(0).capacity(), 1);
    }

    #[test]
    fn permits_are_released_on_drop() {
        let gate = AdmissionGate::new(2);
        let first = gate.acquire(&Interrupt::none()).unwrap();
        let second = gate.acquire(&Interrupt::none()).unwrap();
        assert_eq!(gate.available(), 0);
        drop(first);
        assert_eq!(gate.available(), 1);
        drop(second);
        assert_eq!(gate.available(), 2);
    }

    #[test]
    fn concurrency_never_exceeds_capacity() {
        let gate = Arc::new(AdmissionGate::new(2));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    let _permit = gate.acquire(&Interrupt::none()).unwrap();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(gate.available(), 2);
    }

    #[test]
    fn timeout_aborts_wait() {
        let gate = AdmissionGate::new(1);
        let _held = gate.acquire(&Interrupt::none()).unwrap();

        let timeout = Duration::from_millis(60);
        let started = Instant::now();
        let result = gate.acquire(&Interrupt::with_timeout(timeout));
        assert_eq!(result.unwrap_err(), Interruption::TimedOut(timeout));
        assert!(started.elapsed() >= timeout);
    }

    #[test]
    fn cancel_from_another_thread_aborts_wait() {
        let gate = Arc::new(AdmissionGate::new(1));
        let _held = gate.acquire(&Interrupt::none()).unwrap();

        let interrupt = Arc::new(Interrupt::none());
        let waiter = {
            let gate = Arc::clone(&gate);
            let interrupt = Arc::clone(&interrupt);
            thread::spawn(move || gate.acquire(&interrupt).map(|_| ()))
        };
        thread::sleep(Duration::from_millis(50));
        interrupt.cancel();

        assert_eq!(waiter.join().unwrap(), Err(Interruption::Cancelled));
    }

    #[test]
    fn waiter_proceeds_when_slot_frees() {
        let gate = Arc::new(AdmissionGate::new(1));
        let held = gate.acquire(&Interrupt::none()).unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.acquire(&Interrupt::none()).is_ok())
        };
        thread::sleep(Duration::from_millis(30));
        drop(held);

        assert!(waiter.join().unwrap());
    }

    /// Spin until `count` callers are queued on `gate`.
    fn wait_for_queue(gate: &AdmissionGate, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while gate.waiting() < count {
            assert!(Instant::now() < deadline, "waiters never queued");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn waiters_are_admitted_in_arrival_order() {
        let gate = Arc::new(AdmissionGate::new(1));
        let held = gate.acquire(&Interrupt::none()).unwrap();
        let admitted = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for id in 0..4 {
            let worker_gate = Arc::clone(&gate);
            let admitted = Arc::clone(&admitted);
            handles.push(thread::spawn(move || {
                let _permit = worker_gate.acquire(&Interrupt::none()).unwrap();
                admitted.lock().push(id);
                thread::sleep(Duration::from_millis(5));
            }));
            wait_for_queue(&gate, id + 1);
        }
        drop(held);
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*admitted.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn late_arrival_does_not_jump_the_queue() {
        let gate = Arc::new(AdmissionGate::new(1));
        let held = gate.acquire(&Interrupt::none()).unwrap();

        let queued = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let _permit = gate.acquire(&Interrupt::none()).unwrap();
                thread::sleep(Duration::from_millis(30));
            })
        };
        wait_for_queue(&gate, 1);
        drop(held);

        // The freed slot belongs to the queued waiter even before it wakes.
        let late = gate.acquire(&Interrupt::with_timeout(Duration::from_millis(5)));
        assert!(late.is_err());
        drop(late);
        queued.join().unwrap();
        assert_eq!(gate.available(), 1);
    }

    #[test]
    fn abandoned_ticket_does_not_block_the_queue() {
        let gate = Arc::new(AdmissionGate::new(1));
        let held = gate.acquire(&Interrupt::none()).unwrap();

        let impatient = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                gate.acquire(&Interrupt::with_timeout(Duration::from_millis(40)))
                    .map(|_| ())
            })
        };
        wait_for_queue(&gate, 1);
        let patient = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.acquire(&Interrupt::none()).is_ok())
        };
        wait_for_queue(&gate, 2);

        assert!(matches!(
            impatient.join().unwrap(),
            Err(Interruption::TimedOut(_))
        ));
        assert_eq!(gate.waiting(), 1);
        drop(held);
        assert!(patient.join().unwrap());
        assert_eq!(gate.waiting(), 0);
    }
}
