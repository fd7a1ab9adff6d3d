//! Single-consumer FIFO dispatcher for marshalling work onto the control
//! thread.
//!
//! # Why a dispatcher? (for beginners)
//!
//! All game state (the token registry, the link state machine's observers)
//! is owned by a single *control thread*.  The blocking I/O threads —
//! accept, dial, read — must never touch that state directly; instead they
//! enqueue a callback here, and the control thread executes the queued
//! callbacks once per tick by calling [`Dispatcher::drain`].
//!
//! # Implementation
//!
//! The queue is an `std::sync::mpsc` channel rather than a hand-locked
//! `VecDeque`: the channel already provides thread-safe FIFO hand-off, and
//! the receiver half makes the single-consumer contract explicit.
//!
//! `drain()` snapshots the callbacks queued at the moment it is called and
//! runs exactly those.  Callbacks enqueued *while* a drain is running are
//! left for the next tick, so one drain call is always bounded by the queue
//! length at entry and cannot starve the control thread, no matter how fast
//! producers enqueue.
//!
//! There is no cancellation: once enqueued, a callback will run.

use std::sync::mpsc;
use std::sync::Mutex;

use tracing::trace;

/// A queued unit of work.
type Job = Box<dyn FnOnce() + Send + 'static>;

/// Thread-safe FIFO callback queue with a single consumer.
///
/// [`enqueue`](Dispatcher::enqueue) may be called from any thread;
/// [`drain`](Dispatcher::drain) must only be called from the designated
/// control thread, once per tick.
pub struct Dispatcher {
    // Sender is `Send` but not `Sync`; the mutex makes it shareable through
    // `&self` from any number of producer threads.
    tx: Mutex<mpsc::Sender<Job>>,
    rx: Mutex<mpsc::Receiver<Job>>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx: Mutex::new(tx),
            rx: Mutex::new(rx),
        }
    }

    /// Appends `job` to the queue.  Callable from any thread.
    pub fn enqueue(&self, job: impl FnOnce() + Send + 'static) {
        let tx = self.tx.lock().expect("dispatcher mutex poisoned");
        // The receiver lives inside `self`, so the channel cannot be
        // disconnected while `&self` exists.
        tx.send(Box::new(job)).expect("dispatcher receiver dropped");
    }

    /// Executes every callback queued at the moment of the call, in enqueue
    /// order, synchronously on the calling thread.  Returns the number of
    /// callbacks executed.
    ///
    /// Callbacks enqueued during the drain run on the next call.  The
    /// receiver lock is released before any callback runs, so a callback may
    /// itself enqueue without deadlocking.
    pub fn drain(&self) -> usize {
        let jobs: Vec<Job> = {
            let rx = self.rx.lock().expect("dispatcher mutex poisoned");
            rx.try_iter().collect()
        };
        let count = jobs.len();
        if count > 0 {
            trace!("draining {count} queued callback(s)");
        }
        for job in jobs {
            job();
        }
        count
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_drain_runs_callbacks_in_enqueue_order() {
        // Arrange
        let dispatcher = Dispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = Arc::clone(&order);
            dispatcher.enqueue(move || order.lock().unwrap().push(i));
        }

        // Act
        let count = dispatcher.drain();

        // Assert – strict FIFO
        assert_eq!(count, 5);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_drain_on_empty_queue_returns_zero() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.drain(), 0);
    }

    #[test]
    fn test_callback_enqueued_during_drain_waits_for_next_tick() {
        // Arrange – a callback that enqueues another callback
        let dispatcher = Arc::new(Dispatcher::new());
        let ran = Arc::new(AtomicUsize::new(0));

        let d = Arc::clone(&dispatcher);
        let r = Arc::clone(&ran);
        dispatcher.enqueue(move || {
            let r2 = Arc::clone(&r);
            d.enqueue(move || {
                r2.fetch_add(1, Ordering::SeqCst);
            });
        });

        // Act / Assert – the inner callback is not part of the first drain
        assert_eq!(dispatcher.drain(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 0, "inner callback must wait");

        assert_eq!(dispatcher.drain(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_enqueue_is_safe_from_many_threads() {
        // Arrange
        let dispatcher = Arc::new(Dispatcher::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let threads = 8;
        let per_thread = 100;

        // Act – enqueue from many producer threads at once
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let d = Arc::clone(&dispatcher);
                let c = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        let c = Arc::clone(&c);
                        d.enqueue(move || {
                            c.fetch_add(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("producer thread panicked");
        }

        // Assert – no work is lost
        assert_eq!(dispatcher.drain(), threads * per_thread);
        assert_eq!(counter.load(Ordering::SeqCst), threads * per_thread);
    }

    #[test]
    fn test_callbacks_run_on_the_draining_thread() {
        // Arrange
        let dispatcher = Arc::new(Dispatcher::new());
        let observed = Arc::new(Mutex::new(None));

        let o = Arc::clone(&observed);
        let d = Arc::clone(&dispatcher);
        let producer = thread::spawn(move || {
            d.enqueue(move || {
                *o.lock().unwrap() = Some(thread::current().id());
            });
        });
        producer.join().expect("producer thread panicked");

        // Act
        dispatcher.drain();

        // Assert – the callback ran here, not on the producer thread
        assert_eq!(
            observed.lock().unwrap().expect("callback must have run"),
            thread::current().id()
        );
    }
}
