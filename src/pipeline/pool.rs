//! Bounded worker pool: a fixed set of threads fed over a channel, gated so at most `max`
//! handlers are in flight at once.

use crossbeam_channel::{Sender, unbounded};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// Per-item handler shared by every worker.
pub type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;

/// In-flight slots. `gauge` mirrors `count` for lock-free readers (status layer).
struct Slots {
    count: Mutex<usize>,
    changed: Condvar,
    gauge: Arc<AtomicUsize>,
}

impl Slots {
    fn lock(&self) -> std::sync::MutexGuard<'_, usize> {
        // The guarded value is a plain counter; a poisoned lock still holds a valid count.
        self.count.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn acquire(&self, max: usize) {
        let mut n = self.lock();
        while *n >= max {
            n = self.changed.wait(n).unwrap_or_else(|p| p.into_inner());
        }
        *n += 1;
        self.gauge.store(*n, Ordering::Relaxed);
    }

    fn release(&self) {
        let mut n = self.lock();
        *n = n.saturating_sub(1);
        self.gauge.store(*n, Ordering::Relaxed);
        self.changed.notify_all();
    }

    fn wait_idle(&self) {
        let mut n = self.lock();
        while *n > 0 {
            n = self.changed.wait(n).unwrap_or_else(|p| p.into_inner());
        }
    }
}

pub struct WorkerPool<T: Send + 'static> {
    max: usize,
    slots: Arc<Slots>,
    tx: Option<Sender<T>>,
    workers: Vec<JoinHandle<()>>,
    panics: Arc<AtomicUsize>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn `max` workers running `handler`. `max` is clamped to at least 1.
    pub fn new(max: usize, handler: Handler<T>) -> Self {
        Self::with_gauge(max, handler, Arc::new(AtomicUsize::new(0)))
    }

    /// Like [`new`](Self::new), publishing the in-flight count into `gauge`.
    pub fn with_gauge(max: usize, handler: Handler<T>, gauge: Arc<AtomicUsize>) -> Self {
        let max = max.max(1);
        let (tx, rx) = unbounded::<T>();
        let slots = Arc::new(Slots {
            count: Mutex::new(0),
            changed: Condvar::new(),
            gauge,
        });
        let panics = Arc::new(AtomicUsize::new(0));
        let workers = (0..max)
            .map(|_| {
                let rx = rx.clone();
                let handler = Arc::clone(&handler);
                let slots = Arc::clone(&slots);
                let panics = Arc::clone(&panics);
                thread::spawn(move || {
                    while let Ok(item) = rx.recv() {
                        if panic::catch_unwind(AssertUnwindSafe(|| handler(item))).is_err() {
                            panics.fetch_add(1, Ordering::Relaxed);
                            log::error!("Worker handler panicked; item counted as finished");
                        }
                        slots.release();
                    }
                })
            })
            .collect();
        WorkerPool {
            max,
            slots,
            tx: Some(tx),
            workers,
            panics,
        }
    }

    /// Hand `item` to a worker, blocking while `max` handlers are already running.
    pub fn dispatch(&self, item: T) {
        self.slots.acquire(self.max);
        let sent = self.tx.as_ref().map(|tx| tx.send(item).is_ok());
        if sent != Some(true) {
            self.slots.release();
            log::error!("Worker pool closed; item dropped");
        }
    }

    /// Block until no handler is in flight.
    pub fn drain(&self) {
        self.slots.wait_idle();
    }

    pub fn in_flight(&self) -> usize {
        self.slots.gauge.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Handlers that panicked so far.
    pub fn panicked(&self) -> usize {
        self.panics.load(Ordering::Relaxed)
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.tx.take();
        for w in self.workers.drain(..) {
            let _ = w.join();
        }
    }
}
