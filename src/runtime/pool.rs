//! A bounded worker pool pulling jobs from a LIFO stack.
//!
//! Grounded on a C++ thread pool that favors running the most recently
//! submitted job first rather than FIFO order: under load, the job at
//! the top of the stack is the one most likely to still have warm
//! caches, and simulation steps don't depend on submission order for
//! correctness, only on the `Scheduler`'s own barriers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    jobs: Mutex<Vec<Job>>,
    cv: Condvar,
    stop: AtomicBool,
}

pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(num_threads: usize) -> Self {
        let shared = Arc::new(Shared {
            jobs: Mutex::new(Vec::new()),
            cv: Condvar::new(),
            stop: AtomicBool::new(false),
        });
        let workers = (0..num_threads.max(1))
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || Self::worker_loop(&shared))
            })
            .collect();
        ThreadPool { shared, workers }
    }

    fn worker_loop(shared: &Shared) {
        loop {
            let job = {
                let mut jobs = shared.jobs.lock();
                loop {
                    if let Some(job) = jobs.pop() {
                        break Some(job);
                    }
                    if shared.stop.load(Ordering::Acquire) {
                        break None;
                    }
                    shared.cv.wait(&mut jobs);
                }
            };
            match job {
                Some(job) => job(),
                None => return,
            }
        }
    }

    /// Ignores jobs scheduled after [`Self::stop_now`].
    pub fn insert(&self, job: impl FnOnce() + Send + 'static) {
        if self.shared.stop.load(Ordering::Acquire) {
            return;
        }
        self.shared.jobs.lock().push(Box::new(job));
        self.shared.cv.notify_one();
    }

    /// Blocks until every outstanding job has run, then joins all workers.
    pub fn stop_now(mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.cv.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.cv.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_every_submitted_job() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.insert(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.stop_now();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }
}
