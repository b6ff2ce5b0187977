//! A fixed-size pool of long-lived worker threads. Workers pull boxed
//! closures off a shared `crossbeam_channel`, which is itself backed by a
//! mutex/condvar pair — the "workers waiting on a condition" model the
//! design calls for, without hand-rolling the wait queue.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error};
use thiserror::Error;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Surfaced by [`JobHandle::join_all`] when any task it ran unwound instead
/// of returning.
#[derive(Debug, Error)]
#[error("worker panicked")]
pub struct WorkerPanicked;

/// Per-job bookkeeping so `join_all` only waits on work the caller's own
/// job submitted, not on unrelated jobs sharing the same pool.
#[derive(Clone)]
pub struct JobHandle {
    running: Arc<(Mutex<usize>, Condvar)>,
    panicked: Arc<AtomicBool>,
}

impl JobHandle {
    fn new() -> Self {
        Self {
            running: Arc::new((Mutex::new(0), Condvar::new())),
            panicked: Arc::new(AtomicBool::new(false)),
        }
    }

    fn mark_started(&self) {
        let (lock, _) = &*self.running;
        *lock.lock().unwrap() += 1;
    }

    fn mark_finished(&self, panicked: bool) {
        if panicked {
            self.panicked.store(true, Ordering::SeqCst);
        }
        let (lock, cvar) = &*self.running;
        let mut count = lock.lock().unwrap();
        *count -= 1;
        if *count == 0 {
            cvar.notify_all();
        }
    }

    /// Block until every task this handle has submitted has completed.
    /// Returns [`WorkerPanicked`] if any of them unwound instead of
    /// returning normally.
    pub fn join_all(&self) -> Result<(), WorkerPanicked> {
        let (lock, cvar) = &*self.running;
        let mut count = lock.lock().unwrap();
        while *count > 0 {
            count = cvar.wait(count).unwrap();
        }
        if self.panicked.swap(false, Ordering::SeqCst) {
            Err(WorkerPanicked)
        } else {
            Ok(())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub struct ThreadPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(size: usize) -> Self {
        let (sender, receiver): (Sender<Task>, Receiver<Task>) = unbounded();
        let mut workers = Vec::with_capacity(size);
        for index in 0..size.max(1) {
            let receiver = receiver.clone();
            workers.push(
                std::thread::Builder::new()
                    .name(format!("backup-worker-{}", index))
                    .spawn(move || {
                        while let Ok(task) = receiver.recv() {
                            task();
                        }
                        debug!("worker {} shutting down", index);
                    })
                    .expect("failed to spawn worker thread"),
            );
        }
        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub fn new_job(&self) -> JobHandle {
        JobHandle::new()
    }

    /// Acquire an idle worker (implicitly, via the shared channel) and hand
    /// it `task`, tagged against `job` so [`JobHandle::join_all`] can
    /// observe its completion.
    pub fn run(&self, job: &JobHandle, task: impl FnOnce() + Send + 'static) {
        job.mark_started();
        let job = job.clone();
        let wrapped: Task = Box::new(move || match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => job.mark_finished(false),
            Err(payload) => {
                error!("worker task panicked: {}", panic_message(&*payload));
                job.mark_finished(true);
            }
        });
        self.sender
            .as_ref()
            .expect("pool not yet shut down")
            .send(wrapped)
            .expect("worker channel closed unexpectedly");
    }

    /// Broadcast shutdown (dropping the sender closes the channel for every
    /// worker) and join all worker threads.
    pub fn shutdown(mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn join_all_waits_only_for_its_own_jobs_tasks() {
        let pool = ThreadPool::new(4);
        let job_a = pool.new_job();
        let job_b = pool.new_job();

        let counter_a = Arc::new(AtomicUsize::new(0));
        let counter_b = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = counter_a.clone();
            pool.run(&job_a, move || {
                std::thread::sleep(std::time::Duration::from_millis(5));
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        for _ in 0..3 {
            let counter = counter_b.clone();
            pool.run(&job_b, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        job_a.join_all().unwrap();
        assert_eq!(counter_a.load(Ordering::SeqCst), 5);

        job_b.join_all().unwrap();
        assert_eq!(counter_b.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn join_all_reports_a_panicked_task_without_hanging() {
        let pool = ThreadPool::new(2);
        let job = pool.new_job();

        pool.run(&job, || panic!("boom"));
        pool.run(&job, || {});

        assert!(job.join_all().is_err());
    }
}
