//! Background threads for pure, CPU-bound noise work.
//!
//! Jobs are closures sent over a shared [`crossbeam_channel`] queue to a fixed
//! set of named worker threads. Each submission returns a [`Promise`] backed
//! by its own single-slot channel, which the caller polls cooperatively or
//! joins at the point the result is needed.

use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, warn};

use crate::error::WorldError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Result of a job submitted to a [`NoiseWorkerPool`].
#[derive(Debug)]
pub struct Promise<T> {
    ready: Option<T>,
    receiver: Option<Receiver<T>>,
}

impl<T> Promise<T> {
    /// A promise that is already fulfilled.
    pub fn ready(value: T) -> Self {
        Self {
            ready: Some(value),
            receiver: None,
        }
    }

    fn pending(receiver: Receiver<T>) -> Self {
        Self {
            ready: None,
            receiver: Some(receiver),
        }
    }

    /// Take the value if it has arrived.
    ///
    /// Returns `Ok(None)` while the job is running and
    /// [`WorldError::WorkerDisconnected`] if the worker dropped the job.
    pub fn try_take(&mut self) -> Result<Option<T>, WorldError> {
        if let Some(value) = self.ready.take() {
            return Ok(Some(value));
        }
        let Some(receiver) = &self.receiver else {
            return Err(WorldError::WorkerDisconnected);
        };
        match receiver.try_recv() {
            Ok(value) => {
                self.receiver = None;
                Ok(Some(value))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                self.receiver = None;
                Err(WorldError::WorkerDisconnected)
            }
        }
    }

    /// Block until the value arrives.
    pub fn wait(mut self) -> Result<T, WorldError> {
        if let Some(value) = self.ready.take() {
            return Ok(value);
        }
        self.receiver
            .take()
            .ok_or(WorldError::WorkerDisconnected)?
            .recv()
            .map_err(|_| WorldError::WorkerDisconnected)
    }
}

/// Fixed pool of noise worker threads. Zero threads runs every job inline.
pub struct NoiseWorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl NoiseWorkerPool {
    pub fn new(thread_count: usize) -> Self {
        if thread_count == 0 {
            return Self::inline();
        }
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(thread_count);
        for i in 0..thread_count {
            let receiver = receiver.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("grove-noise-{i}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => warn!("failed to spawn noise worker {i}: {e}"),
            }
        }
        if workers.is_empty() {
            return Self::inline();
        }
        debug!(threads = workers.len(), "noise worker pool started");
        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// A pool that runs every job on the caller's thread.
    pub fn inline() -> Self {
        Self {
            sender: None,
            workers: Vec::new(),
        }
    }

    /// Pool sized from the CPU count, leaving two cores for the caller.
    pub fn with_defaults() -> Self {
        let cpus = num_cpus::get().max(2);
        Self::new((cpus - 2).max(1))
    }

    /// `0` picks [`NoiseWorkerPool::with_defaults`].
    pub fn from_config(noise_threads: usize) -> Self {
        if noise_threads == 0 {
            Self::with_defaults()
        } else {
            Self::new(noise_threads)
        }
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Run `job` on a worker, or inline if the pool has none.
    pub fn submit<T, F>(&self, job: F) -> Promise<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return Promise::ready(job());
        };
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let boxed: Job = Box::new(move || {
            let _ = result_tx.send(job());
        });
        if let Err(unsent) = sender.send(boxed) {
            warn!("noise workers gone, running job inline");
            (unsent.into_inner())();
        }
        Promise::pending(result_rx)
    }
}

impl Drop for NoiseWorkerPool {
    fn drop(&mut self) {
        self.sender = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_inline_pool_is_ready_immediately() {
        let pool = NoiseWorkerPool::new(0);
        assert_eq!(pool.thread_count(), 0);
        let mut promise = pool.submit(|| 6 * 7);
        assert_eq!(promise.try_take().unwrap(), Some(42));
    }

    #[test]
    fn test_threaded_pool_delivers() {
        let pool = NoiseWorkerPool::new(2);
        assert_eq!(pool.thread_count(), 2);
        let promises: Vec<_> = (0..16u64).map(|i| pool.submit(move || i * i)).collect();
        let results: Vec<u64> = promises.into_iter().map(|p| p.wait().unwrap()).collect();
        assert_eq!(results, (0..16u64).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn test_try_take_polls_until_ready() {
        let pool = NoiseWorkerPool::new(1);
        let (go_tx, go_rx) = crossbeam_channel::bounded::<()>(0);
        let mut promise = pool.submit(move || {
            let _ = go_rx.recv();
            "done"
        });
        assert_eq!(promise.try_take().unwrap(), None);
        go_tx.send(()).unwrap();
        let mut value = None;
        for _ in 0..1000 {
            if let Some(v) = promise.try_take().unwrap() {
                value = Some(v);
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(value, Some("done"));
    }

    #[test]
    fn test_panicking_job_reports_disconnect() {
        let pool = NoiseWorkerPool::new(1);
        let promise = pool.submit(|| -> u32 { panic!("worker failure") });
        assert!(matches!(promise.wait(), Err(WorldError::WorkerDisconnected)));
    }

    #[test]
    fn test_taken_promise_reports_disconnect() {
        let mut promise = Promise::ready(1);
        assert_eq!(promise.try_take().unwrap(), Some(1));
        assert!(promise.try_take().is_err());
    }
}
