//! Worker Pool
//!
//! Fixed set of threads running one job at a time each.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{DbError, Result};

/// Bounded pool of worker threads
///
/// Jobs are handed over a rendezvous channel: [`WorkerPool::execute`] blocks
/// until some worker is idle, so a saturated pool makes the caller wait
/// instead of rejecting work.
pub struct WorkerPool<T: Send + 'static> {
    /// Job sender (None once the pool is shutting down)
    sender: Option<Sender<T>>,

    /// Worker thread handles, joined on drop
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn `size` workers, each running `handler` for every job it receives
    pub fn new<F>(size: usize, handler: F) -> Result<Self>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        if size == 0 {
            return Err(DbError::Config("worker pool size must be at least 1".to_string()));
        }

        let (sender, receiver) = channel::bounded::<T>(0);
        let handler = Arc::new(handler);

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = receiver.clone();
            let handler = Arc::clone(&handler);
            let worker = thread::Builder::new()
                .name(format!("simpledb-worker-{}", id))
                .spawn(move || worker_loop(id, receiver, handler))?;
            workers.push(worker);
        }

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Hand a job to the next idle worker, waiting for one if all are busy
    pub fn execute(&self, job: T) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| DbError::Config("worker pool is shut down".to_string()))?;

        sender
            .send(job)
            .map_err(|_| DbError::Config("all pool workers have exited".to_string()))
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        // Closing the channel lets each worker finish its job and exit
        self.sender.take();

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::warn!("Worker thread exited abnormally");
            }
        }
    }
}

fn worker_loop<T, F>(id: usize, receiver: Receiver<T>, handler: Arc<F>)
where
    F: Fn(T) + Send + Sync + 'static,
{
    tracing::trace!("Worker {} started", id);

    for job in receiver.iter() {
        if panic::catch_unwind(AssertUnwindSafe(|| (*handler)(job))).is_err() {
            tracing::error!("Worker {} recovered from a panicking job", id);
        }
    }

    tracing::trace!("Worker {} stopped", id);
}
