use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::runner::{ConversionRunner, JobOutcome};
use crate::error::WorkerError;
use crate::job::JobId;

/// A reserved place in the worker queue.
///
/// Holding a slot guarantees the following [`submit`](QueueSlot::submit)
/// cannot fail, so callers can reserve first and only then commit the
/// state change that hands the job over.
pub struct QueueSlot<'a> {
    permit: mpsc::Permit<'a, JobId>,
}

impl QueueSlot<'_> {
    pub fn submit(self, id: JobId) {
        self.permit.send(id);
    }
}

/// Fixed set of tokio tasks pulling job ids from a bounded queue.
pub struct WorkerPool {
    job_sender: mpsc::Sender<JobId>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawns `worker_count` workers. Must be called inside a tokio runtime.
    pub fn new(runner: Arc<ConversionRunner>, worker_count: usize, queue_capacity: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = mpsc::channel::<JobId>(queue_capacity.max(1));
        let job_receiver = Arc::new(Mutex::new(job_receiver));
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let receiver = Arc::clone(&job_receiver);
            let worker_runner = Arc::clone(&runner);
            workers.push(tokio::spawn(run_worker(worker_id, receiver, worker_runner)));
        }

        info!("Started {} workers", worker_count);

        Self {
            job_sender,
            workers,
            shutdown,
        }
    }

    /// Reserves queue capacity for one job without blocking.
    pub fn reserve(&self) -> Result<QueueSlot<'_>, WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ShutDown);
        }

        match self.job_sender.try_reserve() {
            Ok(permit) => Ok(QueueSlot { permit }),
            Err(mpsc::error::TrySendError::Full(())) => Err(WorkerError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(())) => Err(WorkerError::ShutDown),
        }
    }

    pub fn submit(&self, id: JobId) -> Result<(), WorkerError> {
        self.reserve()?.submit(id);
        Ok(())
    }

    /// Stops accepting new jobs. Queued jobs still run.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Closes the queue and waits for workers to drain it.
    pub async fn wait(self) {
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

async fn run_worker(
    worker_id: usize,
    job_receiver: Arc<Mutex<mpsc::Receiver<JobId>>>,
    runner: Arc<ConversionRunner>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        let next = {
            let mut receiver = job_receiver.lock().await;
            receiver.recv().await
        };
        let Some(id) = next else {
            debug!("Worker {} job channel disconnected", worker_id);
            break;
        };

        debug!("Worker {} processing job {}", worker_id, id);
        match runner.run(&id).await {
            JobOutcome::Completed { .. } => debug!("Worker {} completed job {}", worker_id, id),
            JobOutcome::Failed { .. } => debug!("Worker {} recorded failure for {}", worker_id, id),
            JobOutcome::Abandoned => debug!("Worker {} dropped deleted job {}", worker_id, id),
        }
    }

    debug!("Worker {} stopped", worker_id);
}
