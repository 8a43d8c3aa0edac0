//! Periodic removal of idle jobs.
//!
//! Finished jobs and never-started uploads are dropped once they have been
//! idle for longer than the configured TTL, together with their files.
//! Jobs a worker may still touch are never swept.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::job::JobRegistry;
use crate::store::FileStore;

pub struct Reaper {
    registry: Arc<JobRegistry>,
    store: Arc<FileStore>,
    ttl: chrono::Duration,
    interval: Duration,
    shutdown: AtomicBool,
    wake: Notify,
}

impl Reaper {
    pub fn new(
        registry: Arc<JobRegistry>,
        store: Arc<FileStore>,
        ttl: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            ttl: chrono::Duration::from_std(ttl)
                .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100)),
            interval,
            shutdown: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    /// Runs one sweep now. Returns how many jobs were removed.
    pub async fn sweep_once(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    /// Sweeps as if the current time were `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let removed = self.registry.take_stale(self.ttl, now);
        for job in &removed {
            if let Err(e) = self.store.purge(&job.id).await {
                log::warn!("Failed to purge files of expired job {}: {}", job.id, e);
            }
        }
        if !removed.is_empty() {
            log::info!("Reaper removed {} expired jobs", removed.len());
        }
        removed.len()
    }

    /// Starts the sweep loop on the current tokio runtime.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let reaper = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(reaper.interval);
            interval_timer.tick().await; // skip immediate first tick

            loop {
                if reaper.shutdown.load(Ordering::Acquire) {
                    break;
                }

                tokio::select! {
                    _ = interval_timer.tick() => {},
                    _ = reaper.wake.notified() => {},
                }

                if reaper.shutdown.load(Ordering::Acquire) {
                    break;
                }

                reaper.sweep_once().await;
            }

            log::debug!("Reaper stopped");
        })
    }

    /// Signals the loop to stop and wakes it if it is sleeping.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}
