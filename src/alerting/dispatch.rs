//! Bounded notification dispatch
//!
//! Deliveries go through a bounded queue drained by a fixed pool of worker
//! tasks, so a slow or failing channel can never stall alert evaluation.
//! When the queue is full the job is dropped and counted, not awaited.

use super::alert::Alert;
use super::channels::{ChannelSender, NotificationChannel};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

pub struct NotificationJob {
    pub channel: NotificationChannel,
    pub alert: Alert,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct DispatchCounts {
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}

struct DispatchStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Fixed-size worker pool draining a bounded job queue
pub struct Dispatcher {
    tx: mpsc::Sender<NotificationJob>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    /// Spawns the workers immediately; requires a running tokio runtime
    pub fn new(workers: usize, queue_capacity: usize, sender: Arc<dyn ChannelSender>) -> Self {
        let (tx, rx) = mpsc::channel::<NotificationJob>(queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let stats = Arc::new(DispatchStats {
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        });

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let sender = Arc::clone(&sender);
                let stats = Arc::clone(&stats);
                tokio::spawn(async move {
                    loop {
                        // Hold the lock only for the recv, not the delivery
                        let job = { rx.lock().await.recv().await };
                        let Some(job) = job else { break };

                        match sender.deliver(&job.channel, &job.alert) {
                            Ok(()) => {
                                stats.delivered.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => {
                                stats.failed.fetch_add(1, Ordering::Relaxed);
                                error!(
                                    worker_id,
                                    channel = %job.channel.channel_id,
                                    alert_id = %job.alert.alert_id,
                                    "notification delivery failed: {e}"
                                );
                            }
                        }
                    }
                    debug!(worker_id, "notification worker exited");
                })
            })
            .collect();

        Self {
            tx,
            workers: handles,
            stats,
        }
    }

    /// Non-blocking enqueue; a full queue drops the job
    pub fn enqueue(&self, job: NotificationJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    channel = %job.channel.channel_id,
                    alert_id = %job.alert.alert_id,
                    "notification queue full, dropping job"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("notification queue closed");
                false
            }
        }
    }

    pub fn counts(&self) -> DispatchCounts {
        DispatchCounts {
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }

    /// Close the queue and wait for in-flight deliveries to finish
    pub async fn shutdown(self) {
        drop(self.tx);
        for handle in self.workers {
            if let Err(e) = handle.await {
                error!("notification worker join failed: {e}");
            }
        }
    }
}
