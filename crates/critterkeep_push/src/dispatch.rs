//! Background hand-off between the sweep trigger and the sender.
//!
//! Batches go through a bounded queue; when it is full the batch is dropped
//! with a warning rather than blocking the request that produced it.

use critterkeep_db::ResetEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::sender::NotificationSender;

#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Vec<ResetEvent>>,
}

impl NotificationDispatcher {
    /// Starts the worker on the current runtime.
    ///
    /// The worker exits once every dispatcher clone has been dropped and the
    /// queue is drained.
    pub fn spawn(sender: NotificationSender, queue_depth: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let handle = tokio::spawn(run_worker(sender, rx));
        (Self { tx }, handle)
    }

    /// Queues a batch for delivery. Returns `false` if it was dropped.
    pub fn submit(&self, events: Vec<ResetEvent>) -> bool {
        if events.is_empty() {
            return true;
        }
        let count = events.len();
        match self.tx.try_send(events) {
            Ok(()) => {
                debug!(count, "Queued reset notifications");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(count, "Notification queue full, dropping reset notifications");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(count, "Notification worker stopped, dropping reset notifications");
                false
            }
        }
    }
}

async fn run_worker(sender: NotificationSender, mut rx: mpsc::Receiver<Vec<ResetEvent>>) {
    info!("Notification worker started");
    while let Some(events) = rx.recv().await {
        let count = events.len();
        let report = sender.deliver_batch(events).await;
        info!(
            events = count,
            delivered = report.delivered,
            gone = report.gone,
            failed = report.failed,
            errors = report.errors,
            skipped = report.skipped,
            "Reset notifications processed"
        );
    }
    info!("Notification worker stopped");
}
