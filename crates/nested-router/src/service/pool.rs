//! # Worker Pools
//!
//! A fixed number of long-lived tasks draining one shared bounded queue.
//!
//! ```text
//!   bus subscription(s)
//!          │ try_send
//!          ▼
//!   ┌──────────────┐   lock + recv   ┌──────────┐
//!   │ bounded queue│ ──────────────→ │ worker 0 │ ─→ handler
//!   │  (mpsc, N)   │ ──────────────→ │ worker 1 │ ─→ handler
//!   └──────────────┘ ──────────────→ │ worker k │ ─→ handler
//!                                    └──────────┘
//! ```
//!
//! Each pool owns a shutdown signal. On shutdown workers stop taking queue
//! items, the envelope each worker already holds is processed to the end,
//! and the tasks are joined.

use std::sync::Arc;

use async_trait::async_trait;
use nested_bus::Envelope;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Processes one envelope taken off a pool's queue.
#[async_trait]
pub trait EnvelopeHandler: Send + Sync + 'static {
    async fn handle(&self, envelope: Envelope);
}

/// Supervised set of workers sharing one queue.
pub struct WorkerPool {
    /// Name used in logs.
    name: &'static str,
    /// Shared receiving end of the queue.
    queue: Arc<Mutex<mpsc::Receiver<Envelope>>>,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Worker tasks.
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers, each calling `handler` for every envelope it
    /// takes off `queue`.
    pub fn spawn(
        name: &'static str,
        size: usize,
        queue: mpsc::Receiver<Envelope>,
        handler: Arc<dyn EnvelopeHandler>,
    ) -> Self {
        let queue = Arc::new(Mutex::new(queue));
        let (shutdown_tx, _) = watch::channel(false);

        let workers = (0..size)
            .map(|worker| {
                let queue = Arc::clone(&queue);
                let handler = Arc::clone(&handler);
                let shutdown = shutdown_tx.subscribe();
                tokio::spawn(run_worker(name, worker, queue, handler, shutdown))
            })
            .collect();

        info!(pool = name, workers = size, "Worker pool started");

        Self {
            name,
            queue,
            shutdown_tx,
            workers,
        }
    }

    /// Number of worker tasks.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Envelopes waiting in the queue.
    pub async fn pending(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Stop the workers and wait for them to finish their current envelope.
    ///
    /// # Returns
    ///
    /// The number of queued envelopes abandoned.
    pub async fn shutdown(self) -> usize {
        // Ignore send errors: every worker may already have exited.
        let _ = self.shutdown_tx.send(true);

        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!(pool = self.name, error = %e, "Worker task failed");
            }
        }

        let abandoned = self.queue.lock().await.len();
        if abandoned > 0 {
            warn!(pool = self.name, abandoned, "Queued envelopes abandoned on shutdown");
        }
        info!(pool = self.name, "Worker pool stopped");
        abandoned
    }
}

async fn run_worker(
    pool: &'static str,
    worker: usize,
    queue: Arc<Mutex<mpsc::Receiver<Envelope>>>,
    handler: Arc<dyn EnvelopeHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(pool, worker, "Worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let next = tokio::select! {
            biased;
            _ = shutdown.changed() => None,
            envelope = async { queue.lock().await.recv().await } => envelope,
        };

        match next {
            Some(envelope) => handler.handle(envelope).await,
            // Shutdown signalled or every producer is gone.
            None => break,
        }
    }

    debug!(pool, worker, "Worker stopped");
}
