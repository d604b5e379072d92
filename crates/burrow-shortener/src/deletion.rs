use crate::config::ServiceConfig;
use burrow_core::{ShortenId, ShortenerError, Storage};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Batches soft deletes in the background.
///
/// Submitted ids pass through a small intake channel to a listener task,
/// which forwards them to a batch worker. The worker accumulates ids and
/// writes them with a single `mark_as_deleted_by_id` per tick, skipping empty
/// ticks. A failed flush keeps the batch for the next tick.
///
/// At most `batch_capacity` ids are held in memory. While that many are
/// pending the worker stops receiving, so the channels fill up and
/// [`submit`](Self::submit) waits.
///
/// [`shutdown`](Self::shutdown) drains everything already submitted and
/// performs a final flush before returning.
#[derive(Debug)]
pub struct DeletionPipeline {
    intake: mpsc::Sender<ShortenId>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DeletionPipeline {
    /// Spawns the listener and batch worker onto the current runtime.
    pub fn spawn<S: Storage>(storage: Arc<S>, config: &ServiceConfig) -> Self {
        let (intake, intake_rx) = mpsc::channel(config.intake_capacity.max(1));
        let (batch_tx, batch_rx) = mpsc::channel(config.batch_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let listener = tokio::spawn(listen(intake_rx, batch_tx, shutdown_rx.clone()));
        let worker = tokio::spawn(
            BatchWorker {
                storage,
                batch_rx,
                shutdown: shutdown_rx,
                flush_interval: config.flush_interval,
                flush_timeout: config.operation_timeout,
                max_pending: config.batch_capacity.max(1),
                pending: Vec::new(),
            }
            .run(),
        );

        info!(
            flush_interval = ?config.flush_interval,
            "deletion pipeline started"
        );

        Self {
            intake,
            shutdown_tx,
            tasks: Mutex::new(vec![listener, worker]),
        }
    }

    /// Queues `ids` for deletion. Waits only while the intake channel is full.
    pub async fn submit(&self, ids: Vec<ShortenId>) -> Result<(), ShortenerError> {
        if self.is_closed() {
            return Err(ShortenerError::PipelineClosed);
        }

        for id in ids {
            self.intake
                .send(id)
                .await
                .map_err(|_| ShortenerError::PipelineClosed)?;
        }

        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow() || self.intake.is_closed()
    }

    /// Stops accepting ids, flushes what was accepted and waits for both
    /// tasks to exit. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(err) = task.await {
                error!(error = %err, "deletion pipeline task failed");
            }
        }
    }
}

/// Forwards ids from the intake to the batch channel until shutdown, then
/// drains the intake and closes the batch channel.
async fn listen(
    mut intake: mpsc::Receiver<ShortenId>,
    batch: mpsc::Sender<ShortenId>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            received = intake.recv() => match received {
                Some(id) => {
                    if batch.send(id).await.is_err() {
                        warn!("batch worker gone, dropping deletion request");
                        return;
                    }
                }
                None => break,
            },
            _ = shutdown.changed() => break,
        }
    }

    intake.close();
    while let Some(id) = intake.recv().await {
        if batch.send(id).await.is_err() {
            return;
        }
    }
    debug!("deletion listener stopped");
}

struct BatchWorker<S> {
    storage: Arc<S>,
    batch_rx: mpsc::Receiver<ShortenId>,
    shutdown: watch::Receiver<bool>,
    flush_interval: Duration,
    flush_timeout: Duration,
    max_pending: usize,
    pending: Vec<ShortenId>,
}

impl<S: Storage> BatchWorker<S> {
    async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let accepting = self.pending.len() < self.max_pending;
            if !accepting {
                warn!(
                    pending = self.pending.len(),
                    "deletion backlog full, holding back new requests"
                );
            }

            tokio::select! {
                received = self.batch_rx.recv(), if accepting => match received {
                    Some(id) => self.pending.push(id),
                    None => break,
                },
                _ = ticker.tick() => {
                    self.flush().await;
                }
                // the listener may be stuck sending to us, so a full worker
                // has to notice shutdown itself
                _ = self.shutdown.changed(), if !accepting => {
                    self.batch_rx.close();
                    while let Some(id) = self.batch_rx.recv().await {
                        self.pending.push(id);
                    }
                    break;
                }
            }
        }

        self.flush().await;
        if !self.pending.is_empty() {
            error!(
                dropped = self.pending.len(),
                "final deletion flush failed, pending deletions are lost"
            );
        }
        info!("deletion pipeline stopped");
    }

    async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        self.pending.sort();
        self.pending.dedup();

        let result = tokio::time::timeout(
            self.flush_timeout,
            self.storage.mark_as_deleted_by_id(&self.pending),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                debug!(count = self.pending.len(), "flushed deletion batch");
                self.pending.clear();
            }
            Ok(Err(err)) => {
                warn!(error = %err, pending = self.pending.len(), "deletion flush failed, will retry");
            }
            Err(_) => {
                warn!(
                    timeout = ?self.flush_timeout,
                    pending = self.pending.len(),
                    "deletion flush timed out, will retry"
                );
            }
        }
    }
}
