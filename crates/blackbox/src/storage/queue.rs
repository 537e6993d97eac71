//! Serialized, coalescing snapshot writes.
//!
//! Every enqueued snapshot gets a generation number. A single background
//! task writes the newest pending snapshot, one write at a time. Snapshots
//! that were superseded while a write was in flight are never written;
//! the write of the newer one covers them.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, trace};

use super::{Snapshot, SnapshotStore};
use crate::error::{Error, Result};

#[derive(Debug)]
struct Pending {
    generation: u64,
    snapshot: Arc<Snapshot>,
}

#[derive(Debug, Clone, Default)]
struct Completed {
    /// Generation of the most recent write attempt.
    generation: u64,
    /// Newest generation that was written successfully.
    durable: u64,
    /// Outcome of the most recent attempt, if it failed.
    error: Option<Arc<Error>>,
}

/// Handle to the background writer of one store key.
///
/// Dropping the queue lets the writer finish the newest pending snapshot
/// and then exit.
#[derive(Debug)]
pub struct WriteQueue {
    pending: watch::Sender<Pending>,
    completed: watch::Receiver<Completed>,
}

/// Awaitable durability of one enqueued snapshot.
#[derive(Debug, Clone)]
pub struct PersistTicket {
    generation: u64,
    completed: watch::Receiver<Completed>,
}

impl WriteQueue {
    /// Start the writer task for `key` on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(store: Arc<dyn SnapshotStore>, key: impl Into<String>) -> Self {
        let (pending_tx, pending_rx) = watch::channel(Pending {
            generation: 0,
            snapshot: Arc::new(Snapshot::default()),
        });
        let (completed_tx, completed_rx) = watch::channel(Completed::default());

        tokio::spawn(run_writer(store, key.into(), pending_rx, completed_tx));

        Self {
            pending: pending_tx,
            completed: completed_rx,
        }
    }

    /// Schedule `snapshot` to be written. Does not wait for the write.
    pub fn enqueue(&self, snapshot: Snapshot) -> PersistTicket {
        let snapshot = Arc::new(snapshot);
        let mut generation = 0;
        self.pending.send_modify(|pending| {
            pending.generation += 1;
            pending.snapshot = snapshot;
            generation = pending.generation;
        });
        trace!(generation, "Enqueued snapshot write");
        self.ticket(generation)
    }

    /// A ticket covering everything enqueued so far.
    #[must_use]
    pub fn flush(&self) -> PersistTicket {
        let generation = self.pending.borrow().generation;
        self.ticket(generation)
    }

    fn ticket(&self, generation: u64) -> PersistTicket {
        PersistTicket {
            generation,
            completed: self.completed.clone(),
        }
    }
}

impl PersistTicket {
    /// The generation this ticket waits for.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait until a snapshot at least as new as this ticket's is written.
    ///
    /// Succeeds once any successful write has covered this generation, even
    /// if a later write failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the covering write failed, or
    /// [`Error::Internal`] if the writer stopped first.
    pub async fn wait(&self) -> Result<()> {
        let mut completed = self.completed.clone();
        let outcome = completed
            .wait_for(|c| c.generation >= self.generation)
            .await
            .map(|c| {
                if c.durable >= self.generation {
                    None
                } else {
                    c.error.clone()
                }
            })
            .map_err(|_| Error::internal("snapshot writer stopped before the write completed"))?;

        match outcome {
            Some(err) => Err(Error::Persistence(err)),
            None => Ok(()),
        }
    }
}

async fn run_writer(
    store: Arc<dyn SnapshotStore>,
    key: String,
    mut pending: watch::Receiver<Pending>,
    completed: watch::Sender<Completed>,
) {
    while pending.changed().await.is_ok() {
        let (generation, snapshot) = {
            let latest = pending.borrow_and_update();
            (latest.generation, Arc::clone(&latest.snapshot))
        };

        match store.set(&key, &snapshot).await {
            Ok(()) => completed.send_modify(|c| {
                c.generation = generation;
                c.durable = generation;
                c.error = None;
            }),
            Err(err) => {
                error!(generation, "Failed to persist snapshot: {}", err);
                completed.send_modify(|c| {
                    c.generation = generation;
                    c.error = Some(Arc::new(err));
                });
            }
        }
    }
    trace!("Snapshot writer stopped");
}
