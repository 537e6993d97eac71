//! Persistence layer for blackbox.
//!
//! All records of a session are persisted together as one [`Snapshot`]
//! under a single key. The [`SnapshotStore`] trait is the key-value boundary.
//! [`SqliteStore`] is the durable implementation and [`MemoryStore`] the
//! in-process one. Writes go through a [`WriteQueue`] so that at most one
//! write is in flight and an older snapshot can never overwrite a newer one.

mod memory;
pub mod migrations;
mod queue;
pub mod schema;
mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::{ErrorRecord, HistoryRecord};

pub use memory::MemoryStore;
pub use queue::{PersistTicket, WriteQueue};
pub use sqlite::SqliteStore;

/// Every error and history record of a session, persisted as one value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Error records in the order they were recorded.
    #[serde(default)]
    pub errors: Vec<ErrorRecord>,
    /// History records in the order they were recorded.
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
}

impl Snapshot {
    /// The most recently recorded error, if any.
    #[must_use]
    pub fn latest_error(&self) -> Option<&ErrorRecord> {
        self.errors.last()
    }

    /// Check whether the snapshot holds no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.history.is_empty()
    }

    /// Total number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len() + self.history.len()
    }
}

/// A key-value store holding snapshots.
///
/// A successful `set` means the value will be returned by every later `get`
/// of the same key, including after a restart for durable stores.
#[async_trait]
pub trait SnapshotStore: Send + Sync + std::fmt::Debug {
    /// Read the snapshot stored under `key`, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the stored value cannot be decoded.
    async fn get(&self, key: &str) -> Result<Option<Snapshot>>;

    /// Replace the snapshot stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn set(&self, key: &str, snapshot: &Snapshot) -> Result<()>;
}
