//! The session recorder.
//!
//! A [`Manager`] owns the in-memory error and history lists of one session,
//! keeps them persisted through a [`WriteQueue`], tells listeners about
//! appends, and packs everything into a diagnostic archive on request.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::archive::{self, ExportedArchive, Protection};
use crate::config::Config;
use crate::download::Downloader;
use crate::environment::EnvironmentProvider;
use crate::error::{Error, Result};
use crate::events::{Dispatcher, Event};
use crate::record::{ErrorRecord, HistoryRecord, Record};
use crate::storage::{PersistTicket, Snapshot, SnapshotStore, WriteQueue};

/// An error that was recorded, returned so the caller can propagate it.
///
/// Dropping it is fine; the record is already appended.
#[derive(Debug, Clone)]
pub struct RecordedError {
    record: ErrorRecord,
    ticket: PersistTicket,
}

impl RecordedError {
    /// The appended record.
    #[must_use]
    pub fn record(&self) -> &ErrorRecord {
        &self.record
    }

    /// Ticket for the write that includes this record.
    #[must_use]
    pub fn ticket(&self) -> &PersistTicket {
        &self.ticket
    }

    /// Wait until the record is durable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the write failed.
    pub async fn persisted(&self) -> Result<()> {
        self.ticket.wait().await
    }
}

impl std::fmt::Display for RecordedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.record.description() {
            Some(description) => write!(f, "{}: {}", self.record.key(), description),
            None => write!(f, "{}", self.record.key()),
        }
    }
}

impl std::error::Error for RecordedError {}

/// Records errors and user history for one session.
#[derive(Debug)]
pub struct Manager {
    config: Config,
    records: RwLock<Snapshot>,
    store: Arc<dyn SnapshotStore>,
    queue: WriteQueue,
    dispatcher: Dispatcher,
    environment: Arc<dyn EnvironmentProvider>,
    downloader: Arc<dyn Downloader>,
}

impl Manager {
    /// Create a manager with empty lists and start its write queue.
    ///
    /// Nothing is loaded from `store`; see [`Manager::open`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn new(
        config: Config,
        store: Arc<dyn SnapshotStore>,
        environment: Arc<dyn EnvironmentProvider>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        let queue = WriteQueue::spawn(Arc::clone(&store), config.recorder.store_key.clone());
        Self {
            config,
            records: RwLock::new(Snapshot::default()),
            store,
            queue,
            dispatcher: Dispatcher::new(),
            environment,
            downloader,
        }
    }

    /// Create a manager and apply the retention rule to the stored session.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or cleared.
    pub async fn open(
        config: Config,
        store: Arc<dyn SnapshotStore>,
        environment: Arc<dyn EnvironmentProvider>,
        downloader: Arc<dyn Downloader>,
    ) -> Result<Self> {
        let manager = Self::new(config, store, environment, downloader);
        manager.initialize_retention().await?;
        Ok(manager)
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Listener registry for record and export events.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Append an error record.
    ///
    /// The write is scheduled, not awaited. Use [`RecordedError::persisted`]
    /// to wait for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if the record is not a valid error record.
    pub fn record_error(&self, record: ErrorRecord) -> Result<RecordedError> {
        record.validate()?;

        let ticket = {
            let mut records = self.records.write();
            records.errors.push(record.clone());
            self.queue.enqueue(records.clone())
        };
        debug!(key = record.key(), generation = ticket.generation(), "Recorded error");

        self.dispatcher.dispatch(&Event::Error(record.clone()));
        Ok(RecordedError { record, ticket })
    }

    /// Append a history record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if the record is not a valid history record.
    pub fn record_history(&self, record: HistoryRecord) -> Result<PersistTicket> {
        record.validate()?;

        let ticket = {
            let mut records = self.records.write();
            records.history.push(record.clone());
            self.queue.enqueue(records.clone())
        };
        debug!(key = record.key(), generation = ticket.generation(), "Recorded history");

        self.dispatcher.dispatch(&Event::History(record));
        Ok(ticket)
    }

    /// Append a record of either kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if the record fails validation.
    pub fn record(&self, record: Record) -> Result<PersistTicket> {
        match record {
            Record::Error(record) => Ok(self.record_error(record)?.ticket),
            Record::History(record) => self.record_history(record),
        }
    }

    /// Error records in the order they were appended.
    #[must_use]
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.records.read().errors.clone()
    }

    /// History records in the order they were appended.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.records.read().history.clone()
    }

    /// A copy of both lists.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.records.read().clone()
    }

    /// Empty both lists and wait until the empty snapshot is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the write failed.
    pub async fn clear(&self) -> Result<()> {
        let ticket = {
            let mut records = self.records.write();
            *records = Snapshot::default();
            self.queue.enqueue(Snapshot::default())
        };
        info!("Cleared all records");
        ticket.wait().await
    }

    /// Wait until everything appended so far is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the latest write failed.
    pub async fn flush(&self) -> Result<()> {
        self.queue.flush().wait().await
    }

    /// Decide whether the stored session should be discarded at `now`.
    ///
    /// A session survives only while its latest error happened on the
    /// same local calendar day. Diagnostic mode never keeps anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn should_clear(&self, now: DateTime<Utc>) -> Result<bool> {
        if self.config.recorder.debug {
            debug!("Diagnostic mode, discarding stored records");
            return Ok(true);
        }

        let Some(stored) = self.store.get(&self.config.recorder.store_key).await? else {
            return Ok(true);
        };
        let Some(latest) = stored.latest_error() else {
            return Ok(true);
        };

        Ok(!same_local_day(latest.timestamp(), now))
    }

    /// Apply the retention rule, then load the stored session if it survives.
    ///
    /// Returns `true` if the records were cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or cleared.
    pub async fn initialize_retention(&self) -> Result<bool> {
        if self.should_clear(Utc::now()).await? {
            self.clear().await?;
            info!("Started a fresh session");
            return Ok(true);
        }

        if self.restore().await? {
            Ok(false)
        } else {
            self.clear().await?;
            Ok(true)
        }
    }

    /// Replace the in-memory lists with the stored session, ignoring retention.
    ///
    /// Returns `false` and leaves the lists alone if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn restore(&self) -> Result<bool> {
        let Some(stored) = self.store.get(&self.config.recorder.store_key).await? else {
            return Ok(false);
        };
        info!(
            errors = stored.errors.len(),
            history = stored.history.len(),
            "Restored stored session"
        );
        *self.records.write() = stored;
        Ok(true)
    }

    /// Pack the current records and host description into an archive.
    ///
    /// Listeners get [`Event::ExportBegin`] before the archive is built and
    /// [`Event::ExportDone`] after. With `download` set the archive is also
    /// handed to the configured [`Downloader`].
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be built or saved.
    pub async fn export(&self, download: bool) -> Result<ExportedArchive> {
        let debug = self.config.recorder.debug;
        let file_name = archive::file_name(&self.config.export, debug, Utc::now());

        self.dispatcher.dispatch(&Event::ExportBegin);

        let snapshot = self.snapshot();
        let environment = self.environment.capture();
        let password = if debug {
            None
        } else {
            self.config.export.active_password().map(str::to_string)
        };
        let strength = self.config.export.encryption_strength;

        let bytes = tokio::task::spawn_blocking(move || {
            let protection = password.as_deref().map(|password| Protection {
                password,
                strength,
            });
            archive::build_archive(&snapshot, &environment, protection)
        })
        .await
        .map_err(|e| Error::internal(format!("archive task failed: {e}")))??;

        self.dispatcher.dispatch(&Event::ExportDone);

        let saved_to = if download {
            Some(self.downloader.save(&file_name, &bytes)?)
        } else {
            None
        };

        info!(file = %file_name, bytes = bytes.len(), "Exported archive");
        Ok(ExportedArchive {
            file_name,
            bytes,
            saved_to,
        })
    }
}

fn same_local_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.with_timezone(&Local).date_naive() == b.with_timezone(&Local).date_naive()
}
