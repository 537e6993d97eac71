//! `blackbox` - A local recorder for application errors and user history
//!
//! A [`Manager`] keeps the errors and recent actions of one session,
//! persists them to SQLite in the background, discards them once a day has
//! passed since the last error, and packs everything into a (optionally
//! encrypted) zip archive for support.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use blackbox::{Config, DirectoryDownloader, ErrorRecord, HostEnvironment, Manager};
//! use blackbox::storage::SqliteStore;
//!
//! # async fn run() -> blackbox::Result<()> {
//! let config = Config::load()?;
//! let store = SqliteStore::open(config.database_path(), config.recorder.store_name.clone())?;
//! let downloads = DirectoryDownloader::new(config.download_dir());
//! let manager = Manager::open(
//!     config,
//!     Arc::new(store),
//!     Arc::new(HostEnvironment),
//!     Arc::new(downloads),
//! )
//! .await?;
//!
//! let recorded = manager.record_error(ErrorRecord::new("E42", Some("disk full".into())))?;
//! recorded.persisted().await?;
//! let archive = manager.export(true).await?;
//! println!("{} ({})", archive.file_name, archive.digest());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod archive;
pub mod cli;
pub mod config;
pub mod download;
pub mod environment;
pub mod error;
pub mod events;
pub mod logging;
pub mod manager;
pub mod record;
pub mod storage;

pub use archive::ExportedArchive;
pub use config::Config;
pub use download::{DirectoryDownloader, Downloader};
pub use environment::{EmptyEnvironment, EnvironmentProvider, EnvironmentSnapshot, HostEnvironment};
pub use error::{Error, Result};
pub use events::{Dispatcher, Event, EventKind, ListenerId};
pub use logging::init_logging;
pub use manager::{Manager, RecordedError};
pub use record::{ErrorRecord, HistoryRecord, Record, RecordKind};
pub use storage::{PersistTicket, Snapshot, SnapshotStore};
