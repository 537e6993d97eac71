//! Typed notifications for record and export lifecycle.
//!
//! A [`Dispatcher`] keeps listeners per [`EventKind`] and calls them
//! synchronously, in registration order, when a matching [`Event`] is
//! dispatched.
//!
//! # Example
//!
//! ```
//! use blackbox::events::{Dispatcher, Event, EventKind};
//!
//! let dispatcher = Dispatcher::new();
//! let id = dispatcher.add_listener(EventKind::ExportDone, |_event: &Event| {
//!     println!("export finished");
//! });
//!
//! dispatcher.dispatch(&Event::ExportDone);
//! assert!(dispatcher.remove_listener(id));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::record::{ErrorRecord, HistoryRecord};

/// The kind of an [`Event`], used to pick listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An error record was appended.
    Error,
    /// A history record was appended.
    History,
    /// Archive export is starting.
    ExportBegin,
    /// Archive export finished.
    ExportDone,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::History => write!(f, "history"),
            Self::ExportBegin => write!(f, "export-begin"),
            Self::ExportDone => write!(f, "export-done"),
        }
    }
}

/// A lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An error record was appended.
    Error(ErrorRecord),
    /// A history record was appended.
    History(HistoryRecord),
    /// Archive export is starting.
    ExportBegin,
    /// Archive export finished.
    ExportDone,
}

impl Event {
    /// The kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Error(_) => EventKind::Error,
            Self::History(_) => EventKind::History,
            Self::ExportBegin => EventKind::ExportBegin,
            Self::ExportDone => EventKind::ExportDone,
        }
    }
}

/// Identifies a registered listener for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

struct Registration {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

/// Publish/subscribe registry for [`Event`]s.
///
/// A panicking listener unwinds through [`Dispatcher::dispatch`]; later
/// listeners for that event are not called. Listeners may register or
/// remove listeners from inside a callback. Such changes apply from the
/// next dispatch.
pub struct Dispatcher {
    registrations: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.registrations.read().len())
            .finish_non_exhaustive()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create a dispatcher with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `listener` for events of `kind`.
    pub fn add_listener<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.registrations.write().push(Registration {
            id,
            kind,
            listener: Arc::new(listener),
        });
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }

    /// Number of listeners registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registrations
            .read()
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Call every listener registered for the event's kind.
    pub fn dispatch(&self, event: &Event) {
        let kind = event.kind();
        let listeners: Vec<Listener> = self
            .registrations
            .read()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| Arc::clone(&r.listener))
            .collect();

        for listener in listeners {
            listener(event);
        }
    }
}
