//! Typed pub/sub for visit lifecycle events.
//!
//! Delivery is synchronous, in subscription order, within the turn that
//! emits the event; there is no batching. Listeners never short-circuit
//! each other, with one exception: a `before` listener returning `false`
//! halts further delivery for that emission and aborts the visit.
//!
//! # Examples
//!
//! ```
//! use glide_rs::events::{Event, EventBus, EventKind};
//!
//! let bus = EventBus::new();
//! let id = bus.on(EventKind::Success, |event| {
//!     if let Event::Success { page } = event {
//!         println!("now on {}", page.url);
//!     }
//!     true
//! });
//! bus.off(id);
//! ```

use crate::types::{Page, Progress, VisitFailure, VisitInfo};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// The lifecycle events the engine emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// About to start a visit; cancellable.
    Before,
    /// The exchange started.
    Start,
    /// Transfer progress sample.
    Progress,
    /// The visit reached a terminal state after starting.
    Finish,
    /// A page committed successfully.
    Success,
    /// Transport failure or validation errors.
    Error,
    /// The visit was cancelled or interrupted.
    Cancel,
    /// The on-screen page changed (visit commit or history traversal).
    Navigate,
    /// A prefetch request started.
    Prefetching,
    /// A prefetch entry landed in the cache.
    Prefetched,
    /// The committed page carries one-shot flash data.
    Flash,
}

/// One emitted event with its payload.
#[derive(Clone, Debug)]
pub enum Event {
    /// About to start `visit`; a listener returning `false` aborts it.
    Before {
        /// Snapshot of the pending visit.
        visit: VisitInfo,
    },
    /// The exchange for `visit` started.
    Start {
        /// Snapshot of the running visit.
        visit: VisitInfo,
    },
    /// Transfer progress for `visit`.
    Progress {
        /// Snapshot of the running visit.
        visit: VisitInfo,
        /// The progress sample.
        progress: Progress,
    },
    /// `visit` reached a terminal state.
    Finish {
        /// Snapshot of the finished visit.
        visit: VisitInfo,
    },
    /// `page` committed successfully.
    Success {
        /// The committed page.
        page: Page,
    },
    /// A visit failed or the committed page carries validation errors.
    Error {
        /// Snapshot of the visit that failed.
        visit: VisitInfo,
        /// The failure payload.
        failure: VisitFailure,
    },
    /// `visit` was cancelled or interrupted.
    Cancel {
        /// Snapshot of the cancelled visit.
        visit: VisitInfo,
    },
    /// The on-screen page changed.
    Navigate {
        /// The page now on screen.
        page: Page,
    },
    /// A prefetch started for `url`.
    Prefetching {
        /// Target URL of the prefetch.
        url: String,
    },
    /// A prefetch for `url` completed and was cached.
    Prefetched {
        /// Target URL of the prefetch.
        url: String,
        /// The cached page.
        page: Page,
    },
    /// The committed page carries flash data.
    Flash {
        /// The `flash` prop value.
        data: Value,
    },
}

impl Event {
    /// The kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Before { .. } => EventKind::Before,
            Event::Start { .. } => EventKind::Start,
            Event::Progress { .. } => EventKind::Progress,
            Event::Finish { .. } => EventKind::Finish,
            Event::Success { .. } => EventKind::Success,
            Event::Error { .. } => EventKind::Error,
            Event::Cancel { .. } => EventKind::Cancel,
            Event::Navigate { .. } => EventKind::Navigate,
            Event::Prefetching { .. } => EventKind::Prefetching,
            Event::Prefetched { .. } => EventKind::Prefetched,
            Event::Flash { .. } => EventKind::Flash,
        }
    }
}

type Handler = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Identifies one registered listener, for [`EventBus::off`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenerId {
    kind: EventKind,
    id: u64,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(u64, Handler)>>,
}

/// The event register. Cheap to clone; clones share listeners.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `kind`; returns its id for [`EventBus::off`].
    ///
    /// The return value of the handler only matters for
    /// [`EventKind::Before`], where `false` vetoes the visit; return `true`
    /// everywhere else.
    pub fn on(
        &self,
        kind: EventKind,
        handler: impl Fn(&Event) -> bool + Send + Sync + 'static,
    ) -> ListenerId {
        let mut inner = self.inner.lock().expect("event bus poisoned");
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        ListenerId { kind, id }
    }

    /// Remove a listener. Removing twice is a no-op.
    pub fn off(&self, listener: ListenerId) {
        let mut inner = self.inner.lock().expect("event bus poisoned");
        if let Some(handlers) = inner.listeners.get_mut(&listener.kind) {
            handlers.retain(|(id, _)| *id != listener.id);
        }
    }

    /// Deliver `event` to all listeners of its kind, in subscription order.
    ///
    /// Returns `false` only when a [`EventKind::Before`] listener vetoed the
    /// emission; delivery stops at the vetoing listener.
    pub fn emit(&self, event: &Event) -> bool {
        let kind = event.kind();
        // Snapshot handlers so a listener can subscribe/unsubscribe
        // without deadlocking the bus.
        let handlers: Vec<Handler> = {
            let inner = self.inner.lock().expect("event bus poisoned");
            inner
                .listeners
                .get(&kind)
                .map(|hs| hs.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };
        for handler in handlers {
            let keep_going = handler(event);
            if kind == EventKind::Before && !keep_going {
                return false;
            }
        }
        true
    }

    /// Number of listeners currently registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        let inner = self.inner.lock().expect("event bus poisoned");
        inner.listeners.get(&kind).map_or(0, Vec::len)
    }
}
