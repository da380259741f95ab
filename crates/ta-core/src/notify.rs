//! Change notifications from the interval store.
//!
//! Stores publish a [`ChangeEvent`] after every committed write. Consumers
//! that recompute derived views (session state, coverage) should wrap their
//! handler with [`debounce`] so that a burst of writes, such as the
//! close-then-open pair of a break, triggers a single recomputation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;

use crate::types::{EmployeeId, EntryId, ScheduleId};

/// Default coalescing window for debounced listeners.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// A committed change to entries or schedules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    EntryInserted {
        entry_id: EntryId,
        employee_id: EmployeeId,
    },
    EntryClosed {
        entry_id: EntryId,
        employee_id: EmployeeId,
    },
    ScheduleChanged {
        schedule_id: ScheduleId,
    },
    /// Another connection committed a change; details are unknown.
    External,
}

/// Callback invoked for every published change.
pub type ChangeListener = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Handle returned by [`ChangeFeed::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type SharedListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Thread-safe fan-out of change events to subscribed listeners.
///
/// Listeners run without the feed's lock held, so they may subscribe or
/// unsubscribe from within their callback.
#[derive(Default)]
pub struct ChangeFeed {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(Subscription, SharedListener)>>,
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: ChangeListener) -> Subscription {
        let subscription = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((subscription, Arc::from(listener)));
        subscription
    }

    /// Removes a listener. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription);
        listeners.len() != before
    }

    pub fn publish(&self, event: &ChangeEvent) {
        let snapshot: Vec<SharedListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        tracing::trace!(?event, listeners = snapshot.len(), "publishing change");
        for listener in &snapshot {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Background worker behind a debounced listener.
#[derive(Debug)]
pub struct DebounceWorker {
    handle: JoinHandle<()>,
}

impl DebounceWorker {
    /// Waits for the worker to flush its last batch and exit.
    ///
    /// The worker only exits once every copy of its listener has been
    /// dropped (for example by unsubscribing it and dropping the feed).
    pub fn join(self) {
        if self.handle.join().is_err() {
            tracing::warn!("debounced change handler panicked");
        }
    }
}

/// Wraps `handler` so that bursts of events are delivered as one batch.
///
/// After the first event of a burst the worker keeps collecting until no
/// event arrives for `window`, then calls `handler` once with everything it
/// collected. Events still pending when the listener is dropped are flushed.
pub fn debounce<F>(window: Duration, mut handler: F) -> (ChangeListener, DebounceWorker)
where
    F: FnMut(Vec<ChangeEvent>) + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<ChangeEvent>();

    let handle = thread::spawn(move || {
        while let Ok(first) = rx.recv() {
            let mut batch = vec![first];
            let disconnected = loop {
                match rx.recv_timeout(window) {
                    Ok(event) => batch.push(event),
                    Err(RecvTimeoutError::Timeout) => break false,
                    Err(RecvTimeoutError::Disconnected) => break true,
                }
            };
            tracing::debug!(events = batch.len(), "dispatching debounced changes");
            handler(batch);
            if disconnected {
                return;
            }
        }
    });

    let listener: ChangeListener = Box::new(move |event: &ChangeEvent| {
        // The worker only stops after every sender is gone.
        let _ = tx.send(event.clone());
    });

    (listener, DebounceWorker { handle })
}
