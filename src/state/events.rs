//! Observer registry for state and stat change notifications
//!
//! Listeners are plain callbacks invoked synchronously in registration
//! order. A listener that returns an error or panics is logged and skipped;
//! the remaining listeners still run and the caller never sees the failure.

use crate::core::types::Turn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Error type listeners may return
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type Callback<E> = Box<dyn FnMut(&E) -> Result<(), ListenerError> + Send>;

/// Identifies a registered listener within the registry that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Session-level events broadcast by the state manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateEvent {
    /// A fresh session was created
    SessionCreated {
        /// Session id
        id: String,
    },
    /// A persisted session replaced the active one
    SessionLoaded {
        /// Session id
        id: String,
    },
    /// A message carried commands
    MessageProcessed {
        /// Commands applied
        applied: usize,
        /// Commands that could not be applied
        failed: usize,
    },
    /// The turn counter advanced
    TurnAdvanced {
        /// New turn number
        turn: Turn,
        /// Ids of modifiers that expired this turn
        expired: Vec<String>,
    },
    /// Every stat went back to its base value
    Reset,
    /// A preset replaced the stat set
    PresetApplied {
        /// Preset id
        preset_id: String,
    },
    /// The current stats were saved as a preset
    PresetSaved {
        /// Preset id
        preset_id: String,
    },
}

/// Ordered collection of callbacks for events of type `E`
pub struct ObserverRegistry<E> {
    listeners: Vec<(ListenerHandle, Callback<E>)>,
    next_handle: u64,
}

impl<E> Default for ObserverRegistry<E> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            next_handle: 1,
        }
    }
}

impl<E> fmt::Debug for ObserverRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<E> ObserverRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, listener: F) -> ListenerHandle
    where
        F: FnMut(&E) -> Result<(), ListenerError> + Send + 'static,
    {
        let handle = ListenerHandle(self.next_handle);
        self.attach(handle, listener);
        handle
    }

    /// Register under a handle issued by the owner of several registries
    ///
    /// Later `register` calls never reuse `handle`.
    pub(crate) fn attach<F>(&mut self, handle: ListenerHandle, listener: F)
    where
        F: FnMut(&E) -> Result<(), ListenerError> + Send + 'static,
    {
        self.next_handle = self.next_handle.max(handle.0.saturating_add(1));
        self.listeners.push((handle, Box::new(listener)));
    }

    /// Remove a listener; false if the handle is not registered here
    pub fn unregister(&mut self, handle: ListenerHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(h, _)| *h != handle);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Deliver `event` to every listener
    ///
    /// Returns how many listeners failed.
    pub fn dispatch(&mut self, event: &E) -> usize {
        let mut failures = 0;
        for (handle, listener) in &mut self.listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    tracing::warn!("Listener {:?} failed: {}", handle, e);
                }
                Err(payload) => {
                    failures += 1;
                    tracing::warn!("Listener {:?} panicked: {}", handle, panic_message(&*payload));
                }
            }
        }
        failures
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
