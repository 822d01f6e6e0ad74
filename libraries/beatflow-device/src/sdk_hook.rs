//! Vendor SDK readiness hook
//!
//! The vendor SDK announces itself through one well-known callback that has
//! to exist before the SDK finishes loading. [`SdkHook`] models that slot:
//! at most one registration per hook, and a registration made after the SDK
//! already loaded runs immediately instead of waiting forever.
//!
//! [`SdkHook::global`] is the process-wide instance.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, warn};

type ReadyCallback = Box<dyn FnOnce() + Send>;

static GLOBAL: OnceLock<SdkHook> = OnceLock::new();

/// Outcome of [`SdkHook::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Callback stored; runs when the SDK loads
    Deferred,
    /// SDK was already loaded; callback ran right away
    InvokedImmediately,
    /// Another callback holds the slot; this one was dropped
    AlreadyRegistered,
}

#[derive(Default)]
struct HookState {
    loaded: bool,
    registered: bool,
    pending: Option<ReadyCallback>,
}

/// One-time readiness slot
#[derive(Default)]
pub struct SdkHook {
    state: Mutex<HookState>,
}

impl SdkHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide hook
    pub fn global() -> &'static SdkHook {
        GLOBAL.get_or_init(SdkHook::new)
    }

    /// Register the readiness callback
    pub fn register(&self, callback: impl FnOnce() + Send + 'static) -> Registration {
        let mut state = self.state();
        if state.registered {
            warn!("SDK readiness callback already registered, ignoring");
            return Registration::AlreadyRegistered;
        }
        state.registered = true;

        if state.loaded {
            drop(state);
            debug!("SDK already loaded, invoking readiness callback now");
            callback();
            Registration::InvokedImmediately
        } else {
            state.pending = Some(Box::new(callback));
            Registration::Deferred
        }
    }

    /// Signal that the SDK finished loading
    ///
    /// Runs the pending callback, if any. Later calls do nothing.
    pub fn mark_loaded(&self) {
        let pending = {
            let mut state = self.state();
            if state.loaded {
                return;
            }
            state.loaded = true;
            state.pending.take()
        };

        debug!(callback = pending.is_some(), "SDK loaded");
        if let Some(callback) = pending {
            callback();
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    pub fn is_registered(&self) -> bool {
        self.state().registered
    }

    fn state(&self) -> MutexGuard<'_, HookState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SdkHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("SdkHook")
            .field("loaded", &state.loaded)
            .field("registered", &state.registered)
            .finish()
    }
}
