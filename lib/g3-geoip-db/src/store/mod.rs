/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};

struct StoreState {
    closed: bool,
    last_updated: Option<DateTime<Utc>>,
}

/// Holder of the active decoder instance.
///
/// Readers load the instance lock free. Writers serialize on the state lock,
/// which also guards the closed flag and the last updated time.
pub(crate) struct SnapshotStore<D> {
    active: ArcSwapOption<D>,
    state: Mutex<StoreState>,
}

pub(crate) enum InstallResult {
    Installed,
    Closed,
}

impl<D> SnapshotStore<D> {
    pub(crate) fn new() -> Self {
        SnapshotStore {
            active: ArcSwapOption::new(None),
            state: Mutex::new(StoreState {
                closed: false,
                last_updated: None,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        // the guarded data is plain values, so it stays usable after a panic
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn load(&self) -> Option<Arc<D>> {
        self.active.load_full()
    }

    /// Make `db` the active instance. The previous instance is dropped after
    /// the new one is in place. If the store has been closed `db` is dropped
    /// without being installed.
    pub(crate) fn install(&self, db: D, modified: DateTime<Utc>) -> InstallResult {
        let mut state = self.lock_state();
        if state.closed {
            drop(db);
            return InstallResult::Closed;
        }
        let old = self.active.swap(Some(Arc::new(db)));
        state.last_updated = match state.last_updated {
            Some(t) if t > modified => Some(t),
            _ => Some(modified),
        };
        drop(old);
        InstallResult::Installed
    }

    pub(crate) fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.lock_state().last_updated
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    /// Mark the store closed and release the active instance.
    ///
    /// Returns true only for the call that did the transition.
    pub(crate) fn close(&self) -> bool {
        let mut state = self.lock_state();
        let first = !state.closed;
        state.closed = true;
        let old = self.active.swap(None);
        drop(state);
        drop(old);
        first
    }
}
