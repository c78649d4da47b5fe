// SPDX-License-Identifier: GPL-3.0-only

//! Small helpers shared across modules

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked
///
/// All state guarded this way stays consistent between statements, so a
/// poisoned lock carries nothing worth aborting for.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
