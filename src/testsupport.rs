//! Shared helpers for tests that touch process-wide state.

use std::sync::{Mutex, MutexGuard, OnceLock};

/// Tests that mutate the current directory or juggle the process's standard
/// descriptors hold this lock so they never interleave.
pub(crate) fn lock_process_state() -> MutexGuard<'static, ()> {
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
