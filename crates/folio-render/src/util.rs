//! Small shared helpers.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Acquires a read guard, recovering the data from a poisoned lock.
///
/// Every guarded value in this crate is a cache or a settings record whose
/// writes are single assignments, so a panic elsewhere cannot leave it
/// half-updated.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Acquires a write guard, recovering the data from a poisoned lock.
pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Returns the trimmed string, or `None` when it is blank.
pub(crate) fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
