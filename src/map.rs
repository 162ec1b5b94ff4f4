//! A small, documented trait over the operations every table variant
//! in this family exposes.
//!
//! Per Design Note "Dynamic dispatch / inheritance across table
//! variants": the source ships many tables that share a shape
//! (get/put/replace/add/remove/len/view) but differ in progress
//! guarantee. Rather than model that with inheritance, this crate
//! expresses the shape as a trait implemented by each concrete table,
//! so callers generic over "a concurrent map with this shape" don't
//! need to know which variant they're holding. Only
//! [`crate::table::Table`], the wait-free order-preserving variant, is
//! implemented here; the lock-based and single-threaded variants this
//! trait would otherwise unify are out of scope (§1).

use crate::epoch::EbrHandle;
use crate::view::ViewEntry;

/// The operations common to every concurrent associative container in
/// this family (§6, Library surface).
pub trait ConcurrentMap<V> {
    /// `get(hash) → (value, present)`.
    fn get(&self, handle: EbrHandle, hash: u128) -> Option<V>;

    /// `put(hash, value) → previous-value-if-any`. Always installs.
    fn put(&self, handle: EbrHandle, hash: u128, value: V) -> Option<V>;

    /// Installs only if the key has no current `USED` record. Returns
    /// the value back, unchanged, if the key was already present.
    fn add(&self, handle: EbrHandle, hash: u128, value: V) -> Result<(), V>;

    /// Installs only if the key currently has a `USED` record,
    /// returning the value it replaced.
    fn replace(&self, handle: EbrHandle, hash: u128, value: V) -> Option<V>;

    /// `remove(hash) → (value, present)`.
    fn remove(&self, handle: EbrHandle, hash: u128) -> Option<V>;

    /// `len() → count`: approximate live-entry count.
    fn len(&self) -> usize;

    /// Whether the table currently reports zero live entries.
    fn is_empty(&self) -> bool;

    /// `view() → ordered snapshot`: every live entry as of one
    /// linearized epoch, ordered by insertion (§4.5).
    fn view(&self, handle: EbrHandle) -> Vec<ViewEntry<V>>;
}

impl<V: Clone> ConcurrentMap<V> for crate::table::Table<V> {
    fn get(&self, handle: EbrHandle, hash: u128) -> Option<V> {
        crate::table::Table::get(self, handle, hash)
    }

    fn put(&self, handle: EbrHandle, hash: u128, value: V) -> Option<V> {
        crate::table::Table::put(self, handle, hash, value)
    }

    fn add(&self, handle: EbrHandle, hash: u128, value: V) -> Result<(), V> {
        crate::table::Table::add(self, handle, hash, value)
    }

    fn replace(&self, handle: EbrHandle, hash: u128, value: V) -> Option<V> {
        crate::table::Table::replace(self, handle, hash, value)
    }

    fn remove(&self, handle: EbrHandle, hash: u128) -> Option<V> {
        crate::table::Table::remove(self, handle, hash)
    }

    fn len(&self) -> usize {
        crate::table::Table::len(self)
    }

    fn is_empty(&self) -> bool {
        crate::table::Table::is_empty(self)
    }

    fn view(&self, handle: EbrHandle) -> Vec<ViewEntry<V>> {
        crate::table::Table::view(self, handle)
    }
}
