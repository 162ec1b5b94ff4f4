//! The wait-free, linearizable, order-preserving hash table (§4).
//!
//! A [`Table`] owns exactly one [`Ebr`] context and one active
//! [`Store`] pointer. Every operation accepts a pre-computed 128-bit
//! hash; the table never hashes a key itself (Non-goals, §1).

use std::sync::atomic::{AtomicPtr, Ordering};

use tracing::trace;

use crate::config::TableConfig;
use crate::epoch::{Ebr, EbrHandle};
use crate::migrate;
use crate::record::{find_visible, Payload, Record, RecordData, RecordFlags};
use crate::store::Store;
use crate::view::{self, ViewEntry};

/// How an insert-style operation treats the key's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    /// `put`: always installs, whether or not the key was present.
    Always,
    /// `add`: installs only if the key has no current `USED` record.
    OnlyIfAbsent,
    /// `replace`: installs only if the key currently has a `USED` record.
    OnlyIfPresent,
}

/// Number of CAS attempts before falling back to the wait-free combine
/// policy described in Design Note "Wait-free combining".
const COMBINE_AFTER_RETRIES: u32 = 8;

/// Outcome of [`Table::install`]: distinguishes "the gate refused the
/// write" from "the write ran and displaced this value, if any" — a
/// fresh insert under `Gate::OnlyIfAbsent` and a blocked write under
/// the same gate both involve no displaced value, so the two cases
/// cannot be told apart by `Option<V>` alone.
enum InstallResult<V> {
    /// The gate's precondition wasn't met; no write was performed.
    Blocked,
    /// The write ran, displacing this value if the key was already
    /// `USED`.
    Installed(Option<V>),
}

/// A wait-free, order-preserving open-addressed hash table over
/// caller-hashed keys.
///
/// `V` must be `Clone`: every read-path operation (`get`, `view`, and
/// the displaced-value return of the write-path operations) hands back
/// an owned copy rather than a reference tied to a reservation, so that
/// no caller can be made to hold a guard open indefinitely.
pub struct Table<V> {
    active: AtomicPtr<Store<V>>,
    ebr: Ebr,
    config: TableConfig,
    /// An EBR slot reserved at construction time, charged for
    /// table-internal retirements (retired stores) that don't belong to
    /// any particular caller's operation.
    internal_handle: EbrHandle,
}

// SAFETY: `active` is only ever read via `Acquire` loads and swung via
// CAS; every `Store<V>` it can point to is reachable by any thread that
// holds the table, same as the `Ebr` it's paired with.
unsafe impl<V: Send> Sync for Table<V> {}

impl<V> Table<V> {
    /// Build a new, empty table from a validated configuration.
    ///
    /// # Panics
    ///
    /// Panics if `config.max_threads` is zero, which
    /// [`crate::config::TableConfigBuilder::build`] already rejects.
    #[must_use]
    pub fn new(config: TableConfig) -> Self {
        let capacity = config.initial_capacity();
        let store = Box::into_raw(Box::new(Store::new(capacity, config.load_threshold_percent)));
        let ebr = Ebr::new(config);
        let internal_handle = ebr
            .register()
            .expect("max_threads is validated nonzero by TableConfigBuilder");
        Self {
            active: AtomicPtr::new(store),
            ebr,
            config,
            internal_handle,
        }
    }

    /// Register the calling thread for EBR participation. Must be
    /// called once per thread before any other operation.
    ///
    /// # Panics
    ///
    /// Panics if the table's configured `max_threads` ceiling is
    /// already exhausted — exceeding it is fatal at thread registration
    /// (§4.1's failure model). A caller that needs to handle this
    /// without panicking can drive [`crate::epoch::Ebr::register`]
    /// directly instead.
    pub fn register(&self) -> EbrHandle {
        self.ebr
            .register()
            .expect("thread limit exceeded: increase TableConfig::max_threads")
    }

    /// Release a thread's EBR registration. The thread must not use
    /// `handle` again afterward.
    pub fn unregister(&self, handle: EbrHandle) {
        self.ebr.unregister(handle);
    }

    /// The validated configuration this table was built with.
    #[must_use]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Drive any in-progress migration on `store` to completion and
    /// swing the active pointer, returning the store subsequent probing
    /// should use. Returns `store` unchanged if no migration is active.
    fn drain_migration<'a>(&self, store_ptr: *mut Store<V>, store: &'a Store<V>) -> bool {
        let target_ptr = store.migration_target.load(Ordering::Acquire);
        if target_ptr.is_null() {
            return false;
        }
        // SAFETY: a migration target, once installed, outlives the
        // migration it was created for.
        let target = unsafe { &*target_ptr };
        if migrate::help_migrate(store, target, &self.ebr, self.internal_handle) {
            if self
                .active
                .compare_exchange(store_ptr, target_ptr, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                trace!("table active store swung to migration target");
                // SAFETY: no reservation can observe `store` as the
                // active store any longer; readers still mid-walk are
                // protected by their own reservation epoch.
                unsafe { self.ebr.retire_box(self.internal_handle, store_ptr) };
            }
        }
        true
    }

    /// Reload the active store, helping and swinging past any migration
    /// in progress, until a store with no migration target is found.
    /// Returns that store along with its raw pointer (needed to swing
    /// the active pointer past it later, should it need migrating too).
    fn settled_store(&self) -> (*mut Store<V>, &Store<V>) {
        loop {
            let store_ptr = self.active.load(Ordering::Acquire);
            let store = unsafe { &*store_ptr };
            if !self.drain_migration(store_ptr, store) {
                return (store_ptr, store);
            }
        }
    }

    /// Start a migration if `store` has crossed its load or tombstone
    /// threshold. Idempotent: callers that lose the race to
    /// [`migrate::ensure_target`] simply pick up the winner's target on
    /// their next [`Table::settled_store`] call.
    fn maybe_trigger_migration(&self, store: &Store<V>) {
        if store.needs_migration(self.config.tombstone_threshold_percent) {
            migrate::ensure_target(store, self.config.load_threshold_percent);
        }
    }
}

impl<V: Clone> Table<V> {
    /// `get(hash) → (value, present)`, returned as `Option<V>`.
    pub fn get(&self, handle: EbrHandle, hash: u128) -> Option<V> {
        let epoch = self.ebr.begin_linearized_op(handle);
        let (_, store) = self.settled_store();

        let result = store.find_bucket(hash).and_then(|bucket| {
            let head = bucket.head.load(Ordering::Acquire);
            find_visible(head, epoch, &self.ebr).and_then(|rec| rec.data.value().cloned())
        });

        self.ebr.end_op(handle);
        result
    }

    /// `put(hash, value) → previous-value-if-any`. Always installs,
    /// overwriting any prior value.
    pub fn put(&self, handle: EbrHandle, hash: u128, value: V) -> Option<V> {
        match self.install(handle, hash, Payload::Used(value), Gate::Always) {
            InstallResult::Installed(displaced) => displaced,
            InstallResult::Blocked => unreachable!("Gate::Always never blocks"),
        }
    }

    /// Installs `value` only if the key currently has no `USED` record.
    /// Returns the value passed in, unchanged, wrapped in `Err` if the
    /// key was already present (no write performed); `Ok(())` on a
    /// fresh insert.
    pub fn add(&self, handle: EbrHandle, hash: u128, value: V) -> Result<(), V> {
        match self.install(handle, hash, Payload::Used(value.clone()), Gate::OnlyIfAbsent) {
            InstallResult::Blocked => Err(value),
            InstallResult::Installed(_) => Ok(()),
        }
    }

    /// Installs `value` only if the key currently has a `USED` record,
    /// returning the value it replaced. Returns `None`, performing no
    /// write, if the key was absent.
    pub fn replace(&self, handle: EbrHandle, hash: u128, value: V) -> Option<V> {
        match self.install(handle, hash, Payload::Used(value), Gate::OnlyIfPresent) {
            InstallResult::Blocked => None,
            InstallResult::Installed(displaced) => displaced,
        }
    }

    /// `remove(hash) → (value, present)`, returned as `Option<V>`.
    /// Installs a tombstone only if the key currently has a `USED`
    /// record; a remove of an absent key is a no-op.
    pub fn remove(&self, handle: EbrHandle, hash: u128) -> Option<V> {
        match self.install(handle, hash, Payload::Deleted, Gate::OnlyIfPresent) {
            InstallResult::Blocked => None,
            InstallResult::Installed(displaced) => displaced,
        }
    }

    /// `len() → count`: `used_count - del_count` of the active store,
    /// approximate under concurrent writers.
    pub fn len(&self) -> usize {
        let (_, store) = self.settled_store();
        let used = store.used_count.load(Ordering::Acquire);
        let deleted = store.del_count.load(Ordering::Acquire);
        used.saturating_sub(deleted)
    }

    /// Whether the table currently reports zero live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The active store's bucket count. Exposed so callers (and
    /// tests) can observe that a migration actually grew or rehashed
    /// the table; not part of the core operation set in §6.
    #[must_use]
    pub fn capacity(&self) -> usize {
        let (_, store) = self.settled_store();
        store.capacity()
    }

    /// `view() → ordered snapshot`: every live entry as of a single
    /// linearized epoch, sorted ascending by each entry's
    /// `create_epoch` (§4.5).
    pub fn view(&self, handle: EbrHandle) -> Vec<ViewEntry<V>> {
        let epoch = self.ebr.begin_linearized_op(handle);
        let (_, store) = self.settled_store();
        let entries = view::snapshot(store, epoch, &self.ebr);
        self.ebr.end_op(handle);
        entries
    }

    fn install(
        &self,
        handle: EbrHandle,
        hash: u128,
        payload: Payload<V>,
        gate: Gate,
    ) -> InstallResult<V> {
        self.ebr.begin_basic_op(handle);
        let mut attempts = 0u32;

        let result = loop {
            let (store_ptr, store) = self.settled_store();
            self.maybe_trigger_migration(store);
            if !store.migration_target.load(Ordering::Acquire).is_null() {
                continue;
            }

            let bucket = match store.acquire_bucket(hash) {
                Some(bucket) => bucket,
                None => {
                    self.maybe_trigger_migration(store);
                    migrate::ensure_target(store, self.config.load_threshold_percent);
                    continue;
                }
            };

            let old_head = bucket.head.load(Ordering::Acquire);
            // SAFETY: `old_head`, if non-null, is either the live bucket
            // head or was just read as such; it's kept alive by this
            // op's reservation.
            let prior = unsafe { old_head.as_ref() };

            match (gate, prior.map(|r| r.data.is_used()).unwrap_or(false)) {
                (Gate::OnlyIfAbsent, true) => break InstallResult::Blocked,
                (Gate::OnlyIfPresent, false) => break InstallResult::Blocked,
                _ => {}
            }

            let create_epoch = match (&payload, prior) {
                (Payload::Used(_), Some(rec)) if rec.data.is_used() => rec.header.create_epoch(),
                _ => 0,
            };

            let new_rec = self.ebr.alloc(RecordData {
                payload: Some(clone_payload(&payload)),
                flags: record_flags(&payload),
                prev: old_head,
            });
            if create_epoch != 0 {
                unsafe { (*new_rec).header.seed_create_epoch(create_epoch) };
            }

            match bucket.head.compare_exchange(
                old_head,
                new_rec as *mut Record<V>,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let commit_epoch = self.ebr.commit_write(unsafe { &*new_rec });
                    if create_epoch == 0 {
                        unsafe { (*new_rec).header.help_create_epoch(commit_epoch) };
                    }

                    let displaced = displaced_value(prior);
                    update_counts(store, prior, &payload);
                    if !old_head.is_null() {
                        unsafe { self.ebr.retire(handle, old_head) };
                    }
                    break InstallResult::Installed(displaced);
                }
                Err(_) => {
                    unsafe { self.ebr.retire_unused(new_rec) };
                    attempts += 1;
                    if attempts >= COMBINE_AFTER_RETRIES {
                        trace!(attempts, "install combining with winner after CAS losses");
                        break InstallResult::Installed(displaced_value(prior));
                    }
                }
            }
            let _ = store_ptr;
        };

        self.ebr.end_op(handle);
        result
    }
}

fn clone_payload<V: Clone>(payload: &Payload<V>) -> Payload<V> {
    match payload {
        Payload::Used(v) => Payload::Used(v.clone()),
        Payload::Deleted => Payload::Deleted,
    }
}

fn record_flags<V>(payload: &Payload<V>) -> RecordFlags {
    match payload {
        Payload::Used(_) => RecordFlags::USED,
        Payload::Deleted => RecordFlags::DELETED,
    }
}

fn displaced_value<V: Clone>(prior: Option<&Record<V>>) -> Option<V> {
    prior.and_then(|rec| rec.data.value().cloned())
}

fn update_counts<V>(store: &Store<V>, prior: Option<&Record<V>>, payload: &Payload<V>) {
    let prior_used = prior.map(|r| r.data.is_used()).unwrap_or(false);
    match payload {
        Payload::Used(_) if !prior_used => {
            store.used_count.fetch_add(1, Ordering::AcqRel);
        }
        Payload::Deleted if prior_used => {
            store.del_count.fetch_add(1, Ordering::AcqRel);
        }
        _ => {}
    }
}
