//! Bucket store: a power-of-two array of bucket headers, each owning a
//! [`crate::record`] history stack.

use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use atomic::Atomic;

use crate::record::Record;

/// A hash of zero is reserved to mean "this bucket has never been
/// claimed."
pub(crate) const EMPTY_HASH: u128 = 0;

/// One slot in a [`Store`]: a write-once hash and the head of that
/// bucket's record list.
pub(crate) struct BucketHeader<V> {
    pub(crate) hash: Atomic<u128>,
    pub(crate) head: AtomicPtr<Record<V>>,
}

impl<V> BucketHeader<V> {
    fn empty() -> Self {
        Self {
            hash: Atomic::new(EMPTY_HASH),
            head: AtomicPtr::new(std::ptr::null_mut()),
        }
    }
}

/// One instantiation of the bucket array. A [`crate::table::Table`]
/// holds exactly one active `Store` at a time; migration allocates a
/// new one and swings the active pointer once every bucket has moved.
pub(crate) struct Store<V> {
    pub(crate) mask: usize,
    pub(crate) threshold: usize,
    pub(crate) used_count: AtomicUsize,
    pub(crate) del_count: AtomicUsize,
    pub(crate) buckets: Box<[BucketHeader<V>]>,
    /// Write-once pointer to the store this one is migrating into.
    /// Null until a migration is triggered.
    pub(crate) migration_target: AtomicPtr<Store<V>>,
    /// Next not-yet-claimed bucket index for a migration helper to
    /// take, used only while this store is the outgoing side of a
    /// migration.
    pub(crate) migration_cursor: AtomicUsize,
    /// Number of buckets whose migration has been fully completed
    /// (`MOVED`). Once this reaches `capacity()`, the migration is
    /// done and the active store pointer may be swung.
    pub(crate) migrated_count: AtomicUsize,
}

impl<V> Store<V> {
    /// Allocate a fresh store with `capacity` buckets (must be a
    /// nonzero power of two).
    pub(crate) fn new(capacity: usize, load_threshold_percent: u8) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let buckets = (0..capacity).map(|_| BucketHeader::empty()).collect();
        let threshold = capacity * load_threshold_percent as usize / 100;
        Self {
            mask: capacity - 1,
            threshold,
            used_count: AtomicUsize::new(0),
            del_count: AtomicUsize::new(0),
            buckets,
            migration_target: AtomicPtr::new(std::ptr::null_mut()),
            migration_cursor: AtomicUsize::new(0),
            migrated_count: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.mask + 1
    }

    #[inline]
    fn start_index(&self, hash: u128) -> usize {
        (hash as usize) & self.mask
    }

    /// Linear-probe for the bucket carrying `hash`, CASing it into the
    /// first empty slot seen if it isn't already present.
    ///
    /// Returns `None` only when the store is entirely full of other
    /// hashes (every slot probed is occupied by something else) —
    /// which operations treat as "must migrate first".
    pub(crate) fn acquire_bucket(&self, hash: u128) -> Option<&BucketHeader<V>> {
        debug_assert_ne!(hash, EMPTY_HASH, "zero hash is reserved for empty buckets");
        let cap = self.capacity();
        let start = self.start_index(hash);
        for probe in 0..cap {
            let index = (start + probe) & self.mask;
            let bucket = &self.buckets[index];
            let observed = bucket.hash.load(Ordering::Acquire);
            if observed == hash {
                return Some(bucket);
            }
            if observed == EMPTY_HASH {
                match bucket.hash.compare_exchange_weak(
                    EMPTY_HASH,
                    hash,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return Some(bucket),
                    Err(winner) if winner == hash => return Some(bucket),
                    Err(_) => continue,
                }
            }
        }
        None
    }

    /// Read-only probe: locate the bucket carrying `hash` without
    /// claiming an empty slot.
    pub(crate) fn find_bucket(&self, hash: u128) -> Option<&BucketHeader<V>> {
        debug_assert_ne!(hash, EMPTY_HASH);
        let cap = self.capacity();
        let start = self.start_index(hash);
        for probe in 0..cap {
            let index = (start + probe) & self.mask;
            let bucket = &self.buckets[index];
            let observed = bucket.hash.load(Ordering::Acquire);
            if observed == hash {
                return Some(bucket);
            }
            if observed == EMPTY_HASH {
                return None;
            }
        }
        None
    }

    /// Whether a migration should be triggered before this store
    /// accepts another insert: either the load threshold or the
    /// tombstone threshold (against `used_count`, see DESIGN.md) is
    /// met.
    pub(crate) fn needs_migration(&self, tombstone_threshold_percent: u8) -> bool {
        let used = self.used_count.load(Ordering::Acquire);
        if used >= self.threshold {
            return true;
        }
        let deleted = self.del_count.load(Ordering::Acquire);
        used > 0 && deleted * 100 >= used * tombstone_threshold_percent as usize
    }
}

impl<V> Drop for Store<V> {
    /// Free each bucket's current head. Every record a head ever
    /// superseded was already retired (and is tracked by the owning
    /// `Ebr`'s retirement lists) at the moment it stopped being head,
    /// so the head is the only allocation a bucket still owns outright
    /// — for a fully migrated bucket that's its lone `MOVED` marker;
    /// the chain beneath it belongs to the migration target instead.
    fn drop(&mut self) {
        for bucket in self.buckets.iter_mut() {
            let head = *bucket.head.get_mut();
            if !head.is_null() {
                // SAFETY: `head` was produced by `Ebr::alloc` and has
                // not been freed: it is this bucket's live head, never
                // itself retired, and `&mut self` proves no concurrent
                // access remains.
                unsafe { drop(Box::from_raw(head)) };
            }
        }
    }
}
