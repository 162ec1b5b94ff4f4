//! Cooperative store migration.
//!
//! Migration is triggered when a store's load or tombstone threshold is
//! reached (see [`Store::needs_migration`]). Any thread that observes
//! the threshold may start one by allocating a fresh store and
//! installing it as the old store's migration target; from that point
//! every thread that subsequently touches the table (§4.3, Design Note
//! on cooperative resize) helps migrate buckets before retrying its own
//! operation, so no single thread is ever required to migrate the
//! whole store alone.
//!
//! Buckets are claimed by index through [`Store::migration_cursor`], so
//! each bucket is migrated by exactly one helper: no per-bucket CAS
//! race is possible, which keeps the per-bucket state machine a single
//! straight-line pass (`Initial` -> `MOVING` -> `MOVED`) instead of a
//! retry loop.

use std::sync::atomic::Ordering;

use crate::epoch::{Ebr, EbrHandle};
use crate::record::{Record, RecordData, RecordFlags};
use crate::store::Store;

/// Growth factor applied when migration is triggered by the load
/// threshold. A tombstone-triggered migration keeps the same capacity:
/// a same-size rehash that reclaims dead buckets rather than growing.
const GROWTH_FACTOR: usize = 2;

/// Ensure `old` has a migration target, allocating one if needed.
/// Concurrent callers converge on a single allocation; whoever loses
/// the race frees its candidate immediately, since nothing can have
/// observed it yet.
pub(crate) fn ensure_target<'a, V>(old: &'a Store<V>, load_threshold_percent: u8) -> &'a Store<V> {
    let existing = old.migration_target.load(Ordering::Acquire);
    if !existing.is_null() {
        // SAFETY: once installed, a migration target is never freed
        // until the table has swung its active pointer past `old`.
        return unsafe { &*existing };
    }

    let used = old.used_count.load(Ordering::Acquire);
    let rehash_in_place = used < old.threshold;
    let capacity = if rehash_in_place {
        old.capacity()
    } else {
        old.capacity() * GROWTH_FACTOR
    };

    let candidate = Box::into_raw(Box::new(Store::new(capacity, load_threshold_percent)));
    match old.migration_target.compare_exchange(
        std::ptr::null_mut(),
        candidate,
        Ordering::AcqRel,
        Ordering::Acquire,
    ) {
        Ok(_) => unsafe { &*candidate },
        Err(winner) => {
            // SAFETY: `candidate` lost the race and was never published;
            // no reader can hold a pointer to it.
            drop(unsafe { Box::from_raw(candidate) });
            unsafe { &*winner }
        }
    }
}

/// Claim and migrate buckets from `old` into `new` until either every
/// bucket has been claimed by some helper or this helper has done its
/// share. Returns `true` once the whole migration is complete (every
/// bucket reached `MOVED`), at which point the caller may swing the
/// table's active store pointer.
///
/// `handle` charges any deferred reclamation this helper's migrated
/// buckets produce (superseded `MOVING` markers) — it does not have to
/// be the handle of whichever caller triggered the migration.
pub(crate) fn help_migrate<V>(old: &Store<V>, new: &Store<V>, ebr: &Ebr, handle: EbrHandle) -> bool {
    let capacity = old.capacity();
    loop {
        let idx = old.migration_cursor.fetch_add(1, Ordering::AcqRel);
        if idx >= capacity {
            return old.migrated_count.load(Ordering::Acquire) >= capacity;
        }

        migrate_bucket_at(idx, old, new, ebr, handle);

        let done = old.migrated_count.fetch_add(1, Ordering::AcqRel) + 1;
        if done >= capacity {
            return true;
        }
    }
}

/// Migrate exactly one bucket. Only ever called once per `idx` per
/// migration, since `migration_cursor` hands each index out exactly
/// once: no other thread can be touching `old.buckets[idx]`'s head
/// concurrently, so plain stores suffice where a freestanding
/// implementation would need a CAS.
fn migrate_bucket_at<V>(idx: usize, old: &Store<V>, new: &Store<V>, ebr: &Ebr, handle: EbrHandle) {
    let old_bucket = &old.buckets[idx];
    let hash = old_bucket.hash.load(Ordering::Acquire);
    if hash == crate::store::EMPTY_HASH {
        return;
    }

    let substantive_head = old_bucket.head.load(Ordering::Acquire);

    let moving = ebr.alloc(RecordData::<V> {
        payload: None,
        flags: RecordFlags::MOVING,
        prev: substantive_head,
    });
    old_bucket
        .head
        .store(moving as *mut Record<V>, Ordering::Release);

    if !substantive_head.is_null() {
        if let Some(new_bucket) = new.acquire_bucket(hash) {
            // The new store is fresh and this is the only writer ever
            // to touch this bucket's head during migration, so a plain
            // store is enough to publish the carried-over chain.
            new_bucket.head.store(substantive_head, Ordering::Release);

            // SAFETY: `substantive_head` was read from a live bucket and
            // is kept alive for the duration of the migration by the old
            // store not yet being retired.
            let live = unsafe { &*substantive_head }.data.is_used();
            if live {
                new.used_count.fetch_add(1, Ordering::AcqRel);
            } else {
                new.del_count.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    let moved = ebr.alloc(RecordData::<V> {
        payload: None,
        flags: RecordFlags::MOVING | RecordFlags::MOVED,
        prev: moving as *mut Record<V>,
    });
    old_bucket
        .head
        .store(moved as *mut Record<V>, Ordering::Release);

    // `moving` is superseded by `moved`, same as any other record
    // superseded by a new head; defer its reclamation until no reader
    // can still be mid-walk through it. `moved` itself is never
    // superseded — it stays the bucket's head until `old` as a whole
    // is reclaimed, which frees it (see `Store::drop`).
    unsafe { ebr.retire(handle, moving) };
}
