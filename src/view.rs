//! The view builder (§4.5): a linearized, order-preserving snapshot of
//! a table's active bucket store at a chosen epoch.
//!
//! Ordering is by each entry's `create_epoch` — the write_epoch of the
//! insertion that first made the key present since its latest delete,
//! if any — with ties broken by `write_epoch` then bucket index
//! (§8, property 5). `create_epoch` is maintained incrementally by the
//! table's install path: a `USED` record installed over a prior
//! `USED` record inherits its predecessor's `create_epoch`,
//! while one installed over `DELETED` or an empty bucket starts a new
//! one. A reader here only needs the fallback path for a record whose
//! `create_epoch` help never landed.

use crate::epoch::{Ebr, Epoch};
use crate::record::find_visible;
use crate::store::Store;

/// One entry of a table view, paired with the epoch it is ordered by.
#[derive(Debug, Clone)]
pub struct ViewEntry<V> {
    /// The live value at snapshot time.
    pub value: V,
    /// The epoch this entry is ordered by: the write_epoch of the
    /// insertion that first made the key present since its latest
    /// delete.
    pub create_epoch: Epoch,
    /// The write_epoch of the record actually visible at the
    /// snapshot's epoch (may differ from `create_epoch` if the key
    /// has been overwritten without an intervening delete).
    pub write_epoch: Epoch,
}

/// Walk every bucket of `store`, collect the record visible at
/// `epoch` (if any and if `USED`), and return them sorted ascending by
/// `(create_epoch, write_epoch, bucket index)`.
pub(crate) fn snapshot<V: Clone>(store: &Store<V>, epoch: Epoch, ebr: &Ebr) -> Vec<ViewEntry<V>> {
    let mut entries: Vec<(usize, ViewEntry<V>)> = Vec::new();

    for (index, bucket) in store.buckets.iter().enumerate() {
        let head = bucket.head.load(std::sync::atomic::Ordering::Acquire);
        let Some(rec) = find_visible(head, epoch, ebr) else {
            continue;
        };
        let Some(value) = rec.data.value() else {
            continue;
        };

        let write_epoch = rec.header.write_epoch();
        let create_epoch = match rec.header.create_epoch() {
            0 => rec.header.help_create_epoch(write_epoch),
            seen => seen,
        };

        entries.push((
            index,
            ViewEntry {
                value: value.clone(),
                create_epoch,
                write_epoch,
            },
        ));
    }

    entries.sort_by_key(|(index, entry)| (entry.create_epoch, entry.write_epoch, *index));
    entries.into_iter().map(|(_, entry)| entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfigBuilder;
    use crate::epoch::Ebr;
    use crate::record::{Payload, Record, RecordData, RecordFlags};
    use crate::store::Store;
    use std::sync::atomic::Ordering;

    fn small_ebr() -> Ebr {
        Ebr::new(TableConfigBuilder::new().max_threads(4).build().unwrap())
    }

    fn push<V>(ebr: &Ebr, store: &Store<V>, hash: u128, payload: Payload<V>) {
        let bucket = store.acquire_bucket(hash).unwrap();
        let old_head = bucket.head.load(Ordering::Acquire);
        let flags = match &payload {
            Payload::Used(_) => RecordFlags::USED,
            Payload::Deleted => RecordFlags::DELETED,
        };
        let rec = ebr.alloc(RecordData {
            payload: Some(payload),
            flags,
            prev: old_head,
        });
        bucket
            .head
            .store(rec as *mut Record<V>, Ordering::Release);
        let commit_epoch = ebr.commit_write(unsafe { &*rec });
        unsafe { (*rec).header.help_create_epoch(commit_epoch) };
    }

    #[test]
    fn snapshot_orders_by_create_epoch() {
        let ebr = small_ebr();
        let store = Store::new(8, 75);

        push(&ebr, &store, 0xA, Payload::Used(1u32));
        push(&ebr, &store, 0xB, Payload::Used(2u32));
        push(&ebr, &store, 0xC, Payload::Used(3u32));

        let epoch = ebr.begin_linearized_op(ebr.register().unwrap());
        let entries = snapshot(&store, epoch, &ebr);
        let values: Vec<u32> = entries.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn reinsert_after_delete_gets_fresh_create_epoch() {
        let ebr = small_ebr();
        let store = Store::new(8, 75);

        push(&ebr, &store, 0xA, Payload::Used(1u32));
        push(&ebr, &store, 0xA, Payload::Deleted);
        push(&ebr, &store, 0xA, Payload::Used(2u32));

        let epoch = ebr.begin_linearized_op(ebr.register().unwrap());
        let entries = snapshot(&store, epoch, &ebr);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, 2);
        assert_eq!(entries[0].create_epoch, entries[0].write_epoch);
    }
}
