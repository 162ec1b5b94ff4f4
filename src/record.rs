//! Per-bucket modification records.
//!
//! A bucket's state is a singly-linked, push-only stack of
//! [`Record`]s. Each substantive record (`Used`/`Deleted`) carries an
//! opaque value or tombstones one; migration additionally pushes
//! transparent marker records (`MOVING`/`MOVED`) that carry no data at
//! all and are skipped by every reader — they exist purely so a bucket
//! can record migration progress without ever mutating an installed
//! record.

use bitflags::bitflags;

use crate::epoch::{Allocation, Epoch};

bitflags! {
    /// Record state flags (§3 Data Model).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RecordFlags: u8 {
        /// The record holds a live value.
        const USED = 0b0001;
        /// The record is a tombstone.
        const DELETED = 0b0010;
        /// The bucket has begun migrating (marker, no payload).
        const MOVING = 0b0100;
        /// The bucket has finished migrating (marker, no payload).
        const MOVED = 0b1000;
    }
}

/// The substantive content of a record: either a live value or a
/// tombstone. `None` at the [`RecordData::payload`] level means this
/// record is a migration marker.
pub(crate) enum Payload<V> {
    Used(V),
    Deleted,
}

/// The data half of a [`Record`] (the header half is
/// [`crate::epoch::Header`]).
pub(crate) struct RecordData<V> {
    pub(crate) payload: Option<Payload<V>>,
    pub(crate) flags: RecordFlags,
    pub(crate) prev: *mut Record<V>,
}

/// A bucket history entry: EBR bookkeeping plus [`RecordData`].
pub(crate) type Record<V> = Allocation<RecordData<V>>;

impl<V> RecordData<V> {
    #[inline]
    pub(crate) fn is_marker(&self) -> bool {
        self.payload.is_none()
    }

    #[inline]
    pub(crate) fn is_used(&self) -> bool {
        matches!(self.payload, Some(Payload::Used(_)))
    }

    #[inline]
    pub(crate) fn value(&self) -> Option<&V> {
        match &self.payload {
            Some(Payload::Used(v)) => Some(v),
            _ => None,
        }
    }
}

/// Walk from `head`, skipping transparent migration markers, returning
/// the first substantive record whose committed write_epoch is `<=
/// epoch`. `help_commit` is applied to every substantive record seen
/// so no reader ever blocks behind an uncommitted writer.
///
/// Returns `None` if the chain (ignoring markers and future writes)
/// is exhausted, which means the bucket held nothing visible at
/// `epoch`.
pub(crate) fn find_visible<'a, V>(
    mut cur: *mut Record<V>,
    epoch: Epoch,
    ebr: &'a crate::epoch::Ebr,
) -> Option<&'a Record<V>> {
    loop {
        if cur.is_null() {
            return None;
        }
        // SAFETY: `cur` is either `head` (a live bucket field) or a
        // `prev` pointer reachable from it; both are kept alive by the
        // caller's EBR reservation for the duration of this walk.
        let rec: &'a Record<V> = unsafe { &*cur };
        if rec.data.is_marker() {
            cur = rec.data.prev;
            continue;
        }
        let write_epoch = ebr.help_commit(rec);
        if write_epoch > epoch {
            cur = rec.data.prev;
            continue;
        }
        return Some(rec);
    }
}
