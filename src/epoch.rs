//! Epoch-based memory reclamation (EBR).
//!
//! An [`Ebr`] context is the collaborator the wait-free table drives for
//! both safe memory reclamation and for assigning the linearization
//! epoch of every committed write. Per Design Note 9 this state is
//! **not** a process-wide `static`: it is a context struct owned by a
//! [`crate::table::Table`] and threaded through every operation, so
//! that independent tables (and tests) don't share reservations.
//!
//! The seven operations required of an EBR collaborator (§4.1) are:
//! [`Ebr::begin_basic_op`], [`Ebr::begin_linearized_op`],
//! [`Ebr::end_op`], [`Ebr::alloc`], [`Ebr::commit_write`],
//! [`Ebr::help_commit`], [`Ebr::retire`] and [`Ebr::retire_unused`].

use std::cell::RefCell;
use std::mem::MaybeUninit;

use crossbeam_utils::CachePadded;
use tracing::{debug, trace};

use crate::config::TableConfig;
use crate::error::ConfigError;
use crate::sync::{AtomicU64, AtomicUsize, Ordering};

/// An epoch: either a committed write's linearization point, a
/// thread's current reservation, or a record's retirement stamp.
pub type Epoch = u64;

/// Sentinel reservation value meaning "this thread holds no
/// reservation and may see any epoch that is ever retired."
pub const UNRESERVED: Epoch = u64::MAX;

/// EBR bookkeeping that precedes every tracked allocation.
///
/// `create_epoch` and `write_epoch` start at zero (uncommitted /
/// unset); `retire_epoch` is written exactly once, at [`Ebr::retire`]
/// time.
#[derive(Debug)]
pub struct Header {
    create_epoch: AtomicU64,
    write_epoch: AtomicU64,
    retire_epoch: AtomicU64,
}

impl Header {
    const fn new() -> Self {
        Self {
            create_epoch: AtomicU64::new(0),
            write_epoch: AtomicU64::new(0),
            retire_epoch: AtomicU64::new(0),
        }
    }

    /// The epoch at which this allocation's write was committed, or
    /// zero if not yet committed. Readers must [`Ebr::help_commit`]
    /// before trusting a zero here.
    #[inline]
    pub fn write_epoch(&self) -> Epoch {
        self.write_epoch.load(Ordering::Acquire)
    }

    /// The epoch at which the key this record belongs to was first
    /// made present since its last deletion (or zero if never
    /// recorded). [`crate::view`] helps fill this in lazily.
    #[inline]
    pub fn create_epoch(&self) -> Epoch {
        self.create_epoch.load(Ordering::Acquire)
    }

    /// Seed a create_epoch before this allocation is published to any
    /// other thread. Not synchronized; callers must only use this
    /// before the record is installed into a bucket.
    #[inline]
    pub(crate) fn seed_create_epoch(&self, value: Epoch) {
        self.create_epoch.store(value, Ordering::Relaxed);
    }

    /// Help-install a create_epoch if one hasn't been recorded yet.
    /// Losing the race is benign: some other reader already recorded
    /// an equal-or-earlier value.
    #[inline]
    pub fn help_create_epoch(&self, candidate: Epoch) -> Epoch {
        let _ = self
            .create_epoch
            .compare_exchange(0, candidate, Ordering::AcqRel, Ordering::Acquire);
        self.create_epoch.load(Ordering::Acquire)
    }
}

/// A header-prefixed allocation: the unit [`Ebr`] allocates, commits,
/// and retires. `T` is opaque to the EBR layer.
#[repr(C)]
pub struct Allocation<T> {
    pub header: Header,
    pub data: T,
}

struct Retired {
    ptr: *mut u8,
    retire_epoch: Epoch,
    drop_in_place: unsafe fn(*mut u8),
}

// SAFETY: a `Retired` only ever crosses from the retiring thread to
// that same thread's later scan; it is never observed by another
// thread.
unsafe impl Send for Retired {}

unsafe fn drop_allocation<T>(ptr: *mut u8) {
    // SAFETY: caller guarantees `ptr` was produced by `Ebr::alloc::<T>`
    // and has not already been freed.
    drop(Box::from_raw(ptr as *mut Allocation<T>));
}

unsafe fn drop_box<T>(ptr: *mut u8) {
    // SAFETY: caller guarantees `ptr` was produced by `Box::into_raw::<T>`
    // and has not already been freed.
    drop(Box::from_raw(ptr as *mut T));
}

/// A registered thread's handle into an [`Ebr`] context. Cheap to
/// copy; obtained once via [`Ebr::register`] and kept for the
/// thread's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct EbrHandle {
    tid: usize,
}

impl EbrHandle {
    /// The slot index this handle was assigned. Exposed for tests and
    /// diagnostics; not meaningful across different [`Ebr`] contexts.
    #[must_use]
    pub fn slot(&self) -> usize {
        self.tid
    }
}

/// Process-independent (but per-table) epoch-based reclamation
/// context: a global epoch counter, a fixed-size reservation array,
/// and one retirement list per registered thread.
pub struct Ebr {
    global_epoch: AtomicU64,
    reservations: Box<[CachePadded<AtomicU64>]>,
    retirements: Box<[CachePadded<RefCell<Vec<Retired>>>]>,
    since_scan: Box<[CachePadded<AtomicUsize>]>,
    next_tid: AtomicUsize,
    config: TableConfig,
}

// SAFETY: each thread only ever mutates its own `retirements[tid]`
// entry (enforced by `EbrHandle::tid` being private and obtained only
// through `register`), so cross-thread `Sync` access never races.
unsafe impl Sync for Ebr {}

impl Ebr {
    /// Create a new EBR context.
    #[must_use]
    pub fn new(config: TableConfig) -> Self {
        let reservations = (0..config.max_threads)
            .map(|_| CachePadded::new(AtomicU64::new(UNRESERVED)))
            .collect();
        let retirements = (0..config.max_threads)
            .map(|_| CachePadded::new(RefCell::new(Vec::new())))
            .collect();
        let since_scan = (0..config.max_threads)
            .map(|_| CachePadded::new(AtomicUsize::new(0)))
            .collect();

        Self {
            global_epoch: AtomicU64::new(1),
            reservations,
            retirements,
            since_scan,
            next_tid: AtomicUsize::new(0),
            config,
        }
    }

    /// Register the calling thread. Fatal (returns
    /// [`ConfigError::ThreadLimitExceeded`]) once `max_threads` slots
    /// are handed out; callers embedding this in a [`crate::table::Table`]
    /// treat that as fatal at registration per §4.1's failure model.
    pub fn register(&self) -> Result<EbrHandle, ConfigError> {
        let tid = self.next_tid.fetch_add(1, Ordering::Relaxed);
        if tid >= self.config.max_threads {
            return Err(ConfigError::ThreadLimitExceeded(self.config.max_threads));
        }
        trace!(tid, "ebr thread registered");
        Ok(EbrHandle { tid })
    }

    /// Return a previously registered thread's slot for reuse. Safe to
    /// call only when the thread holds no outstanding reservation and
    /// will perform no further operations through `handle`.
    pub fn unregister(&self, handle: EbrHandle) {
        self.reservations[handle.tid].store(UNRESERVED, Ordering::Release);
    }

    #[inline]
    fn current_epoch(&self) -> Epoch {
        self.global_epoch.load(Ordering::Acquire)
    }

    /// Record the current global epoch into this thread's reservation
    /// slot. Gives no guarantee beyond "will not observe memory
    /// retired strictly before this epoch".
    pub fn begin_basic_op(&self, handle: EbrHandle) -> Epoch {
        let epoch = self.current_epoch();
        self.reservations[handle.tid].store(epoch, Ordering::Release);
        trace!(tid = handle.tid, epoch, "begin_basic_op");
        epoch
    }

    /// Publish the current epoch into the reservation, reread the
    /// global epoch, and retry until they agree. The returned epoch is
    /// simultaneously at-least the reservation and at-most any future
    /// advance, closing the classic sample-then-preempt reclamation
    /// race.
    pub fn begin_linearized_op(&self, handle: EbrHandle) -> Epoch {
        loop {
            let epoch = self.current_epoch();
            self.reservations[handle.tid].store(epoch, Ordering::SeqCst);
            if self.current_epoch() == epoch {
                trace!(tid = handle.tid, epoch, "begin_linearized_op");
                return epoch;
            }
        }
    }

    /// Clear this thread's reservation.
    pub fn end_op(&self, handle: EbrHandle) {
        self.reservations[handle.tid].store(UNRESERVED, Ordering::Release);
        trace!(tid = handle.tid, "end_op");
    }

    /// Allocate a header-prefixed region for `T`, with the header's
    /// epochs all starting at zero.
    pub fn alloc<T>(&self, data: T) -> *mut Allocation<T> {
        let boxed = Box::new(Allocation {
            header: Header::new(),
            data,
        });
        Box::into_raw(boxed)
    }

    /// Allocate without initializing `data` up front, calling `init` to
    /// fill it in place. Mirrors the "hidden preceding header"
    /// allocation idiom for callers that need the pointer identity
    /// before the payload is fully built.
    pub fn alloc_with<T>(&self, init: impl FnOnce(&mut MaybeUninit<T>)) -> *mut Allocation<T> {
        let mut boxed: Box<MaybeUninit<Allocation<T>>> = Box::new_uninit();
        // SAFETY: header and data are both initialized below before
        // `assume_init`.
        unsafe {
            let ptr = boxed.as_mut_ptr();
            std::ptr::write(std::ptr::addr_of_mut!((*ptr).header), Header::new());
            let data_ptr = std::ptr::addr_of_mut!((*ptr).data) as *mut MaybeUninit<T>;
            init(&mut *data_ptr);
            Box::into_raw(boxed.assume_init())
        }
    }

    /// Stamp the linearization epoch of a write into its record,
    /// unless another thread already won the race to commit it.
    /// Returns the epoch that ultimately won, whether ours or not.
    pub fn commit_write<T>(&self, record: &Allocation<T>) -> Epoch {
        let candidate = self.global_epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let _ = record.header.write_epoch.compare_exchange(
            0,
            candidate,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        record.header.write_epoch()
    }

    /// If `record` is not yet committed, commit it. Every reader must
    /// call this before trusting a zero write_epoch, which is what
    /// makes commit wait-free: no reader blocks behind an uncommitted
    /// writer.
    pub fn help_commit<T>(&self, record: &Allocation<T>) -> Epoch {
        let observed = record.header.write_epoch();
        if observed != 0 {
            return observed;
        }
        self.commit_write(record)
    }

    /// Stamp `retire_epoch` and defer reclamation of `ptr` until no
    /// reservation can still observe it. Periodically sweeps this
    /// thread's own retirement list.
    ///
    /// # Safety
    ///
    /// `ptr` must have been produced by `self.alloc::<T>` (or
    /// `alloc_with::<T>`) and not already retired or freed.
    pub unsafe fn retire<T>(&self, handle: EbrHandle, ptr: *mut Allocation<T>) {
        let retire_epoch = self.current_epoch();
        (*ptr).header.retire_epoch.store(retire_epoch, Ordering::Release);

        self.retirements[handle.tid].borrow_mut().push(Retired {
            ptr: ptr as *mut u8,
            retire_epoch,
            drop_in_place: drop_allocation::<T>,
        });

        let count = self.since_scan[handle.tid].fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.config.retire_scan_frequency == 0 {
            self.scan(handle);
        }
    }

    /// Defer reclamation of a plain boxed value that has no
    /// [`Allocation`] header of its own — e.g. a retired store that's
    /// being replaced by a migration. Shares the retiring thread's
    /// retirement list and scan cadence with [`Ebr::retire`].
    ///
    /// # Safety
    ///
    /// `ptr` must have been produced by `Box::into_raw::<T>` and not
    /// already retired or freed.
    pub unsafe fn retire_box<T>(&self, handle: EbrHandle, ptr: *mut T) {
        let retire_epoch = self.current_epoch();

        self.retirements[handle.tid].borrow_mut().push(Retired {
            ptr: ptr as *mut u8,
            retire_epoch,
            drop_in_place: drop_box::<T>,
        });

        let count = self.since_scan[handle.tid].fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.config.retire_scan_frequency == 0 {
            self.scan(handle);
        }
    }

    /// Immediately free `ptr`. Valid only when the caller can prove no
    /// other thread could ever have observed it (e.g. it lost a CAS
    /// race before being published).
    ///
    /// # Safety
    ///
    /// `ptr` must have been produced by `self.alloc::<T>` and must be
    /// unreachable from any other thread.
    pub unsafe fn retire_unused<T>(&self, ptr: *mut Allocation<T>) {
        drop_allocation::<T>(ptr as *mut u8);
    }

    /// Minimum reservation across all live threads, treating
    /// [`UNRESERVED`] as +infinity.
    fn min_reservation(&self) -> Epoch {
        self.reservations
            .iter()
            .map(|r| r.load(Ordering::Acquire))
            .min()
            .unwrap_or(UNRESERVED)
    }

    /// Scan this thread's retirement list and free everything whose
    /// retire_epoch is strictly less than the minimum live
    /// reservation.
    fn scan(&self, handle: EbrHandle) {
        let floor = self.min_reservation();
        let mut list = self.retirements[handle.tid].borrow_mut();
        let mut freed = 0usize;
        list.retain(|item| {
            if item.retire_epoch < floor {
                // SAFETY: retire_epoch < floor means no live reservation
                // can still observe this allocation.
                unsafe { (item.drop_in_place)(item.ptr) };
                freed += 1;
                false
            } else {
                true
            }
        });
        if freed > 0 {
            debug!(tid = handle.tid, freed, floor, "ebr reclaimed retired records");
        }
    }

    /// The validated configuration this context was built with.
    pub fn config(&self) -> &TableConfig {
        &self.config
    }
}

impl Drop for Ebr {
    fn drop(&mut self) {
        // No reservations can be live once the owning Table is
        // dropped; free everything outstanding unconditionally.
        for list in self.retirements.iter() {
            for item in list.borrow_mut().drain(..) {
                unsafe { (item.drop_in_place)(item.ptr) };
            }
        }
    }
}
