//! Atomic-type indirection so the EBR core can be model-checked under
//! `loom` without duplicating its logic.
//!
//! Mirrors the pattern the corpus's `local-rcu` crate uses: everything
//! outside `cfg(loom)` builds uses `std::sync::atomic` directly; under
//! `cfg(loom)`, `cargo test --cfg loom` substitutes loom's shadow
//! atomics and thread API so `loom::model` can explore interleavings
//! of [`crate::epoch::Ebr`]'s reservation/retirement race. Only the
//! epoch manager is threaded through this shim — [`crate::store`]'s
//! 128-bit hash slot uses the `atomic` crate's `Atomic<u128>`
//! regardless of `cfg(loom)`, since loom has no native wide-atomic
//! support; loom coverage is therefore scoped to the EBR core, not the
//! bucket store.

#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[cfg(not(loom))]
pub(crate) mod thread {
    pub(crate) use std::thread::spawn;
}

#[cfg(loom)]
pub(crate) mod thread {
    pub(crate) use loom::thread::spawn;
}
