//! # waithash
//!
//! Epoch-based memory reclamation and a wait-free, linearizable,
//! order-preserving concurrent hash table.
//!
//! This crate implements the hard core of a larger family of
//! concurrent associative containers: the epoch-based reclamation
//! manager ([`epoch`]) that every variant in that family drives for
//! both safe memory reclamation and write linearization, and the
//! representative wait-free table ([`table`]) built on top of it —
//! bucket acquisition, per-key record history lists, cooperative store
//! migration on resize, and snapshot views ordered by insertion epoch.
//!
//! The single-threaded reference table, lock-based variants, the
//! higher-level dictionary/set wrappers, and other data structures
//! this family also ships are out of scope here: this crate's table
//! consumes only the [`epoch::Ebr`] interface and a caller-supplied
//! 128-bit hash.
//!
//! ## Module organization
//!
//! - [`epoch`] — the EBR manager: global epoch, per-thread
//!   reservations, retirement lists, allocation headers.
//! - `store` (crate-private) — the bucket array a table holds at any
//!   one time.
//! - `record` (crate-private) — the per-bucket history stack of
//!   immutable modification records.
//! - [`table`] — `get`/`put`/`add`/`replace`/`remove`/`len`/`view`
//!   over the bucket store, driving [`epoch::Ebr`] for linearization.
//! - `migrate` (crate-private) — the cooperative resize protocol.
//! - [`view`] — the snapshot builder behind `Table::view`.
//! - [`map`] — the [`map::ConcurrentMap`] trait shared by table
//!   variants in this family (only [`table::Table`] is implemented
//!   here).
//! - [`config`] — validated, defaulted table/EBR construction
//!   parameters.
//! - [`error`] — the setup-time error enum.
//!
//! ## Example
//!
//! ```
//! use waithash::config::TableConfigBuilder;
//! use waithash::table::Table;
//!
//! let table: Table<&str> = Table::new(TableConfigBuilder::new().build().unwrap());
//! let handle = table.register();
//!
//! assert_eq!(table.put(handle, 0x01, "first"), None);
//! assert_eq!(table.get(handle, 0x01), Some("first"));
//! assert_eq!(table.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Validated, defaulted construction parameters for a table and its
/// EBR context.
pub mod config;

/// Setup-time error enum.
pub mod error;

/// Epoch-based memory reclamation (EBR).
pub mod epoch;

/// A small trait over the shape every table variant in this family
/// shares.
pub mod map;

/// Cooperative store migration (resize).
pub(crate) mod migrate;

/// Per-bucket modification record history.
pub(crate) mod record;

/// The bucket array a table holds at any one time.
pub(crate) mod store;

/// Atomic-type indirection enabling `cfg(loom)` model-checking of the
/// EBR core.
pub(crate) mod sync;

/// The wait-free, linearizable, order-preserving hash table.
pub mod table;

/// The view (linearized, order-preserving snapshot) builder.
pub mod view;
