//! `loom` model-check of the EBR reservation/retirement race.
//!
//! Run with `RUSTFLAGS="--cfg loom" cargo test --release --test loom_epoch`.
//! Everything here is `cfg(loom)`-gated; on a normal build this file
//! compiles to nothing; loom does not claim wide enough hardware
//! support for the 128-bit hash slot ([`waithash::store`] isn't public
//! and isn't exercised here), so coverage is scoped to the epoch
//! manager itself per [`waithash::sync`]'s module doc.

#![cfg(loom)]

use std::sync::Arc;

use waithash::config::TableConfigBuilder;
use waithash::epoch::Ebr;

#[test]
fn concurrent_commit_and_retire_never_panics() {
    loom::model(|| {
        let ebr = Arc::new(Ebr::new(
            TableConfigBuilder::new().max_threads(4).build().unwrap(),
        ));

        let writer_ebr = ebr.clone();
        let writer = loom::thread::spawn(move || {
            let handle = writer_ebr.register().unwrap();
            writer_ebr.begin_basic_op(handle);
            let rec = writer_ebr.alloc(1u32);
            unsafe {
                writer_ebr.commit_write(&*rec);
                writer_ebr.retire(handle, rec);
            }
            writer_ebr.end_op(handle);
        });

        let reader_handle = ebr.register().unwrap();
        let epoch = ebr.begin_linearized_op(reader_handle);
        assert!(epoch >= 1);
        ebr.end_op(reader_handle);

        writer.join().unwrap();
    });
}
