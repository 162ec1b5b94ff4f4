//! End-to-end scenarios 1-4 from the testable-properties table: basic
//! put/get, overwrite-then-remove, insertion-ordered views, and view
//! identity across a delete-then-reinsert.

use waithash::config::TableConfigBuilder;
use waithash::table::Table;

fn table() -> Table<i64> {
    Table::new(TableConfigBuilder::new().max_threads(8).build().unwrap())
}

#[test]
fn scenario_1_put_then_get() {
    let table = table();
    let h = table.register();

    assert_eq!(table.put(h, 0x01, 1), None);
    assert_eq!(table.get(h, 0x01), Some(1));
}

#[test]
fn scenario_2_overwrite_then_remove() {
    let table = table();
    let h = table.register();

    assert_eq!(table.put(h, 0x02, 10), None);
    assert_eq!(table.put(h, 0x02, 20), Some(10));
    assert_eq!(table.get(h, 0x02), Some(20));
    assert_eq!(table.remove(h, 0x02), Some(20));
    assert_eq!(table.get(h, 0x02), None);
}

#[test]
fn scenario_3_view_is_insertion_ordered() {
    let table = table();
    let h = table.register();

    table.put(h, 0xA, 100);
    table.put(h, 0xB, 200);
    table.put(h, 0xC, 300);

    let view = table.view(h);
    let values: Vec<i64> = view.iter().map(|e| e.value).collect();
    assert_eq!(values, vec![100, 200, 300]);

    let epochs: Vec<_> = view.iter().map(|e| e.create_epoch).collect();
    let mut sorted = epochs.clone();
    sorted.sort_unstable();
    assert_eq!(epochs, sorted, "view must already be create_epoch-ordered");
}

#[test]
fn scenario_4_reinsert_after_delete_has_one_entry_at_last_insert_epoch() {
    let table = table();
    let h = table.register();

    table.put(h, 0xA, 1);
    table.remove(h, 0xA);
    table.put(h, 0xA, 2);

    let view = table.view(h);
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].value, 2);
    assert_eq!(
        view[0].create_epoch, view[0].write_epoch,
        "a reinsert after delete starts a fresh create_epoch at its own write_epoch"
    );
}

#[test]
fn add_rejects_when_present_and_replace_rejects_when_absent() {
    let table = table();
    let h = table.register();

    assert_eq!(table.add(h, 0x5, 1), Ok(()));
    assert_eq!(table.add(h, 0x5, 99), Err(99));
    assert_eq!(table.get(h, 0x5), Some(1));

    assert_eq!(table.replace(h, 0x6, 1), None);
    assert_eq!(table.get(h, 0x6), None);

    table.put(h, 0x6, 1);
    assert_eq!(table.replace(h, 0x6, 2), Some(1));
    assert_eq!(table.get(h, 0x6), Some(2));
}

#[test]
fn len_tracks_puts_and_removes() {
    let table = table();
    let h = table.register();

    assert_eq!(table.len(), 0);
    assert!(table.is_empty());

    table.put(h, 0x1, 1);
    table.put(h, 0x2, 2);
    assert_eq!(table.len(), 2);

    table.remove(h, 0x1);
    assert_eq!(table.len(), 1);
    assert!(!table.is_empty());
}
