//! Sequential, single-threaded model check: replay randomized
//! put/remove/get operation sequences against both the table and a
//! reference `HashMap` + insertion-order `Vec`, and assert they agree
//! at every step. Supplements properties 1 (linearizability of get,
//! trivially true with one thread) and 4/5 (view consistency and
//! order) with randomized coverage beyond the hand-picked scenarios.

use std::collections::HashMap;

use proptest::prelude::*;

use waithash::config::TableConfigBuilder;
use waithash::table::Table;

#[derive(Debug, Clone)]
enum Op {
    Put(u128, i32),
    Remove(u128),
    Get(u128),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let key = 1u128..16;
    prop_oneof![
        (key.clone(), any::<i32>()).prop_map(|(k, v)| Op::Put(k, v)),
        key.clone().prop_map(Op::Remove),
        key.prop_map(Op::Get),
    ]
}

proptest! {
    #[test]
    fn matches_reference_hashmap(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let table = Table::<i32>::new(TableConfigBuilder::new().max_threads(2).build().unwrap());
        let handle = table.register();

        let mut reference: HashMap<u128, i32> = HashMap::new();
        // Insertion order since the last delete, one entry per live key.
        let mut order: Vec<u128> = Vec::new();

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    let prev_table = table.put(handle, k, v);
                    let prev_ref = reference.insert(k, v);
                    prop_assert_eq!(prev_table, prev_ref);
                    if !order.contains(&k) {
                        order.push(k);
                    }
                }
                Op::Remove(k) => {
                    let prev_table = table.remove(handle, k);
                    let prev_ref = reference.remove(&k);
                    prop_assert_eq!(prev_table, prev_ref);
                    order.retain(|&existing| existing != k);
                }
                Op::Get(k) => {
                    prop_assert_eq!(table.get(handle, k), reference.get(&k).copied());
                }
            }
        }

        prop_assert_eq!(table.len(), reference.len());

        let view = table.view(handle);
        prop_assert_eq!(view.len(), reference.len());

        let view_keys_in_order: Vec<i32> = view.iter().map(|e| e.value).collect();
        let expected_in_order: Vec<i32> = order.iter().map(|k| reference[k]).collect();
        prop_assert_eq!(view_keys_in_order, expected_in_order);
    }
}
