use std::sync::Arc;

use switchplane_core::collab::testing::{BridgeDomainState, InMemoryBridgeDomainTable, InMemoryInterfaceTable, InterfaceState};
use switchplane_core::l2fib::{test_support, EntryFlags, L2FibTable, SW_IF_INDEX_INVALID};
use switchplane_core::{DataplaneError, L2FibConfig};

fn table() -> (Arc<L2FibTable>, Arc<InMemoryBridgeDomainTable>) {
    let bd_table = Arc::new(InMemoryBridgeDomainTable::new());
    bd_table.provision(1, BridgeDomainState { seq_num: 0, mac_age: 10, learn_count: 0, learn_limit: 0 });
    let if_table = Arc::new(InMemoryInterfaceTable::new());
    if_table.provision(3, InterfaceState::default());
    let cfg = L2FibConfig { num_buckets: 16, table_size: 4096 };
    (Arc::new(L2FibTable::new(&cfg, bd_table.clone(), if_table)), bd_table)
}

// spec.md §8 scenario 1 and the L2-FIB round-trip property.
#[test]
fn add_then_lookup_sets_age_not() {
    let (table, _bd) = table();
    let mac = [0x52, 0x54, 0x00, 0x53, 0x18, 0x33];
    table.add(mac, 1, 3, EntryFlags::STATIC, 0).unwrap();

    let value = table.lookup(mac, 1).unwrap();
    assert_eq!(value.sw_if_index(), 3);
    assert!(value.flags().contains(EntryFlags::STATIC));
    assert!(value.flags().contains(EntryFlags::AGE_NOT));
}

// spec.md §8 scenario 2.
#[test]
fn filter_entries_have_no_interface_and_are_static() {
    let (table, _bd) = table();
    let mac = [0x52, 0x54, 0x00, 0x53, 0x18, 0x77];
    table.add_filter(mac, 1, 0).unwrap();

    let value = table.lookup(mac, 1).unwrap();
    assert_eq!(value.sw_if_index(), SW_IF_INDEX_INVALID);
    assert!(value.flags().contains(EntryFlags::FILTER));
    assert!(value.flags().contains(EntryFlags::STATIC));
}

// spec.md §8 "Delete-mismatch" property.
#[test]
fn delete_with_mismatched_interface_is_rejected_and_entry_survives() {
    let (table, _bd) = table();
    let mac = [0x52, 0x54, 0x00, 0x53, 0x18, 0x33];
    table.add(mac, 1, 3, EntryFlags::NONE, 0).unwrap();

    let err = table.del(mac, 1, 9).unwrap_err();
    assert_eq!(err, DataplaneError::Mismatch);
    assert!(table.lookup(mac, 1).is_some());
}

#[test]
fn delete_of_absent_entry_is_not_found() {
    let (table, _bd) = table();
    let err = table.del([1, 2, 3, 4, 5, 6], 1, 0).unwrap_err();
    assert_eq!(err, DataplaneError::NotFound);
}

// spec.md §8 scenario 3: bulk-add/check/del over contiguous MACs.
#[test]
fn bulk_add_and_delete_over_contiguous_macs() {
    let (table, _bd) = table();
    let base = [0x52, 0x54, 0x00, 0x53, 0x00, 0x00];
    let macs: Vec<[u8; 6]> = (0..4).map(|i| test_support::increment_mac(base, i)).collect();

    for mac in &macs {
        table.add(*mac, 1, 3, EntryFlags::NONE, 0).unwrap();
    }
    for mac in &macs {
        assert!(table.lookup(*mac, 1).is_some(), "expected {mac:02x?} to be present");
    }

    for mac in &macs {
        table.del(*mac, 1, 0).unwrap();
    }
    // first missing MAC after deletion is reported AWOL by a `check`-style scan
    let first_awol = macs.iter().find(|mac| table.lookup(**mac, 1).is_none());
    assert_eq!(first_awol, Some(&macs[0]));
}

#[test]
fn overwriting_a_learned_entry_with_add_decrements_learn_count() {
    let (table, bd_table) = table();
    let mac = [0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
    table.learn(mac, 1, 3, 0).unwrap();
    assert_eq!(table.global_learn_count(), 1);
    assert_eq!(bd_table.state(1).unwrap().learn_count, 1);

    table.add(mac, 1, 3, EntryFlags::STATIC, 0).unwrap();
    assert_eq!(table.global_learn_count(), 0);
}

// spec.md §4.1 / §7: `add`/`learn` fail `ResourceExhausted` once `table_size`'s
// entry budget is full, and a rejected insert leaves existing state intact.
#[test]
fn learn_beyond_table_size_budget_is_resource_exhausted() {
    let bd_table = Arc::new(InMemoryBridgeDomainTable::new());
    bd_table.provision(1, BridgeDomainState { seq_num: 0, mac_age: 10, learn_count: 0, learn_limit: 0 });
    let if_table = Arc::new(InMemoryInterfaceTable::new());
    if_table.provision(3, InterfaceState::default());
    // 16 bytes per packed (key, value) pair => room for exactly one entry.
    let cfg = L2FibConfig { num_buckets: 1, table_size: 16 };
    let table = L2FibTable::new(&cfg, bd_table, if_table);

    table.learn([0, 0, 0, 0, 0, 1], 1, 3, 0).unwrap();
    let err = table.learn([0, 0, 0, 0, 0, 2], 1, 3, 0).unwrap_err();
    assert_eq!(err, DataplaneError::ResourceExhausted);

    // the rejected insert must not have touched the table.
    assert!(table.lookup([0, 0, 0, 0, 0, 1], 1).is_some());
    assert!(table.lookup([0, 0, 0, 0, 0, 2], 1).is_none());

    // refreshing the already-admitted key is still allowed; it is not a new key.
    table.learn([0, 0, 0, 0, 0, 1], 1, 3, 5).unwrap();
}
