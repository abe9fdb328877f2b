use std::sync::Arc;

use switchplane_core::collab::testing::{BridgeDomainState, InMemoryBridgeDomainTable, InMemoryInterfaceTable, InterfaceState};
use switchplane_core::collab::{BridgeDomainTable, InterfaceTable};
use switchplane_core::l2fib::{EntryFlags, L2FibTable, MacAger};
use switchplane_core::L2FibConfig;

fn table() -> (Arc<L2FibTable>, Arc<InMemoryBridgeDomainTable>, Arc<InMemoryInterfaceTable>) {
    let bd_table = Arc::new(InMemoryBridgeDomainTable::new());
    bd_table.provision(1, BridgeDomainState { seq_num: 0, mac_age: 0, learn_count: 0, learn_limit: 0 });
    bd_table.provision(2, BridgeDomainState { seq_num: 0, mac_age: 0, learn_count: 0, learn_limit: 0 });
    let if_table = Arc::new(InMemoryInterfaceTable::new());
    if_table.provision(3, InterfaceState::default());
    let cfg = L2FibConfig { num_buckets: 8, table_size: 4096 };
    (Arc::new(L2FibTable::new(&cfg, bd_table.clone(), if_table.clone())), bd_table, if_table)
}

#[tokio::test]
async fn flush_interface_bumps_seq_and_ages_out_dependent_entries() {
    let (table, _bd, if_table) = table();
    let mac = [0, 0, 0, 0, 0, 1];
    table.learn(mac, 1, 3, 0).unwrap();
    let ager = MacAger::new(table.clone());
    ager.scan(0).await;
    assert!(table.lookup(mac, 1).is_some());

    let before = if_table.input_seq_num(3).unwrap();
    table.flush_interface(3);
    assert_ne!(if_table.input_seq_num(3).unwrap(), before);

    ager.scan(0).await;
    assert!(table.lookup(mac, 1).is_none());
}

#[tokio::test]
async fn flush_bridge_bumps_seq_and_ages_out_dependent_entries() {
    let (table, bd_table, _if) = table();
    let mac = [0, 0, 0, 0, 0, 2];
    table.learn(mac, 1, 3, 0).unwrap();
    let ager = MacAger::new(table.clone());
    ager.scan(0).await;

    let before = bd_table.seq_num(1).unwrap();
    table.flush_bridge(1);
    assert_ne!(bd_table.seq_num(1).unwrap(), before);

    ager.scan(0).await;
    assert!(table.lookup(mac, 1).is_none());
}

#[tokio::test]
async fn flush_all_bumps_every_valid_bridge() {
    let (table, bd_table, _if) = table();
    let before_1 = bd_table.seq_num(1).unwrap();
    let before_2 = bd_table.seq_num(2).unwrap();

    table.flush_all();

    assert_ne!(bd_table.seq_num(1).unwrap(), before_1);
    assert_ne!(bd_table.seq_num(2).unwrap(), before_2);
}

#[tokio::test]
async fn clear_empties_the_table_and_resets_learn_counts_synchronously() {
    let (table, bd_table, _if) = table();
    table.learn([0, 0, 0, 0, 0, 3], 1, 3, 0).unwrap();
    table.learn([0, 0, 0, 0, 0, 4], 2, 3, 0).unwrap();
    table.add([0, 0, 0, 0, 0, 5], 1, 3, EntryFlags::STATIC, 0).unwrap();

    table.clear();

    assert!(table.dump(None).is_empty());
    assert_eq!(table.global_learn_count(), 0);
    assert_eq!(bd_table.state(1).unwrap().learn_count, 0);
    assert_eq!(bd_table.state(2).unwrap().learn_count, 0);
}

#[tokio::test]
async fn dump_filters_by_bridge_domain() {
    let (table, _bd, _if) = table();
    table.add([0, 0, 0, 0, 0, 6], 1, 3, EntryFlags::STATIC, 0).unwrap();
    table.add([0, 0, 0, 0, 0, 7], 2, 3, EntryFlags::STATIC, 0).unwrap();

    let bd1 = table.dump(Some(1));
    assert_eq!(bd1.len(), 1);
    assert_eq!(bd1[0].0.bd_index(), 1);

    assert_eq!(table.dump(None).len(), 2);
}
