use crate::collab::BridgeDomainTable;

/// A point-in-time snapshot of the fields the ager and the `flush_*`
/// operations need from a bridge domain, gathered in one call instead of
/// four separate trait dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeDomainConfig {
    pub bd_index: u16,
    pub seq_num: u8,
    pub mac_age: u8,
    pub learn_count: u32,
    pub learn_limit: u32,
}

impl BridgeDomainConfig {
    pub fn snapshot(bd_table: &dyn BridgeDomainTable, bd_index: u16) -> Option<Self> {
        if !bd_table.is_valid(bd_index) {
            return None;
        }
        Some(Self {
            bd_index,
            seq_num: bd_table.seq_num(bd_index).unwrap_or(0),
            mac_age: bd_table.mac_age(bd_index).unwrap_or(0),
            learn_count: bd_table.learn_count(bd_index),
            learn_limit: bd_table.learn_limit(bd_index).unwrap_or(0),
        })
    }
}
