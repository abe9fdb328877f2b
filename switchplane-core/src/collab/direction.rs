/// Packet direction a policer or feature is bound to, mirroring the
/// `VLIB_RX`/`VLIB_TX` split `policer_index_by_sw_if_index` is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Rx,
    Tx,
}

impl Direction {
    pub const fn index(self) -> usize {
        match self {
            Direction::Rx => 0,
            Direction::Tx => 1,
        }
    }
}
