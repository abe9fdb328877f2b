mod ager;
mod bridge_domain;
mod key;
mod table;

pub use ager::MacAger;
pub use bridge_domain::BridgeDomainConfig;
pub use key::{composite_sn, test_support, EntryFlags, L2FibKey, L2FibValue, SW_IF_INDEX_INVALID};
pub use table::L2FibTable;
