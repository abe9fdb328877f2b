/// A single MAC learn/move/delete notification, batched by the ager and
/// handed to the subscribed `MacEventClient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacEvent {
    pub mac: [u8; 6],
    pub bd_index: u16,
    pub sw_if_index: u32,
    pub action: MacEventAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacEventAction {
    Add,
    Move,
    Delete,
}
