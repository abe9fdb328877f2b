use std::net::IpAddr;

/// One of the two transport protocols a local endpoint can be reserved
/// for — the 1-byte `proto` field of spec.md §3.4's 24-byte key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportProto {
    Tcp,
    Udp,
}

impl TransportProto {
    /// IANA protocol number, the shape [`crate::collab::SessionLookup6Tuple`]
    /// expects for its `proto` parameter.
    pub fn wire_proto(self) -> u8 {
        match self {
            TransportProto::Tcp => 6,
            TransportProto::Udp => 17,
        }
    }
}

/// `(protocol, fib, IP, port)` identifying the local side of an outbound
/// connection. Represented as plain typed fields rather than a packed byte
/// string: unlike the L2-FIB key, nothing here needs single-word atomic
/// semantics — the registry's hot-path invariant is on the descriptor's
/// `refcnt`, not on this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub proto: TransportProto,
    pub fib_index: u32,
    pub ip: IpAddr,
    pub port: u16,
}

impl EndpointKey {
    pub fn new(proto: TransportProto, fib_index: u32, ip: IpAddr, port: u16) -> Self {
        Self { proto, fib_index, ip, port }
    }
}
