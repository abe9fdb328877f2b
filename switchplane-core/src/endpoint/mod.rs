mod key;
mod port_alloc;
mod registry;

pub use key::{EndpointKey, TransportProto};
pub use port_alloc::{PortAllocator, RemoteTarget};
pub use registry::{EndpointDescriptor, EndpointRegistry};
