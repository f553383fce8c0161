//! Transport layer: the duplex byte pipe variants and their common trait.

pub mod accessory;
pub mod mock;
pub mod tcp;
pub mod traits;

pub use accessory::AccessoryChannel;
pub use mock::MockChannel;
pub use tcp::{TcpAcceptor, TcpChannel};
pub use traits::{ChannelKind, TransportChannel, TransportError};
