//! Reader addressing

use std::fmt;

use uuid::Uuid;

/// Identifier of an OSDP connection (one serial bus or network link)
pub type ConnectionId = Uuid;

/// Physical reader path: a connection plus the reader's OSDP address on it
///
/// This is the key under which a control panel tracks PKOC state, so two
/// readers sharing an address on different connections are distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderAddress {
    /// Connection the reader is attached to
    pub connection_id: ConnectionId,

    /// OSDP address of the reader (0x00 - 0x7E)
    pub address: u8,
}

impl ReaderAddress {
    pub fn new(connection_id: ConnectionId, address: u8) -> Self {
        Self {
            connection_id,
            address,
        }
    }
}

impl fmt::Display for ReaderAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reader[{}@0x{:02X}]", self.connection_id, self.address)
    }
}
