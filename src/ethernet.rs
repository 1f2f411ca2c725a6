//! Ethernet hardware addresses.
//!
//! Only the 48-bit MAC address type lives here; frame construction is left
//! to the link layer that owns the device.

use core::fmt;

/// 48-bit Ethernet MAC address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EthAddr(pub [u8; 6]);

impl EthAddr {
    /// All zeros (unknown hardware address in ARP requests).
    pub const ZERO: EthAddr = EthAddr([0; 6]);

    /// Link-layer broadcast (ff:ff:ff:ff:ff:ff).
    pub const BROADCAST: EthAddr = EthAddr([0xff; 6]);

    /// Create from 6 octets.
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        EthAddr([a, b, c, d, e, f])
    }

    /// Check if this is the broadcast address.
    #[inline]
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    /// Check if the group bit is set (multicast, including broadcast).
    #[inline]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Check if this is the all-zero address.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Get raw octets.
    #[inline]
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for EthAddr {
    fn from(bytes: [u8; 6]) -> Self {
        EthAddr(bytes)
    }
}

impl fmt::Debug for EthAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for EthAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}
