//! IPv4 addressing helpers used by address resolution.
//!
//! # References
//! - RFC 791: Internet Protocol
//! - RFC 3927: Dynamic Configuration of IPv4 Link-Local Addresses

use core::fmt;

// ============================================================================
// IPv4 Address
// ============================================================================

/// IPv4 address (4 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ipv4Addr(pub [u8; 4]);

impl Ipv4Addr {
    /// Create from 4 octets
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Ipv4Addr([a, b, c, d])
    }

    /// All zeros (0.0.0.0)
    pub const UNSPECIFIED: Ipv4Addr = Ipv4Addr::new(0, 0, 0, 0);

    /// Limited broadcast (255.255.255.255)
    pub const BROADCAST: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);

    /// Check if this is a multicast address (224.0.0.0/4)
    #[inline]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0xf0 == 0xe0
    }

    /// Check if this is the limited broadcast address (255.255.255.255)
    #[inline]
    pub fn is_broadcast(&self) -> bool {
        self.0 == [255, 255, 255, 255]
    }

    /// Check if this is the unspecified address (0.0.0.0)
    #[inline]
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0, 0, 0, 0]
    }

    /// Check if this is an IPv4 link-local address (169.254.0.0/16)
    #[inline]
    pub fn is_link_local(&self) -> bool {
        self.0[0] == 169 && self.0[1] == 254
    }

    /// A unicast address usable as a cache key: not unspecified, multicast
    /// or limited broadcast.
    #[inline]
    pub fn is_unicast(&self) -> bool {
        !self.is_unspecified() && !self.is_multicast() && !self.is_broadcast()
    }

    /// Get the 4 octets
    #[inline]
    pub fn octets(&self) -> [u8; 4] {
        self.0
    }

    /// Convert to u32 (network byte order interpretation)
    #[inline]
    pub fn to_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Check whether `other` is on the same subnet under `mask`.
    #[inline]
    pub fn same_subnet(&self, other: Ipv4Addr, mask: Ipv4Addr) -> bool {
        let m = mask.to_u32();
        (self.to_u32() & m) == (other.to_u32() & m)
    }

    /// Subnet-directed broadcast address for this address under `mask`.
    #[inline]
    pub fn subnet_broadcast(&self, mask: Ipv4Addr) -> Ipv4Addr {
        Ipv4Addr::from(self.to_u32() | !mask.to_u32())
    }
}

impl From<[u8; 4]> for Ipv4Addr {
    fn from(bytes: [u8; 4]) -> Self {
        Ipv4Addr(bytes)
    }
}

impl From<u32> for Ipv4Addr {
    fn from(val: u32) -> Self {
        Ipv4Addr(val.to_be_bytes())
    }
}

impl fmt::Debug for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

// ============================================================================
// Tests
// ============================================================================
