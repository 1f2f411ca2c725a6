//! Collaborator interfaces consumed by the resolver.
//!
//! The resolver never touches a device or the IP configuration directly. It
//! goes through three narrow traits:
//!
//! 1. **`LinkLayer`**: reports each interface's own hardware address and
//!    transmits ARP payloads. Framing (Ethernet header, ethertype 0x0806) is
//!    the implementor's job.
//!
//! 2. **`AddressPolicy`**: answers which IPv4 address, mask and next hop an
//!    interface currently uses, and optionally vets inbound mappings before
//!    they are cached.
//!
//! 3. **`MappingObserver`**: receives one call per mapping that appears,
//!    changes or disappears.
//!
//! # Thread Safety
//!
//! Implementations are called from both the receive path and the tick path,
//! possibly on different cores, and never while a resolver lock is held.
//! They must be `Send + Sync` and may call back into the resolver.

use core::fmt;

use crate::ethernet::EthAddr;
use crate::ipv4::Ipv4Addr;

// ============================================================================
// Interface Identifier
// ============================================================================

/// Index of a network interface (controller) known to the resolver.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InterfaceId(pub u8);

impl InterfaceId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "if{}", self.0)
    }
}

// ============================================================================
// Link Layer
// ============================================================================

/// Errors from transmit operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxError {
    /// No buffer or descriptor available (try again later).
    QueueFull,
    /// Link is down.
    LinkDown,
    /// Interface is not known to the link layer.
    NoDevice,
}

/// Frame transmitter and hardware address source.
pub trait LinkLayer: Send + Sync {
    /// Hardware address of `iface`.
    fn hw_addr(&self, iface: InterfaceId) -> EthAddr;

    /// Send an ARP payload to `dst` (unicast or [`EthAddr::BROADCAST`]).
    fn transmit(&self, iface: InterfaceId, dst: EthAddr, payload: &[u8]) -> Result<(), TxError>;
}

// ============================================================================
// Address Policy
// ============================================================================

/// Layer-3 configuration of one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpConfig {
    pub ip: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl IpConfig {
    /// Whether `remote` can be resolved directly on this link.
    ///
    /// Link-local addresses are on-link whatever the mask says (RFC 3927).
    pub fn is_on_link(&self, remote: Ipv4Addr) -> bool {
        self.ip.same_subnet(remote, self.mask) || self.ip.is_link_local() || remote.is_link_local()
    }

    /// Subnet-directed broadcast address.
    pub fn broadcast(&self) -> Ipv4Addr {
        self.ip.subnet_broadcast(self.mask)
    }
}

/// Subnet and access policy provider.
pub trait AddressPolicy: Send + Sync {
    /// Current address configuration, or `None` if `iface` has no usable
    /// unicast address.
    fn local_config(&self, iface: InterfaceId) -> Option<IpConfig>;

    /// Whether an inbound mapping may be cached.
    fn is_permitted(&self, _iface: InterfaceId, _remote_ip: Ipv4Addr, _remote_hw: EthAddr) -> bool {
        true
    }
}

// ============================================================================
// Mapping Observer
// ============================================================================

/// Change-notification sink.
pub trait MappingObserver: Send + Sync {
    fn on_mapping_changed(&self, iface: InterfaceId, ip: Ipv4Addr, hw: EthAddr, valid: bool);
}

/// Observer that discards all notifications.
pub struct NoopObserver;

impl MappingObserver for NoopObserver {
    fn on_mapping_changed(&self, _iface: InterfaceId, _ip: Ipv4Addr, _hw: EthAddr, _valid: bool) {}
}
