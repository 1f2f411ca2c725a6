//! Resolver configuration.
//!
//! All durations are in ticks of the periodic timer that drives
//! [`ArpResolver::tick`](crate::ArpResolver::tick).

use alloc::vec::Vec;

use crate::link::InterfaceId;

// ============================================================================
// Defaults
// ============================================================================

/// Default number of cache slots per interface.
pub const DEFAULT_TABLE_SIZE: usize = 16;

/// Default tick rate (100 ms period).
pub const DEFAULT_TICKS_PER_SECOND: u32 = 10;

/// Default lifetime of a learned mapping (2 minutes).
pub const DEFAULT_REACHABLE_TIMEOUT: u32 = 120 * DEFAULT_TICKS_PER_SECOND;

/// Default time an unanswered request keeps its slot (1 second).
pub const DEFAULT_REQUEST_TIMEOUT: u32 = DEFAULT_TICKS_PER_SECOND;

/// Default RNG seed for probe jitter.
pub const DEFAULT_RNG_SEED: u64 = 0x5eed_a4b0_0c4e_d11c;

// ============================================================================
// Assignment Method
// ============================================================================

/// How an address was (or is being) acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignMethod {
    /// Manually configured.
    Static,
    /// Self-assigned 169.254/16 (RFC 3927).
    LinkLocal,
    /// Handed out by a DHCP server.
    Dhcp,
}

/// A DAD context: one per interface and acquisition method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSlot {
    pub interface: InterfaceId,
    pub method: AssignMethod,
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `interface_count` is zero.
    NoInterfaces,
    /// `table_size` is zero.
    EmptyTable,
    /// `ticks_per_second` is zero.
    ZeroTickRate,
    /// A probe slot names an interface outside `interface_count`.
    UnknownInterface,
    /// Two probe slots share interface and method.
    DuplicateProbeSlot,
}

/// Static resolver configuration.
#[derive(Debug, Clone)]
pub struct ArpConfig {
    /// Interfaces are numbered `0..interface_count`.
    pub interface_count: u8,
    /// Slots per interface table.
    pub table_size: usize,
    /// Lifetime of a `Reachable` entry. Zero makes learned entries static.
    pub reachable_timeout: u32,
    /// Lifetime of an `Incomplete` entry. Zero disables pending tracking.
    pub request_timeout: u32,
    pub ticks_per_second: u32,
    pub probe_slots: Vec<ProbeSlot>,
    pub rng_seed: u64,
}

impl Default for ArpConfig {
    fn default() -> Self {
        ArpConfig {
            interface_count: 1,
            table_size: DEFAULT_TABLE_SIZE,
            reachable_timeout: DEFAULT_REACHABLE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            probe_slots: Vec::new(),
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

impl ArpConfig {
    /// Default config with one probe slot per interface and method.
    pub fn with_interfaces(interface_count: u8) -> Self {
        let mut probe_slots = Vec::with_capacity(interface_count as usize * 3);
        for i in 0..interface_count {
            for method in [AssignMethod::Static, AssignMethod::LinkLocal, AssignMethod::Dhcp] {
                probe_slots.push(ProbeSlot {
                    interface: InterfaceId(i),
                    method,
                });
            }
        }
        ArpConfig {
            interface_count,
            probe_slots,
            ..ArpConfig::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interface_count == 0 {
            return Err(ConfigError::NoInterfaces);
        }
        if self.table_size == 0 {
            return Err(ConfigError::EmptyTable);
        }
        if self.ticks_per_second == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        for (i, slot) in self.probe_slots.iter().enumerate() {
            if slot.interface.0 >= self.interface_count {
                return Err(ConfigError::UnknownInterface);
            }
            if self.probe_slots[..i].contains(slot) {
                return Err(ConfigError::DuplicateProbeSlot);
            }
        }
        Ok(())
    }
}
