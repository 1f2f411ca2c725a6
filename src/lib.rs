//! IPv4 address resolution (ARP) for multi-interface network stacks.
//!
//! This crate provides:
//! - A bounded per-interface resolution cache with reference-counted entry
//!   locks and age-based eviction
//! - RFC 5227 duplicate address detection (probing)
//! - Gratuitous announcements after an address is taken into use
//! - A stateless ARP header codec
//!
//! # Design
//!
//! Everything is owned by one [`ArpResolver`]. Devices, IP configuration and
//! change listeners are reached through the traits in [`link`], so the crate
//! has no global state and no knowledge of any driver.
//!
//! A single periodic [`ArpResolver::tick`] drives entry aging, probe
//! retransmission and announcements. No operation blocks; every call is
//! bounded by the table size.
//!
//! # Example
//!
//! ```ignore
//! let resolver = ArpResolver::new(ArpConfig::with_interfaces(1), link, policy, observer)?;
//!
//! match resolver.lookup_and_lock(eth0, next_hop, true) {
//!     Ok(token) => {
//!         let dst = resolver.get_hw_addr(&token);
//!         // ... build and queue the datagram ...
//!         resolver.unlock(token);
//!     }
//!     Err(LookupError::Miss) => { /* send a request, retry later */ }
//!     Err(_) => { /* pending or full, retry later */ }
//! }
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod announce;
pub mod arp;
pub mod cache;
pub mod config;
pub mod counters;
pub mod dad;
pub mod ethernet;
pub mod ipv4;
pub mod link;
pub mod resolver;

pub use announce::AnnounceContext;
pub use arp::{
    build_arp_probe, build_arp_reply, build_arp_request, build_gratuitous_arp, parse_arp,
    serialize_arp, ArpError, ArpOp, ArpPacket, ArpStats, ArpStatsSnapshot, ARP_PACKET_LEN,
};
pub use cache::{ArpEntry, ArpTable, CacheEntry, CacheError, EntryState, LockToken, LookupError};
pub use config::{ArpConfig, AssignMethod, ConfigError, ProbeSlot};
pub use counters::ArpCounters;
pub use dad::{DadCallback, DadOutcome, ProbeId, ProbeParams, ProbeState};
pub use ethernet::EthAddr;
pub use ipv4::Ipv4Addr;
pub use link::{
    AddressPolicy, InterfaceId, IpConfig, LinkLayer, MappingObserver, NoopObserver, TxError,
};
pub use resolver::{ArpResolver, ProbeError, ResolveError, RxOutcome};
