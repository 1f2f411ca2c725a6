//! Per-interface ARP cache table.
//!
//! A fixed-size arena of entries addressed by slot index. Callers that need
//! a mapping to stay put while they build a datagram take a [`LockToken`];
//! a locked slot is never reclaimed or overwritten. Stale-mapping paths
//! (timeout, removal, hardware change under lock) may only mark a locked
//! entry logically `Free`, leaving its addresses readable until the last
//! token is returned.
//!
//! Every slot carries a generation that is bumped whenever the slot is
//! claimed for a new occupant, so a token can never be mistaken for the
//! entry that replaced the one it locked.
//!
//! # Eviction
//!
//! When a new mapping needs a slot the table picks, in order:
//!
//! 1. the existing entry for the same IP,
//! 2. the first unlocked `Free` slot,
//! 3. the unlocked `Reachable` entry with the greatest age (lowest index on
//!    ties).
//!
//! `Static`, `Incomplete` and locked entries are never evicted.
//!
//! All methods run under the owning interface's lock and only queue
//! [`MappingEvent`]s; delivering them is the caller's job once the lock is
//! released.

use alloc::vec::Vec;

use crate::counters::ArpCounters;
use crate::ethernet::EthAddr;
use crate::ipv4::Ipv4Addr;
use crate::link::InterfaceId;

// ============================================================================
// Entry
// ============================================================================

/// Lifecycle state of a cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Unused (or logically freed while still locked).
    Free,
    /// Resolution request in flight.
    Incomplete,
    /// Resolved; ages out at `expiry`.
    Reachable,
    /// Resolved; never ages and never evicted.
    Static,
}

/// One slot of the table.
#[derive(Debug, Clone, Copy)]
pub struct ArpEntry {
    pub state: EntryState,
    pub ip: Ipv4Addr,
    pub hw: EthAddr,
    /// Absolute tick at which an `Incomplete`/`Reachable` entry goes stale.
    pub expiry: u32,
    pub lock_count: u32,
    pub generation: u32,
}

impl ArpEntry {
    const EMPTY: ArpEntry = ArpEntry {
        state: EntryState::Free,
        ip: Ipv4Addr::UNSPECIFIED,
        hw: EthAddr::ZERO,
        expiry: 0,
        lock_count: 0,
        generation: 0,
    };

    #[inline]
    fn is_locked(&self) -> bool {
        self.lock_count != 0
    }

    #[inline]
    fn holds_mapping(&self) -> bool {
        matches!(self.state, EntryState::Reachable | EntryState::Static)
    }
}

/// Exported view of a resolved mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub ip: Ipv4Addr,
    pub hw: EthAddr,
    pub is_static: bool,
}

/// A mapping that became valid, changed, or went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingEvent {
    pub iface: InterfaceId,
    pub ip: Ipv4Addr,
    pub hw: EthAddr,
    pub valid: bool,
}

// ============================================================================
// Lock Token & Errors
// ============================================================================

/// Capability proving a reference on a resolved cache entry.
///
/// Not `Clone`: it is consumed by `unlock`, so every successful lock is
/// released exactly once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a lock token must be returned with unlock()"]
pub struct LockToken {
    pub(crate) iface: InterfaceId,
    pub(crate) slot: usize,
    pub(crate) generation: u32,
}

impl LockToken {
    /// Interface the locked entry belongs to.
    pub fn interface(&self) -> InterfaceId {
        self.iface
    }
}

/// Why `lookup_and_lock` produced no token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    /// No usable mapping. If creation was requested the caller should now
    /// send a resolution request.
    Miss,
    /// A resolution request for this address is already outstanding.
    Pending,
    /// Every slot is locked, static or pending.
    TableFull,
}

/// Failures of the explicit set/remove API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// Address may not be cached (not unicast, off-link, our own, ...).
    NotPermitted,
    /// Target slot is locked by an outstanding token.
    Busy,
    /// No slot available.
    TableFull,
    /// No entry for this address.
    NotFound,
    /// Interface index outside the configured set.
    UnknownInterface,
}

enum Slot {
    Existing(usize),
    Claimed(usize),
}

impl Slot {
    fn index(&self) -> usize {
        match *self {
            Slot::Existing(i) | Slot::Claimed(i) => i,
        }
    }
}

// ============================================================================
// Table
// ============================================================================

/// Fixed-size cache for one interface.
pub struct ArpTable {
    iface: InterfaceId,
    entries: Vec<ArpEntry>,
    reachable_timeout: u32,
    request_timeout: u32,
}

impl ArpTable {
    pub fn new(iface: InterfaceId, size: usize, reachable_timeout: u32, request_timeout: u32) -> Self {
        let mut entries = Vec::with_capacity(size);
        entries.resize(size, ArpEntry::EMPTY);
        ArpTable {
            iface,
            entries,
            reachable_timeout,
            request_timeout,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Read-only view of a slot.
    pub fn entry(&self, slot: usize) -> Option<&ArpEntry> {
        self.entries.get(slot)
    }

    /// Slot holding a live (non-`Free`) entry for `ip`.
    pub fn find(&self, ip: Ipv4Addr) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.state != EntryState::Free && e.ip == ip)
    }

    /// Look up `ip` and take a reference on it.
    ///
    /// On a miss with `create` set, a slot is claimed and parked in
    /// `Incomplete` until the reply arrives or `request_timeout` elapses.
    pub fn lookup_and_lock(
        &mut self,
        ip: Ipv4Addr,
        create: bool,
        now: u32,
        counters: &ArpCounters,
        events: &mut Vec<MappingEvent>,
    ) -> Result<LockToken, LookupError> {
        if let Some(i) = self.find(ip) {
            let e = &mut self.entries[i];
            return match e.state {
                EntryState::Incomplete => Err(LookupError::Pending),
                _ => {
                    e.lock_count = e.lock_count.saturating_add(1);
                    Ok(LockToken {
                        iface: self.iface,
                        slot: i,
                        generation: e.generation,
                    })
                }
            };
        }

        if !create {
            return Err(LookupError::Miss);
        }

        let slot = self
            .select_slot(ip, now, counters, events)
            .ok_or(LookupError::TableFull)?;
        if self.request_timeout != 0 {
            let e = &mut self.entries[slot.index()];
            e.state = EntryState::Incomplete;
            e.ip = ip;
            e.expiry = now.wrapping_add(self.request_timeout);
        }
        Err(LookupError::Miss)
    }

    /// Drop a reference taken by `lookup_and_lock`.
    pub fn unlock(&mut self, token: LockToken) {
        match self.entries.get_mut(token.slot) {
            Some(e) if e.generation == token.generation && e.lock_count > 0 => {
                e.lock_count -= 1;
            }
            _ => log::warn!(
                "arp: unbalanced unlock on {:?} slot {}",
                token.iface,
                token.slot
            ),
        }
    }

    /// Hardware address of the entry `token` locks.
    ///
    /// Stays readable even if the entry was logically freed meanwhile.
    pub fn hw_addr(&self, token: &LockToken) -> Option<EthAddr> {
        self.entries
            .get(token.slot)
            .filter(|e| e.generation == token.generation && e.is_locked())
            .map(|e| e.hw)
    }

    /// Apply learned resolution data.
    ///
    /// Without `allow_insert` only an existing entry is touched. Returns
    /// `true` if the mapping is now cached with `hw`.
    pub fn update(
        &mut self,
        ip: Ipv4Addr,
        hw: EthAddr,
        allow_insert: bool,
        now: u32,
        counters: &ArpCounters,
        events: &mut Vec<MappingEvent>,
    ) -> bool {
        let slot = match self.find(ip) {
            Some(i) => i,
            None if allow_insert => match self.select_slot(ip, now, counters, events) {
                Some(slot) => slot.index(),
                None => return false,
            },
            None => return false,
        };

        let reachable_timeout = self.reachable_timeout;
        let iface = self.iface;
        let e = &mut self.entries[slot];
        match e.state {
            EntryState::Static => e.hw == hw,
            EntryState::Reachable => {
                if e.hw == hw || !e.is_locked() {
                    if e.hw != hw {
                        events.push(MappingEvent {
                            iface,
                            ip,
                            hw,
                            valid: true,
                        });
                    }
                    e.hw = hw;
                    e.expiry = now.wrapping_add(reachable_timeout);
                    true
                } else {
                    // Holders keep reading the old address; the slot is
                    // released for reuse once they unlock.
                    e.state = EntryState::Free;
                    events.push(MappingEvent {
                        iface,
                        ip,
                        hw: e.hw,
                        valid: false,
                    });
                    log::debug!("arp: {} changed hw while locked, invalidated", ip);
                    false
                }
            }
            EntryState::Incomplete | EntryState::Free => {
                e.ip = ip;
                e.hw = hw;
                if reachable_timeout == 0 {
                    e.state = EntryState::Static;
                } else {
                    e.state = EntryState::Reachable;
                    e.expiry = now.wrapping_add(reachable_timeout);
                }
                events.push(MappingEvent {
                    iface,
                    ip,
                    hw,
                    valid: true,
                });
                true
            }
        }
    }

    /// Explicitly install a mapping.
    pub fn set(
        &mut self,
        ip: Ipv4Addr,
        hw: EthAddr,
        is_static: bool,
        now: u32,
        counters: &ArpCounters,
        events: &mut Vec<MappingEvent>,
    ) -> Result<(), CacheError> {
        let slot = self
            .select_slot(ip, now, counters, events)
            .ok_or(CacheError::TableFull)?
            .index();

        let reachable_timeout = self.reachable_timeout;
        let iface = self.iface;
        let e = &mut self.entries[slot];
        if e.is_locked() {
            return Err(CacheError::Busy);
        }

        let changed = !e.holds_mapping() || e.hw != hw;
        e.ip = ip;
        e.hw = hw;
        if is_static || reachable_timeout == 0 {
            e.state = EntryState::Static;
        } else {
            e.state = EntryState::Reachable;
            e.expiry = now.wrapping_add(reachable_timeout);
        }
        if changed {
            events.push(MappingEvent {
                iface,
                ip,
                hw,
                valid: true,
            });
        }
        Ok(())
    }

    /// Remove the entry for `ip`.
    pub fn remove(&mut self, ip: Ipv4Addr, events: &mut Vec<MappingEvent>) -> Result<(), CacheError> {
        let i = self.find(ip).ok_or(CacheError::NotFound)?;
        let e = &mut self.entries[i];
        if e.holds_mapping() {
            events.push(MappingEvent {
                iface: self.iface,
                ip,
                hw: e.hw,
                valid: false,
            });
        }
        e.state = EntryState::Free;
        Ok(())
    }

    /// Age out entries whose expiry is `now`.
    pub fn sweep(&mut self, now: u32, events: &mut Vec<MappingEvent>) {
        for e in self.entries.iter_mut() {
            match e.state {
                EntryState::Reachable if e.expiry == now => {
                    e.state = EntryState::Free;
                    events.push(MappingEvent {
                        iface: self.iface,
                        ip: e.ip,
                        hw: e.hw,
                        valid: false,
                    });
                }
                EntryState::Incomplete if e.expiry == now => {
                    e.state = EntryState::Free;
                }
                _ => {}
            }
        }
    }

    /// Snapshot of all resolved mappings.
    pub fn mappings(&self) -> Vec<CacheEntry> {
        self.entries
            .iter()
            .filter(|e| e.holds_mapping())
            .map(|e| CacheEntry {
                ip: e.ip,
                hw: e.hw,
                is_static: e.state == EntryState::Static,
            })
            .collect()
    }

    /// Pick a slot for `ip` following the eviction order above.
    ///
    /// A claimed slot comes back `Free` with a fresh generation. Counts a
    /// replacement or a drop in `counters`.
    fn select_slot(
        &mut self,
        ip: Ipv4Addr,
        now: u32,
        counters: &ArpCounters,
        events: &mut Vec<MappingEvent>,
    ) -> Option<Slot> {
        if let Some(i) = self.find(ip) {
            return Some(Slot::Existing(i));
        }

        let free = self
            .entries
            .iter()
            .position(|e| e.state == EntryState::Free && !e.is_locked());

        let slot = match free {
            Some(i) => i,
            None => {
                let i = match self.oldest_reachable(now) {
                    Some(i) => i,
                    None => {
                        counters.inc_dropped_all_locked();
                        log::debug!("arp: {:?} table full, dropping {}", self.iface, ip);
                        return None;
                    }
                };
                let victim = self.entries[i];
                counters.inc_replaced();
                events.push(MappingEvent {
                    iface: self.iface,
                    ip: victim.ip,
                    hw: victim.hw,
                    valid: false,
                });
                log::debug!("arp: evicting {} for {}", victim.ip, ip);
                i
            }
        };

        let e = &mut self.entries[slot];
        let generation = e.generation.wrapping_add(1);
        *e = ArpEntry {
            generation,
            ..ArpEntry::EMPTY
        };
        Some(Slot::Claimed(slot))
    }

    fn oldest_reachable(&self, now: u32) -> Option<usize> {
        let horizon = now.wrapping_add(self.reachable_timeout);
        let mut best: Option<(usize, u32)> = None;
        for (i, e) in self.entries.iter().enumerate() {
            if e.state != EntryState::Reachable || e.is_locked() {
                continue;
            }
            let age = horizon.wrapping_sub(e.expiry);
            match best {
                Some((_, best_age)) if age <= best_age => {}
                _ => best = Some((i, age)),
            }
        }
        best.map(|(i, _)| i)
    }
}

// ============================================================================
// Tests
// ============================================================================
