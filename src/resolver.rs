//! Address resolver: the per-interface caches plus the DAD and announcement
//! state machines, behind one owned context object.
//!
//! # Locking
//!
//! Each interface's table and announcement schedule share one
//! `spin::Mutex`; all DAD contexts share another. Locks are held only for
//! table/state bookkeeping. Anything that leaves the resolver (frame
//! transmission, mapping notifications, DAD callbacks) is queued in an
//! [`Effects`] batch while locked and executed by [`ArpResolver::flush`]
//! after the guard is dropped, so collaborators may call back in freely.
//!
//! # Time
//!
//! A `u32` tick counter advanced by [`ArpResolver::tick`]. Expiry compares
//! for equality against the counter, so wraparound needs no special casing.
//! The counter is read with the interface lock held, so every expiry lands
//! at or after the next sweep of that table.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use rand::rngs::SmallRng;
use rand::SeedableRng;
use spin::Mutex;

use crate::announce::AnnounceContext;
use crate::arp::{
    build_arp_probe, build_arp_reply, build_arp_request, build_gratuitous_arp, parse_arp, ArpOp,
    ArpPacket, ArpStats,
};
use crate::cache::{ArpTable, CacheEntry, CacheError, LockToken, LookupError, MappingEvent};
use crate::config::{ArpConfig, AssignMethod, ConfigError};
use crate::counters::ArpCounters;
use crate::dad::{ConflictCheck, DadCallback, DadOutcome, ProbeAction, ProbeContext, ProbeId, ProbeParams};
use crate::ethernet::EthAddr;
use crate::ipv4::Ipv4Addr;
use crate::link::{AddressPolicy, InterfaceId, IpConfig, LinkLayer, MappingObserver};

// ============================================================================
// Public Result Types
// ============================================================================

/// Verdict on an inbound ARP payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxOutcome {
    /// Header was valid; the message has been processed (possibly ignored).
    Accepted,
    /// Header failed validation; nothing changed.
    InvalidHeader,
}

/// Why `resolve` produced no hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// Interface has no usable address configuration.
    NoAddress,
    /// Destination is not on this link; route via the gateway.
    NotOnLink,
    /// Not resolved yet (a request is or was just sent).
    Miss,
    /// No slot available for a new entry.
    TableFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeError {
    /// Probe id outside the configured probe slots.
    UnknownContext,
}

// ============================================================================
// Deferred Effects
// ============================================================================

enum Outgoing {
    Request {
        iface: InterfaceId,
        sender_ip: Ipv4Addr,
        target_ip: Ipv4Addr,
    },
    Reply {
        iface: InterfaceId,
        dst: EthAddr,
        sender_ip: Ipv4Addr,
        target_hw: EthAddr,
        target_ip: Ipv4Addr,
    },
    Probe {
        iface: InterfaceId,
        candidate: Ipv4Addr,
    },
    Announce {
        iface: InterfaceId,
        ip: Ipv4Addr,
        op: ArpOp,
    },
}

/// Work collected under a lock and executed after it is released.
#[derive(Default)]
struct Effects {
    frames: Vec<Outgoing>,
    events: Vec<MappingEvent>,
    results: Vec<(DadCallback, Ipv4Addr, DadOutcome)>,
}

struct InterfaceState {
    table: ArpTable,
    announce: AnnounceContext,
}

// ============================================================================
// Resolver
// ============================================================================

/// IPv4 address resolution for a set of interfaces.
pub struct ArpResolver {
    ticks_per_second: u32,
    interfaces: Vec<Mutex<InterfaceState>>,
    probes: Mutex<Vec<ProbeContext>>,
    rng: Mutex<SmallRng>,
    now: AtomicU32,
    counters: ArpCounters,
    stats: ArpStats,
    link: Arc<dyn LinkLayer>,
    policy: Arc<dyn AddressPolicy>,
    observer: Arc<dyn MappingObserver>,
}

impl ArpResolver {
    pub fn new(
        config: ArpConfig,
        link: Arc<dyn LinkLayer>,
        policy: Arc<dyn AddressPolicy>,
        observer: Arc<dyn MappingObserver>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let interfaces = (0..config.interface_count)
            .map(|i| {
                Mutex::new(InterfaceState {
                    table: ArpTable::new(
                        InterfaceId(i),
                        config.table_size,
                        config.reachable_timeout,
                        config.request_timeout,
                    ),
                    announce: AnnounceContext::new(),
                })
            })
            .collect();
        let probes = config.probe_slots.iter().map(|s| ProbeContext::new(*s)).collect();

        log::debug!(
            "arp: resolver up, {} interface(s), {} slots each, {} probe context(s)",
            config.interface_count,
            config.table_size,
            config.probe_slots.len()
        );

        Ok(ArpResolver {
            ticks_per_second: config.ticks_per_second,
            interfaces,
            probes: Mutex::new(probes),
            rng: Mutex::new(SmallRng::seed_from_u64(config.rng_seed)),
            now: AtomicU32::new(0),
            counters: ArpCounters::new(),
            stats: ArpStats::new(),
            link,
            policy,
            observer,
        })
    }

    /// Current tick.
    #[inline]
    pub fn now(&self) -> u32 {
        self.now.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> &ArpStats {
        &self.stats
    }

    fn interface(&self, iface: InterfaceId) -> Option<&Mutex<InterfaceState>> {
        self.interfaces.get(iface.index())
    }

    // ========================================================================
    // Lookup / Lock
    // ========================================================================

    /// Find a resolved mapping for `ip` and pin it.
    ///
    /// With `create_if_missing`, a miss reserves an `Incomplete` entry and the
    /// caller is expected to send a resolution request.
    pub fn lookup_and_lock(
        &self,
        iface: InterfaceId,
        ip: Ipv4Addr,
        create_if_missing: bool,
    ) -> Result<LockToken, LookupError> {
        let state = match self.interface(iface) {
            Some(s) => s,
            None => {
                log::warn!("arp: lookup on unknown interface {:?}", iface);
                return Err(LookupError::Miss);
            }
        };

        let mut fx = Effects::default();
        let result = {
            let mut guard = state.lock();
            // Read under the guard so a concurrent tick cannot sweep past it.
            let now = self.now();
            guard
                .table
                .lookup_and_lock(ip, create_if_missing, now, &self.counters, &mut fx.events)
        };
        self.flush(fx);

        match result {
            Ok(_) => self.stats.inc_cache_hits(),
            Err(_) => self.stats.inc_cache_misses(),
        }
        result
    }

    /// Release a token obtained from `lookup_and_lock`.
    pub fn unlock(&self, token: LockToken) {
        if let Some(state) = self.interface(token.interface()) {
            state.lock().table.unlock(token);
        }
    }

    /// Hardware address of the entry `token` pins.
    pub fn get_hw_addr(&self, token: &LockToken) -> Option<EthAddr> {
        self.interface(token.interface())
            .and_then(|state| state.lock().table.hw_addr(token))
    }

    /// Resolve `ip` to a hardware address in one call.
    ///
    /// On a miss with `initiate` set, a request is broadcast from the
    /// interface's own address. An in-flight request is never repeated.
    pub fn resolve(
        &self,
        iface: InterfaceId,
        ip: Ipv4Addr,
        initiate: bool,
    ) -> Result<EthAddr, ResolveError> {
        let cfg = self
            .policy
            .local_config(iface)
            .ok_or(ResolveError::NoAddress)?;
        if !cfg.is_on_link(ip) {
            return Err(ResolveError::NotOnLink);
        }

        match self.lookup_and_lock(iface, ip, initiate) {
            Ok(token) => {
                let hw = self.get_hw_addr(&token);
                self.unlock(token);
                hw.ok_or(ResolveError::Miss)
            }
            Err(LookupError::Miss) => {
                if initiate {
                    let mut fx = Effects::default();
                    fx.frames.push(Outgoing::Request {
                        iface,
                        sender_ip: cfg.ip,
                        target_ip: ip,
                    });
                    self.flush(fx);
                }
                Err(ResolveError::Miss)
            }
            Err(LookupError::Pending) => Err(ResolveError::Miss),
            Err(LookupError::TableFull) => Err(ResolveError::TableFull),
        }
    }

    // ========================================================================
    // Explicit Set / Remove
    // ========================================================================

    pub fn set_static_or_reachable(
        &self,
        iface: InterfaceId,
        ip: Ipv4Addr,
        hw: EthAddr,
        is_static: bool,
    ) -> Result<(), CacheError> {
        if !ip.is_unicast() || hw.is_multicast() || hw.is_zero() {
            return Err(CacheError::NotPermitted);
        }
        let state = self.interface(iface).ok_or(CacheError::UnknownInterface)?;

        let mut fx = Effects::default();
        let result = {
            let mut guard = state.lock();
            let now = self.now();
            guard
                .table
                .set(ip, hw, is_static, now, &self.counters, &mut fx.events)
        };
        self.flush(fx);
        result
    }

    pub fn remove(&self, iface: InterfaceId, ip: Ipv4Addr) -> Result<(), CacheError> {
        let state = self.interface(iface).ok_or(CacheError::UnknownInterface)?;

        let mut fx = Effects::default();
        let result = state.lock().table.remove(ip, &mut fx.events);
        self.flush(fx);
        result
    }

    /// All resolved mappings of `iface`.
    pub fn cache_entries(&self, iface: InterfaceId) -> Vec<CacheEntry> {
        self.interface(iface)
            .map(|state| state.lock().table.mappings())
            .unwrap_or_default()
    }

    // ========================================================================
    // Update Engine
    // ========================================================================

    /// Apply resolution data learned for `ip`.
    ///
    /// Returns `true` if the mapping is now cached. Addresses outside the
    /// interface's subnet, broadcast/multicast addresses, our own address
    /// and anything the access policy refuses are dropped silently.
    pub fn apply_resolution(
        &self,
        iface: InterfaceId,
        ip: Ipv4Addr,
        hw: EthAddr,
        allow_insert: bool,
    ) -> bool {
        let cfg = match self.policy.local_config(iface) {
            Some(cfg) => cfg,
            None => return false,
        };
        let mut fx = Effects::default();
        let cached = self.update(iface, &cfg, ip, hw, allow_insert, &mut fx) == Some(true);
        self.flush(fx);
        cached
    }

    /// Filter and apply one mapping. `None` means the mapping was refused by
    /// policy; `Some(cached)` reports the table outcome.
    fn update(
        &self,
        iface: InterfaceId,
        cfg: &IpConfig,
        ip: Ipv4Addr,
        hw: EthAddr,
        allow_insert: bool,
        fx: &mut Effects,
    ) -> Option<bool> {
        if !ip.is_unicast() || ip == cfg.ip || ip == cfg.broadcast() || !cfg.is_on_link(ip) {
            log::trace!("arp: {:?} ignoring mapping for {}", iface, ip);
            return None;
        }
        if !self.policy.is_permitted(iface, ip, hw) {
            log::trace!("arp: {:?} policy refused {} -> {}", iface, ip, hw);
            return None;
        }

        let state = self.interface(iface)?;
        let mut guard = state.lock();
        let now = self.now();
        let cached = guard
            .table
            .update(ip, hw, allow_insert, now, &self.counters, &mut fx.events);
        Some(cached)
    }

    // ========================================================================
    // Receive Path
    // ========================================================================

    /// Process an inbound ARP payload.
    ///
    /// `src_hw` is the Ethernet source of the frame that carried it.
    pub fn on_resolution_frame(&self, iface: InterfaceId, src_hw: EthAddr, payload: &[u8]) -> RxOutcome {
        self.stats.inc_rx_packets();

        let pkt = match parse_arp(payload) {
            Ok(pkt) => pkt,
            Err(e) => {
                self.stats.inc_rx_errors();
                log::trace!("arp: {:?} bad header: {:?}", iface, e);
                return RxOutcome::InvalidHeader;
            }
        };

        match pkt.op {
            ArpOp::Request => self.stats.inc_rx_requests(),
            ArpOp::Reply => self.stats.inc_rx_replies(),
            ArpOp::Other(_) => {}
        }

        if self.interface(iface).is_none() {
            log::warn!("arp: frame on unknown interface {:?}", iface);
            return RxOutcome::Accepted;
        }
        if pkt.sender_ip.is_multicast() || pkt.sender_ip.is_broadcast() {
            return RxOutcome::Accepted;
        }

        let mut fx = Effects::default();
        let local_hw = self.link.hw_addr(iface);
        if self.check_probes(iface, &pkt, local_hw, &mut fx) {
            self.flush(fx);
            return RxOutcome::Accepted;
        }

        if let Some(cfg) = self.policy.local_config(iface) {
            self.learn(iface, &cfg, &pkt, src_hw, &mut fx);
        }
        self.flush(fx);
        RxOutcome::Accepted
    }

    /// Run `pkt` past every armed DAD context on `iface`. Returns `true` if
    /// it is our own looped-back traffic and must not be processed further.
    fn check_probes(&self, iface: InterfaceId, pkt: &ArpPacket, local_hw: EthAddr, fx: &mut Effects) -> bool {
        let mut probes = self.probes.lock();
        let mut loopback = false;
        for ctx in probes.iter_mut().filter(|c| c.slot().interface == iface) {
            match ctx.check_conflict(pkt, local_hw) {
                ConflictCheck::Unrelated => {}
                ConflictCheck::Loopback => loopback = true,
                ConflictCheck::Conflict(candidate, callback) => {
                    self.stats.inc_conflicts();
                    log::debug!(
                        "arp: {:?} conflict on {}: claimed by {}",
                        iface,
                        candidate,
                        pkt.sender_hw
                    );
                    fx.results.push((
                        callback,
                        candidate,
                        DadOutcome::Conflict {
                            local: local_hw,
                            remote: pkt.sender_hw,
                        },
                    ));
                }
            }
        }
        loopback
    }

    fn learn(&self, iface: InterfaceId, cfg: &IpConfig, pkt: &ArpPacket, src_hw: EthAddr, fx: &mut Effects) {
        let for_us = cfg.ip.is_unicast() && pkt.target_ip == cfg.ip;
        if !for_us {
            if !pkt.sender_ip.is_unspecified() {
                self.update(iface, cfg, pkt.sender_ip, pkt.sender_hw, false, fx);
            }
            return;
        }

        let answer = if pkt.sender_ip.is_unspecified() {
            true
        } else {
            self.update(iface, cfg, pkt.sender_ip, pkt.sender_hw, true, fx).is_some()
        };

        if answer && pkt.op == ArpOp::Request {
            fx.frames.push(Outgoing::Reply {
                iface,
                dst: src_hw,
                sender_ip: cfg.ip,
                target_hw: pkt.sender_hw,
                target_ip: pkt.sender_ip,
            });
        }
    }

    // ========================================================================
    // DAD & Announcements
    // ========================================================================

    /// Probe context configured for `iface` and `method`.
    pub fn probe_context(&self, iface: InterfaceId, method: AssignMethod) -> Option<ProbeId> {
        self.probes
            .lock()
            .iter()
            .position(|c| c.slot().interface == iface && c.slot().method == method)
            .map(ProbeId)
    }

    /// Arm `id` to probe `candidate`, replacing any run in progress.
    pub fn start_probe(
        &self,
        id: ProbeId,
        candidate: Ipv4Addr,
        params: ProbeParams,
        callback: DadCallback,
    ) -> Result<(), ProbeError> {
        let mut probes = self.probes.lock();
        let ctx = probes.get_mut(id.0).ok_or(ProbeError::UnknownContext)?;
        ctx.arm(candidate, params, callback);
        log::debug!(
            "arp: {:?} probing {} ({} probe(s))",
            ctx.slot().interface,
            candidate,
            params.probe_count
        );
        Ok(())
    }

    /// Disarm `id` without reporting a result.
    pub fn stop_probe(&self, id: ProbeId) -> Result<(), ProbeError> {
        let mut probes = self.probes.lock();
        let ctx = probes.get_mut(id.0).ok_or(ProbeError::UnknownContext)?;
        ctx.disarm();
        Ok(())
    }

    /// Schedule `count` gratuitous announcements of `ip`, `interval_ticks`
    /// apart, starting on the next tick. `count == 0` cancels.
    pub fn start_announce(
        &self,
        iface: InterfaceId,
        ip: Ipv4Addr,
        count: u8,
        interval_ticks: u32,
        method: AssignMethod,
    ) {
        match self.interface(iface) {
            Some(state) => state.lock().announce.start(ip, count, interval_ticks, method),
            None => log::warn!("arp: announce on unknown interface {:?}", iface),
        }
    }

    // ========================================================================
    // Timer
    // ========================================================================

    /// Advance time by one tick: age cache entries, then drive announcements
    /// and probes. Frames are only sent on interfaces listed in `online`;
    /// schedules on other interfaces still advance.
    pub fn tick(&self, online: &[InterfaceId]) {
        let now = self.now.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        let mut fx = Effects::default();

        for (i, state) in self.interfaces.iter().enumerate() {
            let iface = InterfaceId(i as u8);
            let mut guard = state.lock();
            guard.table.sweep(now, &mut fx.events);
            if let Some((ip, op)) = guard.announce.on_tick() {
                if online.contains(&iface) {
                    fx.frames.push(Outgoing::Announce { iface, ip, op });
                }
            }
        }

        {
            let mut probes = self.probes.lock();
            let mut rng = self.rng.lock();
            for ctx in probes.iter_mut() {
                let iface = ctx.slot().interface;
                match ctx.on_tick(self.ticks_per_second, &mut *rng) {
                    ProbeAction::None => {}
                    ProbeAction::Probe(candidate) => {
                        if online.contains(&iface) {
                            fx.frames.push(Outgoing::Probe { iface, candidate });
                        }
                    }
                    ProbeAction::Accepted(candidate, callback) => {
                        log::debug!("arp: {:?} {} is free to use", iface, candidate);
                        fx.results.push((callback, candidate, DadOutcome::Accepted));
                    }
                }
            }
        }

        self.flush(fx);
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Read and clear `(replaced, dropped_all_locked)`.
    pub fn get_and_reset_counters(&self) -> (u32, u32) {
        self.counters.get_and_reset()
    }

    // ========================================================================
    // Effects
    // ========================================================================

    /// Execute queued effects. Must be called with no resolver lock held.
    fn flush(&self, fx: Effects) {
        for frame in fx.frames {
            self.send(frame);
        }
        for ev in fx.events {
            self.observer.on_mapping_changed(ev.iface, ev.ip, ev.hw, ev.valid);
        }
        for (callback, candidate, outcome) in fx.results {
            callback(candidate, outcome);
        }
    }

    fn send(&self, frame: Outgoing) {
        let (iface, dst, payload) = match frame {
            Outgoing::Request {
                iface,
                sender_ip,
                target_ip,
            } => {
                self.stats.inc_tx_requests();
                let hw = self.link.hw_addr(iface);
                (iface, EthAddr::BROADCAST, build_arp_request(hw, sender_ip, target_ip))
            }
            Outgoing::Reply {
                iface,
                dst,
                sender_ip,
                target_hw,
                target_ip,
            } => {
                self.stats.inc_tx_replies();
                let hw = self.link.hw_addr(iface);
                // RFC 3927: replies from a link-local source are broadcast.
                let dst = if sender_ip.is_link_local() {
                    EthAddr::BROADCAST
                } else {
                    dst
                };
                (iface, dst, build_arp_reply(hw, sender_ip, target_hw, target_ip))
            }
            Outgoing::Probe { iface, candidate } => {
                self.stats.inc_tx_probes();
                let hw = self.link.hw_addr(iface);
                (iface, EthAddr::BROADCAST, build_arp_probe(hw, candidate))
            }
            Outgoing::Announce { iface, ip, op } => {
                self.stats.inc_tx_announcements();
                let hw = self.link.hw_addr(iface);
                log::debug!("arp: {:?} announcing {}", iface, ip);
                (iface, EthAddr::BROADCAST, build_gratuitous_arp(hw, ip, op))
            }
        };

        if let Err(e) = self.link.transmit(iface, dst, &payload) {
            self.stats.inc_tx_errors();
            log::debug!("arp: {:?} transmit failed: {:?}", iface, e);
        }
    }
}
